use crate::types::{
    AuthorAssociation, CloserKind, Issue, IssueState, PullRequest, PullRequestState,
    TimelineEvent, TimelineEventKind,
};
use crate::window::TimeWindow;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

/// An open issue with no activity for longer than this is stale.
pub const STALE_AFTER_DAYS: i64 = 14;
/// An open issue created longer ago than this is old.
pub const OLD_AFTER_DAYS: i64 = 120;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Contributor logins, split by affiliation and by whether they were active in the window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContributorSets {
    pub all: BTreeSet<String>,
    pub internal: BTreeSet<String>,
    pub external: BTreeSet<String>,
    pub period: BTreeSet<String>,
    pub period_internal: BTreeSet<String>,
    pub period_external: BTreeSet<String>,
    pub period_first_time: BTreeSet<String>,
}

impl ContributorSets {
    fn record_all_time(&mut self, login: &str, association: &AuthorAssociation) {
        self.all.insert(login.to_string());
        if association.is_internal() {
            self.internal.insert(login.to_string());
        }
        if association.is_external() {
            self.external.insert(login.to_string());
        }
    }

    fn record_period(&mut self, login: &str, association: &AuthorAssociation) {
        self.period.insert(login.to_string());
        if association.is_internal() {
            self.period_internal.insert(login.to_string());
        }
        if association.is_external() {
            self.period_external.insert(login.to_string());
        }
        if association.is_first_time() {
            self.period_first_time.insert(login.to_string());
        }
    }

    /// Adds every login in `other` to the matching set in `self`.
    pub fn union_with(&mut self, other: &ContributorSets) {
        self.all.extend(other.all.iter().cloned());
        self.internal.extend(other.internal.iter().cloned());
        self.external.extend(other.external.iter().cloned());
        self.period.extend(other.period.iter().cloned());
        self.period_internal
            .extend(other.period_internal.iter().cloned());
        self.period_external
            .extend(other.period_external.iter().cloned());
        self.period_first_time
            .extend(other.period_first_time.iter().cloned());
    }
}

/// Counts of records created inside the window, by author affiliation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenedCounts {
    pub total: usize,
    pub internal: usize,
    pub external: usize,
    pub first_time: usize,
}

impl OpenedCounts {
    fn record(&mut self, association: &AuthorAssociation) {
        self.total += 1;
        if association.is_internal() {
            self.internal += 1;
        }
        if association.is_external() {
            self.external += 1;
        }
        if association.is_first_time() {
            self.first_time += 1;
        }
    }

    fn add(&mut self, other: &OpenedCounts) {
        self.total += other.total;
        self.internal += other.internal;
        self.external += other.external;
        self.first_time += other.first_time;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IssueMetrics {
    pub total: usize,
    pub internal: usize,
    pub external: usize,
    pub open: usize,
    pub stale: usize,
    pub old: usize,
    /// Issues with a closing timestamp, regardless of when.
    pub closed_all_time: usize,
    pub closed_by_pull_request: usize,
    /// Days from creation to close, one entry per closed issue.
    pub open_times: Vec<f64>,
    pub opened: OpenedCounts,
    /// Issues closed inside the window.
    pub closed: usize,
    pub contributors: ContributorSets,
}

impl IssueMetrics {
    /// Folds `other` into `self`: counters add, lists concatenate, sets union.
    pub fn merge(&mut self, other: &IssueMetrics) {
        self.total += other.total;
        self.internal += other.internal;
        self.external += other.external;
        self.open += other.open;
        self.stale += other.stale;
        self.old += other.old;
        self.closed_all_time += other.closed_all_time;
        self.closed_by_pull_request += other.closed_by_pull_request;
        self.open_times.extend_from_slice(&other.open_times);
        self.opened.add(&other.opened);
        self.closed += other.closed;
        self.contributors.union_with(&other.contributors);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PullRequestMetrics {
    pub total: usize,
    pub internal: usize,
    pub external: usize,
    pub open: usize,
    /// Days from creation to merge, one entry per merged pull request.
    pub merge_times: Vec<f64>,
    pub opened: OpenedCounts,
    /// Pull requests merged inside the window.
    pub merged: usize,
    /// Pull requests closed without merging inside the window.
    pub closed: usize,
    pub contributors: ContributorSets,
}

impl PullRequestMetrics {
    pub fn merge(&mut self, other: &PullRequestMetrics) {
        self.total += other.total;
        self.internal += other.internal;
        self.external += other.external;
        self.open += other.open;
        self.merge_times.extend_from_slice(&other.merge_times);
        self.opened.add(&other.opened);
        self.merged += other.merged;
        self.closed += other.closed;
        self.contributors.union_with(&other.contributors);
    }
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY
}

/// Timestamp of the most recent timeline event that has one, else the creation time.
pub fn last_activity(issue: &Issue) -> DateTime<Utc> {
    issue
        .timeline
        .iter()
        .filter_map(|event| event.created_at)
        .last()
        .unwrap_or(issue.created_at)
}

/// Whether the final close event in a timeline was performed by a pull request.
///
/// Earlier closes are ignored, so an issue closed by a PR, reopened and then
/// closed by hand is not counted.
pub fn closed_by_pull_request(timeline: &[TimelineEvent]) -> bool {
    timeline
        .iter()
        .fold(None, |last_close, event| match event.kind {
            TimelineEventKind::Closed => Some(event),
            _ => last_close,
        })
        .is_some_and(|event| event.closer == Some(CloserKind::PullRequest))
}

/// Reduces a repository's complete issue collection.
///
/// Staleness and age are measured against `now`; the opened/closed counters and
/// period contributor sets against `window`.
pub fn calculate_issue_metrics(
    issues: &[Issue],
    window: &TimeWindow,
    now: DateTime<Utc>,
) -> IssueMetrics {
    let mut metrics = IssueMetrics {
        total: issues.len(),
        ..Default::default()
    };
    let mut ghosts = 0;

    for issue in issues {
        let association = &issue.author_association;
        let author = issue.author.as_deref();
        if author.is_none() {
            ghosts += 1;
        }

        if let Some(login) = author {
            metrics.contributors.record_all_time(login, association);
        }
        if association.is_internal() {
            metrics.internal += 1;
        }
        if association.is_external() {
            metrics.external += 1;
        }

        if issue.state == IssueState::Open {
            metrics.open += 1;
            if now - last_activity(issue) > Duration::days(STALE_AFTER_DAYS) {
                metrics.stale += 1;
            }
            if now - issue.created_at > Duration::days(OLD_AFTER_DAYS) {
                metrics.old += 1;
            }
        }

        if window.contains(issue.created_at) {
            metrics.opened.record(association);
            if let Some(login) = author {
                metrics.contributors.record_period(login, association);
            }
        }

        if let Some(closed_at) = issue.closed_at {
            metrics.closed_all_time += 1;
            metrics
                .open_times
                .push(days_between(issue.created_at, closed_at));
            if window.contains(closed_at) {
                metrics.closed += 1;
            }
            if closed_by_pull_request(&issue.timeline) {
                metrics.closed_by_pull_request += 1;
            }
        }
    }

    if ghosts > 0 {
        tracing::debug!(ghosts, "Issues without an author excluded from contributors");
    }

    metrics
}

/// Reduces a repository's complete pull request collection.
pub fn calculate_pull_request_metrics(
    pull_requests: &[PullRequest],
    window: &TimeWindow,
) -> PullRequestMetrics {
    let mut metrics = PullRequestMetrics {
        total: pull_requests.len(),
        ..Default::default()
    };
    let mut ghosts = 0;

    for pr in pull_requests {
        let association = &pr.author_association;
        let author = pr.author.as_deref();
        if author.is_none() {
            ghosts += 1;
        }

        if let Some(login) = author {
            metrics.contributors.record_all_time(login, association);
        }
        if association.is_internal() {
            metrics.internal += 1;
        }
        if association.is_external() {
            metrics.external += 1;
        }

        if pr.state == PullRequestState::Open {
            metrics.open += 1;
        }

        if window.contains(pr.created_at) {
            metrics.opened.record(association);
            if let Some(login) = author {
                metrics.contributors.record_period(login, association);
            }
        }

        match (pr.state, pr.merged_at, pr.closed_at) {
            (PullRequestState::Merged, Some(merged_at), _) => {
                metrics
                    .merge_times
                    .push(days_between(pr.created_at, merged_at));
                if window.contains(merged_at) {
                    metrics.merged += 1;
                }
            }
            (PullRequestState::Closed, _, Some(closed_at)) => {
                if window.contains(closed_at) {
                    metrics.closed += 1;
                }
            }
            _ => {}
        }
    }

    if ghosts > 0 {
        tracing::debug!(
            ghosts,
            "Pull requests without an author excluded from contributors"
        );
    }

    metrics
}
