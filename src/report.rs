//! Per-repository report rows and the cross-repository `TOTAL` row.
//!
//! A `RepoSummary` keeps the raw components (counters, duration lists and
//! contributor sets) so that the total can be rebuilt from sums and unions.
//! Percentages and averages are only derived when a `MetricRow` is produced.

use crate::metrics::{
    calculate_issue_metrics, calculate_pull_request_metrics, ContributorSets, IssueMetrics,
    PullRequestMetrics,
};
use crate::types::{RepoCounters, RepoSnapshot};
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

pub const TOTAL_ROW_NAME: &str = "TOTAL";

const NOT_APPLICABLE: &str = "N/A";

/// A whole-number derived value, or "N/A" when it has no defined value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ratio(pub Option<u64>);

impl Ratio {
    /// `round(100 * numerator / denominator)`, or N/A for a zero denominator.
    pub fn percent(numerator: usize, denominator: usize) -> Self {
        if denominator == 0 {
            return Ratio(None);
        }
        Ratio(Some(
            (100.0 * numerator as f64 / denominator as f64).round() as u64,
        ))
    }

    /// Mean of `values` rounded to a whole number, or N/A when empty.
    pub fn average(values: &[f64]) -> Self {
        if values.is_empty() {
            return Ratio(None);
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Ratio(Some(mean.round().max(0.0) as u64))
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str(NOT_APPLICABLE),
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(value) => serializer.serialize_u64(value),
            None => serializer.serialize_str(NOT_APPLICABLE),
        }
    }
}

/// Reduced, not-yet-derived metrics for one repository (or for all of them).
#[derive(Clone, Debug, PartialEq)]
pub struct RepoSummary {
    pub name: String,
    pub counters: RepoCounters,
    pub issues: IssueMetrics,
    pub pull_requests: PullRequestMetrics,
}

impl RepoSummary {
    /// Runs both metrics engines over a snapshot.
    pub fn from_snapshot(snapshot: &RepoSnapshot, window: &TimeWindow, now: DateTime<Utc>) -> Self {
        Self {
            name: snapshot.id.to_string(),
            counters: snapshot.counters,
            issues: calculate_issue_metrics(&snapshot.issues, window, now),
            pull_requests: calculate_pull_request_metrics(&snapshot.pull_requests, window),
        }
    }

    /// Issue and pull request contributors combined.
    pub fn contributors(&self) -> ContributorSets {
        let mut sets = self.issues.contributors.clone();
        sets.union_with(&self.pull_requests.contributors);
        sets
    }

    pub fn to_row(&self) -> MetricRow {
        let issues = &self.issues;
        let prs = &self.pull_requests;
        let contributors = self.contributors();

        MetricRow {
            repo: self.name.clone(),
            stars: self.counters.stars,
            watchers: self.counters.watchers,
            forks: self.counters.forks,
            issues: issues.total,
            pull_requests: prs.total,
            internal_issues: issues.internal,
            external_issues: issues.external,
            internal_pull_requests: prs.internal,
            external_pull_requests: prs.external,
            open_issues: issues.open,
            stale_issues: issues.stale,
            percent_stale_issues: Ratio::percent(issues.stale, issues.open),
            old_issues: issues.old,
            percent_old_issues: Ratio::percent(issues.old, issues.open),
            percent_issues_closed_by_pull_request: Ratio::percent(
                issues.closed_by_pull_request,
                issues.closed_all_time,
            ),
            average_issue_open_time: Ratio::average(&issues.open_times),
            open_pull_requests: prs.open,
            average_pull_request_merge_time: Ratio::average(&prs.merge_times),
            contributors: contributors.all.len(),
            internal_contributors: contributors.internal.len(),
            external_contributors: contributors.external.len(),
            opened_issues: issues.opened.total,
            opened_internal_issues: issues.opened.internal,
            opened_external_issues: issues.opened.external,
            opened_first_time_issues: issues.opened.first_time,
            closed_issues: issues.closed,
            opened_pull_requests: prs.opened.total,
            opened_internal_pull_requests: prs.opened.internal,
            opened_external_pull_requests: prs.opened.external,
            opened_first_time_pull_requests: prs.opened.first_time,
            merged_pull_requests: prs.merged,
            closed_pull_requests: prs.closed,
            period_contributors: contributors.period.len(),
            period_internal_contributors: contributors.period_internal.len(),
            period_external_contributors: contributors.period_external.len(),
            period_first_time_contributors: contributors.period_first_time.len(),
        }
    }
}

/// Folds every summary into one named `TOTAL`.
///
/// Counters are summed and contributor sets unioned, so a login active in
/// several repositories is counted once. Derived values in the resulting row
/// come from these sums, not from the per-repository percentages.
pub fn aggregate<'a, I>(summaries: I) -> RepoSummary
where
    I: IntoIterator<Item = &'a RepoSummary>,
{
    summaries.into_iter().fold(
        RepoSummary {
            name: TOTAL_ROW_NAME.to_string(),
            counters: RepoCounters::default(),
            issues: IssueMetrics::default(),
            pull_requests: PullRequestMetrics::default(),
        },
        |mut total, summary| {
            total.counters.stars += summary.counters.stars;
            total.counters.watchers += summary.counters.watchers;
            total.counters.forks += summary.counters.forks;
            total.issues.merge(&summary.issues);
            total.pull_requests.merge(&summary.pull_requests);
            total
        },
    )
}

/// One flat line of the report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricRow {
    pub repo: String,
    pub stars: u64,
    pub watchers: u64,
    pub forks: u64,
    pub issues: usize,
    pub pull_requests: usize,
    pub internal_issues: usize,
    pub external_issues: usize,
    pub internal_pull_requests: usize,
    pub external_pull_requests: usize,
    pub open_issues: usize,
    pub stale_issues: usize,
    pub percent_stale_issues: Ratio,
    pub old_issues: usize,
    pub percent_old_issues: Ratio,
    pub percent_issues_closed_by_pull_request: Ratio,
    pub average_issue_open_time: Ratio,
    pub open_pull_requests: usize,
    pub average_pull_request_merge_time: Ratio,
    pub contributors: usize,
    pub internal_contributors: usize,
    pub external_contributors: usize,
    pub opened_issues: usize,
    pub opened_internal_issues: usize,
    pub opened_external_issues: usize,
    pub opened_first_time_issues: usize,
    pub closed_issues: usize,
    pub opened_pull_requests: usize,
    pub opened_internal_pull_requests: usize,
    pub opened_external_pull_requests: usize,
    pub opened_first_time_pull_requests: usize,
    pub merged_pull_requests: usize,
    pub closed_pull_requests: usize,
    pub period_contributors: usize,
    pub period_internal_contributors: usize,
    pub period_external_contributors: usize,
    pub period_first_time_contributors: usize,
}
