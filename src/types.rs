//! Domain records produced by a `RepoSource` and consumed by the metrics engines.

use crate::config::RepoId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two paginated collections fetched per repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Issue,
    PullRequest,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Issue => f.write_str("issue"),
            RecordKind::PullRequest => f.write_str("pull request"),
        }
    }
}

/// The relationship of an author to the repository, as reported by the API.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorAssociation {
    Owner,
    Member,
    Collaborator,
    Contributor,
    FirstTimeContributor,
    None,
    #[serde(other)]
    Unknown,
}

/// One page of records plus its continuation state.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A page with no successor.
    pub fn last(records: Vec<T>) -> Self {
        Self {
            records,
            has_next_page: false,
            end_cursor: None,
        }
    }

    pub fn with_next(records: Vec<T>, cursor: impl Into<String>) -> Self {
        Self {
            records,
            has_next_page: true,
            end_cursor: Some(cursor.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    Open,
    Merged,
    Closed,
}

/// Whatever closed an issue, when the timeline says so.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloserKind {
    PullRequest,
    Commit,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimelineEventKind {
    Closed,
    Reopened,
    Other(String),
}

#[derive(Clone, Debug)]
pub struct TimelineEvent {
    pub kind: TimelineEventKind,
    pub created_at: Option<DateTime<Utc>>,
    pub closer: Option<CloserKind>,
}

#[derive(Clone, Debug)]
pub struct Issue {
    /// Login of the author; `None` for deleted ("ghost") accounts.
    pub author: Option<String>,
    pub author_association: AuthorAssociation,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub state: IssueState,
    /// Chronological, as delivered by the API.
    pub timeline: Vec<TimelineEvent>,
}

#[derive(Clone, Debug)]
pub struct PullRequest {
    pub author: Option<String>,
    pub author_association: AuthorAssociation,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub state: PullRequestState,
}

/// Repository-level counters that come from a single, unpaginated request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepoCounters {
    pub stars: u64,
    pub watchers: u64,
    pub forks: u64,
}

/// Everything fetched for one repository. Never modified after the fetch completes.
#[derive(Clone, Debug)]
pub struct RepoSnapshot {
    pub id: RepoId,
    pub counters: RepoCounters,
    pub issues: Vec<Issue>,
    pub pull_requests: Vec<PullRequest>,
}
