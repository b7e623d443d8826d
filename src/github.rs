//! `RepoSource` backed by the GitHub GraphQL API.
//!
//! Raw nodes are deserialised into loosely-typed structs and converted to the
//! domain records here. Nodes missing a creation timestamp are dropped with a
//! warning so that nothing downstream has to deal with absent required fields.

use crate::config::RepoId;
use crate::error::RecordError;
use crate::fetcher::RepoSource;
use crate::types::{
    AuthorAssociation, CloserKind, Issue, IssueState, Page, PullRequest, PullRequestState,
    RecordKind, RepoCounters, TimelineEvent, TimelineEventKind,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::Deserialize;

const COUNTERS_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    stargazerCount
    forkCount
    watchers { totalCount }
  }
}"#;

const ISSUES_QUERY: &str = r#"
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    issues(first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes {
        author { login }
        authorAssociation
        createdAt
        closedAt
        state
        timelineItems(last: 100) {
          nodes {
            __typename
            ... on ClosedEvent { createdAt closer { __typename } }
            ... on AddedToProjectEvent { createdAt }
            ... on AssignedEvent { createdAt }
            ... on CommentDeletedEvent { createdAt }
            ... on ConnectedEvent { createdAt }
            ... on ConvertedNoteToIssueEvent { createdAt }
            ... on ConvertedToDiscussionEvent { createdAt }
            ... on CrossReferencedEvent { createdAt }
            ... on DemilestonedEvent { createdAt }
            ... on DisconnectedEvent { createdAt }
            ... on IssueComment { createdAt }
            ... on LabeledEvent { createdAt }
            ... on LockedEvent { createdAt }
            ... on MarkedAsDuplicateEvent { createdAt }
            ... on MentionedEvent { createdAt }
            ... on MilestonedEvent { createdAt }
            ... on MovedColumnsInProjectEvent { createdAt }
            ... on PinnedEvent { createdAt }
            ... on ReferencedEvent { createdAt }
            ... on RemovedFromProjectEvent { createdAt }
            ... on RenamedTitleEvent { createdAt }
            ... on ReopenedEvent { createdAt }
            ... on SubscribedEvent { createdAt }
            ... on TransferredEvent { createdAt }
            ... on UnassignedEvent { createdAt }
            ... on UnlabeledEvent { createdAt }
            ... on UnlockedEvent { createdAt }
            ... on UnmarkedAsDuplicateEvent { createdAt }
            ... on UnpinnedEvent { createdAt }
            ... on UnsubscribedEvent { createdAt }
            ... on UserBlockedEvent { createdAt }
          }
        }
      }
    }
  }
}"#;

const PULL_REQUESTS_QUERY: &str = r#"
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    pullRequests(first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes {
        author { login }
        authorAssociation
        createdAt
        mergedAt
        closedAt
        state
      }
    }
  }
}"#;

pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }

        Ok(Self {
            octocrab: builder.build()?,
        })
    }

    async fn query<T: DeserializeOwned + Send>(
        &self,
        query: &str,
        repo: &RepoId,
        cursor: Option<&str>,
    ) -> Result<T> {
        let payload = query_payload(query, repo, cursor);
        let response: GraphQlResponse<RepositoryData<T>> = self.octocrab.graphql(&payload).await?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            bail!("GitHub GraphQL error for {}: {}", repo, messages.join("; "));
        }

        response
            .data
            .and_then(|data| data.repository)
            .ok_or_else(|| anyhow!("Repository {} not found", repo))
    }
}

#[async_trait]
impl RepoSource for GitHubClient {
    async fn fetch_counters(&self, repo: &RepoId) -> Result<RepoCounters> {
        let raw: RawCounters = self.query(COUNTERS_QUERY, repo, None).await?;
        Ok(RepoCounters {
            stars: raw.stargazer_count,
            watchers: raw.watchers.total_count,
            forks: raw.fork_count,
        })
    }

    async fn fetch_issues(&self, repo: &RepoId, cursor: Option<&str>) -> Result<Page<Issue>> {
        let raw: IssuesData = self.query(ISSUES_QUERY, repo, cursor).await?;
        Ok(into_page(repo, raw.issues))
    }

    async fn fetch_pull_requests(
        &self,
        repo: &RepoId,
        cursor: Option<&str>,
    ) -> Result<Page<PullRequest>> {
        let raw: PullRequestsData = self.query(PULL_REQUESTS_QUERY, repo, cursor).await?;
        Ok(into_page(repo, raw.pull_requests))
    }
}

/// Owner and name travel as GraphQL variables, so they are passed through verbatim.
fn query_payload(query: &str, repo: &RepoId, cursor: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "query": query,
        "variables": {
            "owner": repo.owner,
            "name": repo.repo,
            "cursor": cursor,
        }
    })
}

/// Converts a raw connection into a page, quarantining invalid nodes.
fn into_page<R, T>(repo: &RepoId, connection: Connection<R>) -> Page<T>
where
    T: TryFrom<R, Error = RecordError>,
{
    let records = connection
        .nodes
        .into_iter()
        .flatten()
        .filter_map(|node| match T::try_from(node) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(repo = %repo, "Skipping record: {}", e);
                None
            }
        })
        .collect();

    Page {
        records,
        has_next_page: connection.page_info.has_next_page,
        end_cursor: connection.page_info.end_cursor,
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    page_info: PageInfo,
    nodes: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCounters {
    stargazer_count: u64,
    fork_count: u64,
    watchers: TotalCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct IssuesData {
    issues: Connection<RawIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestsData {
    pull_requests: Connection<RawPullRequest>,
}

#[derive(Debug, Deserialize)]
struct RawActor {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIssue {
    author: Option<RawActor>,
    author_association: AuthorAssociation,
    created_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    state: Option<IssueState>,
    timeline_items: Option<TimelineConnection>,
}

#[derive(Debug, Deserialize)]
struct TimelineConnection {
    nodes: Vec<Option<RawTimelineItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTimelineItem {
    #[serde(rename = "__typename")]
    typename: String,
    created_at: Option<DateTime<Utc>>,
    closer: Option<RawTypename>,
}

#[derive(Debug, Deserialize)]
struct RawTypename {
    #[serde(rename = "__typename")]
    typename: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPullRequest {
    author: Option<RawActor>,
    author_association: AuthorAssociation,
    created_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    state: Option<PullRequestState>,
}

impl From<RawTimelineItem> for TimelineEvent {
    fn from(raw: RawTimelineItem) -> Self {
        let kind = match raw.typename.as_str() {
            "ClosedEvent" => TimelineEventKind::Closed,
            "ReopenedEvent" => TimelineEventKind::Reopened,
            _ => TimelineEventKind::Other(raw.typename),
        };
        let closer = raw.closer.map(|closer| match closer.typename.as_str() {
            "PullRequest" => CloserKind::PullRequest,
            "Commit" => CloserKind::Commit,
            _ => CloserKind::Other,
        });

        TimelineEvent {
            kind,
            created_at: raw.created_at,
            closer,
        }
    }
}

impl TryFrom<RawIssue> for Issue {
    type Error = RecordError;

    fn try_from(raw: RawIssue) -> Result<Self, Self::Error> {
        let missing = |field| RecordError {
            kind: RecordKind::Issue,
            field,
        };

        Ok(Issue {
            author: raw.author.map(|a| a.login),
            author_association: raw.author_association,
            created_at: raw.created_at.ok_or_else(|| missing("createdAt"))?,
            closed_at: raw.closed_at,
            state: raw.state.ok_or_else(|| missing("state"))?,
            timeline: raw
                .timeline_items
                .map(|items| {
                    items
                        .nodes
                        .into_iter()
                        .flatten()
                        .map(TimelineEvent::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

impl TryFrom<RawPullRequest> for PullRequest {
    type Error = RecordError;

    fn try_from(raw: RawPullRequest) -> Result<Self, Self::Error> {
        let missing = |field| RecordError {
            kind: RecordKind::PullRequest,
            field,
        };

        Ok(PullRequest {
            author: raw.author.map(|a| a.login),
            author_association: raw.author_association,
            created_at: raw.created_at.ok_or_else(|| missing("createdAt"))?,
            merged_at: raw.merged_at,
            closed_at: raw.closed_at,
            state: raw.state.ok_or_else(|| missing("state"))?,
        })
    }
}
