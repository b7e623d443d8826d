use crate::config::RepoId;
use crate::error::PaginationError;
use crate::types::{Issue, Page, PullRequest, RecordKind, RepoCounters, RepoSnapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::future::Future;

/// A paginated source of repository data.
///
/// Implementations own transport, authentication and any retry policy.
/// Fetching the same cursor twice must yield the same page.
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn fetch_counters(&self, repo: &RepoId) -> Result<RepoCounters>;

    async fn fetch_issues(&self, repo: &RepoId, cursor: Option<&str>) -> Result<Page<Issue>>;

    async fn fetch_pull_requests(
        &self,
        repo: &RepoId,
        cursor: Option<&str>,
    ) -> Result<Page<PullRequest>>;
}

/// Drains a cursor-paginated source into one collection, in page order.
///
/// Stops when a page reports no successor. A page that claims a successor
/// without a cursor, or more than `max_pages` pages, is an error. On any error
/// the records gathered so far are dropped.
pub async fn drain_pages<T, F, Fut>(
    repo: &RepoId,
    kind: RecordKind,
    max_pages: u32,
    mut fetch: F,
) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;

    for page_num in 1..=max_pages {
        let page = fetch(cursor.take())
            .await
            .with_context(|| format!("failed to fetch {kind} page {page_num} for {repo}"))?;

        tracing::debug!(
            repo = %repo,
            %kind,
            page = page_num,
            records = page.records.len(),
            "Fetched page"
        );
        records.extend(page.records);

        if !page.has_next_page {
            return Ok(records);
        }

        match page.end_cursor {
            Some(next) => cursor = Some(next),
            None => {
                return Err(PaginationError::MissingCursor {
                    repo: repo.to_string(),
                    kind,
                    page: page_num,
                }
                .into())
            }
        }
    }

    Err(PaginationError::PageLimitExceeded {
        repo: repo.to_string(),
        kind,
        max_pages,
    }
    .into())
}

/// Fetches the counters and both complete collections for one repository.
///
/// The two collections are drained concurrently; pages within each are sequential.
pub async fn fetch_snapshot<S>(source: &S, repo: &RepoId, max_pages: u32) -> Result<RepoSnapshot>
where
    S: RepoSource + ?Sized,
{
    let counters = async {
        source
            .fetch_counters(repo)
            .await
            .with_context(|| format!("failed to fetch repository counters for {repo}"))
    };
    let issues = drain_pages(repo, RecordKind::Issue, max_pages, |cursor| async move {
        source.fetch_issues(repo, cursor.as_deref()).await
    });
    let pull_requests = drain_pages(repo, RecordKind::PullRequest, max_pages, |cursor| async move {
        source.fetch_pull_requests(repo, cursor.as_deref()).await
    });

    let (counters, issues, pull_requests) = tokio::try_join!(counters, issues, pull_requests)?;

    tracing::info!(
        repo = %repo,
        issues = issues.len(),
        pull_requests = pull_requests.len(),
        "Fetched repository"
    );

    Ok(RepoSnapshot {
        id: repo.clone(),
        counters,
        issues,
        pull_requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn repo() -> RepoId {
        RepoId::new("owner", "repo")
    }

    fn pages(sizes: &[usize]) -> Vec<Page<usize>> {
        let mut next = 0;
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let records: Vec<usize> = (next..next + size).collect();
                next += size;
                if i + 1 == sizes.len() {
                    Page::last(records)
                } else {
                    Page::with_next(records, format!("cursor-{}", i + 1))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_drain_three_pages_in_order() {
        let script = pages(&[100, 100, 37]);
        let seen_cursors = std::sync::Mutex::new(Vec::new());

        let records = drain_pages(&repo(), RecordKind::Issue, 10, |cursor| {
            seen_cursors.lock().unwrap().push(cursor.clone());
            let index = match cursor.as_deref() {
                None => 0,
                Some(c) => c.trim_start_matches("cursor-").parse::<usize>().unwrap(),
            };
            let page = script[index].clone();
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(records.len(), 237);
        assert_eq!(records, (0..237).collect::<Vec<_>>());
        assert_eq!(
            *seen_cursors.lock().unwrap(),
            vec![
                None,
                Some("cursor-1".to_string()),
                Some("cursor-2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_drain_stops_at_page_limit() {
        let calls = AtomicU32::new(0);
        let err = drain_pages(&repo(), RecordKind::PullRequest, 3, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Page::with_next(vec![1u8], "again")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            err.downcast_ref::<PaginationError>(),
            Some(&PaginationError::PageLimitExceeded {
                repo: "owner/repo".to_string(),
                kind: RecordKind::PullRequest,
                max_pages: 3,
            })
        );
    }

    #[tokio::test]
    async fn test_drain_rejects_missing_cursor() {
        let err = drain_pages(&repo(), RecordKind::Issue, 10, |_| async {
            Ok(Page {
                records: vec![1u8],
                has_next_page: true,
                end_cursor: None,
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PaginationError>(),
            Some(PaginationError::MissingCursor { page: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_drain_propagates_fetch_error() {
        let calls = AtomicU32::new(0);
        let result: Result<Vec<u8>> = drain_pages(&repo(), RecordKind::Issue, 10, |_| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Ok(Page::with_next(vec![1u8, 2], "next"))
                } else {
                    Err(anyhow::anyhow!("bad credentials"))
                }
            }
        })
        .await;

        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("bad credentials"));
        assert!(err.to_string().contains("issue page 2 for owner/repo"));
    }
}
