use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use repo_metrics::config::RepoId;
use repo_metrics::fetcher::{fetch_snapshot, RepoSource};
use repo_metrics::querier::{MetricsQuerier, RepoOutcome};
use repo_metrics::report::Ratio;
use repo_metrics::types::{
    AuthorAssociation, CloserKind, Issue, IssueState, Page, PullRequest, PullRequestState,
    RepoCounters, TimelineEvent, TimelineEventKind,
};
use repo_metrics::window::TimeWindow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Scripted pages for one repository, keyed by the cursor that requests them.
#[derive(Default, Clone)]
struct ScriptedRepo {
    counters: RepoCounters,
    issue_pages: Vec<Page<Issue>>,
    pull_request_pages: Vec<Page<PullRequest>>,
    fail: bool,
}

/// In-memory source. Page `n` is served for cursor `"<kind>-n"`.
#[derive(Default)]
struct InMemorySource {
    repos: HashMap<RepoId, ScriptedRepo>,
    requests: Mutex<Vec<String>>,
}

impl InMemorySource {
    fn with_repo(mut self, id: RepoId, repo: ScriptedRepo) -> Self {
        self.repos.insert(id, repo);
        self
    }

    fn lookup(&self, repo: &RepoId) -> Result<&ScriptedRepo> {
        let scripted = self
            .repos
            .get(repo)
            .ok_or_else(|| anyhow!("Repository {} not found", repo))?;
        if scripted.fail {
            return Err(anyhow!("401 Bad credentials"));
        }
        Ok(scripted)
    }

    fn page_index(prefix: &str, cursor: Option<&str>) -> usize {
        cursor
            .and_then(|c| c.strip_prefix(prefix))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RepoSource for InMemorySource {
    async fn fetch_counters(&self, repo: &RepoId) -> Result<RepoCounters> {
        Ok(self.lookup(repo)?.counters)
    }

    async fn fetch_issues(&self, repo: &RepoId, cursor: Option<&str>) -> Result<Page<Issue>> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("{repo} issues {cursor:?}"));
        let index = Self::page_index("issues-", cursor);
        Ok(self.lookup(repo)?.issue_pages[index].clone())
    }

    async fn fetch_pull_requests(
        &self,
        repo: &RepoId,
        cursor: Option<&str>,
    ) -> Result<Page<PullRequest>> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("{repo} pulls {cursor:?}"));
        let index = Self::page_index("pulls-", cursor);
        Ok(self.lookup(repo)?.pull_request_pages[index].clone())
    }
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

fn paged<T: Clone>(records: Vec<T>, page_size: usize, prefix: &str) -> Vec<Page<T>> {
    let chunks: Vec<Vec<T>> = records.chunks(page_size).map(|c| c.to_vec()).collect();
    if chunks.is_empty() {
        return vec![Page::last(vec![])];
    }
    let count = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            if i + 1 == count {
                Page::last(chunk)
            } else {
                Page::with_next(chunk, format!("{prefix}{}", i + 1))
            }
        })
        .collect()
}

fn open_issue(author: &str, created: DateTime<Utc>) -> Issue {
    Issue {
        author: Some(author.to_string()),
        author_association: AuthorAssociation::Contributor,
        created_at: created,
        closed_at: None,
        state: IssueState::Open,
        timeline: vec![],
    }
}

fn pull_request(author: Option<&str>, created: DateTime<Utc>) -> PullRequest {
    PullRequest {
        author: author.map(str::to_string),
        author_association: AuthorAssociation::Member,
        created_at: created,
        merged_at: None,
        closed_at: None,
        state: PullRequestState::Open,
    }
}

/// Issue A: opened 2024-01-01, closed nine days later by a pull request.
/// Issue B: opened 2024-02-01, still open, last touched 2024-02-20.
fn scenario_issues() -> Vec<Issue> {
    vec![
        Issue {
            author: Some("alice".to_string()),
            author_association: AuthorAssociation::Member,
            created_at: at(2024, 1, 1),
            closed_at: Some(at(2024, 1, 10)),
            state: IssueState::Closed,
            timeline: vec![TimelineEvent {
                kind: TimelineEventKind::Closed,
                created_at: Some(at(2024, 1, 10)),
                closer: Some(CloserKind::PullRequest),
            }],
        },
        Issue {
            author: Some("bob".to_string()),
            author_association: AuthorAssociation::FirstTimeContributor,
            created_at: at(2024, 2, 1),
            closed_at: None,
            state: IssueState::Open,
            timeline: vec![TimelineEvent {
                kind: TimelineEventKind::Other("IssueComment".to_string()),
                created_at: Some(at(2024, 2, 20)),
                closer: None,
            }],
        },
    ]
}

fn window() -> TimeWindow {
    TimeWindow::parse("2024-01-01", "2024-02-15").unwrap()
}

#[tokio::test]
async fn test_single_repository_scenario() {
    let id = RepoId::new("acme", "widgets");
    let source = InMemorySource::default().with_repo(
        id.clone(),
        ScriptedRepo {
            counters: RepoCounters {
                stars: 12,
                watchers: 4,
                forks: 3,
            },
            issue_pages: vec![Page::last(scenario_issues())],
            pull_request_pages: vec![Page::last(vec![])],
            fail: false,
        },
    );

    let querier = MetricsQuerier::new(Arc::new(source), 10, None);
    let report = querier
        .run(std::slice::from_ref(&id), &window(), at(2024, 3, 10))
        .await;

    assert!(report.failed.is_empty());
    assert_eq!(report.rows.len(), 2);

    let row = &report.rows[0];
    assert_eq!(row.repo, "acme/widgets");
    assert_eq!(row.stars, 12);
    assert_eq!(row.issues, 2);
    assert_eq!(row.opened_issues, 2);
    assert_eq!(row.opened_first_time_issues, 1);
    assert_eq!(row.closed_issues, 1);
    assert_eq!(row.percent_issues_closed_by_pull_request, Ratio(Some(100)));
    assert_eq!(row.average_issue_open_time, Ratio(Some(9)));
    assert_eq!(row.open_issues, 1);
    assert_eq!(row.stale_issues, 1);
    assert_eq!(row.old_issues, 0);
    assert_eq!(row.percent_stale_issues, Ratio(Some(100)));
    assert_eq!(row.percent_old_issues, Ratio(Some(0)));
    assert_eq!(row.average_pull_request_merge_time, Ratio(None));
    assert_eq!(row.contributors, 2);
    assert_eq!(row.period_first_time_contributors, 1);

    let total = &report.rows[1];
    assert_eq!(total.repo, "TOTAL");
    assert_eq!(total.opened_issues, 2);
    assert_eq!(total.average_issue_open_time, Ratio(Some(9)));
}

#[tokio::test]
async fn test_failed_repository_is_absent_and_total_is_last() {
    let good = RepoId::new("acme", "good");
    let other = RepoId::new("acme", "other");
    let broken = RepoId::new("acme", "broken");

    let source = InMemorySource::default()
        .with_repo(
            good.clone(),
            ScriptedRepo {
                counters: RepoCounters {
                    stars: 5,
                    watchers: 1,
                    forks: 0,
                },
                issue_pages: vec![Page::last(vec![open_issue("shared", at(2024, 1, 5))])],
                pull_request_pages: vec![Page::last(vec![pull_request(Some("x"), at(2024, 1, 6))])],
                fail: false,
            },
        )
        .with_repo(
            other.clone(),
            ScriptedRepo {
                counters: RepoCounters {
                    stars: 7,
                    watchers: 2,
                    forks: 1,
                },
                issue_pages: vec![Page::last(vec![open_issue("shared", at(2024, 1, 7))])],
                pull_request_pages: vec![Page::last(vec![])],
                fail: false,
            },
        )
        .with_repo(
            broken.clone(),
            ScriptedRepo {
                fail: true,
                ..Default::default()
            },
        );

    let querier = MetricsQuerier::new(Arc::new(source), 10, Some(2));
    let report = querier
        .run(&[good, broken.clone(), other], &window(), at(2024, 1, 10))
        .await;

    assert_eq!(report.failed, vec![broken]);
    assert_eq!(report.rows.len(), 3);
    assert!(report.rows.iter().all(|row| row.repo != "acme/broken"));

    let total = report.rows.last().unwrap();
    assert_eq!(total.repo, "TOTAL");
    assert_eq!(total.stars, 12);
    assert_eq!(total.issues, 2);
    assert_eq!(total.pull_requests, 1);
    assert_eq!(total.contributors, 2);
    assert_eq!(
        report
            .rows
            .iter()
            .filter(|row| row.repo == "TOTAL")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_pull_requests_paginate_on_their_own_cursor() {
    let id = RepoId::new("acme", "busy");
    let prs: Vec<PullRequest> = (0..237)
        .map(|i| pull_request(Some(format!("dev{}", i % 50).as_str()), at(2024, 1, 2)))
        .collect();
    let issues: Vec<Issue> = (0..150)
        .map(|i| open_issue(&format!("user{i}"), at(2023, 6, 1)))
        .collect();

    let source = Arc::new(InMemorySource::default().with_repo(
        id.clone(),
        ScriptedRepo {
            counters: RepoCounters::default(),
            issue_pages: paged(issues, 100, "issues-"),
            pull_request_pages: paged(prs, 100, "pulls-"),
            fail: false,
        },
    ));

    let snapshot = fetch_snapshot(source.as_ref(), &id, 10).await.unwrap();
    assert_eq!(snapshot.issues.len(), 150);
    assert_eq!(snapshot.pull_requests.len(), 237);

    let requests = source.requests.lock().unwrap().clone();
    let pull_requests: Vec<&String> = requests.iter().filter(|r| r.contains("pulls")).collect();
    assert_eq!(pull_requests.len(), 3);
    assert!(requests.contains(&"acme/busy pulls Some(\"pulls-2\")".to_string()));
    assert_eq!(requests.iter().filter(|r| r.contains("issues")).count(), 2);
}

#[tokio::test]
async fn test_ghost_authors_do_not_abort_the_run() {
    let id = RepoId::new("acme", "ghosts");
    let mut ghost_issue = open_issue("placeholder", at(2024, 1, 3));
    ghost_issue.author = None;

    let source = InMemorySource::default().with_repo(
        id.clone(),
        ScriptedRepo {
            counters: RepoCounters::default(),
            issue_pages: vec![Page::last(vec![ghost_issue])],
            pull_request_pages: vec![Page::last(vec![
                pull_request(None, at(2024, 1, 2)),
                pull_request(Some("real"), at(2024, 1, 4)),
            ])],
            fail: false,
        },
    );

    let querier = MetricsQuerier::new(Arc::new(source), 10, None);
    let outcomes = querier.fetch_all(std::slice::from_ref(&id)).await;
    assert!(matches!(outcomes.as_slice(), [RepoOutcome::Fetched(_)]));

    let report = repo_metrics::querier::build_report(outcomes, &window(), at(2024, 1, 10));
    let row = &report.rows[0];
    assert_eq!(row.issues, 1);
    assert_eq!(row.opened_issues, 1);
    assert_eq!(row.opened_pull_requests, 2);
    assert_eq!(row.contributors, 1);
    assert_eq!(row.period_internal_contributors, 1);
}

#[tokio::test]
async fn test_no_repositories_yields_only_total() {
    let querier = MetricsQuerier::new(Arc::new(InMemorySource::default()), 10, None);
    let report = querier.run(&[], &window(), at(2024, 1, 10)).await;

    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].repo, "TOTAL");
    assert_eq!(report.rows[0].contributors, 0);
    assert_eq!(report.rows[0].percent_stale_issues, Ratio(None));
}
