//! Batch pipeline that turns a list of repositories into report rows.
//!
//! This module implements `MetricsQuerier`, the main entry point for a run. It:
//! 1. Fetches every repository concurrently, capturing a result per repository.
//! 2. Runs the metrics engines over each complete snapshot.
//! 3. Appends the cross-repository `TOTAL` row.
//!
//! A repository whose fetch fails is left out of both its own row and the total.

use crate::config::RepoId;
use crate::fetcher::{self, RepoSource};
use crate::report::{aggregate, MetricRow, RepoSummary};
use crate::types::RepoSnapshot;
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// What happened to one repository during the fetch stage.
#[derive(Debug)]
pub enum RepoOutcome {
    Fetched(RepoSnapshot),
    Failed { repo: RepoId, error: anyhow::Error },
}

/// The finished report: per-repository rows followed by exactly one `TOTAL` row.
#[derive(Debug)]
pub struct Report {
    pub rows: Vec<MetricRow>,
    /// Repositories that could not be fetched and are absent from `rows`.
    pub failed: Vec<RepoId>,
}

pub struct MetricsQuerier<S: ?Sized> {
    source: Arc<S>,
    max_pages: u32,
    concurrency_limit: Option<usize>,
}

impl<S> MetricsQuerier<S>
where
    S: RepoSource + ?Sized,
{
    pub fn new(source: Arc<S>, max_pages: u32, concurrency_limit: Option<usize>) -> Self {
        Self {
            source,
            max_pages,
            concurrency_limit,
        }
    }

    /// Fetches every repository, computes the metrics and builds the report.
    pub async fn run(
        &self,
        repos: &[RepoId],
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> Report {
        tracing::info!(repos = repos.len(), %window, "Starting metrics run");
        let outcomes = self.fetch_all(repos).await;
        build_report(outcomes, window, now)
    }

    /// Fetches all repositories without one failure affecting the others.
    ///
    /// Outcomes arrive in completion order.
    pub async fn fetch_all(&self, repos: &[RepoId]) -> Vec<RepoOutcome> {
        let limit = self.concurrency_limit.unwrap_or(repos.len()).max(1);

        stream::iter(repos)
            .map(|repo| async move {
                match fetcher::fetch_snapshot(self.source.as_ref(), repo, self.max_pages).await {
                    Ok(snapshot) => RepoOutcome::Fetched(snapshot),
                    Err(error) => {
                        tracing::error!(repo = %repo, "Failed to fetch repository: {:#}", error);
                        RepoOutcome::Failed {
                            repo: repo.clone(),
                            error,
                        }
                    }
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await
    }
}

/// Reduces fetch outcomes into report rows, ending with the `TOTAL` row.
pub fn build_report(outcomes: Vec<RepoOutcome>, window: &TimeWindow, now: DateTime<Utc>) -> Report {
    let mut summaries = Vec::with_capacity(outcomes.len());
    let mut failed = Vec::new();

    for outcome in outcomes {
        match outcome {
            RepoOutcome::Fetched(snapshot) => {
                summaries.push(RepoSummary::from_snapshot(&snapshot, window, now));
            }
            RepoOutcome::Failed { repo, .. } => failed.push(repo),
        }
    }

    if !failed.is_empty() {
        tracing::warn!(
            skipped = failed.len(),
            "Some repositories are missing from the report and the total"
        );
    }

    let mut rows: Vec<MetricRow> = summaries.iter().map(RepoSummary::to_row).collect();
    rows.push(aggregate(&summaries).to_row());

    for row in &rows {
        tracing::info!(
            repo = %row.repo,
            issues = row.issues,
            pull_requests = row.pull_requests,
            contributors = row.contributors,
            "Computed metrics"
        );
    }

    Report { rows, failed }
}
