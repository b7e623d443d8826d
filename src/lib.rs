pub mod author;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod github;
pub mod metrics;
pub mod querier;
pub mod report;
pub mod sink;
pub mod types;
pub mod window;

use config::AppConfig;
use github::GitHubClient;
use querier::{MetricsQuerier, Report};
use sink::{CsvSink, ReportSink};
use std::sync::Arc;

/// Runs the whole pipeline for a validated configuration and writes the report.
///
/// The time window is checked before any request is made. Repositories that
/// fail to fetch are logged and reported back in `Report::failed`; a failure
/// to write the report is returned as an error.
pub async fn run(config: &AppConfig) -> anyhow::Result<Report> {
    let window = config.validate()?;

    let client = Arc::new(GitHubClient::new(config.github_token.clone())?);
    let querier = MetricsQuerier::new(
        client,
        config.max_github_api_pages,
        config.concurrency_limit,
    );

    let report = querier
        .run(&config.repos, &window, chrono::Utc::now())
        .await;

    CsvSink::new(&config.output_path).write_rows(&report.rows)?;

    Ok(report)
}
