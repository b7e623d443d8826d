//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs the list of repositories to report on,
//! the reporting window, pagination limits and where the report is written.

use crate::error::ConfigError;
use crate::window::TimeWindow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Repositories to report on.
    /// Expected format: comma-separated string of "owner/repo" pairs.
    /// Example: "facebook/react,rust-lang/rust"
    #[serde(deserialize_with = "deserialize_repos")]
    pub repos: Vec<RepoId>,

    /// First day of the reporting window (YYYY-MM-DD).
    pub start_date: String,

    /// Last day of the reporting window (YYYY-MM-DD).
    pub end_date: String,

    /// Hard limit on the number of paginated requests per record kind per repository.
    #[serde(default = "default_max_pages")]
    pub max_github_api_pages: u32,

    /// Maximum number of repositories fetched at once. Unset means all of them.
    #[serde(default)]
    pub concurrency_limit: Option<usize>,

    /// Where the CSV report is written.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Optional GitHub Personal Access Token for higher rate limits.
    pub github_token: Option<String>,
}

fn default_max_pages() -> u32 {
    1000
}

fn default_output_path() -> PathBuf {
    PathBuf::from("repo-metrics.csv")
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Parses and validates the reporting window.
    ///
    /// Called before any fetch so a bad window aborts the run without partial output.
    pub fn time_window(&self) -> Result<TimeWindow, ConfigError> {
        TimeWindow::parse(&self.start_date, &self.end_date)
    }

    /// Checks everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<TimeWindow, ConfigError> {
        if self.repos.is_empty() {
            return Err(ConfigError::NoRepositories);
        }
        if self.max_github_api_pages == 0 {
            return Err(ConfigError::InvalidPageLimit);
        }
        self.time_window()
    }
}

fn deserialize_repos<'de, D>(deserializer: D) -> Result<Vec<RepoId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_repos(&s))
}

pub fn parse_repos(s: &str) -> Vec<RepoId> {
    s.split(',')
        .filter_map(|part| {
            let parts: Vec<&str> = part.trim().split('/').collect();
            match parts.as_slice() {
                [owner, repo] if !owner.trim().is_empty() && !repo.trim().is_empty() => {
                    Some(RepoId::new(owner.trim(), repo.trim()))
                }
                _ => {
                    if !part.trim().is_empty() {
                        tracing::warn!(entry = part.trim(), "Ignoring malformed repository entry");
                    }
                    None
                }
            }
        })
        .collect()
}
