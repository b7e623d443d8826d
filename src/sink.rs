use crate::report::MetricRow;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Destination for the finished report.
pub trait ReportSink {
    fn write_rows(&mut self, rows: &[MetricRow]) -> Result<()>;
}

/// Writes one CSV file with a header row, replacing any existing file.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for CsvSink {
    fn write_rows(&mut self, rows: &[MetricRow]) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)
            .with_context(|| format!("failed to create {}", self.path.display()))?;

        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("failed to write row for {}", row.repo))?;
        }

        writer
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;

        tracing::info!(path = %self.path.display(), rows = rows.len(), "Wrote report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{aggregate, RepoSummary};
    use crate::types::RepoCounters;

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let summary = RepoSummary {
            name: "owner/repo".to_string(),
            counters: RepoCounters {
                stars: 7,
                watchers: 3,
                forks: 1,
            },
            issues: Default::default(),
            pull_requests: Default::default(),
        };
        let rows = vec![summary.to_row(), aggregate([&summary]).to_row()];

        let mut sink = CsvSink::new(&path);
        sink.write_rows(&rows).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("repo,stars,watchers,forks,issues,pull_requests,"));
        assert!(lines[0].ends_with(",period_first_time_contributors"));
        assert!(lines[1].starts_with("owner/repo,7,3,1,0,0,"));
        assert!(lines[1].contains("N/A"));
        assert!(lines[2].starts_with("TOTAL,7,3,1,"));
    }

    #[test]
    fn test_csv_sink_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path().join("missing").join("report.csv"));
        assert!(sink.write_rows(&[]).is_err());
    }
}
