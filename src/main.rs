use repo_metrics::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repo_metrics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}. Exiting.", e);
            std::process::exit(1);
        }
    };

    match repo_metrics::run(&config).await {
        Ok(report) => {
            if !report.failed.is_empty() {
                let skipped: Vec<String> = report.failed.iter().map(|r| r.to_string()).collect();
                tracing::warn!(
                    "Report written without {} repositories: {}",
                    skipped.len(),
                    skipped.join(", ")
                );
            }
        }
        Err(e) => {
            tracing::error!("{:#}. Exiting.", e);
            std::process::exit(1);
        }
    }
}
