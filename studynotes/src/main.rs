// StudyNotes - notes, drawings and study reminders
// Entry point: open the data directory and run one reminder resume sweep

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use studynotes::app::AppState;
use studynotes::services::LoggingSurface;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DATA_DIR_ENV: &str = "STUDYNOTES_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "./studynotes-data";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studynotes=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting StudyNotes");

    let app_data_dir = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    let state = AppState::initialize(app_data_dir.clone(), Arc::new(LoggingSurface))
        .await
        .with_context(|| format!("Failed to open data directory {}", app_data_dir.display()))?;

    let report = state
        .reminders
        .reconcile()
        .await
        .context("Reminder resume sweep failed")?;

    tracing::info!(
        "Resume sweep: {} scheduled, {} cancelled, {} fired, {} failed",
        report.scheduled,
        report.cancelled,
        report.fired,
        report.failed
    );

    Ok(())
}
