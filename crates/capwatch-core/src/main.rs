//! Capwatch CLI
//!
//! Runs one round of cluster checks and exits.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use capwatch::alerting::{
    HistoryStore, LogNotifier, Notifier, SmtpNotifier, DEFAULT_HISTORY_FILE,
};
use capwatch::source::QumuloClient;
use capwatch::{CheckFamily, Checker, Config, RunSummary};

/// Capwatch - threshold alerts for cluster quotas, capacity and replication
#[derive(Parser)]
#[command(name = "capwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CAPWATCH_CONFIG")]
    config: PathBuf,

    /// History file recording alerts already sent
    #[arg(short = 'H', long, default_value = DEFAULT_HISTORY_FILE, env = "CAPWATCH_HISTORY")]
    history: PathBuf,

    /// Log alerts instead of emailing them
    #[arg(long)]
    no_emails: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Only run these check families (repeatable)
    #[arg(long, value_enum)]
    only: Vec<CheckFamily>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match run(cli).await {
        Ok(summary) if !summary.all_completed() => {
            error!(notified = summary.notified(), "Run finished with skipped checks");
            ExitCode::from(2)
        }
        Ok(summary) => {
            if summary.has_problems() {
                warn!(notified = summary.notified(), "Run finished with problems");
            } else {
                info!(notified = summary.notified(), "Run finished");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let config = Config::load(&cli.config)?;
    info!(
        cluster = %config.cluster_settings.cluster_name,
        config = %cli.config.display(),
        "Loaded configuration"
    );

    let notifier: Box<dyn Notifier> = if cli.no_emails {
        info!("Email delivery disabled, alerts will only be logged");
        Box::new(LogNotifier)
    } else {
        Box::new(SmtpNotifier::new(&config.email_settings).context("Invalid email settings")?)
    };

    let source = QumuloClient::login(&config.cluster_settings)
        .await
        .with_context(|| {
            format!(
                "Unable to log in to cluster {}",
                config.cluster_settings.cluster_address
            )
        })?;
    info!(host = %source.host(), "Connected to cluster");

    let families = if cli.only.is_empty() {
        CheckFamily::ALL.to_vec()
    } else {
        CheckFamily::ALL
            .into_iter()
            .filter(|f| cli.only.contains(f))
            .collect()
    };

    let checker = Checker::new(
        config,
        Box::new(source),
        notifier,
        HistoryStore::new(cli.history),
    );
    let summary = checker.run(&families).await?;

    for report in &summary.reports {
        if let Some(reason) = &report.skipped {
            warn!(family = %report.family, reason = %reason, "Check skipped");
            continue;
        }
        info!(
            family = %report.family,
            notified = report.notified,
            failed = report.failed.len(),
            errors = report.evaluation_errors.len(),
            "Check complete"
        );
    }

    Ok(summary)
}
