//! Clinschema Command-Line Front End
//!
//! Loads a provisioning manifest, runs it against the simulation executor and
//! writes the schema documentation and PASS/FAIL report.

mod config;
mod error;
mod formatter;
mod runner;

use clap::Parser;
use clinschema_core::CancellationToken;
use config::{Args, CliConfig};
use formatter::create_formatter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code when the run completed but did not pass.
const EXIT_RUN_FAILED: i32 = 2;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinschema=info,clinschema_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Args::parse().into_config();
    let formatter = create_formatter(config.format);

    match run(config).await {
        Ok((true, summary)) => println!("{}", summary),
        Ok((false, summary)) => {
            println!("{}", summary);
            std::process::exit(EXIT_RUN_FAILED);
        }
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            std::process::exit(1);
        }
    }
}

/// Provision the configured manifest. Returns whether the run passed and the
/// formatted summary.
async fn run(config: CliConfig) -> error::Result<(bool, String)> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        manifest = ?config.manifest,
        output_dir = ?config.output_dir,
        "starting clinschema"
    );

    let manifest = runner::load_manifest(&config)?;

    // Ctrl-C stops the run before the next object
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            return;
        }
        tracing::warn!("received interrupt, cancelling provisioning run");
        signal_token.cancel();
    });

    let generated_at = chrono::Utc::now();
    let run = tokio::task::spawn_blocking(move || {
        runner::provision(&manifest, generated_at, cancel)
    })
    .await??;

    if config.writes_output() {
        let written = runner::write_artifacts(&config, &run)?;
        tracing::info!(artifacts = written.len(), "artifacts written");
    }

    run.report.log_summary();
    let summary = create_formatter(config.format).format_run(&run);
    Ok((run.passed(), summary))
}
