use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use taskledger::application::engine::LedgerEngine;
use taskledger::infrastructure::file_store::FileSnapshots;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the ledger snapshot files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.data_dir).into_diagnostic()?;

    let snapshots = FileSnapshots::new(&cli.data_dir);
    let engine = LedgerEngine::bootstrap(Box::new(snapshots))
        .await
        .into_diagnostic()?;

    // Mirror every user update into the log; the transport collaborator
    // subscribes the same way.
    let mut updates = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            info!(
                user = %update.user.username,
                balance = %update.user.balance.normalize(),
                new_completions = update.new_completions.len(),
                "user update"
            );
        }
    });

    info!(data_dir = %cli.data_dir.display(), "ledger engine ready");
    shutdown_signal().await.into_diagnostic()?;

    info!("termination signal received; flushing snapshots");
    engine.flush_all().await;
    info!("all snapshots flushed; shutting down");
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}
