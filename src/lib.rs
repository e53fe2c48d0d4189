use cleaner::CleanupReport;
use config::Config;
use progress::TracingReporter;
use repository::SqliteRepository;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, FmtSubscriber};

pub mod cleaner;
pub mod cli;
pub mod config;
pub mod error;
pub mod message;
pub mod progress;
pub mod repository;

/// Installs the global `tracing` subscriber, filtered by `CLEANER_LOG`.
pub fn init_tracing() -> eyre::Result<()> {
    let filter = EnvFilter::builder()
        .with_env_var("CLEANER_LOG")
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    let builder = FmtSubscriber::builder().with_env_filter(filter);

    // Human-readable while developing, one JSON object per line in release.
    #[cfg(debug_assertions)]
    builder.pretty().finish().try_init()?;
    #[cfg(not(debug_assertions))]
    builder.json().finish().try_init()?;

    Ok(())
}

/// Returns a builder for a full clean-up of the store named by `config`.
///
/// Opens the store, runs the clean-up to completion, optionally waits for a
/// line on stdin, then closes the store.
#[bon::builder(finish_fn = start)]
pub async fn run(
    config: Config,
    #[builder(default)] wait_for_exit: bool,
) -> eyre::Result<CleanupReport> {
    let path = config
        .db_path()
        .ok_or_else(|| eyre::eyre!("no database path given"))?;

    tracing::info!("Connecting to store at {path} ...");

    let repository = SqliteRepository::connect_with(&config)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Unable to open store"))?;

    tracing::info!("Connected. Processing FailedMessage documents ...");

    let result = cleaner::cleanup()
        .repository(&repository)
        .reporter(&TracingReporter)
        .page_size(config.page_size())
        .max_attempts_per_message(config.max_attempts())
        .run()
        .await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Clean-up aborted");
            repository.close().await;
            return Err(e.into());
        }
    };

    if wait_for_exit {
        tracing::info!("Clean-up finished, press <enter> to exit ...");
        wait_then_close(&repository, BufReader::new(tokio::io::stdin())).await?;
    } else {
        repository.close().await;
    }

    Ok(report)
}

/// Reads one line from `input`, then closes the store whether or not the
/// read succeeded.
async fn wait_then_close<I>(repository: &SqliteRepository, mut input: I) -> eyre::Result<()>
where
    I: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = input.read_line(&mut line).await;

    if let Err(e) = &read {
        tracing::error!(error = %e, "Unable to read from stdin");
    }

    repository.close().await;

    read?;

    Ok(())
}
