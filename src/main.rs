use clap::{CommandFactory, Parser};
use failed_message_cleaner::{cli::Cli, config::Config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    let config = cli.merge(Config::load()?);

    if config.db_path().is_none() {
        Cli::command().print_help()?;
        return Ok(());
    }

    failed_message_cleaner::init_tracing()?;

    failed_message_cleaner::run()
        .config(config)
        .wait_for_exit(!cli.no_wait)
        .start()
        .await?;

    Ok(())
}
