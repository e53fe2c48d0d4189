use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "failed-message-cleaner", version)]
#[command(about = "Truncate the processing-attempt history of failed messages")]
pub struct Cli {
    /// Path to the failed message store
    pub db_path: Option<PathBuf>,

    /// Documents fetched and saved per transaction [default: 15]
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Most recent processing attempts kept on each message [default: 10]
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Exit as soon as the clean-up finishes instead of waiting for a key press
    #[arg(long)]
    pub no_wait: bool,
}

impl Cli {
    /// Layers command-line values over `config`.
    pub fn merge(&self, mut config: Config) -> Config {
        if let Some(path) = &self.db_path {
            config.db_path = Some(path.to_string_lossy().into_owned());
        }
        if let Some(page_size) = self.page_size {
            config.page_size = Some(page_size);
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = Some(max_attempts);
        }

        config
    }
}
