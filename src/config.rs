use serde::Deserialize;

/// Number of documents fetched and saved per transaction.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Number of processing attempts kept on each message.
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    pub db_path: Option<String>,
    pub page_size: Option<usize>,
    pub max_attempts: Option<usize>,
    #[serde(default)]
    pub create_if_missing: bool,
}

impl Config {
    /// Reads `CLEANER_*` environment variables.
    pub fn load() -> eyre::Result<Self> {
        Ok(envy::prefixed("CLEANER_").from_env::<Self>()?)
    }

    pub fn db_path(&self) -> Option<&str> {
        self.db_path.as_deref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    /// Config for a store at `path`, with every other setting at its default.
    pub fn with_db_path(path: impl Into<String>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }
}
