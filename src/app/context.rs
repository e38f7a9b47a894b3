use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::Result;
use crate::config::Config;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::parser::FeedParser;
use crate::scheduler::FetchScheduler;
use crate::store::SqliteStore;

/// Everything a command needs, owned by `main` for the life of the process.
pub struct AppContext {
    pub config: Config,
    /// Where `config` is saved back to.
    pub config_path: PathBuf,
    pub store: Arc<SqliteStore>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub parser: FeedParser,
}

impl AppContext {
    pub fn new(config: Config, config_path: PathBuf) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Arc::new(SqliteStore::new(&config.database_path)?);
        Self::with_store(config, config_path, store)
    }

    /// A context backed by an in-memory database.
    pub fn in_memory(config: Config, config_path: PathBuf) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, config_path, store)
    }

    fn with_store(config: Config, config_path: PathBuf, store: Arc<SqliteStore>) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new(&config.fetch)?);

        Ok(Self {
            config,
            config_path,
            store,
            fetcher,
            parser: FeedParser::new(),
        })
    }

    pub fn scheduler(&self) -> FetchScheduler<SqliteStore> {
        FetchScheduler::new(self.store.clone(), self.fetcher.clone(), self.parser.clone())
    }
}
