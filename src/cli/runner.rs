//! CLI runner - wires configuration, warehouse and staging into a load

use crate::cli::commands::Cli;
use crate::config::LoaderConfig;
use crate::engine::{LoadStats, StreamDispatchLoop};
use crate::error::{Result, ResultExt};
use crate::staging::StagingStore;
use crate::state::{read_state_file, StateEmitter};
use crate::sync::{TableCache, TableSyncCoordinator};
use crate::warehouse::{self, Warehouse};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the loader against stdin
    pub async fn run(&self) -> Result<()> {
        let config = LoaderConfig::from_file(&self.cli.config).await?;
        if self.cli.check_config {
            tracing::info!("Configuration {} is valid", self.cli.config.display());
            return Ok(());
        }

        let mut emitter = StateEmitter::stdout();
        if let Some(path) = &self.cli.state_file {
            match read_state_file(path).await? {
                Some(previous) => tracing::info!("Last committed checkpoint: {}", previous),
                None => tracing::info!("No checkpoint in {} yet", path.display()),
            }
            emitter = emitter.with_state_file(path);
        }

        let stats = load(config, BufReader::new(tokio::io::stdin()), emitter).await?;
        tracing::info!(
            "Done: {} message(s), {} row(s) loaded, {} record(s) skipped",
            stats.messages,
            stats.rows_loaded,
            stats.skipped_records
        );
        Ok(())
    }
}

/// Load every message from `input` with the given configuration
pub async fn load<R>(config: LoaderConfig, input: R, emitter: StateEmitter) -> Result<LoadStats>
where
    R: AsyncBufRead + Unpin,
{
    let config = Arc::new(config);
    let warehouse = warehouse::connect(&config).await?;
    let staging = StagingStore::from_config(&config)?;
    let cache = table_cache(warehouse.as_ref(), &config).await?;

    let coordinator = TableSyncCoordinator::new(warehouse, staging, Arc::new(cache), Arc::clone(&config));
    let mut dispatch = StreamDispatchLoop::new(coordinator, config, emitter);
    dispatch.run(input).await
}

async fn table_cache(warehouse: &dyn Warehouse, config: &LoaderConfig) -> Result<TableCache> {
    if config.disable_table_cache {
        tracing::info!("Table cache disabled");
        return Ok(TableCache::empty());
    }
    TableCache::load(warehouse, &config.schema_names())
        .await
        .context("Failed to load table cache")
}
