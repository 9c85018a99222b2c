pub mod info;
pub mod init;
pub mod repl;
pub mod search;

use anyhow::Result;

use cardscry::result::render_failure;
use cardscry::{Config, EmbeddingStore, Error};

/// Library failures surface as "<stage> stage failed: <cause>"
pub fn stage_error(err: Error) -> anyhow::Error {
    anyhow::anyhow!(render_failure(&err))
}

/// Open the configured store once for the whole process
pub fn open_store(config: &Config) -> Result<EmbeddingStore> {
    let path = config.store.resolved_path().map_err(stage_error)?;
    EmbeddingStore::open_table(&path, &config.store.table).map_err(stage_error)
}
