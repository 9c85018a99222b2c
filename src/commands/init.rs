use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use cardscry::config::CONFIG_FILE_NAME;
use cardscry::Config;

pub fn execute(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    Config::write_default(&path, force)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    println!("✓ Wrote default configuration to {}", path.display());
    println!("  Set NEBIUS_API_KEY, COHERE_API_KEY and DEEPSEEK_API_KEY, or add api_key entries.");
    Ok(())
}
