use anyhow::Result;
use serde_json::json;

use cardscry::Config;

use super::open_store;

pub fn execute(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let path = store
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    if json {
        let info = json!({
            "store": path,
            "table": config.store.table,
            "cards": store.len(),
            "dimension": store.dimension(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Store:     {}", path);
        println!("Table:     {}", config.store.table);
        println!("Cards:     {}", store.len());
        println!("Dimension: {}", store.dimension());
    }
    Ok(())
}
