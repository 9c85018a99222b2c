//! One-shot search

use anyhow::Result;

use cardscry::{Config, Pipeline};

use super::{open_store, stage_error};

pub fn execute(config: &Config, query: &str, json: bool, top_k: Option<usize>) -> Result<()> {
    let mut config = config.clone();
    if let Some(k) = top_k {
        config.retrieval.top_k = k;
    }

    let store = open_store(&config)?;
    let pipeline = Pipeline::from_config(&config, &store).map_err(stage_error)?;
    let result = pipeline.run(query).map_err(stage_error)?;

    if json {
        println!("{}", result.to_json()?);
    } else {
        print!("{}", result.render_text());
    }
    Ok(())
}
