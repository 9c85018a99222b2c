//! Interactive search loop
//!
//! The store is loaded and the clients are built once; each line is one
//! independent invocation. A failed query prints its stage and the loop
//! continues.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use colored::Colorize;

use cardscry::result::render_failure;
use cardscry::{Config, Pipeline};

use super::{open_store, stage_error};

pub fn execute(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let pipeline = Pipeline::from_config(config, &store).map_err(stage_error)?;

    println!(
        "🔎 {} cards loaded ({}-dim), top {} per query. Type a query, or 'quit' to exit.",
        pipeline.store().len(),
        pipeline.store().dimension(),
        pipeline.options().top_k
    );

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{} ", "cardscry>".bold());
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
            break;
        }

        match pipeline.run(query) {
            Ok(result) => print!("{}", result.render_text()),
            Err(e) => eprintln!("{} {}", "✗".red().bold(), render_failure(&e)),
        }
        println!();
    }
    Ok(())
}
