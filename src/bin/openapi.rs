//! Prints the OpenAPI document, or writes it to the path given as the first argument.

use anyhow::{Context, Result};

fn main() -> Result<()> {
    let json = serde_json::to_string_pretty(&libris::api::openapi())?;

    match std::env::args().nth(1) {
        Some(path) => std::fs::write(&path, format!("{json}\n"))
            .with_context(|| format!("Failed to write OpenAPI document to {path}"))?,
        None => println!("{json}"),
    }

    Ok(())
}
