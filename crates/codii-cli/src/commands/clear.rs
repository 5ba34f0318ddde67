//! `codii clear` command

use crate::app::{ClearArgs, OutputFormat};
use codii_core::{Indexer, Result};

pub fn run(args: ClearArgs, indexer: &Indexer, format: OutputFormat) -> Result<()> {
    indexer.clear(&args.path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({"result": "ok"})),
        OutputFormat::Cli => println!("Cleared index for {}.", args.path.display()),
    }
    Ok(())
}
