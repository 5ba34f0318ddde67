//! `codii status` command

use crate::app::{OutputFormat, StatusArgs};
use codii_core::{CodebaseStatus, Indexer, Result};

pub fn run(args: StatusArgs, indexer: &Indexer, format: OutputFormat) -> Result<()> {
    match args.path {
        Some(path) => {
            let status = indexer.status(&path)?;
            print_statuses(&[status], format)
        }
        None => {
            let statuses = indexer.list_statuses()?;
            if statuses.is_empty() && format == OutputFormat::Cli {
                println!("No codebases indexed yet.");
                return Ok(());
            }
            print_statuses(&statuses, format)
        }
    }
}

fn print_statuses(statuses: &[CodebaseStatus], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(statuses)?);
        }
        OutputFormat::Cli => {
            for status in statuses {
                println!(
                    "{}: {:?} ({}%, stage {:?}, {} files, {} chunks)",
                    status.path,
                    status.status,
                    status.progress,
                    status.current_stage,
                    status.indexed_files,
                    status.total_chunks
                );
                if let Some(ref message) = status.error_message {
                    println!("  error: {message}");
                }
            }
        }
    }
    Ok(())
}
