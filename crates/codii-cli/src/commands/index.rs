//! `codii index` command

use crate::app::{IndexArgs, OutputFormat};
use codii_core::{IndexOutcome, IndexRequest, Indexer, Result};

pub fn run(args: IndexArgs, indexer: &Indexer, format: OutputFormat) -> Result<()> {
    let request = IndexRequest {
        force: args.force,
        splitter: args.splitter.into(),
        custom_extensions: args.extensions,
        ignore_patterns: args.ignore_patterns,
    };

    let outcome = indexer.index(&args.path, request)?;

    match outcome {
        IndexOutcome::NoChanges => match format {
            OutputFormat::Json => println!("{}", serde_json::json!({"result": "no_changes"})),
            OutputFormat::Cli => println!(
                "No changes detected for {}. Use --force to re-index.",
                args.path.display()
            ),
        },
        IndexOutcome::Accepted => {
            if args.wait {
                indexer.wait(&args.path)?;
                let status = indexer.status(&args.path)?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&status)?)
                    }
                    OutputFormat::Cli => println!(
                        "Indexed {}: {} files, {} chunks",
                        args.path.display(),
                        status.indexed_files,
                        status.total_chunks
                    ),
                }
            } else {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::json!({"result": "accepted"}))
                    }
                    OutputFormat::Cli => println!(
                        "Indexing started for {}. Run `codii status {}` to check progress.",
                        args.path.display(),
                        args.path.display()
                    ),
                }
            }
        }
    }
    Ok(())
}
