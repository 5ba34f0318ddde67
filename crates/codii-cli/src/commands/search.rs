//! `codii search` command

use crate::app::{OutputFormat, SearchArgs};
use codii_core::{IndexStatus, Indexer, Result, SearchResult};

/// Long chunk contents are truncated for terminal output
const MAX_DISPLAY_CHARS: usize = 5000;

pub fn run(args: SearchArgs, indexer: &Indexer, format: OutputFormat) -> Result<()> {
    let query = args.query.join(" ");
    let filter = if args.extension_filter.is_empty() {
        None
    } else {
        Some(args.extension_filter.as_slice())
    };

    let results = indexer.search(&args.path, &query, args.limit, filter, !args.no_rerank)?;
    let status = indexer.status(&args.path)?;
    let still_indexing = status.status == IndexStatus::Indexing;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Cli => {
            if results.is_empty() {
                println!("No results for '{query}'.");
            }
            for result in &results {
                print_result(result);
            }
            if still_indexing {
                println!("Note: indexing is still in progress, results may be incomplete.");
            }
        }
    }
    Ok(())
}

fn print_result(result: &SearchResult) {
    let mut content = result.content.as_str();
    let mut truncated = false;
    if content.len() > MAX_DISPLAY_CHARS {
        let mut cut = MAX_DISPLAY_CHARS;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        content = &content[..cut];
        truncated = true;
    }

    println!(
        "#{} {}:{}-{} [{} {}] score {:.4}",
        result.rank,
        result.path,
        result.start_line,
        result.end_line,
        result.language,
        result.chunk_type,
        result.combined_score
    );
    println!("{content}");
    if truncated {
        println!("... (truncated)");
    }
    println!();
}
