use anyhow::{Context, Result};
use graphscan::{scan, Database, Matching, ScanOutcome, Scratch};
use std::path::PathBuf;

use crate::cli_utils::read_input_data;

/// Single scan printing every match event
pub fn cmd_scan(graph: PathBuf, input: PathBuf, limit: Option<usize>) -> Result<()> {
    let db = Database::open(&graph)
        .with_context(|| format!("unable to load graph file \"{}\"", graph.display()))?;
    let data = read_input_data(&input)?;
    let mut scratch = Scratch::for_database(&db);

    let mut count = 0usize;
    let outcome = scan(&db, &data, 0, &mut scratch, |event| {
        println!(
            "Match: pattern {} from {} to {}",
            event.id, event.from, event.to
        );
        count += 1;
        match limit {
            Some(limit) if count >= limit => Matching::Terminate,
            _ => Matching::Continue,
        }
    })
    .context("unable to scan input buffer")?;

    match outcome {
        ScanOutcome::Completed => println!("Scan complete: {} matches", count),
        ScanOutcome::Terminated => println!("Scan terminated after {} matches", count),
    }
    Ok(())
}
