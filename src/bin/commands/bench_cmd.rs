use anyhow::{Context, Result};
use graphscan::{scan, Database, Matching, Scratch};
use std::path::PathBuf;
use std::time::Instant;

use crate::cli_utils::read_input_data;

/// Timed scan loop: load the graph once, read the input once, allocate
/// scratch once, then run `runs` scans back to back. Matches print during
/// every run; the benchmark aborts on the first scan failure.
pub fn cmd_bench(graph: PathBuf, input: PathBuf, runs: u32) -> Result<()> {
    println!("Loading graph...");
    let db = Database::open(&graph)
        .with_context(|| format!("unable to load graph file \"{}\"", graph.display()))?;

    println!("Reading input data...");
    let data = read_input_data(&input)?;

    println!("Allocating scratch...");
    let mut scratch = Scratch::for_database(&db);

    println!("Scanning input data with {} runs...", runs);
    let mut elapsed_total = 0.0;

    for _ in 0..runs {
        let start = Instant::now();
        scan(&db, &data, 0, &mut scratch, |event| {
            println!("Match at offset {}", event.to);
            Matching::Continue
        })
        .context("unable to scan input buffer")?;

        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        println!("Time elapsed in ms: {:.6}", elapsed);
        elapsed_total += elapsed;
    }

    println!(
        "Average time elapsed in ms: {:.6}",
        elapsed_total / runs as f64
    );
    Ok(())
}
