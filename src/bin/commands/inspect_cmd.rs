use anyhow::{Context, Result};
use graphscan::Database;
use serde_json::json;
use std::path::PathBuf;

pub fn cmd_inspect(graph: PathBuf, json_output: bool, verbose: bool) -> Result<()> {
    let db = Database::open(&graph)
        .with_context(|| format!("unable to load graph file \"{}\"", graph.display()))?;
    let info = db.info();

    if json_output {
        let mut output = json!({
            "file": graph.display().to_string(),
            "info": info,
        });
        if verbose {
            let patterns: Vec<_> = (0..db.pattern_count())
                .map(|i| {
                    let flags = db.pattern_flags(i).unwrap_or_default();
                    json!({
                        "id": db.pattern_id(i),
                        "expression": db.expression(i),
                        "caseless": flags.caseless,
                        "dotall": flags.dot_all,
                    })
                })
                .collect();
            output["patterns"] = json!(patterns);
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Database: {}", graph.display());
        println!("Format version: {}", info.version);
        println!("Mode:           {}", info.mode);
        println!("Patterns:       {}", info.patterns);
        println!("Instructions:   {}", info.instructions);
        println!("Buffer size:    {} bytes", info.buffer_size);
        println!("Checksum:       {}", info.checksum);
        match info.accel_byte {
            Some(b) if b.is_ascii_graphic() => {
                println!("Accel byte:     {:#04x} ('{}')", b, b as char)
            }
            Some(b) => println!("Accel byte:     {:#04x}", b),
            None => println!("Accel byte:     none"),
        }

        if verbose {
            println!();
            println!("Patterns:");
            for i in 0..db.pattern_count() {
                let flags = db.pattern_flags(i).unwrap_or_default();
                let mut tags = Vec::new();
                if flags.caseless {
                    tags.push("caseless");
                }
                if flags.dot_all {
                    tags.push("dotall");
                }
                println!(
                    "  {:>6}  {}{}",
                    db.pattern_id(i).unwrap_or(0),
                    db.expression(i).unwrap_or("?"),
                    if tags.is_empty() {
                        String::new()
                    } else {
                        format!("  [{}]", tags.join(","))
                    }
                );
            }
        }
    }

    Ok(())
}
