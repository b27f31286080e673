mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{cmd_bench, cmd_compile, cmd_inspect, cmd_scan};

#[derive(Parser)]
#[command(name = "graphscan")]
#[command(
    about = "Block-mode multi-pattern scanning engine",
    long_about = "graphscan - compile regex pattern sets into immutable graph databases and \n\
    scan byte buffers against all patterns simultaneously.\n\n\
    Databases are offset-based binary files that load zero-copy via memory mapping. \n\
    Scans report every match occurrence through a synchronous callback, in \n\
    non-decreasing end-offset order.\n\n\
    Examples:\n\
      graphscan compile patterns.txt -o patterns.gsdb\n\
      graphscan scan patterns.gsdb input.bin\n\
      graphscan bench patterns.gsdb corpus.bin 10\n\
      graphscan inspect patterns.gsdb --json"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a pattern list into a graph database
    Compile {
        /// Input files with one expression per line, or "-" for stdin.
        /// Lines may carry a numeric "id:" prefix; '#' comments and blank
        /// lines are skipped. ".gz" files are decompressed transparently.
        #[arg(value_name = "PATTERNS", required = true)]
        inputs: Vec<PathBuf>,

        /// Output database file (.gsdb extension)
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Case-insensitive matching (default: case-sensitive)
        #[arg(short = 'i', long)]
        case_insensitive: bool,

        /// Make '.' match newline as well
        #[arg(long)]
        dotall: bool,

        /// Verbose output during compilation
        #[arg(short, long)]
        verbose: bool,
    },

    /// Scan an input file once and print every match
    Scan {
        /// Path to the graph database (.gsdb file)
        #[arg(value_name = "GRAPH")]
        graph: PathBuf,

        /// Input file to scan
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Stop after this many matches (exercises cooperative termination)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Benchmark repeated scans of an input file against a graph database
    Bench {
        /// Path to the graph database (.gsdb file)
        #[arg(value_name = "GRAPH")]
        graph: PathBuf,

        /// Input file to scan (read fully into memory)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Number of timed scan runs
        #[arg(value_name = "RUNS", value_parser = clap::value_parser!(u32).range(1..))]
        runs: u32,
    },

    /// Inspect a graph database
    Inspect {
        /// Path to the graph database (.gsdb file)
        #[arg(value_name = "GRAPH")]
        graph: PathBuf,

        /// Output metadata as JSON
        #[arg(short, long)]
        json: bool,

        /// List every pattern with its id and flags
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            inputs,
            output,
            case_insensitive,
            dotall,
            verbose,
        } => cmd_compile(inputs, output, case_insensitive, dotall, verbose),
        Commands::Scan {
            graph,
            input,
            limit,
        } => cmd_scan(graph, input, limit),
        Commands::Bench { graph, input, runs } => cmd_bench(graph, input, runs),
        Commands::Inspect {
            graph,
            json,
            verbose,
        } => cmd_inspect(graph, json, verbose),
    }
}
