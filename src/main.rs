// src/main.rs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Args;
use indicatif::ProgressBar;
use line_survival::{batch, dataset};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("line_survival=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let start_time = Instant::now();

    // 1. Inputs
    let rows = dataset::load_commit_rows(&args.commits)?;
    let registry = dataset::load_registry(&args.repositories)?;
    println!(
        "Loaded {} commits and {} repositories in {:.2?}.",
        rows.len(),
        registry.len(),
        start_time.elapsed()
    );

    // 2. Survival for every commit
    let config = args.survival_config();
    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    progress.set_message("Processing repositories");
    let batch_start = Instant::now();
    let output = batch::run_batch(&rows, &registry, &config, &progress)
        .context("Batch stopped on an unresolvable commit")?;
    println!("Survival computed in {:.2?}.", batch_start.elapsed());

    // 3. Outputs
    dataset::write_records(&args.output, &output.commits, args.jsonl)?;
    println!("Wrote {} commit rows to {}", output.commits.len(), args.output.display());
    if let Some(path) = &args.lines_output {
        dataset::write_records(path, &output.lines, args.jsonl)?;
        println!("Wrote {} line rows to {}", output.lines.len(), path.display());
    }

    println!("{}", output.stats);
    println!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}
