//! RFM Dash: e-commerce dashboard with RFM customer segmentation
//!
//! This is the main entrypoint that orchestrates data loading, filtering,
//! aggregation, segmentation and reporting.

use anyhow::Result;
use clap::Parser;
use rfm_dash::filter::{date_bounds, resolve_category};
use rfm_dash::{
    classify_code, load_transactions, report, Args, Dashboard, DashboardFilter, RfmScores,
};
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Check if in score lookup mode
    if let Some(scores) = args.parse_score_code()? {
        run_lookup_mode(scores);
    } else {
        run_full_pipeline(&args)?;
    }

    Ok(())
}

/// Classify a single RFM score code
fn run_lookup_mode(scores: RfmScores) {
    println!("=== Segment Lookup ===");
    println!(
        "Input scores: R={}, F={}, M={}",
        scores.recency, scores.frequency, scores.monetary
    );

    let segment = classify_code(&scores.code());
    println!("\n✓ Segment: {}", segment);
}

/// Run the full dashboard pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== RFM Dashboard ===\n");

    let start_time = Instant::now();

    // Step 1: Load and validate data
    log::info!("Step 1: Loading transactions from {}", args.input);
    let data_start = Instant::now();
    let load = load_transactions(&args.input)?;
    log::info!("Loading time: {:.2}s", data_start.elapsed().as_secs_f64());
    report::print_load_summary(&load);

    let Some((first_day, last_day)) = date_bounds(&load.transactions) else {
        anyhow::bail!("No valid transactions found in {}", args.input);
    };

    // Step 2: Build the filter, defaulting to the full date range
    let filter = DashboardFilter::new(
        args.start_date.unwrap_or(first_day),
        args.end_date.unwrap_or(last_day),
        resolve_category(&args.category, &load.transactions)?,
    )?;

    // Step 3: Compute every dashboard section
    log::info!("Step 2: Computing dashboard sections");
    let compute_start = Instant::now();
    let dashboard = Dashboard::build(&load.transactions, &filter)?;
    log::info!(
        "Computation time: {:.2}s",
        compute_start.elapsed().as_secs_f64()
    );

    report::print_dashboard(&dashboard, args.top);

    // Step 4: Export the scored customer table
    if let Ok(records) = &dashboard.segmentation {
        report::write_segments_csv(records, &args.output)?;
        println!("\nScored customers saved to: {}", args.output);
    }

    println!("\n=== Pipeline Complete ===");
    println!(
        "Total processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
