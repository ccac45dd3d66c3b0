//! Batch evaluation of body measurements against ground truth.
//!
//! Each image in `--images` needs a pose file next to it
//! (`photo.jpg` -> `photo.pose.json`).
//!
//! Usage:
//!   body-measure-eval --images data/ --csv truth.csv
//!   body-measure-eval --images data/ --csv truth.csv --out results.json --limit 20

use std::path::PathBuf;

use body_measure::evaluate::{evaluate, load_ground_truth, summarize, Dimension, EvaluationRow, EvaluationSummary};
use body_measure::{Config, MeasurementResult, Pipeline, PoseFileProvider};
use clap::Parser;
use log::{info, warn, LevelFilter};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "body-measure-eval")]
#[command(author, version, about = "Batch evaluate body measurement predictions", long_about = None)]
struct Args {
    /// Directory with input images
    #[arg(long, required = true)]
    images: PathBuf,

    /// Ground truth CSV (filename,height_cm, optional shoulder_cm,waist_cm,chest_cm,hip_cm)
    #[arg(long, required = true)]
    csv: PathBuf,

    /// Output JSON path
    #[arg(long, default_value = "results.json")]
    out: PathBuf,

    /// Optional limit on number of rows to process
    #[arg(long)]
    limit: Option<usize>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    summary: &'a EvaluationSummary,
    rows: &'a [EvaluationRow],
}

/// Waist MAPE above this suggests the fixed slice heuristic needs calibration.
const WAIST_MAPE_WARNING_PCT: f64 = 8.0;

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let ground_truth = load_ground_truth(&args.csv)?;
    info!("Loaded {} ground truth rows from {:?}", ground_truth.len(), args.csv);

    let rows = evaluate(&args.images, &ground_truth, args.limit, |image, height_cm| {
        let pose_path = PoseFileProvider::sidecar_path(image);
        if !pose_path.exists() {
            warn!("No pose file for {:?}", image);
            return Ok(MeasurementResult::failed(
                body_measure::FailureReason::NoSubjectDetected,
            ));
        }
        let provider = PoseFileProvider::open(&pose_path)?;
        let mut pipeline = Pipeline::new(Box::new(provider), config.clone());
        Ok(pipeline.measure_path(image, height_cm)?.result)
    })?;

    let summary = summarize(&rows);
    let report = Report {
        summary: &summary,
        rows: &rows,
    };
    std::fs::write(&args.out, serde_json::to_string_pretty(&report)?)?;

    println!("Saved results: {}", args.out.display());
    println!("Image count: {}", summary.images);
    println!("Errors present: {}", summary.failures);
    println!("Metrics:");
    for (dim, err) in &summary.errors {
        let name = dim.column().trim_end_matches("_cm");
        println!("  {}_mae_cm: {}", name, err.mae_cm);
        match err.mape_pct {
            Some(mape) => println!("  {}_mape_pct: {}", name, mape),
            None => println!("  {}_mape_pct: n/a", name),
        }
    }
    if let Some(conf) = summary.avg_confidence {
        println!("  avg_confidence: {}", conf);
    }

    if let Some(mape) = summary
        .errors
        .get(&Dimension::Waist)
        .and_then(|e| e.mape_pct)
    {
        if mape > WAIST_MAPE_WARNING_PCT {
            warn!("High waist MAPE ({mape}%); consider calibrating the torso slice heuristic");
        }
    }

    Ok(())
}
