//! CLI application for body width measurement.
//!
//! Usage:
//!   body-measure <image> <height_cm>                        # Human-readable output
//!   body-measure <image> <height_cm> --json                 # JSON output
//!   body-measure <image> <height_cm> --pose pose.json       # Explicit pose file
//!   body-measure <image> <height_cm> --mask mask.png        # Report the subject crop
//!   body-measure <image> <height_cm> --annotate out.png     # Save overlay

use std::path::{Path, PathBuf};

use body_measure::{
    annotate::annotate, Config, MaskFileSegmenter, MeasurementResult, Pipeline, PipelineOutput,
    PoseFileProvider,
};
use clap::Parser;
use log::{info, LevelFilter};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "body-measure")]
#[command(author, version, about = "Measure body widths from a single full-body image", long_about = None)]
struct Args {
    /// Input image (full body, upright, frontal ideally)
    #[arg(required = true)]
    image: PathBuf,

    /// Known subject height in centimeters
    #[arg(required = true, allow_negative_numbers = true)]
    height_cm: f64,

    /// Pose landmarks JSON (default: <image stem>.pose.json next to the image)
    #[arg(long)]
    pose: Option<PathBuf>,

    /// Subject segmentation mask; the padded subject crop is reported with the
    /// result (pose file coordinates always refer to the full image)
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write an annotated copy of the image
    #[arg(long)]
    annotate: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    crop: Option<body_measure::CropRegion>,
    #[serde(flatten)]
    result: &'a MeasurementResult,
}

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

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the measurement succeeded.
fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            Config::load(path)?
        }
        None => Config::default(),
    };

    let pose_path = args
        .pose
        .clone()
        .unwrap_or_else(|| PoseFileProvider::sidecar_path(&args.image));
    info!("Loading pose landmarks from {:?}...", pose_path);
    let provider = PoseFileProvider::open(&pose_path)?;

    let mut pipeline = Pipeline::new(Box::new(provider), config);
    if let Some(mask) = &args.mask {
        let threshold = pipeline.config().segmentation.mask_threshold;
        pipeline = pipeline.with_segmenter(Box::new(MaskFileSegmenter::new(mask, threshold)));
    }

    info!("Measuring {:?} at {} cm...", args.image, args.height_cm);
    let output = pipeline.measure_path(&args.image, args.height_cm)?;

    if let Some(path) = &args.annotate {
        write_annotation(args, &pipeline, &output, path)?;
    }

    let output_str = if args.json {
        serde_json::to_string_pretty(&Output {
            image: args.image.display().to_string(),
            crop: output.crop,
            result: &output.result,
        })?
    } else {
        format_human_readable(&output.result)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        info!("Output written to {:?}", path);
    } else {
        println!("{}", output_str);
    }

    Ok(output.result.is_success())
}

fn write_annotation(
    args: &Args,
    pipeline: &Pipeline,
    output: &PipelineOutput,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(landmarks) = &output.landmarks else {
        log::warn!("No landmarks to annotate, skipping {:?}", path);
        return Ok(());
    };
    let image = image::open(&args.image)?;
    let fractions = pipeline.config().measurement.slice_fractions();
    annotate(&image, landmarks, fractions).save(path)?;
    info!("Annotated image written to {:?}", path);
    Ok(())
}

fn format_human_readable(result: &MeasurementResult) -> String {
    match result {
        MeasurementResult::Success(m) => {
            let mut s = String::new();
            s.push_str(&format!("Height (input)   : {:.1} cm\n", m.height_input_cm));
            s.push_str(&format!("Shoulder width   : {:.1} cm\n", m.shoulder_width_cm));
            s.push_str(&format!("Chest width      : {:.1} cm\n", m.chest_width_cm));
            s.push_str(&format!("Waist width      : {:.1} cm\n", m.waist_width_cm));
            s.push_str(&format!("Hip width        : {:.1} cm", m.hip_width_cm));
            s
        }
        MeasurementResult::Failure(f) => {
            let mut s = format!("Error: {}", f.message);
            if let Some(v) = &f.visibility {
                s.push_str(&format!(
                    "\nVisibility: nose {:.2}, ankles {:.2}/{:.2}",
                    v.nose, v.left_ankle, v.right_ankle
                ));
            }
            s
        }
    }
}
