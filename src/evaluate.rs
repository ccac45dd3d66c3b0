//! Batch evaluation of predicted widths against measured ground truth.
//!
//! Ground truth is a CSV file with a header row. `filename` and `height_cm`
//! are required; `shoulder_cm`, `waist_cm`, `chest_cm` and `hip_cm` are
//! optional and may be left blank per row.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::measure::{BodyMeasurements, MeasurementResult};

/// Measured body dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Shoulder,
    Waist,
    Chest,
    Hip,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Shoulder,
        Dimension::Waist,
        Dimension::Chest,
        Dimension::Hip,
    ];

    /// Ground-truth CSV column for this dimension.
    pub const fn column(self) -> &'static str {
        match self {
            Dimension::Shoulder => "shoulder_cm",
            Dimension::Waist => "waist_cm",
            Dimension::Chest => "chest_cm",
            Dimension::Hip => "hip_cm",
        }
    }

    pub fn predicted(self, m: &BodyMeasurements) -> f64 {
        match self {
            Dimension::Shoulder => m.shoulder_width_cm,
            Dimension::Waist => m.waist_width_cm,
            Dimension::Chest => m.chest_width_cm,
            Dimension::Hip => m.hip_width_cm,
        }
    }
}

/// One row of the ground-truth table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub filename: String,
    pub height_cm: f64,
    pub widths_cm: BTreeMap<Dimension, f64>,
}

/// Evaluation outcome for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub filename: String,
    pub height_cm: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cm_per_px: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub predicted_cm: BTreeMap<Dimension, f64>,
    pub ground_truth_cm: BTreeMap<Dimension, f64>,
}

/// Error statistics for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionError {
    pub samples: usize,
    /// Mean absolute error in centimeters, rounded to 3 decimals.
    pub mae_cm: f64,
    /// Mean absolute percentage error, rounded to 2 decimals. `None` when no
    /// sample has a positive ground truth.
    pub mape_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub images: usize,
    pub failures: usize,
    pub errors: BTreeMap<Dimension, DimensionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
}

pub fn load_ground_truth<P: AsRef<Path>>(path: P) -> Result<Vec<GroundTruth>> {
    let content = fs::read_to_string(path)?;
    parse_ground_truth(&content)
}

/// One ground-truth CSV row. Unknown columns are ignored.
#[derive(Debug, Deserialize)]
struct GroundTruthRecord {
    filename: String,
    height_cm: f64,
    #[serde(default)]
    shoulder_cm: Option<f64>,
    #[serde(default)]
    waist_cm: Option<f64>,
    #[serde(default)]
    chest_cm: Option<f64>,
    #[serde(default)]
    hip_cm: Option<f64>,
}

impl GroundTruthRecord {
    fn width(&self, dim: Dimension) -> Option<f64> {
        match dim {
            Dimension::Shoulder => self.shoulder_cm,
            Dimension::Waist => self.waist_cm,
            Dimension::Chest => self.chest_cm,
            Dimension::Hip => self.hip_cm,
        }
    }
}

const REQUIRED_COLUMNS: [&str; 2] = ["filename", "height_cm"];

pub fn parse_ground_truth(content: &str) -> Result<Vec<GroundTruth>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(|e| csv_error(e, 1))?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(Error::InvalidGroundTruth {
            line: 1,
            reason: "missing header row".into(),
        });
    }
    if !REQUIRED_COLUMNS
        .iter()
        .all(|column| headers.iter().any(|h| h == *column))
    {
        return Err(Error::InvalidGroundTruth {
            line: 1,
            reason: "CSV must contain at least columns: filename, height_cm".into(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(e, 0))?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let parsed: GroundTruthRecord = record
            .deserialize(Some(&headers))
            .map_err(|e| csv_error(e, line))?;

        if parsed.filename.is_empty() {
            return Err(Error::InvalidGroundTruth {
                line,
                reason: "empty filename".into(),
            });
        }

        let widths_cm = Dimension::ALL
            .iter()
            .filter_map(|&dim| parsed.width(dim).map(|w| (dim, w)))
            .collect();

        rows.push(GroundTruth {
            filename: parsed.filename,
            height_cm: parsed.height_cm,
            widths_cm,
        });
    }

    Ok(rows)
}

/// Map a CSV error to the line it occurred on, or `fallback_line` when the
/// reader has no position for it.
fn csv_error(err: csv::Error, fallback_line: usize) -> Error {
    let line = err
        .position()
        .map_or(fallback_line, |p| p.line() as usize);
    Error::InvalidGroundTruth {
        line,
        reason: err.to_string(),
    }
}

/// Run `measure` on every ground-truth row (at most `limit` rows).
///
/// `measure` receives the image path and the subject's height. Rows whose
/// image is missing, or whose measurement fails, are recorded with an error
/// instead of predictions.
pub fn evaluate<F>(
    images_dir: &Path,
    ground_truth: &[GroundTruth],
    limit: Option<usize>,
    mut measure: F,
) -> Result<Vec<EvaluationRow>>
where
    F: FnMut(&Path, f64) -> Result<MeasurementResult>,
{
    let take = limit.unwrap_or(ground_truth.len());
    let mut rows = Vec::with_capacity(take.min(ground_truth.len()));

    for gt in ground_truth.iter().take(take) {
        let mut row = EvaluationRow {
            filename: gt.filename.clone(),
            height_cm: gt.height_cm,
            error: None,
            cm_per_px: None,
            confidence: None,
            predicted_cm: BTreeMap::new(),
            ground_truth_cm: gt.widths_cm.clone(),
        };

        let image_path = images_dir.join(&gt.filename);
        if !image_path.exists() {
            debug!("Missing image {}", image_path.display());
            row.error = Some("missing_image".into());
            rows.push(row);
            continue;
        }

        match measure(&image_path, gt.height_cm)? {
            MeasurementResult::Success(m) => {
                row.cm_per_px = Some(m.cm_per_px);
                row.confidence = Some(m.visibility.mean());
                for dim in Dimension::ALL {
                    row.predicted_cm.insert(dim, dim.predicted(&m));
                }
            }
            MeasurementResult::Failure(f) => {
                info!("{}: {}", gt.filename, f);
                row.error = Some(f.reason.code().to_string());
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Per-dimension MAE and MAPE over rows with both a prediction and a ground
/// truth. Dimensions without any such row are omitted.
pub fn compute_errors(rows: &[EvaluationRow]) -> BTreeMap<Dimension, DimensionError> {
    let mut errors = BTreeMap::new();

    for dim in Dimension::ALL {
        let pairs: Vec<(f64, f64)> = rows
            .iter()
            .filter_map(|r| Some((*r.ground_truth_cm.get(&dim)?, *r.predicted_cm.get(&dim)?)))
            .collect();
        if pairs.is_empty() {
            continue;
        }

        let mae = pairs.iter().map(|(gt, p)| (gt - p).abs()).sum::<f64>() / pairs.len() as f64;

        let pct: Vec<f64> = pairs
            .iter()
            .filter(|(gt, _)| *gt > 0.0)
            .map(|(gt, p)| (gt - p).abs() / gt * 100.0)
            .collect();
        let mape = if pct.is_empty() {
            None
        } else {
            Some(round_to(pct.iter().sum::<f64>() / pct.len() as f64, 2))
        };

        errors.insert(
            dim,
            DimensionError {
                samples: pairs.len(),
                mae_cm: round_to(mae, 3),
                mape_pct: mape,
            },
        );
    }

    errors
}

pub fn summarize(rows: &[EvaluationRow]) -> EvaluationSummary {
    let confidences: Vec<f64> = rows.iter().filter_map(|r| r.confidence).collect();
    let avg_confidence = if confidences.is_empty() {
        None
    } else {
        Some(round_to(
            confidences.iter().sum::<f64>() / confidences.len() as f64,
            3,
        ))
    };

    EvaluationSummary {
        images: rows.len(),
        failures: rows.iter().filter(|r| r.error.is_some()).count(),
        errors: compute_errors(rows),
        avg_confidence,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
