//! Height-calibrated body width estimation.
//!
//! The engine converts pixel-space landmarks into centimeters with a single
//! scale factor derived from the subject's known height:
//!
//! 1. Standing height is approximated by the mean nose-to-ankle distance over
//!    the sides whose nose and ankle are both visible, then corrected by the
//!    head offset factor for the distance between nose and crown.
//! 2. Shoulder and hip widths are direct landmark distances.
//! 3. The torso is sampled by interpolating between the shoulder line and the
//!    hip line at fixed fractions.
//! 4. Waist is the narrowest slice; chest is the uppermost slice widened by
//!    the chest factor.
//!
//! Shoulder and hip landmarks are used regardless of their visibility; only
//! the height landmarks are gated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MeasurementConfig;
use crate::landmarks::{BodyPart, LandmarkSet, Visibility};
use crate::types::Point;

/// Why a measurement could not be produced.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Image could not be read")]
    ImageUnreadable,

    #[error("No person detected")]
    NoSubjectDetected,

    #[error("Insufficient reliable landmarks for height")]
    InsufficientLandmarks,

    #[error("Invalid height calibration")]
    InvalidHeight,
}

impl FailureReason {
    /// Stable machine-readable code.
    pub const fn code(self) -> &'static str {
        match self {
            FailureReason::ImageUnreadable => "image_unreadable",
            FailureReason::NoSubjectDetected => "no_subject_detected",
            FailureReason::InsufficientLandmarks => "insufficient_landmarks",
            FailureReason::InvalidHeight => "invalid_height",
        }
    }
}

/// A failed measurement, with whatever visibility data was gathered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementFailure {
    pub reason: FailureReason,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl MeasurementFailure {
    pub fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            message: reason.to_string(),
            visibility: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

impl std::fmt::Display for MeasurementFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.reason.code())
    }
}

/// Body widths in centimeters, with the calibration used to derive them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMeasurements {
    pub height_input_cm: f64,
    /// Calibration scale: centimeters per image pixel.
    pub cm_per_px: f64,
    /// Mean nose-to-ankle distance in pixels, before head-offset correction.
    pub nose_to_ankle_px: f64,
    pub shoulder_width_cm: f64,
    pub hip_width_cm: f64,
    pub waist_width_cm: f64,
    pub chest_width_cm: f64,
    /// Widths of the interpolated torso slices, aligned with `slice_fractions`.
    pub torso_slice_widths_cm: Vec<f64>,
    pub slice_fractions: Vec<f64>,
    pub visibility: Visibility,
}

/// Outcome of a measurement: fully populated, or a failure reason only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MeasurementResult {
    Success(BodyMeasurements),
    Failure(MeasurementFailure),
}

impl MeasurementResult {
    pub fn failed(reason: FailureReason) -> Self {
        MeasurementResult::Failure(MeasurementFailure::new(reason))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MeasurementResult::Success(_))
    }

    pub fn measurements(&self) -> Option<&BodyMeasurements> {
        match self {
            MeasurementResult::Success(m) => Some(m),
            MeasurementResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&MeasurementFailure> {
        match self {
            MeasurementResult::Success(_) => None,
            MeasurementResult::Failure(f) => Some(f),
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure().map(|f| f.reason)
    }

    /// Visibility scores, present on success and on landmark-stage failures.
    pub fn visibility(&self) -> Option<&Visibility> {
        match self {
            MeasurementResult::Success(m) => Some(&m.visibility),
            MeasurementResult::Failure(f) => f.visibility.as_ref(),
        }
    }

    pub fn into_result(self) -> Result<BodyMeasurements, MeasurementFailure> {
        match self {
            MeasurementResult::Success(m) => Ok(m),
            MeasurementResult::Failure(f) => Err(f),
        }
    }
}

impl From<MeasurementFailure> for MeasurementResult {
    fn from(failure: MeasurementFailure) -> Self {
        MeasurementResult::Failure(failure)
    }
}

/// Estimate body widths from landmarks and the subject's real height.
///
/// Pure: performs no I/O and keeps no state between calls.
pub fn compute_measurements(
    landmarks: &LandmarkSet,
    real_height_cm: f64,
    config: &MeasurementConfig,
) -> MeasurementResult {
    let visibility = landmarks.visibility_report();

    let Some(nose_to_ankle_px) = nose_to_ankle_distance(landmarks, config.visibility_threshold())
    else {
        return MeasurementFailure::new(FailureReason::InsufficientLandmarks)
            .with_visibility(visibility)
            .into();
    };

    if !(real_height_cm.is_finite() && real_height_cm > 0.0) {
        return MeasurementFailure::new(FailureReason::InvalidHeight)
            .with_message(format!(
                "Real height must be positive, got {real_height_cm} cm"
            ))
            .with_visibility(visibility)
            .into();
    }

    let effective_height_px = nose_to_ankle_px * config.head_offset_factor();
    if !(effective_height_px.is_finite() && effective_height_px > 0.0) {
        return MeasurementFailure::new(FailureReason::InvalidHeight)
            .with_message(format!(
                "Degenerate nose-to-ankle distance ({nose_to_ankle_px} px)"
            ))
            .with_visibility(visibility)
            .into();
    }

    let cm_per_px = real_height_cm / effective_height_px;

    let shoulder_width_cm = landmarks
        .position(BodyPart::LeftShoulder)
        .distance(&landmarks.position(BodyPart::RightShoulder))
        * cm_per_px;
    let hip_width_cm = landmarks
        .position(BodyPart::LeftHip)
        .distance(&landmarks.position(BodyPart::RightHip))
        * cm_per_px;

    let slice_fractions = config.slice_fractions().to_vec();
    let torso_slice_widths_cm: Vec<f64> = slice_fractions
        .iter()
        .map(|&f| {
            let (left, right) = torso_slice(landmarks, f);
            left.distance(&right) * cm_per_px
        })
        .collect();

    // Waist: narrowest slice (inward taper). Chest: uppermost slice, widened.
    let waist_width_cm = torso_slice_widths_cm
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let chest_width_cm = torso_slice_widths_cm[0] * config.chest_factor();

    MeasurementResult::Success(BodyMeasurements {
        height_input_cm: real_height_cm,
        cm_per_px,
        nose_to_ankle_px,
        shoulder_width_cm,
        hip_width_cm,
        waist_width_cm,
        chest_width_cm,
        torso_slice_widths_cm,
        slice_fractions,
        visibility,
    })
}

/// Endpoints of the torso slice at fraction `f` of the way from the shoulder
/// line to the hip line, as (left, right) pixel positions.
pub fn torso_slice(landmarks: &LandmarkSet, f: f64) -> (Point, Point) {
    let left = landmarks
        .position(BodyPart::LeftShoulder)
        .lerp(&landmarks.position(BodyPart::LeftHip), f);
    let right = landmarks
        .position(BodyPart::RightShoulder)
        .lerp(&landmarks.position(BodyPart::RightHip), f);
    (left, right)
}

/// Mean nose-to-ankle distance over the usable sides, or `None` when neither
/// side has a visible nose and ankle.
fn nose_to_ankle_distance(landmarks: &LandmarkSet, threshold: f64) -> Option<f64> {
    let nose = landmarks.get(BodyPart::Nose);
    if !nose.is_visible(threshold) {
        return None;
    }

    let mut total = 0.0;
    let mut count = 0usize;
    for ankle in [BodyPart::LeftAnkle, BodyPart::RightAnkle] {
        let ankle = landmarks.get(ankle);
        if ankle.is_visible(threshold) {
            total += nose.position.distance(&ankle.position);
            count += 1;
        }
    }

    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}
