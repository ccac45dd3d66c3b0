//! # body-measure
//!
//! Body width estimation (shoulder, chest, waist, hip) from a single 2D
//! photograph, calibrated by the subject's known height.
//!
//! This crate provides:
//! - **Measurement Engine**: converts seven pose landmarks into centimeter
//!   widths using one height-derived scale factor
//! - **Torso Sampling**: interpolated cross-sections between the shoulder and
//!   hip lines, used to approximate waist and chest
//! - **Pipeline**: optional subject segmentation and pluggable landmark
//!   detection in front of the engine
//! - **Evaluation**: error statistics against measured ground truth
//!
//! ## Algorithm Overview
//!
//! 1. Approximate standing height as the mean nose-to-ankle distance (sides
//!    with nose and ankle visibility above 0.5 only)
//! 2. Correct for the nose-to-crown offset (x1.04) and derive cm per pixel
//! 3. Scale the shoulder and hip landmark distances
//! 4. Sample the torso at 30%, 40%, 50%, 60% and 70% of the way from
//!    shoulders to hips
//! 5. Waist is the narrowest slice; chest is the 30% slice x1.03
//!
//! ## Quick Start
//!
//! ```rust
//! use body_measure::{
//!     compute_measurements, BodyPart, Landmark, LandmarkSet, MeasurementConfig, Point,
//! };
//!
//! // Landmarks in pixel coordinates, e.g. from a pose detector
//! let landmarks = LandmarkSet::from_fn(|part| {
//!     let position = match part {
//!         BodyPart::Nose => Point::new(0.0, -100.0),
//!         BodyPart::LeftAnkle => Point::new(-5.0, 100.0),
//!         BodyPart::RightAnkle => Point::new(5.0, 100.0),
//!         BodyPart::LeftShoulder => Point::new(-40.0, -50.0),
//!         BodyPart::RightShoulder => Point::new(40.0, -50.0),
//!         BodyPart::LeftHip => Point::new(-30.0, 40.0),
//!         BodyPart::RightHip => Point::new(30.0, 40.0),
//!     };
//!     Landmark::new(position, 1.0)
//! });
//!
//! let result = compute_measurements(&landmarks, 180.0, &MeasurementConfig::default());
//! let m = result.measurements().expect("all landmarks visible");
//! println!("Shoulder width: {:.1} cm", m.shoulder_width_cm);
//! assert!(m.waist_width_cm <= m.shoulder_width_cm);
//! ```
//!
//! ## Custom Landmark Sources
//!
//! Implement [`LandmarkProvider`] to plug in a pose model:
//!
//! ```rust
//! use body_measure::{LandmarkProvider, LandmarkSet, Result};
//! use image::DynamicImage;
//!
//! struct MyPoseModel { /* ... */ }
//!
//! impl LandmarkProvider for MyPoseModel {
//!     fn detect(&mut self, image: &DynamicImage) -> Result<Option<LandmarkSet>> {
//!         // Run inference, return None when nobody is in frame
//!         Ok(None)
//!     }
//! }
//! ```

pub mod annotate;
mod config;
mod error;
pub mod evaluate;
mod landmarks;
mod measure;
mod pipeline;
mod provider;
mod segment;
mod types;

pub use config::{
    Config, MeasurementConfig, MeasurementConfigBuilder, SegmentationConfig,
    DEFAULT_CHEST_FACTOR, DEFAULT_HEAD_OFFSET_FACTOR, DEFAULT_SLICE_FRACTIONS,
    DEFAULT_VISIBILITY_THRESHOLD,
};
pub use error::{Error, Result};
pub use landmarks::{BodyPart, Landmark, LandmarkSet, NormalizedLandmark, Visibility, MIN_POSE_LANDMARKS};
pub use measure::{
    compute_measurements, torso_slice, BodyMeasurements, FailureReason, MeasurementFailure,
    MeasurementResult,
};
pub use pipeline::{Pipeline, PipelineOutput};
pub use provider::{
    LandmarkProvider, MaskFileSegmenter, PoseFile, PoseFileProvider, SegmentationProvider,
    StaticLandmarkProvider,
};
pub use segment::{crop_to_subject, subject_crop, SubjectMask};
pub use types::{CropRegion, Point};
