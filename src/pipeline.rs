//! Image-to-measurement pipeline: optional segmentation, landmark detection,
//! then the measurement engine.

use std::path::Path;

use image::DynamicImage;
use log::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::landmarks::LandmarkSet;
use crate::measure::{compute_measurements, FailureReason, MeasurementFailure, MeasurementResult};
use crate::provider::{LandmarkProvider, SegmentationProvider};
use crate::segment::crop_to_subject;
use crate::types::CropRegion;

/// Everything produced for one image.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub result: MeasurementResult,
    /// Detected landmarks in the coordinate frame of the input image.
    pub landmarks: Option<LandmarkSet>,
    /// Region the subject was cropped to before detection, if any.
    pub crop: Option<CropRegion>,
}

impl PipelineOutput {
    fn failed(failure: MeasurementFailure) -> Self {
        Self {
            result: failure.into(),
            landmarks: None,
            crop: None,
        }
    }
}

pub struct Pipeline {
    landmarks: Box<dyn LandmarkProvider>,
    segmenter: Option<Box<dyn SegmentationProvider>>,
    config: Config,
}

impl Pipeline {
    pub fn new(landmarks: Box<dyn LandmarkProvider>, config: Config) -> Self {
        Self {
            landmarks,
            segmenter: None,
            config,
        }
    }

    pub fn with_segmenter(mut self, segmenter: Box<dyn SegmentationProvider>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Measure the subject in an image file. An unreadable image is reported
    /// as an `ImageUnreadable` failure, not an error.
    pub fn measure_path<P: AsRef<Path>>(&mut self, path: P, real_height_cm: f64) -> Result<PipelineOutput> {
        let path = path.as_ref();
        debug!("Loading image {}", path.display());
        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Failed to read image {}: {}", path.display(), e);
                return Ok(PipelineOutput::failed(
                    MeasurementFailure::new(FailureReason::ImageUnreadable)
                        .with_message(format!("Image could not be read: {}: {}", path.display(), e)),
                ));
            }
        };
        self.measure_image(&image, real_height_cm)
    }

    pub fn measure_image(&mut self, image: &DynamicImage, real_height_cm: f64) -> Result<PipelineOutput> {
        let mut crop = None;
        let mut cropped = None;
        if let Some(segmenter) = self.segmenter.as_mut() {
            match segmenter.segment(image)? {
                Some(mask) => {
                    if let Some((sub_image, region)) =
                        crop_to_subject(image, &mask, &self.config.segmentation)?
                    {
                        info!(
                            "Cropped {}x{} image to {}x{} subject region",
                            image.width(),
                            image.height(),
                            region.width,
                            region.height
                        );
                        cropped = Some(sub_image);
                        crop = Some(region);
                    }
                }
                None => warn!("Segmentation found no subject, using full image"),
            }
        }

        let on_crop = self.landmarks.detects_on_crop();
        let detect_on = match &cropped {
            Some(sub_image) if on_crop => sub_image,
            _ => image,
        };
        let Some(detected) = self.landmarks.detect(detect_on)? else {
            info!("No person detected");
            return Ok(PipelineOutput {
                result: MeasurementResult::failed(FailureReason::NoSubjectDetected),
                landmarks: None,
                crop,
            });
        };

        // Back into the input image's frame; widths are translation invariant.
        let landmarks = match crop {
            Some(region) if on_crop => detected.translated(region.origin()),
            _ => detected,
        };

        let result = compute_measurements(&landmarks, real_height_cm, &self.config.measurement);
        match &result {
            MeasurementResult::Success(m) => debug!(
                "Measured at {:.4} cm/px: shoulder {:.1} cm, waist {:.1} cm",
                m.cm_per_px, m.shoulder_width_cm, m.waist_width_cm
            ),
            MeasurementResult::Failure(f) => info!("Measurement failed: {}", f),
        }

        Ok(PipelineOutput {
            result,
            landmarks: Some(landmarks),
            crop,
        })
    }
}
