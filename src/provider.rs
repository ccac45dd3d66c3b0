//! Perception model seams.
//!
//! Pose detection and segmentation are external collaborators. The pipeline
//! only talks to them through [`LandmarkProvider`] and
//! [`SegmentationProvider`], so any model runtime can be plugged in, and
//! tests can substitute fixed answers.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::landmarks::{LandmarkSet, NormalizedLandmark};
use crate::segment::SubjectMask;

/// Locates body landmarks in an image.
pub trait LandmarkProvider {
    /// Returns `None` when no subject was detected.
    fn detect(&mut self, image: &DynamicImage) -> Result<Option<LandmarkSet>>;

    /// Whether detection should run on the segmented subject crop.
    ///
    /// Providers whose coordinates were computed on the full image (such as
    /// precomputed pose files) return `false`; they are then handed the
    /// uncropped image and their landmarks are used as is.
    fn detects_on_crop(&self) -> bool {
        true
    }
}

/// Separates the subject from the background.
pub trait SegmentationProvider {
    /// Returns `None` when segmentation found nothing usable.
    fn segment(&mut self, image: &DynamicImage) -> Result<Option<SubjectMask>>;
}

impl<T: LandmarkProvider + ?Sized> LandmarkProvider for Box<T> {
    fn detect(&mut self, image: &DynamicImage) -> Result<Option<LandmarkSet>> {
        (**self).detect(image)
    }

    fn detects_on_crop(&self) -> bool {
        (**self).detects_on_crop()
    }
}

impl<T: SegmentationProvider + ?Sized> SegmentationProvider for Box<T> {
    fn segment(&mut self, image: &DynamicImage) -> Result<Option<SubjectMask>> {
        (**self).segment(image)
    }
}

/// Always answers with the same landmarks, regardless of the image.
#[derive(Debug, Clone, Default)]
pub struct StaticLandmarkProvider {
    landmarks: Option<LandmarkSet>,
}

impl StaticLandmarkProvider {
    pub fn new(landmarks: Option<LandmarkSet>) -> Self {
        Self { landmarks }
    }
}

impl LandmarkProvider for StaticLandmarkProvider {
    fn detect(&mut self, _image: &DynamicImage) -> Result<Option<LandmarkSet>> {
        Ok(self.landmarks.clone())
    }
}

/// Pose detector output as written to disk: one entry per detected person,
/// each a full skeleton in normalized image coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseFile {
    #[serde(default)]
    pub pose_landmarks: Vec<Vec<NormalizedLandmark>>,
}

impl PoseFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let pose: Self = serde_json::from_reader(BufReader::new(file))?;
        Ok(pose)
    }
}

/// Reads landmarks from a precomputed pose file. The first pose is used.
///
/// Coordinates are normalized to the full image the pose was computed on, so
/// the pipeline never hands this provider a crop.
#[derive(Debug, Clone)]
pub struct PoseFileProvider {
    pose: PoseFile,
}

impl PoseFileProvider {
    pub fn new(pose: PoseFile) -> Self {
        Self { pose }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading pose landmarks from {}", path.display());
        Ok(Self::new(PoseFile::load(path)?))
    }

    /// Conventional pose file location for an image: `photo.jpg` ->
    /// `photo.pose.json` in the same directory.
    pub fn sidecar_path(image_path: &Path) -> PathBuf {
        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        image_path.with_file_name(format!("{stem}.pose.json"))
    }
}

impl LandmarkProvider for PoseFileProvider {
    fn detect(&mut self, image: &DynamicImage) -> Result<Option<LandmarkSet>> {
        let Some(first) = self.pose.pose_landmarks.first() else {
            return Ok(None);
        };
        if first.is_empty() {
            return Ok(None);
        }
        LandmarkSet::from_normalized(first, image.width(), image.height()).map(Some)
    }

    fn detects_on_crop(&self) -> bool {
        false
    }
}

/// Loads a precomputed segmentation mask image from disk.
#[derive(Debug, Clone)]
pub struct MaskFileSegmenter {
    path: PathBuf,
    threshold: u8,
}

impl MaskFileSegmenter {
    pub fn new<P: Into<PathBuf>>(path: P, threshold: u8) -> Self {
        Self {
            path: path.into(),
            threshold,
        }
    }
}

impl SegmentationProvider for MaskFileSegmenter {
    fn segment(&mut self, image: &DynamicImage) -> Result<Option<SubjectMask>> {
        debug!("Loading segmentation mask from {}", self.path.display());
        let mask_image = image::open(&self.path)?.to_luma8();
        if mask_image.dimensions() != (image.width(), image.height()) {
            return Err(Error::Provider(format!(
                "mask {} is {}x{} but image is {}x{}",
                self.path.display(),
                mask_image.width(),
                mask_image.height(),
                image.width(),
                image.height()
            )));
        }
        Ok(Some(SubjectMask::from_luma(&mask_image, self.threshold)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::BodyPart;
    use image::RgbImage;

    fn pose_json(n: usize) -> String {
        let points: Vec<String> = (0..n)
            .map(|i| format!(r#"{{"x": {}, "y": 0.25, "visibility": 0.8}}"#, i as f64 / 50.0))
            .collect();
        format!(r#"{{"pose_landmarks": [[{}]]}}"#, points.join(","))
    }

    #[test]
    fn static_provider_returns_fixture() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let mut empty = StaticLandmarkProvider::new(None);
        assert!(empty.detect(&image).unwrap().is_none());
    }

    #[test]
    fn pose_file_provider_denormalizes() {
        let pose: PoseFile = serde_json::from_str(&pose_json(33)).unwrap();
        let mut provider = PoseFileProvider::new(pose);

        let image = DynamicImage::ImageRgb8(RgbImage::new(100, 200));
        let set = provider.detect(&image).unwrap().unwrap();

        let hip = set.position(BodyPart::LeftHip);
        assert!((hip.x - 46.0).abs() < 1e-9);
        assert!((hip.y - 50.0).abs() < 1e-9);
        assert_eq!(set.visibility(BodyPart::Nose), 0.8);
    }

    #[test]
    fn empty_pose_file_means_no_subject() {
        let pose: PoseFile = serde_json::from_str(r#"{"pose_landmarks": []}"#).unwrap();
        let mut provider = PoseFileProvider::new(pose);
        let image = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        assert!(provider.detect(&image).unwrap().is_none());

        let pose: PoseFile = serde_json::from_str("{}").unwrap();
        let mut provider = PoseFileProvider::new(pose);
        assert!(provider.detect(&image).unwrap().is_none());
    }

    #[test]
    fn truncated_pose_is_an_error() {
        let pose: PoseFile = serde_json::from_str(&pose_json(12)).unwrap();
        let mut provider = PoseFileProvider::new(pose);
        let image = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        assert!(matches!(
            provider.detect(&image),
            Err(Error::InvalidPose(_))
        ));
    }

    #[test]
    fn sidecar_path_replaces_extension() {
        let path = PoseFileProvider::sidecar_path(Path::new("/data/people/alice.jpg"));
        assert_eq!(path, PathBuf::from("/data/people/alice.pose.json"));
    }

    #[test]
    fn boxed_provider_delegates() {
        let mut provider: Box<dyn LandmarkProvider> = Box::new(StaticLandmarkProvider::default());
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert!(provider.detect(&image).unwrap().is_none());
    }
}
