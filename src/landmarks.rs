//! Body landmark types consumed by the measurement engine.
//!
//! A [`LandmarkSet`] holds the seven anatomical points the engine needs, in
//! image pixel coordinates. Pose detectors usually report a larger skeleton in
//! normalized coordinates; [`LandmarkSet::from_normalized`] picks the required
//! points out of the 33-point BlazePose topology and scales them to pixels.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{CropRegion, Point};

/// Body parts consulted by the measurement engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum BodyPart {
    Nose = 0,
    LeftShoulder = 1,
    RightShoulder = 2,
    LeftHip = 3,
    RightHip = 4,
    LeftAnkle = 5,
    RightAnkle = 6,
}

impl BodyPart {
    pub const COUNT: usize = 7;

    pub const ALL: [BodyPart; BodyPart::COUNT] = [
        BodyPart::Nose,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
    ];

    /// Index of this part in the 33-point BlazePose skeleton.
    pub const fn pose_index(self) -> usize {
        match self {
            BodyPart::Nose => 0,
            BodyPart::LeftShoulder => 11,
            BodyPart::RightShoulder => 12,
            BodyPart::LeftHip => 23,
            BodyPart::RightHip => 24,
            BodyPart::LeftAnkle => 27,
            BodyPart::RightAnkle => 28,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            BodyPart::Nose => "nose",
            BodyPart::LeftShoulder => "left_shoulder",
            BodyPart::RightShoulder => "right_shoulder",
            BodyPart::LeftHip => "left_hip",
            BodyPart::RightHip => "right_hip",
            BodyPart::LeftAnkle => "left_ankle",
            BodyPart::RightAnkle => "right_ankle",
        }
    }
}

/// Minimum number of points a pose must have to cover every [`BodyPart`].
pub const MIN_POSE_LANDMARKS: usize = BodyPart::RightAnkle.pose_index() + 1;

/// A single landmark: pixel position plus detector confidence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub position: Point,
    /// Confidence score in [0, 1].
    pub visibility: f64,
}

impl Landmark {
    pub const fn new(position: Point, visibility: f64) -> Self {
        Self {
            position,
            visibility,
        }
    }

    /// Whether the visibility strictly exceeds `threshold`.
    pub fn is_visible(&self, threshold: f64) -> bool {
        self.visibility > threshold
    }
}

/// A landmark as emitted by pose detectors: coordinates normalized to [0,1]
/// relative to the image width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLandmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "default_visibility")]
    pub visibility: f64,
}

fn default_visibility() -> f64 {
    1.0
}

/// The seven landmarks required by the measurement engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    landmarks: [Landmark; BodyPart::COUNT],
}

impl LandmarkSet {
    pub fn new(landmarks: [Landmark; BodyPart::COUNT]) -> Self {
        Self { landmarks }
    }

    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut(BodyPart) -> Landmark,
    {
        let mut landmarks = [Landmark::default(); BodyPart::COUNT];
        for part in BodyPart::ALL {
            landmarks[part as usize] = f(part);
        }
        Self::new(landmarks)
    }

    /// Build a landmark set from a full normalized pose (BlazePose layout),
    /// scaling coordinates to a `width` x `height` image.
    pub fn from_normalized(points: &[NormalizedLandmark], width: u32, height: u32) -> Result<Self> {
        if points.len() < MIN_POSE_LANDMARKS {
            return Err(Error::InvalidPose(format!(
                "expected at least {} landmarks, got {}",
                MIN_POSE_LANDMARKS,
                points.len()
            )));
        }

        let frame = CropRegion::new(0, 0, width, height);
        let mut landmarks = [Landmark::default(); BodyPart::COUNT];
        for part in BodyPart::ALL {
            let p = &points[part.pose_index()];
            if !p.x.is_finite() || !p.y.is_finite() || !p.visibility.is_finite() {
                return Err(Error::InvalidPose(format!(
                    "non-finite values for {}",
                    part.name()
                )));
            }
            let position = frame.denormalize_point(Point::new(p.x, p.y));
            landmarks[part as usize] = Landmark::new(position, p.visibility);
        }

        Ok(Self::new(landmarks))
    }

    pub fn get(&self, part: BodyPart) -> &Landmark {
        &self.landmarks[part as usize]
    }

    pub fn position(&self, part: BodyPart) -> Point {
        self.landmarks[part as usize].position
    }

    pub fn visibility(&self, part: BodyPart) -> f64 {
        self.landmarks[part as usize].visibility
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyPart, &Landmark)> {
        BodyPart::ALL.into_iter().zip(self.landmarks.iter())
    }

    /// Shift every position by `offset`, e.g. to map landmarks detected on a
    /// crop back into the source image.
    pub fn translated(&self, offset: Point) -> Self {
        let mut landmarks = self.landmarks;
        for lm in &mut landmarks {
            lm.position = lm.position + offset;
        }
        Self { landmarks }
    }

    pub fn visibility_report(&self) -> Visibility {
        Visibility {
            nose: self.visibility(BodyPart::Nose),
            left_ankle: self.visibility(BodyPart::LeftAnkle),
            right_ankle: self.visibility(BodyPart::RightAnkle),
            left_shoulder: self.visibility(BodyPart::LeftShoulder),
            right_shoulder: self.visibility(BodyPart::RightShoulder),
            left_hip: self.visibility(BodyPart::LeftHip),
            right_hip: self.visibility(BodyPart::RightHip),
        }
    }
}

/// Visibility scores of the landmarks consulted for a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Visibility {
    pub nose: f64,
    pub left_ankle: f64,
    pub right_ankle: f64,
    pub left_shoulder: f64,
    pub right_shoulder: f64,
    pub left_hip: f64,
    pub right_hip: f64,
}

impl Visibility {
    pub fn get(&self, part: BodyPart) -> f64 {
        match part {
            BodyPart::Nose => self.nose,
            BodyPart::LeftShoulder => self.left_shoulder,
            BodyPart::RightShoulder => self.right_shoulder,
            BodyPart::LeftHip => self.left_hip,
            BodyPart::RightHip => self.right_hip,
            BodyPart::LeftAnkle => self.left_ankle,
            BodyPart::RightAnkle => self.right_ankle,
        }
    }

    /// Mean visibility across all consulted landmarks.
    pub fn mean(&self) -> f64 {
        let sum: f64 = BodyPart::ALL.iter().map(|&p| self.get(p)).sum();
        sum / BodyPart::COUNT as f64
    }
}
