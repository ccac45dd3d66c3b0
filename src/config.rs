//! Tunable parameters for measurement and segmentation.
//!
//! Defaults reproduce the fixed body-proportion heuristics: a 4% head-top
//! correction on the nose-to-ankle distance, a 3% outward chest correction,
//! five torso slices between 30% and 70% of the shoulder-to-hip span, and a
//! 0.5 visibility gate for the height landmarks.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_HEAD_OFFSET_FACTOR: f64 = 1.04;
pub const DEFAULT_CHEST_FACTOR: f64 = 1.03;
pub const DEFAULT_SLICE_FRACTIONS: [f64; 5] = [0.30, 0.40, 0.50, 0.60, 0.70];
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.5;

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub measurement: MeasurementConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.segmentation.validate()?;
        Ok(config)
    }
}

/// Parameters of the measurement engine.
///
/// Always holds at least one slice fraction; construct through
/// [`MeasurementConfig::builder`] or deserialization, both of which validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MeasurementConfigBuilder")]
pub struct MeasurementConfig {
    head_offset_factor: f64,
    chest_factor: f64,
    slice_fractions: Vec<f64>,
    visibility_threshold: f64,
}

impl MeasurementConfig {
    pub fn builder() -> MeasurementConfigBuilder {
        MeasurementConfigBuilder::default()
    }

    /// Ratio of full standing height to the nose-to-ankle distance.
    pub fn head_offset_factor(&self) -> f64 {
        self.head_offset_factor
    }

    /// Multiplier applied to the uppermost torso slice to estimate chest width.
    pub fn chest_factor(&self) -> f64 {
        self.chest_factor
    }

    /// Fractions of the shoulder-to-hip span at which torso slices are taken.
    /// Never empty.
    pub fn slice_fractions(&self) -> &[f64] {
        &self.slice_fractions
    }

    /// Visibility a nose/ankle landmark must exceed to be used for height.
    pub fn visibility_threshold(&self) -> f64 {
        self.visibility_threshold
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            head_offset_factor: DEFAULT_HEAD_OFFSET_FACTOR,
            chest_factor: DEFAULT_CHEST_FACTOR,
            slice_fractions: DEFAULT_SLICE_FRACTIONS.to_vec(),
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        }
    }
}

/// Builder for [`MeasurementConfig`]. Unset fields take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeasurementConfigBuilder {
    head_offset_factor: Option<f64>,
    chest_factor: Option<f64>,
    slice_fractions: Option<Vec<f64>>,
    visibility_threshold: Option<f64>,
}

impl MeasurementConfigBuilder {
    pub fn head_offset_factor(mut self, factor: f64) -> Self {
        self.head_offset_factor = Some(factor);
        self
    }

    pub fn chest_factor(mut self, factor: f64) -> Self {
        self.chest_factor = Some(factor);
        self
    }

    pub fn slice_fractions(mut self, fractions: Vec<f64>) -> Self {
        self.slice_fractions = Some(fractions);
        self
    }

    pub fn visibility_threshold(mut self, threshold: f64) -> Self {
        self.visibility_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> Result<MeasurementConfig> {
        let head_offset_factor = self
            .head_offset_factor
            .unwrap_or(DEFAULT_HEAD_OFFSET_FACTOR);
        let chest_factor = self.chest_factor.unwrap_or(DEFAULT_CHEST_FACTOR);
        let slice_fractions = self
            .slice_fractions
            .unwrap_or_else(|| DEFAULT_SLICE_FRACTIONS.to_vec());
        let visibility_threshold = self
            .visibility_threshold
            .unwrap_or(DEFAULT_VISIBILITY_THRESHOLD);

        if !(head_offset_factor.is_finite() && head_offset_factor > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "head_offset_factor must be positive, got {head_offset_factor}"
            )));
        }
        if !(chest_factor.is_finite() && chest_factor > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "chest_factor must be positive, got {chest_factor}"
            )));
        }
        if slice_fractions.is_empty() {
            return Err(Error::InvalidConfig(
                "slice_fractions must contain at least one fraction".into(),
            ));
        }
        if let Some(f) = slice_fractions.iter().find(|f| !(0.0..=1.0).contains(*f)) {
            return Err(Error::InvalidConfig(format!(
                "slice fraction {f} outside [0, 1]"
            )));
        }
        if !(0.0..=1.0).contains(&visibility_threshold) {
            return Err(Error::InvalidConfig(format!(
                "visibility_threshold {visibility_threshold} outside [0, 1]"
            )));
        }

        Ok(MeasurementConfig {
            head_offset_factor,
            chest_factor,
            slice_fractions,
            visibility_threshold,
        })
    }
}

impl TryFrom<MeasurementConfigBuilder> for MeasurementConfig {
    type Error = Error;

    fn try_from(builder: MeasurementConfigBuilder) -> Result<Self> {
        builder.build()
    }
}

/// Parameters for cropping an image to a segmented subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Padding added above and below the mask, as a fraction of its height.
    #[serde(default = "default_vertical_padding")]
    pub vertical_padding: f64,
    /// Padding added left and right of the mask, as a fraction of its width.
    #[serde(default = "default_horizontal_padding")]
    pub horizontal_padding: f64,
    /// Masks covering less than this fraction of the image are ignored.
    #[serde(default = "default_min_mask_coverage")]
    pub min_mask_coverage: f64,
    /// Gray level above which a mask pixel counts as subject.
    #[serde(default = "default_mask_threshold")]
    pub mask_threshold: u8,
}

fn default_vertical_padding() -> f64 {
    0.50
}

fn default_horizontal_padding() -> f64 {
    0.20
}

fn default_min_mask_coverage() -> f64 {
    0.10
}

fn default_mask_threshold() -> u8 {
    127
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            vertical_padding: default_vertical_padding(),
            horizontal_padding: default_horizontal_padding(),
            min_mask_coverage: default_min_mask_coverage(),
            mask_threshold: default_mask_threshold(),
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("vertical_padding", self.vertical_padding),
            ("horizontal_padding", self.horizontal_padding),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.min_mask_coverage) {
            return Err(Error::InvalidConfig(format!(
                "min_mask_coverage {} outside [0, 1]",
                self.min_mask_coverage
            )));
        }
        Ok(())
    }
}
