//! Cropping an image to a segmented subject before landmark detection.

use image::{DynamicImage, GrayImage};
use log::{debug, warn};

use crate::config::SegmentationConfig;
use crate::error::{Error, Result};
use crate::types::CropRegion;

/// Per-pixel subject mask, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectMask {
    data: Vec<bool>,
    width: u32,
    height: u32,
}

impl SubjectMask {
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> bool,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { data, width, height }
    }

    /// Pixels brighter than `threshold` are subject.
    pub fn from_luma(image: &GrayImage, threshold: u8) -> Self {
        let (width, height) = image.dimensions();
        let data = image.pixels().map(|p| p.0[0] > threshold).collect();
        Self { data, width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Fraction of pixels marked as subject.
    pub fn coverage(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let count = self.data.iter().filter(|&&v| v).count();
        count as f64 / self.data.len() as f64
    }

    /// Tight bounds of the subject pixels, inclusive on both ends:
    /// `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.get(x, y) {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds
    }
}

/// Padded crop around the subject, or `None` if the mask is empty or too
/// small to trust.
pub fn subject_crop(mask: &SubjectMask, config: &SegmentationConfig) -> Option<CropRegion> {
    let coverage = mask.coverage();
    if coverage < config.min_mask_coverage {
        warn!(
            "Mask too small ({:.1}% of image), using full image",
            coverage * 100.0
        );
        return None;
    }

    let Some((min_x, min_y, max_x, max_y)) = mask.bounds() else {
        warn!("Segmentation produced an empty mask, using full image");
        return None;
    };

    // Generous vertical padding so head and feet survive the crop.
    let pad_y = (config.vertical_padding * (max_y - min_y) as f64) as u32;
    let pad_x = (config.horizontal_padding * (max_x - min_x) as f64) as u32;

    let x0 = min_x.saturating_sub(pad_x);
    let y0 = min_y.saturating_sub(pad_y);
    let x1 = max_x.saturating_add(pad_x).saturating_add(1).min(mask.width());
    let y1 = max_y.saturating_add(pad_y).saturating_add(1).min(mask.height());

    let region = CropRegion::new(x0, y0, x1 - x0, y1 - y0);
    debug!(
        "Subject crop {}x{} at ({}, {}) from {}x{} mask",
        region.width,
        region.height,
        region.x,
        region.y,
        mask.width(),
        mask.height()
    );
    Some(region)
}

/// Crop `image` to the padded subject region. Returns the cropped image and
/// the region used, or `None` when the mask is unusable.
pub fn crop_to_subject(
    image: &DynamicImage,
    mask: &SubjectMask,
    config: &SegmentationConfig,
) -> Result<Option<(DynamicImage, CropRegion)>> {
    if mask.width() != image.width() || mask.height() != image.height() {
        return Err(Error::Provider(format!(
            "mask is {}x{} but image is {}x{}",
            mask.width(),
            mask.height(),
            image.width(),
            image.height()
        )));
    }

    Ok(subject_crop(mask, config).map(|region| {
        let cropped = image.crop_imm(region.x, region.y, region.width, region.height);
        (cropped, region)
    }))
}
