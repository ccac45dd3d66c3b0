use serde::{Deserialize, Serialize};

/// A 2D point in image pixel coordinates (origin at top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation from `self` (t = 0) to `other` (t = 1).
    ///
    /// Returns exactly `self` when both endpoints coincide.
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        *self + (*other - *self) * t
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// A rectangular image region defined by top-left corner, width, and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner as a pixel offset.
    pub fn origin(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }

    /// Convert a point from normalized [0,1] coordinates to pixel coordinates
    /// within this region.
    pub fn denormalize_point(&self, p: Point) -> Point {
        Point::new(
            self.x as f64 + p.x * self.width as f64,
            self.y as f64 + p.y * self.height as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shoulder_offsets() {
        let left = Point::new(80.0, 100.0);
        let right = Point::new(120.0, 104.0);

        assert_eq!(right - left, Point::new(40.0, 4.0));
        assert_eq!(left + Point::new(73.0, 0.0), Point::new(153.0, 100.0));
        assert_eq!((right - left) * 0.5, Point::new(20.0, 2.0));
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert!((b.distance(&a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn point_lerp_endpoints() {
        let a = Point::new(-40.0, -50.0);
        let b = Point::new(-30.0, 40.0);

        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);

        let mid = a.lerp(&b, 0.5);
        assert!((mid.x - (-35.0)).abs() < 1e-12);
        assert!((mid.y - (-5.0)).abs() < 1e-12);
    }

    #[test]
    fn point_lerp_degenerate() {
        let a = Point::new(12.3, -45.6);
        for t in [0.3, 0.4, 0.5, 0.6, 0.7] {
            assert_eq!(a.lerp(&a, t), a);
        }
    }

    #[test]
    fn crop_region_denormalization() {
        let region = CropRegion::new(100, 50, 200, 400);

        let center = region.denormalize_point(Point::new(0.5, 0.5));
        assert_eq!(center, Point::new(200.0, 250.0));
        assert_eq!(region.origin(), Point::new(100.0, 50.0));
    }
}
