//! Overlay of landmarks and torso slices on the source image.

use image::{DynamicImage, Rgba, RgbaImage};

use crate::landmarks::{BodyPart, LandmarkSet};
use crate::measure::torso_slice;
use crate::types::Point;

const LANDMARK_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const SKELETON_COLOR: Rgba<u8> = Rgba([0, 255, 255, 255]);
const SLICE_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

const SKELETON: [(BodyPart, BodyPart); 6] = [
    (BodyPart::LeftShoulder, BodyPart::RightShoulder),
    (BodyPart::LeftHip, BodyPart::RightHip),
    (BodyPart::LeftShoulder, BodyPart::LeftHip),
    (BodyPart::RightShoulder, BodyPart::RightHip),
    (BodyPart::LeftHip, BodyPart::LeftAnkle),
    (BodyPart::RightHip, BodyPart::RightAnkle),
];

/// Draw the measurement landmarks, the torso outline and each torso slice.
///
/// Anything outside the image is clipped, however far out it lies.
pub fn annotate(image: &DynamicImage, landmarks: &LandmarkSet, slice_fractions: &[f64]) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    let radius = f64::from((rgba.width().max(rgba.height()) / 200).max(2));

    for (a, b) in SKELETON {
        draw_segment(&mut rgba, landmarks.position(a), landmarks.position(b), SKELETON_COLOR);
    }

    for &f in slice_fractions {
        let (left, right) = torso_slice(landmarks, f);
        draw_segment(&mut rgba, left, right, SLICE_COLOR);
    }

    for (_, lm) in landmarks.iter() {
        draw_disc(&mut rgba, lm.position, radius, LANDMARK_COLOR);
    }

    rgba
}

/// Plot `p` rounded to the nearest pixel, if it falls inside the image.
fn plot(img: &mut RgbaImage, p: Point, color: Rgba<u8>) {
    let (x, y) = (p.x.round(), p.y.round());
    if x >= 0.0 && y >= 0.0 && x < f64::from(img.width()) && y < f64::from(img.height()) {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_disc(img: &mut RgbaImage, center: Point, radius: f64, color: Rgba<u8>) {
    let center = Point::new(center.x.round(), center.y.round());
    let max_x = f64::from(img.width()) - 1.0;
    let max_y = f64::from(img.height()) - 1.0;

    // Pixel box around the disc, clamped before any integer conversion.
    let x0 = (center.x - radius).max(0.0);
    let x1 = (center.x + radius).min(max_x);
    let y0 = (center.y - radius).max(0.0);
    let y1 = (center.y + radius).min(max_y);
    if !(x0 <= x1 && y0 <= y1) {
        return;
    }

    for y in y0 as u32..=y1 as u32 {
        for x in x0 as u32..=x1 as u32 {
            let p = Point::new(f64::from(x), f64::from(y));
            if p.distance(&center) <= radius {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Draw the part of segment `a`-`b` that lies inside the image.
fn draw_segment(img: &mut RgbaImage, a: Point, b: Point, color: Rgba<u8>) {
    let max = Point::new(f64::from(img.width()) - 1.0, f64::from(img.height()) - 1.0);
    let Some((a, b)) = clip_segment(a, b, max) else {
        return;
    };

    // At most one pixel per step; the clipped length bounds the step count.
    let d = b - a;
    let steps = d.x.abs().max(d.y.abs()).ceil().max(1.0);
    for i in 0..=steps as u32 {
        plot(img, a.lerp(&b, f64::from(i) / steps), color);
    }
}

/// Liang-Barsky clip of segment `a`-`b` to the rectangle `[0, max.x] x [0, max.y]`.
fn clip_segment(a: Point, b: Point, max: Point) -> Option<(Point, Point)> {
    let d = b - a;
    if !(a.x.is_finite() && a.y.is_finite() && d.x.is_finite() && d.y.is_finite()) {
        return None;
    }

    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [(-d.x, a.x), (d.x, max.x - a.x), (-d.y, a.y), (d.y, max.y - a.y)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    Some((a.lerp(&b, t0), a.lerp(&b, t1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;
    use image::RgbImage;

    fn figure() -> LandmarkSet {
        LandmarkSet::from_fn(|part| {
            let p = match part {
                BodyPart::Nose => Point::new(50.0, 10.0),
                BodyPart::LeftShoulder => Point::new(30.0, 30.0),
                BodyPart::RightShoulder => Point::new(70.0, 30.0),
                BodyPart::LeftHip => Point::new(34.0, 60.0),
                BodyPart::RightHip => Point::new(66.0, 60.0),
                BodyPart::LeftAnkle => Point::new(40.0, 95.0),
                BodyPart::RightAnkle => Point::new(60.0, 95.0),
            };
            Landmark::new(p, 1.0)
        })
    }

    #[test]
    fn draws_landmarks_and_slices() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(100, 100));
        let out = annotate(&image, &figure(), &[0.5]);

        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(*out.get_pixel(50, 10), LANDMARK_COLOR);
        // Midpoint of the 0.5 slice: between (32, 45) and (68, 45).
        assert_eq!(*out.get_pixel(50, 45), SLICE_COLOR);
        // Shoulder line.
        assert_eq!(*out.get_pixel(50, 30), SKELETON_COLOR);
        // Background untouched.
        assert_eq!(*out.get_pixel(5, 5), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn offscreen_points_are_clipped() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let set = LandmarkSet::from_fn(|_| Landmark::new(Point::new(-500.0, 900.0), 1.0));
        let out = annotate(&image, &set, &[0.3, 0.7]);
        assert!(out.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn distant_landmarks_are_clipped() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let set = LandmarkSet::from_fn(|part| {
            let p = match part {
                BodyPart::LeftShoulder => Point::new(-1e12, 5.0),
                BodyPart::RightShoulder => Point::new(1e12, 5.0),
                _ => Point::new(-1e12, -1e12),
            };
            Landmark::new(p, 1.0)
        });

        let out = annotate(&image, &set, &[]);
        // Only the shoulder line crosses the frame.
        for x in 0..10 {
            assert_eq!(*out.get_pixel(x, 5), SKELETON_COLOR);
        }
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(9, 9), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn clip_segment_keeps_inside_part() {
        let max = Point::new(9.0, 9.0);
        let (a, b) = clip_segment(Point::new(-5.0, 2.0), Point::new(15.0, 2.0), max).unwrap();
        assert!(a.distance(&Point::new(0.0, 2.0)) < 1e-9);
        assert!(b.distance(&Point::new(9.0, 2.0)) < 1e-9);

        assert!(clip_segment(Point::new(-5.0, -1.0), Point::new(15.0, -1.0), max).is_none());
        assert!(clip_segment(Point::new(f64::MAX, 0.0), Point::new(-f64::MAX, 0.0), max).is_none());
        assert!(clip_segment(Point::new(f64::NAN, 0.0), Point::new(1.0, 1.0), max).is_none());
    }
}
