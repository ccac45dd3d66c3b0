//! End-to-end tests: images, pose files and masks on disk through the
//! pipeline and the batch evaluator.

use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use body_measure::evaluate::{evaluate, parse_ground_truth, summarize, Dimension};
use body_measure::{
    BodyPart, Config, CropRegion, FailureReason, MaskFileSegmenter, Pipeline, PoseFileProvider,
    MIN_POSE_LANDMARKS,
};
use image::{GrayImage, Luma, Rgb, RgbImage};
use serde_json::json;

const WIDTH: u32 = 200;
const HEIGHT: u32 = 400;

/// (BlazePose index, x, y) in normalized coordinates.
const POSE: [(usize, f64, f64); 7] = [
    (0, 0.5, 0.1),
    (11, 0.4, 0.25),
    (12, 0.6, 0.25),
    (23, 0.45, 0.5),
    (24, 0.55, 0.5),
    (27, 0.48, 0.9),
    (28, 0.52, 0.9),
];

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("body_measure_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_image(path: &Path) {
    RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([120, 120, 120]))
        .save(path)
        .unwrap();
}

fn write_pose(path: &Path, poses: usize) {
    let skeleton: Vec<_> = (0..MIN_POSE_LANDMARKS + 4)
        .map(|i| match POSE.iter().find(|(idx, _, _)| *idx == i) {
            Some(&(_, x, y)) => json!({ "x": x, "y": y, "z": 0.0, "visibility": 0.95 }),
            None => json!({ "x": 0.5, "y": 0.5, "visibility": 0.9 }),
        })
        .collect();
    let pose = json!({ "pose_landmarks": vec![skeleton; poses] });
    fs::write(path, serde_json::to_string(&pose).unwrap()).unwrap();
}

/// Sample with image `photo.png` and its pose file.
fn sample(dir: &Path) -> PathBuf {
    let image = dir.join("photo.png");
    write_image(&image);
    write_pose(&PoseFileProvider::sidecar_path(&image), 1);
    image
}

fn pipeline_for(image: &Path) -> Pipeline {
    let provider = PoseFileProvider::open(PoseFileProvider::sidecar_path(image)).unwrap();
    Pipeline::new(Box::new(provider), Config::default())
}

#[test]
fn measures_image_with_pose_file() {
    let dir = scratch_dir("pose_file");
    let image = sample(&dir);

    let output = pipeline_for(&image).measure_path(&image, 175.0).unwrap();
    let m = output.result.measurements().expect("pose is fully visible");

    // Nose (100, 40), ankles (96, 360) and (104, 360), shoulders 40 px apart.
    let nose_to_ankle = (4.0f64 * 4.0 + 320.0 * 320.0).sqrt();
    let cm_per_px = 175.0 / (nose_to_ankle * 1.04);
    assert_relative_eq!(m.nose_to_ankle_px, nose_to_ankle, max_relative = 1e-9);
    assert_relative_eq!(m.shoulder_width_cm, 40.0 * cm_per_px, max_relative = 1e-9);
    assert_relative_eq!(m.hip_width_cm, 20.0 * cm_per_px, max_relative = 1e-9);
    assert!(output.crop.is_none());

    let landmarks = output.landmarks.unwrap();
    assert_relative_eq!(landmarks.position(BodyPart::LeftShoulder).x, 80.0, epsilon = 1e-9);
    assert_relative_eq!(landmarks.position(BodyPart::LeftShoulder).y, 100.0, epsilon = 1e-9);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn mask_leaves_pose_file_widths_unchanged() {
    let dir = scratch_dir("mask_crop");
    let image = sample(&dir);

    let mask_path = dir.join("photo_mask.png");
    GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
        if (80..120).contains(&x) && (40..=360).contains(&y) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
    .save(&mask_path)
    .unwrap();

    let unmasked = pipeline_for(&image).measure_path(&image, 175.0).unwrap();

    let threshold = Config::default().segmentation.mask_threshold;
    let mut pipeline =
        pipeline_for(&image).with_segmenter(Box::new(MaskFileSegmenter::new(&mask_path, threshold)));
    let masked = pipeline.measure_path(&image, 175.0).unwrap();

    // Span 80..=119 x 40..=360, padded by int(0.2 * 39) and int(0.5 * 320).
    assert_eq!(masked.crop, Some(CropRegion::new(73, 0, 54, 400)));

    // The pose file describes the full image, crop or not.
    let shoulder = masked.landmarks.as_ref().unwrap().position(BodyPart::LeftShoulder);
    assert_relative_eq!(shoulder.x, 80.0, epsilon = 1e-9);
    assert_relative_eq!(shoulder.y, 100.0, epsilon = 1e-9);

    let with_mask = masked.result.measurements().expect("pose is fully visible");
    let without_mask = unmasked.result.measurements().unwrap();
    println!(
        "shoulder without mask {:.2} cm, with mask {:.2} cm",
        without_mask.shoulder_width_cm, with_mask.shoulder_width_cm
    );
    assert_eq!(with_mask, without_mask);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn mask_size_mismatch_is_an_error() {
    let dir = scratch_dir("mask_mismatch");
    let image = sample(&dir);

    let mask_path = dir.join("small_mask.png");
    GrayImage::from_pixel(10, 10, Luma([255])).save(&mask_path).unwrap();

    let mut pipeline =
        pipeline_for(&image).with_segmenter(Box::new(MaskFileSegmenter::new(&mask_path, 127)));
    assert!(pipeline.measure_path(&image, 175.0).is_err());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unreadable_image_is_a_failure_result() {
    let dir = scratch_dir("unreadable");
    let image = dir.join("broken.png");
    fs::write(&image, b"not an image").unwrap();
    write_pose(&PoseFileProvider::sidecar_path(&image), 1);

    let output = pipeline_for(&image).measure_path(&image, 175.0).unwrap();
    assert_eq!(output.result.failure_reason(), Some(FailureReason::ImageUnreadable));
    assert!(output.landmarks.is_none());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn empty_pose_file_means_no_subject() {
    let dir = scratch_dir("no_subject");
    let image = dir.join("empty.png");
    write_image(&image);
    write_pose(&PoseFileProvider::sidecar_path(&image), 0);

    let output = pipeline_for(&image).measure_path(&image, 175.0).unwrap();
    assert_eq!(output.result.failure_reason(), Some(FailureReason::NoSubjectDetected));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn batch_evaluation_over_directory() {
    let dir = scratch_dir("batch");
    let image = sample(&dir);
    let config = Config::default();

    // Measure once to derive a ground truth 10% wider than the prediction.
    let predicted = pipeline_for(&image)
        .measure_path(&image, 175.0)
        .unwrap()
        .result
        .into_result()
        .unwrap();
    let csv = format!(
        "filename,height_cm,shoulder_cm,waist_cm\n\
         photo.png,175,{},\n\
         missing.png,160,40,30\n",
        predicted.shoulder_width_cm * 1.1
    );
    let ground_truth = parse_ground_truth(&csv).unwrap();

    let rows = evaluate(&dir, &ground_truth, None, |path, height_cm| {
        let provider = PoseFileProvider::open(PoseFileProvider::sidecar_path(path))?;
        let mut pipeline = Pipeline::new(Box::new(provider), config.clone());
        Ok(pipeline.measure_path(path, height_cm)?.result)
    })
    .unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows[0].error.is_none());
    assert_eq!(rows[1].error.as_deref(), Some("missing_image"));

    let summary = summarize(&rows);
    println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    assert_eq!(summary.images, 2);
    assert_eq!(summary.failures, 1);

    let shoulder = &summary.errors[&Dimension::Shoulder];
    assert_eq!(shoulder.samples, 1);
    // |1.1p - p| / 1.1p
    assert_relative_eq!(shoulder.mape_pct.unwrap(), 9.09, epsilon = 1e-9);
    assert!(!summary.errors.contains_key(&Dimension::Waist));

    let _ = fs::remove_dir_all(&dir);
}
