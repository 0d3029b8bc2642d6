use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;

use super::detection::{FaceBox, FaceDetector};
use super::segmentation::{replace_background, PersonSegmenter};

/// Face must occupy at least this fraction of the image
const MIN_FACE_AREA: f32 = 0.10;
/// But not more than this (too close to the camera)
const MAX_FACE_AREA: f32 = 0.80;
/// Maximum distance of the face center from the image center, per axis
const MAX_CENTER_OFFSET: f32 = 0.3;

/// Headshot framing: widen the face rect to include shoulders and neck
const CROP_WIDTH_FACTOR: f32 = 1.8;
const CROP_HEIGHT_FACTOR: f32 = 2.2;
/// Vertical bias placing the face in the upper portion of the crop
const CROP_VERTICAL_BIAS: f32 = 0.4;

/// Immutable result of one headshot analysis.
///
/// A retake produces a fresh verdict; nothing here is ever mutated in
/// place. The derived image variants are excluded from serialization.
#[derive(Debug, Clone, Serialize)]
pub struct HeadshotVerdict {
    pub is_valid: bool,
    pub face_count: usize,
    pub face_area_fraction: f32,
    pub face_box: Option<FaceBox>,
    #[serde(skip)]
    pub cropped: Option<RgbImage>,
    #[serde(skip)]
    pub background_replaced: Option<RgbImage>,
    pub message: String,
}

impl HeadshotVerdict {
    fn invalid(face_count: usize, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            face_count,
            face_area_fraction: 0.0,
            face_box: None,
            cropped: None,
            background_replaced: None,
            message: message.into(),
        }
    }
}

/// Analyze a capture and decide whether it qualifies as a headshot.
///
/// Face detection and person segmentation are both read-only over the same
/// immutable image, so they run concurrently; their results are merged at
/// the end. Detector failures degrade to an invalid verdict and segmenter
/// failures simply leave `background_replaced` empty; neither propagates
/// as an error.
pub fn analyze<D, S>(
    img: &RgbImage,
    detector: &D,
    segmenter: Option<&S>,
    background: Rgb<u8>,
) -> HeadshotVerdict
where
    D: FaceDetector + Sync,
    S: PersonSegmenter + Sync,
{
    let (faces, mask) = rayon::join(
        || detector.detect_faces(img),
        || segmenter.map(|s| s.segment(img)),
    );

    let background_replaced = match mask {
        Some(Ok(mask)) => Some(replace_background(img, &mask, background)),
        _ => None,
    };

    let mut verdict = match faces {
        Ok(faces) => evaluate_faces(img, &faces),
        Err(e) => HeadshotVerdict::invalid(0, format!("Face detection failed: {}", e)),
    };
    verdict.background_replaced = background_replaced;
    verdict
}

/// Apply the headshot criteria to the detected faces
fn evaluate_faces(img: &RgbImage, faces: &[FaceBox]) -> HeadshotVerdict {
    let face_count = faces.len();

    if face_count != 1 {
        let message = if face_count == 0 {
            "No face detected".to_string()
        } else {
            format!("Multiple faces detected ({})", face_count)
        };
        return HeadshotVerdict::invalid(face_count, message);
    }

    let face = faces[0];
    let face_area_fraction = face.area_fraction();

    let is_valid_size = (MIN_FACE_AREA..=MAX_FACE_AREA).contains(&face_area_fraction);

    let (center_x, center_y) = face.center();
    let is_reasonably_centered = (center_x - 0.5).abs() < MAX_CENTER_OFFSET
        && (center_y - 0.5).abs() < MAX_CENTER_OFFSET;

    let is_valid = is_valid_size && is_reasonably_centered;

    let cropped = if is_valid {
        Some(crop_to_headshot(img, &face))
    } else {
        None
    };

    let message = if is_valid {
        "Perfect headshot".to_string()
    } else if !is_valid_size {
        if face_area_fraction < MIN_FACE_AREA {
            "Face too small - move a bit closer".to_string()
        } else {
            "Face too large - move back".to_string()
        }
    } else {
        "Center face in frame".to_string()
    };

    HeadshotVerdict {
        is_valid,
        face_count,
        face_area_fraction,
        face_box: Some(face),
        cropped,
        background_replaced: None,
        message,
    }
}

/// Crop the image around the face with typical headshot framing.
///
/// The face rect is expanded to include the shoulders and neck, biased so
/// the face sits in the upper portion, and clamped to the image bounds.
pub fn crop_to_headshot(img: &RgbImage, face: &FaceBox) -> RgbImage {
    let (img_w, img_h) = img.dimensions();
    let (fx, fy, fw, fh) = face.to_pixel_rect(img_w, img_h);

    let expanded_w = fw * CROP_WIDTH_FACTOR;
    let expanded_h = fh * CROP_HEIGHT_FACTOR;

    let face_mid_x = fx + fw / 2.0;
    let face_mid_y = fy + fh / 2.0;

    let expanded_x = face_mid_x - expanded_w / 2.0;
    let expanded_y = face_mid_y - expanded_h * CROP_VERTICAL_BIAS;

    let x = expanded_x.max(0.0) as u32;
    let y = expanded_y.max(0.0) as u32;
    let w = (expanded_w.min(img_w as f32 - x as f32).max(1.0)) as u32;
    let h = (expanded_h.min(img_h as f32 - y as f32).max(1.0)) as u32;

    image::imageops::crop_imm(img, x, y, w.max(1), h.max(1)).to_image()
}

/// Draw the detected face box onto a copy of the image for debug output
pub fn draw_face_box(img: &RgbImage, face: &FaceBox) -> RgbImage {
    let mut annotated = img.clone();
    let (img_w, img_h) = annotated.dimensions();
    let (fx, fy, fw, fh) = face.to_pixel_rect(img_w, img_h);

    let rect = Rect::at(fx.max(0.0) as i32, fy.max(0.0) as i32)
        .of_size((fw.max(1.0)) as u32, (fh.max(1.0)) as u32);
    draw_hollow_rect_mut(&mut annotated, rect, Rgb([0, 255, 0]));
    annotated
}

/// Build a mask-aware variant directly, used when validation is disabled
/// but background removal is requested.
pub fn background_replaced_only<S: PersonSegmenter>(
    img: &RgbImage,
    segmenter: &S,
    background: Rgb<u8>,
) -> Option<RgbImage> {
    match segmenter.segment(img) {
        Ok(mask) => Some(replace_background(img, &mask, background)),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use image::{GrayImage, ImageBuffer, Luma};

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    struct FixedDetector(Vec<FaceBox>);

    impl FaceDetector for FixedDetector {
        fn detect_faces(&self, _img: &RgbImage) -> Result<Vec<FaceBox>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect_faces(&self, _img: &RgbImage) -> Result<Vec<FaceBox>> {
            Err(anyhow::anyhow!("model unavailable"))
        }
    }

    struct FixedSegmenter(GrayImage);

    impl PersonSegmenter for FixedSegmenter {
        fn segment(&self, _img: &RgbImage) -> Result<GrayImage> {
            Ok(self.0.clone())
        }
    }

    struct FailingSegmenter;

    impl PersonSegmenter for FailingSegmenter {
        fn segment(&self, _img: &RgbImage) -> Result<GrayImage> {
            Err(anyhow::anyhow!("segmentation unavailable"))
        }
    }

    fn test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    fn centered_face(width: f32, height: f32) -> FaceBox {
        FaceBox {
            x: 0.5 - width / 2.0,
            y: 0.5 - height / 2.0,
            width,
            height,
            confidence: 0.95,
        }
    }

    #[test]
    fn valid_centered_face_passes() {
        let img = test_image(1200, 1600);
        let detector = FixedDetector(vec![centered_face(0.35, 0.35)]);

        let verdict = analyze(&img, &detector, None::<&FailingSegmenter>, WHITE);
        assert!(verdict.is_valid);
        assert_eq!(verdict.face_count, 1);
        assert!((verdict.face_area_fraction - 0.1225).abs() < 1e-6);
        assert_eq!(verdict.message, "Perfect headshot");
        assert!(verdict.cropped.is_some());
    }

    #[test]
    fn face_below_min_area_is_too_small() {
        // 0.3 x 0.3 box centered at (0.5, 0.45): fraction 0.09, centered
        let img = test_image(1200, 1600);
        let face = FaceBox {
            x: 0.5 - 0.15,
            y: 0.45 - 0.15,
            width: 0.3,
            height: 0.3,
            confidence: 0.9,
        };
        let detector = FixedDetector(vec![face]);

        let verdict = analyze(&img, &detector, None::<&FailingSegmenter>, WHITE);
        assert!(!verdict.is_valid);
        assert!((verdict.face_area_fraction - 0.09).abs() < 1e-6);
        assert_eq!(verdict.message, "Face too small - move a bit closer");
        assert!(verdict.cropped.is_none());
    }

    #[test]
    fn face_above_max_area_is_too_large() {
        let img = test_image(640, 480);
        let detector = FixedDetector(vec![centered_face(0.95, 0.9)]);

        let verdict = analyze(&img, &detector, None::<&FailingSegmenter>, WHITE);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.message, "Face too large - move back");
    }

    #[test]
    fn off_center_face_with_valid_size_asks_for_centering() {
        let img = test_image(640, 480);
        let face = FaceBox {
            x: 0.0,
            y: 0.0,
            width: 0.4,
            height: 0.4,
            confidence: 0.9,
        };
        let detector = FixedDetector(vec![face]);

        let verdict = analyze(&img, &detector, None::<&FailingSegmenter>, WHITE);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.message, "Center face in frame");
    }

    #[test]
    fn zero_faces_is_invalid() {
        let img = test_image(640, 480);
        let detector = FixedDetector(vec![]);

        let verdict = analyze(&img, &detector, None::<&FailingSegmenter>, WHITE);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.face_count, 0);
        assert_eq!(verdict.message, "No face detected");
    }

    #[test]
    fn multiple_faces_are_invalid_with_count() {
        let img = test_image(640, 480);
        let detector = FixedDetector(vec![centered_face(0.2, 0.2), centered_face(0.3, 0.3)]);

        let verdict = analyze(&img, &detector, None::<&FailingSegmenter>, WHITE);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.face_count, 2);
        assert_eq!(verdict.message, "Multiple faces detected (2)");
    }

    #[test]
    fn detector_failure_degrades_to_invalid_verdict() {
        let img = test_image(640, 480);

        let verdict = analyze(&img, &FailingDetector, None::<&FailingSegmenter>, WHITE);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.face_count, 0);
        assert!(verdict.message.starts_with("Face detection failed"));
    }

    #[test]
    fn segmenter_failure_leaves_verdict_untouched() {
        let img = test_image(640, 480);
        let detector = FixedDetector(vec![centered_face(0.35, 0.35)]);

        let verdict = analyze(&img, &detector, Some(&FailingSegmenter), WHITE);
        assert!(verdict.is_valid);
        assert!(verdict.background_replaced.is_none());
    }

    #[test]
    fn segmenter_success_attaches_variant() {
        let img = test_image(64, 48);
        let detector = FixedDetector(vec![centered_face(0.35, 0.35)]);
        let mask = ImageBuffer::from_pixel(64, 48, Luma([255u8]));
        let segmenter = FixedSegmenter(mask);

        let verdict = analyze(&img, &detector, Some(&segmenter), WHITE);
        let variant = verdict.background_replaced.expect("variant present");
        assert_eq!(variant.dimensions(), (64, 48));
    }

    #[test]
    fn background_variant_present_even_without_face() {
        let img = test_image(64, 48);
        let detector = FixedDetector(vec![]);
        let segmenter = FixedSegmenter(ImageBuffer::from_pixel(64, 48, Luma([255u8])));

        let verdict = analyze(&img, &detector, Some(&segmenter), WHITE);
        assert!(!verdict.is_valid);
        assert!(verdict.background_replaced.is_some());
    }

    #[test]
    fn crop_stays_within_bounds_for_edge_face() {
        let img = test_image(400, 400);
        // Face pushed into the top-left corner of pixel space
        let face = FaceBox {
            x: 0.0,
            y: 0.7,
            width: 0.3,
            height: 0.3,
            confidence: 0.9,
        };

        let cropped = crop_to_headshot(&img, &face);
        let (w, h) = cropped.dimensions();
        assert!(w <= 400 && h <= 400);
        assert!(w > 0 && h > 0);
    }

    #[test]
    fn crop_expands_face_rect() {
        let img = test_image(1000, 1000);
        let face = centered_face(0.2, 0.2);

        let cropped = crop_to_headshot(&img, &face);
        let (w, h) = cropped.dimensions();
        // 200px face expands to 360x440
        assert_eq!(w, 360);
        assert_eq!(h, 440);
    }

    #[test]
    fn draw_face_box_keeps_dimensions() {
        let img = test_image(320, 240);
        let annotated = draw_face_box(&img, &centered_face(0.4, 0.4));
        assert_eq!(annotated.dimensions(), (320, 240));
    }
}
