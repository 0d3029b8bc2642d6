use anyhow::{Context, Result};
use exif::{In, Reader, Tag, Value};
use image::{imageops, RgbImage};
use std::path::Path;

/// EXIF orientation values as written by phone cameras
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExifOrientation {
    /// No orientation specified or undefined
    Undefined = 0,
    /// Normal orientation (0 degrees)
    TopLeft = 1,
    /// Horizontally flipped
    TopRight = 2,
    /// Rotated 180 degrees
    BottomRight = 3,
    /// Vertically flipped
    BottomLeft = 4,
    /// Rotated 90 degrees CCW + horizontally flipped
    LeftTop = 5,
    /// Rotated 90 degrees CW (portrait)
    RightTop = 6,
    /// Rotated 90 degrees CW + horizontally flipped
    RightBottom = 7,
    /// Rotated 90 degrees CCW (portrait)
    LeftBottom = 8,
}

impl From<u32> for ExifOrientation {
    fn from(value: u32) -> Self {
        match value {
            1 => ExifOrientation::TopLeft,
            2 => ExifOrientation::TopRight,
            3 => ExifOrientation::BottomRight,
            4 => ExifOrientation::BottomLeft,
            5 => ExifOrientation::LeftTop,
            6 => ExifOrientation::RightTop,
            7 => ExifOrientation::RightBottom,
            8 => ExifOrientation::LeftBottom,
            _ => ExifOrientation::Undefined,
        }
    }
}

/// Read EXIF orientation tag from an image file
pub fn read_exif_orientation(image_path: &Path) -> Result<ExifOrientation> {
    let file = std::fs::File::open(image_path).with_context(|| {
        format!(
            "Failed to open image for EXIF reading: {}",
            image_path.display()
        )
    })?;

    let mut buf_reader = std::io::BufReader::new(file);
    let exif_reader = Reader::new();

    let exif = exif_reader
        .read_from_container(&mut buf_reader)
        .context("Failed to read EXIF data")?;

    if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
        if let Value::Short(values) = &field.value {
            if let Some(&orientation_value) = values.first() {
                return Ok(ExifOrientation::from(orientation_value as u32));
            }
        }
    }

    Ok(ExifOrientation::Undefined)
}

/// Apply EXIF rotation to an image, producing upright pixel data.
///
/// Downstream analysis and compositing assume unrotated buffers, so this
/// runs before anything else touches the capture.
pub fn apply_rotation(img: &RgbImage, orientation: ExifOrientation) -> RgbImage {
    match orientation {
        ExifOrientation::Undefined | ExifOrientation::TopLeft => img.clone(),
        ExifOrientation::TopRight => imageops::flip_horizontal(img),
        ExifOrientation::BottomRight => imageops::rotate180(img),
        ExifOrientation::BottomLeft => imageops::flip_vertical(img),
        ExifOrientation::LeftTop => {
            let rotated = imageops::rotate270(img);
            imageops::flip_horizontal(&rotated)
        }
        ExifOrientation::RightTop => imageops::rotate90(img),
        ExifOrientation::RightBottom => {
            let rotated = imageops::rotate90(img);
            imageops::flip_horizontal(&rotated)
        }
        ExifOrientation::LeftBottom => imageops::rotate270(img),
    }
}

/// Load a captured image and normalize it to upright orientation.
///
/// Missing or unreadable EXIF data is treated as `Undefined` (no rotation);
/// an undecodable image is a hard error for the caller to handle.
pub fn load_upright(image_path: &Path) -> Result<RgbImage> {
    let img = image::open(image_path)
        .with_context(|| format!("Failed to decode capture: {}", image_path.display()))?;
    let rgb_img = img.to_rgb8();

    let orientation = read_exif_orientation(image_path).unwrap_or(ExifOrientation::Undefined);
    Ok(apply_rotation(&rgb_img, orientation))
}
