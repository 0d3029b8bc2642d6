use anyhow::Result;
use fast_image_resize::{images::Image, ResizeOptions, Resizer};
use image::{ImageBuffer, Rgb, RgbImage};
use std::num::NonZeroU32;

/// How a capture is mapped onto the fixed output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizePolicy {
    /// Scale to cover the target box, center-cropping the overflow.
    #[default]
    Fill,
    /// Scale to fit inside the target box, letterboxing on a flat
    /// background color.
    Fit,
}

/// Normalize a capture to exact target dimensions.
///
/// Deterministic for identical pixel data; the output buffer dimensions
/// always equal `target_width` x `target_height` regardless of the source
/// aspect ratio. Orientation must already be upright (see
/// `orientation::load_upright`).
pub fn normalize(
    img: &RgbImage,
    target_width: u32,
    target_height: u32,
    policy: ResizePolicy,
    background: Rgb<u8>,
) -> Result<RgbImage> {
    if target_width == 0 || target_height == 0 {
        return Err(anyhow::anyhow!(
            "Target dimensions must be non-zero, got {}x{}",
            target_width,
            target_height
        ));
    }

    match policy {
        ResizePolicy::Fill => normalize_fill(img, target_width, target_height),
        ResizePolicy::Fit => normalize_fit(img, target_width, target_height, background),
    }
}

/// Crop-to-fill: crop the source to the target aspect ratio, then scale.
fn normalize_fill(img: &RgbImage, target_width: u32, target_height: u32) -> Result<RgbImage> {
    let (src_width, src_height) = img.dimensions();

    let target_aspect = target_width as f64 / target_height as f64;
    let source_aspect = src_width as f64 / src_height as f64;

    let (crop_width, crop_height) = if source_aspect > target_aspect {
        // Source is wider - crop width
        let new_width = (src_height as f64 * target_aspect) as u32;
        (new_width.min(src_width).max(1), src_height)
    } else {
        // Source is taller - crop height
        let new_height = (src_width as f64 / target_aspect) as u32;
        (src_width, new_height.min(src_height).max(1))
    };

    let crop_x = (src_width.saturating_sub(crop_width)) / 2;
    let crop_y = (src_height.saturating_sub(crop_height)) / 2;

    let cropped = crop_region(img, crop_x, crop_y, crop_width, crop_height)?;
    scale_exact(&cropped, target_width, target_height)
}

/// Fit-with-letterbox: scale the source to fit inside the target, centered
/// on a flat background.
fn normalize_fit(
    img: &RgbImage,
    target_width: u32,
    target_height: u32,
    background: Rgb<u8>,
) -> Result<RgbImage> {
    let (src_width, src_height) = img.dimensions();

    let scale = (target_width as f64 / src_width as f64)
        .min(target_height as f64 / src_height as f64);
    let scaled_width = ((src_width as f64 * scale).round() as u32)
        .clamp(1, target_width);
    let scaled_height = ((src_height as f64 * scale).round() as u32)
        .clamp(1, target_height);

    let scaled = scale_exact(img, scaled_width, scaled_height)?;

    let mut canvas = ImageBuffer::from_pixel(target_width, target_height, background);
    let offset_x = (target_width - scaled_width) / 2;
    let offset_y = (target_height - scaled_height) / 2;
    image::imageops::replace(&mut canvas, &scaled, offset_x as i64, offset_y as i64);

    Ok(canvas)
}

/// Crop an image to the specified region
pub fn crop_region(
    img: &RgbImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let (img_width, img_height) = img.dimensions();

    if x + width > img_width || y + height > img_height {
        return Err(anyhow::anyhow!(
            "Crop dimensions exceed image bounds: crop({},{},{}x{}) on {}x{} image",
            x,
            y,
            width,
            height,
            img_width,
            img_height
        ));
    }

    Ok(image::imageops::crop_imm(img, x, y, width, height).to_image())
}

/// Resize an image to exact dimensions using a high-quality scaler
pub fn scale_exact(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let (src_width, src_height) = img.dimensions();

    if src_width == width && src_height == height {
        return Ok(img.clone());
    }

    let src_pixels: Vec<u8> = img.pixels().flat_map(|p| [p[0], p[1], p[2]]).collect();

    let src_width_nz =
        NonZeroU32::new(src_width).ok_or_else(|| anyhow::anyhow!("Source width is zero"))?;
    let src_height_nz =
        NonZeroU32::new(src_height).ok_or_else(|| anyhow::anyhow!("Source height is zero"))?;
    let dst_width_nz =
        NonZeroU32::new(width).ok_or_else(|| anyhow::anyhow!("Target width is zero"))?;
    let dst_height_nz =
        NonZeroU32::new(height).ok_or_else(|| anyhow::anyhow!("Target height is zero"))?;

    let src_image = Image::from_vec_u8(
        src_width_nz.into(),
        src_height_nz.into(),
        src_pixels,
        fast_image_resize::PixelType::U8x3,
    )?;

    let mut dst_image = Image::new(
        dst_width_nz.into(),
        dst_height_nz.into(),
        fast_image_resize::PixelType::U8x3,
    );

    let mut resizer = Resizer::new();
    resizer.resize(&src_image, &mut dst_image, Some(&ResizeOptions::default()))?;

    let dst_pixels = dst_image.buffer();
    let mut output = ImageBuffer::new(width, height);

    for (i, pixel) in output.pixels_mut().enumerate() {
        let base_idx = i * 3;
        if base_idx + 2 < dst_pixels.len() {
            *pixel = Rgb([
                dst_pixels[base_idx],
                dst_pixels[base_idx + 1],
                dst_pixels[base_idx + 2],
            ]);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_image(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_crop_region() {
        let img = create_test_image(100, 100);
        let cropped = crop_region(&img, 10, 10, 50, 50).unwrap();

        assert_eq!(cropped.dimensions(), (50, 50));

        let original_pixel = img.get_pixel(15, 15);
        let cropped_pixel = cropped.get_pixel(5, 5);
        assert_eq!(original_pixel, cropped_pixel);
    }

    #[test]
    fn test_crop_bounds_validation() {
        let img = create_test_image(50, 50);

        let result = crop_region(&img, 10, 10, 50, 50);
        assert!(result.is_err());

        let result = crop_region(&img, 10, 10, 40, 40);
        assert!(result.is_ok());
    }

    #[test]
    fn test_scale_exact() {
        let img = create_test_image(100, 100);
        let resized = scale_exact(&img, 50, 50).unwrap();

        assert_eq!(resized.dimensions(), (50, 50));
    }

    #[test]
    fn test_fill_output_dimensions_for_any_aspect() {
        for (w, h) in [(1200, 1600), (1600, 1200), (640, 480), (333, 777)] {
            let img = create_test_image(w, h);
            let result = normalize(&img, 640, 480, ResizePolicy::Fill, Rgb([255, 255, 255]))
                .unwrap();
            assert_eq!(result.dimensions(), (640, 480));
        }
    }

    #[test]
    fn test_fit_output_dimensions_for_any_aspect() {
        for (w, h) in [(1200, 1600), (1600, 1200), (640, 480), (333, 777)] {
            let img = create_test_image(w, h);
            let result =
                normalize(&img, 640, 480, ResizePolicy::Fit, Rgb([255, 255, 255])).unwrap();
            assert_eq!(result.dimensions(), (640, 480));
        }
    }

    #[test]
    fn test_fit_letterboxes_portrait_on_background() {
        // Portrait source into landscape target leaves columns of background
        let img = ImageBuffer::from_pixel(100, 200, Rgb([10u8, 20, 30]));
        let result = normalize(&img, 640, 480, ResizePolicy::Fit, Rgb([240, 240, 240])).unwrap();

        // Scaled content is 240x480, centered at x = 200..440
        assert_eq!(*result.get_pixel(0, 240), Rgb([240, 240, 240]));
        assert_eq!(*result.get_pixel(639, 240), Rgb([240, 240, 240]));
        assert_eq!(*result.get_pixel(320, 240), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_fill_crops_instead_of_letterboxing() {
        // Flat color source stays flat after fill: no background pixels leak in
        let img = ImageBuffer::from_pixel(100, 200, Rgb([10u8, 20, 30]));
        let result = normalize(&img, 640, 480, ResizePolicy::Fill, Rgb([255, 255, 255])).unwrap();

        assert_eq!(*result.get_pixel(0, 0), Rgb([10, 20, 30]));
        assert_eq!(*result.get_pixel(639, 479), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_normalize_idempotent_at_target_size() {
        let img = create_test_image(640, 480);
        let once = normalize(&img, 640, 480, ResizePolicy::Fill, Rgb([255, 255, 255])).unwrap();
        let twice = normalize(&once, 640, 480, ResizePolicy::Fill, Rgb([255, 255, 255])).unwrap();

        // Already at target size: both paths are exact copies
        assert_eq!(once, img);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_normalize_rejects_zero_target() {
        let img = create_test_image(10, 10);
        assert!(normalize(&img, 0, 480, ResizePolicy::Fill, Rgb([0, 0, 0])).is_err());
    }
}
