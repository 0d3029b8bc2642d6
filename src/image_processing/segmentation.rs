use anyhow::Result;
use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::detection::save_temp_image;

/// Person segmentation collaborator.
///
/// Returns a single-channel foreground mask, possibly at a different
/// resolution than the source image. Failures are non-fatal upstream: the
/// analyzer simply omits the background-replaced variant.
pub trait PersonSegmenter {
    fn segment(&self, img: &RgbImage) -> Result<GrayImage>;
}

#[derive(Debug, Deserialize)]
struct SegmentPayload {
    #[serde(default)]
    mask: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Person segmenter backed by an external script.
///
/// The script is invoked as
/// `python3 <script> --image <path> --task mask --output-format json`
/// and prints `{"mask": "<path to single-channel image>"}`. The mask file
/// is read back, converted to luma and deleted.
pub struct ScriptPersonSegmenter {
    script_path: PathBuf,
}

impl ScriptPersonSegmenter {
    pub fn new(script_path: &Path) -> Result<Self> {
        if !script_path.exists() {
            return Err(anyhow::anyhow!(
                "Detector script not found: {}",
                script_path.display()
            ));
        }

        Ok(Self {
            script_path: script_path.to_path_buf(),
        })
    }
}

impl PersonSegmenter for ScriptPersonSegmenter {
    fn segment(&self, img: &RgbImage) -> Result<GrayImage> {
        let temp_path = save_temp_image(img, "mask")?;

        let output = Command::new("python3")
            .arg(&self.script_path)
            .arg("--image")
            .arg(&temp_path)
            .arg("--task")
            .arg("mask")
            .arg("--output-format")
            .arg("json")
            .output();

        let _ = std::fs::remove_file(&temp_path);

        let output = output.map_err(|e| anyhow::anyhow!("Failed to execute segmenter: {}", e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!("Segmenter script failed: {}", stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let payload: SegmentPayload = serde_json::from_str(&stdout)
            .map_err(|e| anyhow::anyhow!("Failed to parse segmenter output: {} | Raw: {}", e, stdout))?;

        if let Some(error) = payload.error {
            return Err(anyhow::anyhow!("Segmenter reported error: {}", error));
        }

        let mask_path = payload
            .mask
            .ok_or_else(|| anyhow::anyhow!("Segmenter returned no mask path"))?;
        let mask = image::open(&mask_path)
            .map_err(|e| anyhow::anyhow!("Failed to read mask {}: {}", mask_path, e))?
            .to_luma8();
        let _ = std::fs::remove_file(&mask_path);

        Ok(mask)
    }
}

/// Composite the original image over a flat background using the
/// segmentation mask as per-pixel alpha: original pixels where the mask
/// selects foreground, background color elsewhere.
///
/// The mask may be any resolution; it is scaled by the larger of the two
/// axis factors so it fully covers the image, then centered.
pub fn replace_background(img: &RgbImage, mask: &GrayImage, background: Rgb<u8>) -> RgbImage {
    let (img_w, img_h) = img.dimensions();
    let (mask_w, mask_h) = mask.dimensions();

    if mask_w == 0 || mask_h == 0 {
        return ImageBuffer::from_pixel(img_w, img_h, background);
    }

    let scaled = if (mask_w, mask_h) == (img_w, img_h) {
        mask.clone()
    } else {
        let scale = (img_w as f64 / mask_w as f64).max(img_h as f64 / mask_h as f64);
        let scaled_w = ((mask_w as f64 * scale).round() as u32).max(img_w);
        let scaled_h = ((mask_h as f64 * scale).round() as u32).max(img_h);
        image::imageops::resize(
            mask,
            scaled_w,
            scaled_h,
            image::imageops::FilterType::Triangle,
        )
    };

    // The scaled mask covers the image on both axes; center the overflow
    let (scaled_w, scaled_h) = scaled.dimensions();
    let offset_x = (scaled_w - img_w) / 2;
    let offset_y = (scaled_h - img_h) / 2;

    let mut output = ImageBuffer::new(img_w, img_h);
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let alpha = scaled.get_pixel(x + offset_x, y + offset_y)[0] as u16;
        let src = img.get_pixel(x, y);
        let mut blended = [0u8; 3];
        for c in 0..3 {
            let fg = src[c] as u16;
            let bg = background[c] as u16;
            blended[c] = ((fg * alpha + bg * (255 - alpha)) / 255) as u8;
        }
        *pixel = Rgb(blended);
    }

    output
}
