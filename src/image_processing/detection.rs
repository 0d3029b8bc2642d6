use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// A detected face in normalized image coordinates.
///
/// Coordinates follow the detector convention: all values in 0..1 with the
/// origin at the bottom-left (y-flipped relative to pixel rows), so the
/// whole image has area 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub confidence: f32,
}

impl FaceBox {
    /// Fraction of the image area covered by this face (image area = 1.0)
    pub fn area_fraction(&self) -> f32 {
        self.width * self.height
    }

    /// Box center in normalized coordinates
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Convert to a pixel-space rectangle (x, y, width, height) with the
    /// origin at the top-left, un-flipping the y axis.
    pub fn to_pixel_rect(&self, img_width: u32, img_height: u32) -> (f32, f32, f32, f32) {
        let w = img_width as f32;
        let h = img_height as f32;
        (
            self.x * w,
            (1.0 - (self.y + self.height)) * h,
            self.width * w,
            self.height * h,
        )
    }
}

/// Face detection collaborator.
///
/// Failures surface as `Err`; the analyzer degrades them to an invalid
/// verdict rather than propagating.
pub trait FaceDetector {
    fn detect_faces(&self, img: &RgbImage) -> Result<Vec<FaceBox>>;
}

/// JSON payload emitted by the external detector script in `faces` mode
#[derive(Debug, Deserialize)]
struct DetectFacesPayload {
    #[serde(default)]
    faces: Vec<FaceBox>,
    #[serde(default)]
    error: Option<String>,
}

/// Face detector backed by an external script.
///
/// The script is invoked as
/// `python3 <script> --image <path> --task faces --output-format json`
/// and prints a JSON object `{"faces": [{"x": .., "y": .., "width": ..,
/// "height": .., "confidence": ..}, ..]}` in normalized, y-flipped
/// coordinates. Detections below the confidence threshold are dropped.
pub struct ScriptFaceDetector {
    script_path: PathBuf,
    confidence_threshold: f32,
}

impl ScriptFaceDetector {
    pub fn new(script_path: &Path, confidence_threshold: f32) -> Result<Self> {
        if !script_path.exists() {
            return Err(anyhow::anyhow!(
                "Detector script not found: {}",
                script_path.display()
            ));
        }

        Ok(Self {
            script_path: script_path.to_path_buf(),
            confidence_threshold,
        })
    }
}

impl FaceDetector for ScriptFaceDetector {
    fn detect_faces(&self, img: &RgbImage) -> Result<Vec<FaceBox>> {
        let temp_path = save_temp_image(img, "faces")?;

        let output = Command::new("python3")
            .arg(&self.script_path)
            .arg("--image")
            .arg(&temp_path)
            .arg("--task")
            .arg("faces")
            .arg("--output-format")
            .arg("json")
            .output();

        let _ = std::fs::remove_file(&temp_path);

        let output = output.map_err(|e| anyhow::anyhow!("Failed to execute detector: {}", e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!("Detector script failed: {}", stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let payload: DetectFacesPayload = serde_json::from_str(&stdout)
            .map_err(|e| anyhow::anyhow!("Failed to parse detector output: {} | Raw: {}", e, stdout))?;

        if let Some(error) = payload.error {
            return Err(anyhow::anyhow!("Detector reported error: {}", error));
        }

        Ok(payload
            .faces
            .into_iter()
            .filter(|f| f.confidence >= self.confidence_threshold)
            .collect())
    }
}

/// Save an image to a temporary file for the external script
pub(crate) fn save_temp_image(img: &RgbImage, tag: &str) -> Result<PathBuf> {
    let temp_dir = std::env::temp_dir();
    let temp_filename = format!("patient_photo_{}_{}.jpg", tag, std::process::id());
    let temp_path = temp_dir.join(temp_filename);

    img.save(&temp_path)?;

    Ok(temp_path)
}
