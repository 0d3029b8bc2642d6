use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::utils::sanitize_patient_filename;

/// JPEG quality used for transfer files
const JPEG_QUALITY: u8 = 80;

/// How many saved photos survive a cleanup pass
pub const DEFAULT_KEEP: usize = 10;

/// Flat single-directory store of `<patientName>.jpg` transfer files.
///
/// Writes are plain non-atomic file writes; a failed write surfaces as an
/// error for the caller to turn into a retry prompt.
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    /// Open (creating if needed) the store directory
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create store directory: {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a given patient's transfer file would occupy
    pub fn file_path(&self, patient_name: &str) -> PathBuf {
        let stem = sanitize_patient_filename(patient_name);
        self.root.join(format!("{}.jpg", stem))
    }

    /// Encode and write the normalized photo as this patient's transfer
    /// file. An existing file for the same patient is replaced, keeping
    /// the at-most-one-pending invariant. Names that sanitize to an empty
    /// stem are rejected; they would produce a hidden `.jpg` file that the
    /// listing and cleanup operations cannot see.
    pub fn save(&self, img: &RgbImage, patient_name: &str) -> Result<PathBuf> {
        if sanitize_patient_filename(patient_name).is_empty() {
            return Err(anyhow::anyhow!(
                "Patient name '{}' contains no usable filename characters",
                patient_name
            ));
        }
        let path = self.file_path(patient_name);

        let file = File::create(&path)
            .with_context(|| format!("Failed to create transfer file: {}", path.display()))?;
        let writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
        img.write_with_encoder(encoder)
            .with_context(|| format!("Failed to encode JPEG: {}", path.display()))?;

        Ok(path)
    }

    /// Remove a transfer file after confirmed export or an abandoned flow
    pub fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove transfer file: {}", path.display()))
    }

    /// List saved `.jpg` filenames, newest-first by name
    pub fn list_saved(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).max_depth(1).follow_links(false) {
            let entry = entry.context("Failed to read store entry")?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_jpg = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("jpg"))
                .unwrap_or(false);
            if !is_jpg {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push(name.to_string());
            }
        }

        files.sort_by(|a, b| b.cmp(a));
        Ok(files)
    }

    /// The most recently saved file, if any
    pub fn most_recent(&self) -> Result<Option<String>> {
        Ok(self.list_saved()?.into_iter().next())
    }

    /// Delete all but the `keep` most recent files; returns how many were
    /// removed
    pub fn cleanup_old(&self, keep: usize) -> Result<usize> {
        let files = self.list_saved()?;
        if files.len() <= keep {
            return Ok(0);
        }

        let mut removed = 0;
        for filename in files.into_iter().skip(keep) {
            let path = self.root.join(&filename);
            if std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
