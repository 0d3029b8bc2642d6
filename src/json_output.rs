//! JSON output for front-end integration
//!
//! When the --json flag is enabled, verdicts and status information are
//! emitted as JSON lines to stdout, suppressing all styled output.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::image_processing::HeadshotVerdict;
use crate::session::ExportOutcome;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Headshot analysis result for the capture
    Verdict {
        is_valid: bool,
        face_count: usize,
        face_area_fraction: f32,
        message: String,
    },
    /// Transfer file written to the store
    Saved {
        patient_name: String,
        path: String,
        width: u32,
        height: u32,
    },
    /// Transfer file present in the store (listing mode)
    Listed { patient_name: String, path: String },
    /// Export command finished
    Export { path: String, exported: bool },
    /// Fatal error
    Error { message: String },
    /// End-of-run summary
    Summary {
        patient_name: String,
        saved: bool,
        exported: bool,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Create and emit a verdict message
    pub fn verdict(verdict: &HeadshotVerdict) {
        Self::Verdict {
            is_valid: verdict.is_valid,
            face_count: verdict.face_count,
            face_area_fraction: verdict.face_area_fraction,
            message: verdict.message.clone(),
        }
        .emit();
    }

    /// Create and emit a saved-file message
    pub fn saved(patient_name: &str, path: &Path, width: u32, height: u32) {
        Self::Saved {
            patient_name: patient_name.to_string(),
            path: path.display().to_string(),
            width,
            height,
        }
        .emit();
    }

    /// Create and emit a listing entry message
    pub fn listed(patient_name: &str, path: &Path) {
        Self::Listed {
            patient_name: patient_name.to_string(),
            path: path.display().to_string(),
        }
        .emit();
    }

    /// Create and emit an export result message
    pub fn export(path: &Path, outcome: ExportOutcome) {
        Self::Export {
            path: path.display().to_string(),
            exported: outcome == ExportOutcome::Exported,
        }
        .emit();
    }

    /// Create and emit a fatal error message
    pub fn error(message: impl Into<String>) {
        Self::Error {
            message: message.into(),
        }
        .emit();
    }

    /// Create and emit a summary message
    pub fn summary(patient_name: &str, saved: bool, exported: bool, duration_secs: f64) {
        Self::Summary {
            patient_name: patient_name.to_string(),
            saved,
            exported,
            duration_secs,
        }
        .emit();
    }
}
