use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::image_processing::ResizePolicy;

#[derive(Debug, Clone, ValueEnum, PartialEq, Eq)]
pub enum ResizeMode {
    /// Scale to cover 640x480 and center-crop the overflow (no borders)
    #[value(name = "fill")]
    Fill,
    /// Scale to fit inside 640x480 and letterbox on the background color
    #[value(name = "fit")]
    Fit,
}

impl ResizeMode {
    pub fn to_policy(&self) -> ResizePolicy {
        match self {
            ResizeMode::Fill => ResizePolicy::Fill,
            ResizeMode::Fit => ResizePolicy::Fit,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "patient-photo",
    about = "Capture-to-transfer processor for patient headshot photos",
    long_about = "
Patient Photo - Headshot Capture Processor

This tool turns a raw patient capture into a standardized transfer file.
It validates the capture as a proper headshot (single face, close enough,
centered), optionally replaces the background behind the person, then
normalizes the photo to a fixed transfer size and saves it as
<patientName>.jpg in a flat store directory for hand-off to an external
export command.

Example Usage:
  # Normalize a capture and save it under the patient's name
  patient-photo -i capture.jpg -n \"John Doe\" -o ~/photo-store

  # Validate the capture as a headshot before accepting it
  patient-photo -i capture.jpg -n \"John Doe\" -o ~/photo-store \\
    --validate --detector-script ./scripts/detect_subject.py

  # Validation plus background replacement with a white backdrop
  patient-photo -i capture.jpg -n \"John Doe\" -o ~/photo-store \\
    --validate --remove-background \\
    --detector-script ./scripts/detect_subject.py --background \"#FFFFFF\"

  # Keep a failed validation anyway (operator override)
  patient-photo -i capture.jpg -n \"John Doe\" --validate \\
    --detector-script ./scripts/detect_subject.py --use-anyway

  # Hand the saved file to an export command; {} is replaced by the path
  patient-photo -i capture.jpg -n \"John Doe\" -o ~/photo-store \\
    --export-cmd \"rsync -t {} clinic@server:/incoming/\"

  # List saved transfer files, newest first
  patient-photo -o ~/photo-store --list

  # Delete all but the 10 most recent transfer files
  patient-photo -o ~/photo-store --cleanup --keep 10

  # Dry run: analyze and report without writing any files
  patient-photo -i capture.jpg -n \"John Doe\" --dry-run --verbose"
)]
pub struct Args {
    /// Input capture file (JPEG, PNG, WebP or TIFF)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Patient name; becomes the transfer filename (truncated to 16 chars)
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub patient_name: Option<String>,

    /// Store directory holding the <patientName>.jpg transfer files
    #[arg(short = 'o', long = "store", default_value = ".", value_name = "DIR")]
    pub store_dir: PathBuf,

    /// Transfer size (format: WIDTHxHEIGHT)
    #[arg(
        short = 's',
        long = "size",
        default_value = "640x480",
        value_name = "WIDTHxHEIGHT"
    )]
    pub size: String,

    /// Resize policy: fill (crop, no borders) or fit (letterbox)
    #[arg(long = "policy", default_value = "fill", value_name = "POLICY")]
    pub policy: ResizeMode,

    /// Background color for letterboxing and background replacement (hex RGB)
    #[arg(long = "background", default_value = "#FFFFFF", value_name = "COLOR")]
    pub background: String,

    /// Validate the capture as a headshot before accepting it
    #[arg(long = "validate")]
    pub validate: bool,

    /// Force headshot validation off, overriding the config file
    #[arg(long = "no-validate", conflicts_with = "validate")]
    pub no_validate: bool,

    /// Replace the background behind the person with the background color
    #[arg(long = "remove-background")]
    pub remove_background: bool,

    /// Accept the photo even when headshot validation fails
    #[arg(long = "use-anyway")]
    pub use_anyway: bool,

    /// Path to the detection script (uses system Python)
    #[arg(long = "detector-script", value_name = "FILE")]
    pub detector_script: Option<PathBuf>,

    /// Confidence threshold for face detection (0.0-1.0)
    #[arg(long = "confidence", default_value = "0.6", value_name = "THRESHOLD")]
    pub confidence_threshold: f32,

    /// External export command; a {} argument is replaced with the file path
    #[arg(long = "export-cmd", value_name = "CMD")]
    pub export_cmd: Option<String>,

    /// List saved transfer files, newest first, then exit
    #[arg(long = "list")]
    pub list: bool,

    /// Delete all but the --keep most recent transfer files, then exit
    #[arg(long = "cleanup")]
    pub cleanup: bool,

    /// How many transfer files --cleanup keeps
    #[arg(long = "keep", default_value = "10", value_name = "N")]
    pub keep: usize,

    /// Load defaults from a JSON config file (command line takes precedence)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Emit machine-readable JSON messages instead of styled output
    #[arg(long = "json")]
    pub json: bool,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Write an annotated copy with the detected face box drawn in
    #[arg(long = "debug")]
    pub debug: bool,

    /// Simulate the run without writing any files
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

impl Args {
    /// Parse the size string into width and height
    pub fn parse_size(&self) -> Result<(u32, u32), String> {
        let parts: Vec<&str> = self.size.split('x').collect();
        if parts.len() != 2 {
            return Err(format!(
                "Invalid size format '{}'. Use WIDTHxHEIGHT (e.g., 640x480)",
                self.size
            ));
        }

        let width = parts[0]
            .parse::<u32>()
            .map_err(|_| format!("Invalid width: '{}'", parts[0]))?;
        let height = parts[1]
            .parse::<u32>()
            .map_err(|_| format!("Invalid height: '{}'", parts[1]))?;

        if width == 0 || height == 0 {
            return Err("Width and height must be greater than 0".to_string());
        }

        if width > 4000 || height > 4000 {
            return Err("Width and height must be less than 4000 pixels".to_string());
        }

        Ok((width, height))
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input: None,
            patient_name: None,
            store_dir: PathBuf::from("."),
            size: "640x480".to_string(),
            policy: ResizeMode::Fill,
            background: "#FFFFFF".to_string(),
            validate: false,
            no_validate: false,
            remove_background: false,
            use_anyway: false,
            detector_script: None,
            confidence_threshold: 0.6,
            export_cmd: None,
            list: false,
            cleanup: false,
            keep: 10,
            config_file: None,
            json: false,
            verbose: false,
            debug: false,
            dry_run: false,
        }
    }
}
