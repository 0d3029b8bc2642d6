use anyhow::Result;
use console::style;
use image::Rgb;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::Args;

/// Create a styled progress bar for the capture pipeline stages
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments before any work starts
pub fn validate_inputs(args: &Args) -> Result<()> {
    // List and cleanup modes only need the store directory
    if args.list || args.cleanup {
        return Ok(());
    }

    let input = args
        .input
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("No input capture file specified (use -i <FILE>)"))?;

    if !input.exists() {
        return Err(anyhow::anyhow!(
            "Input capture does not exist: {}",
            input.display()
        ));
    }
    if !input.is_file() {
        return Err(anyhow::anyhow!(
            "Input capture is not a file: {}",
            input.display()
        ));
    }

    let name = args
        .patient_name
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("No patient name specified (use -n <NAME>)"))?;
    if name.trim().is_empty() {
        return Err(anyhow::anyhow!("Patient name must not be empty"));
    }
    if sanitize_patient_filename(name).is_empty() {
        return Err(anyhow::anyhow!(
            "Patient name '{}' contains no usable filename characters",
            name
        ));
    }

    args.parse_size().map_err(|e| anyhow::anyhow!(e))?;

    if !is_valid_hex_color(&args.background) {
        return Err(anyhow::anyhow!(
            "Invalid background color format: '{}'. Expected hex format like #RRGGBB",
            args.background
        ));
    }

    if args.validate {
        match &args.detector_script {
            Some(path) if !path.exists() => {
                return Err(anyhow::anyhow!(
                    "Detector script not found: {}",
                    path.display()
                ));
            }
            None => {
                return Err(anyhow::anyhow!(
                    "Headshot validation requires a detector script (--detector-script <FILE>)"
                ));
            }
            _ => {}
        }
    }

    if !(0.0..=1.0).contains(&args.confidence_threshold) {
        return Err(anyhow::anyhow!(
            "Confidence threshold must be between 0.0 and 1.0, got: {}",
            args.confidence_threshold
        ));
    }

    if args.keep == 0 {
        return Err(anyhow::anyhow!("--keep must be at least 1"));
    }

    Ok(())
}

/// Check if a string is a valid hex color
pub fn is_valid_hex_color(color: &str) -> bool {
    if !color.starts_with('#') {
        return false;
    }

    let hex_part = &color[1..];

    // Accept #RGB and #RRGGBB formats
    match hex_part.len() {
        3 | 6 => hex_part.chars().all(|c| c.is_ascii_hexdigit()),
        _ => false,
    }
}

/// Parse a hex color string into an RGB pixel
pub fn parse_hex_rgb(color: &str) -> Result<Rgb<u8>> {
    if !is_valid_hex_color(color) {
        return Err(anyhow::anyhow!("Invalid hex color: '{}'", color));
    }

    let hex = &color[1..];
    let (r, g, b) = if hex.len() == 3 {
        // #RGB shorthand: each digit doubles
        let r = u8::from_str_radix(&hex[0..1], 16)?;
        let g = u8::from_str_radix(&hex[1..2], 16)?;
        let b = u8::from_str_radix(&hex[2..3], 16)?;
        (r * 17, g * 17, b * 17)
    } else {
        (
            u8::from_str_radix(&hex[0..2], 16)?,
            u8::from_str_radix(&hex[2..4], 16)?,
            u8::from_str_radix(&hex[4..6], 16)?,
        )
    };

    Ok(Rgb([r, g, b]))
}

/// Sanitize a patient name into a filesystem-safe filename stem.
/// The store may live on FAT32-formatted removable media, so the full
/// FAT32 invalid set is replaced, consecutive underscores are collapsed
/// and the result is trimmed.
pub fn sanitize_patient_filename(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());

    for ch in name.chars() {
        let replacement = match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            '\t' | '\n' | '\r' => '_',
            c => c,
        };
        sanitized.push(replacement);
    }

    let mut result = String::new();
    let mut prev_was_underscore = false;
    for ch in sanitized.chars() {
        if ch == '_' {
            if !prev_was_underscore {
                result.push(ch);
                prev_was_underscore = true;
            }
        } else {
            result.push(ch);
            prev_was_underscore = false;
        }
    }

    result.trim_matches('_').trim().to_string()
}

/// Print verbose information if verbose mode is enabled
pub fn verbose_println(verbose: bool, message: &str) {
    if verbose {
        println!("{} {}", style("[VERBOSE]").dim(), message);
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    println!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}
