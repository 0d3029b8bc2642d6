use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

pub use crate::session::ExportOutcome;

/// Placeholder in the export command replaced with the transfer file path
const PATH_PLACEHOLDER: &str = "{}";

/// Hand the pending transfer file to the external export command.
///
/// The command string is split on whitespace; every `{}` occurrence in the
/// resulting arguments is replaced with the file path, and the path is
/// appended when no placeholder is present. Exit status zero means the
/// file reached its destination; any other status is treated as a user
/// cancellation, which leaves the file and the session state untouched.
/// Only a failure to launch the command at all is an error.
pub fn run_export(command: &str, file: &Path) -> Result<ExportOutcome> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("Export command is empty"))?;

    let path_str = file.display().to_string();
    let mut args: Vec<String> = Vec::new();
    let mut replaced = false;
    for part in parts {
        if part.contains(PATH_PLACEHOLDER) {
            args.push(part.replace(PATH_PLACEHOLDER, &path_str));
            replaced = true;
        } else {
            args.push(part.to_string());
        }
    }
    if !replaced {
        args.push(path_str);
    }

    let status = Command::new(program)
        .args(&args)
        .status()
        .with_context(|| format!("Failed to launch export command: {}", program))?;

    if status.success() {
        Ok(ExportOutcome::Exported)
    } else {
        Ok(ExportOutcome::Cancelled)
    }
}
