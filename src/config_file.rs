use crate::cli::{Args, ResizeMode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Capture station profile stored as JSON
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub name: Option<String>,
    pub config: StationConfigJson,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConfigJson {
    pub store_path: Option<String>,
    pub size: Option<String>,
    pub policy: Option<String>,
    pub background: Option<String>,
    pub validate: Option<bool>,
    pub remove_background: Option<bool>,
    pub detector_script: Option<String>,
    pub confidence_threshold: Option<f32>,
    pub export_cmd: Option<String>,
    pub keep: Option<usize>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
    pub dry_run: Option<bool>,
}

impl Args {
    /// Load a station profile from a JSON file and merge it with the
    /// command-line arguments. Command-line arguments take precedence
    /// over config file values.
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: ConfigFile = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            // The presence of a flag on the command line decides precedence
            let args_from_cli = std::env::args().collect::<Vec<_>>();
            self.merge_from_config(config.config, &args_from_cli);

            if self.verbose {
                eprintln!("Loaded configuration from: {:?}", config_path);
            }
        }
        Ok(())
    }

    fn merge_from_config(&mut self, config: StationConfigJson, args_from_cli: &[String]) {
        let flag_present = |names: &[&str]| {
            args_from_cli.iter().any(|a| {
                names
                    .iter()
                    .any(|n| a == n || a.starts_with(&format!("{}=", n)))
            })
        };

        if !flag_present(&["-o", "--store"]) {
            if let Some(store) = config.store_path {
                self.store_dir = PathBuf::from(store);
            }
        }

        if !flag_present(&["-s", "--size"]) {
            if let Some(size) = config.size {
                self.size = size;
            }
        }

        if !flag_present(&["--policy"]) {
            if let Some(policy) = config.policy {
                self.policy = match policy.as_str() {
                    "fill" => ResizeMode::Fill,
                    "fit" => ResizeMode::Fit,
                    _ => self.policy.clone(),
                };
            }
        }

        if !flag_present(&["--background"]) {
            if let Some(bg) = config.background {
                self.background = bg;
            }
        }

        if !flag_present(&["--detector-script"]) {
            if let Some(script) = config.detector_script {
                self.detector_script = Some(PathBuf::from(script));
            }
        }

        if !flag_present(&["--confidence"]) {
            if let Some(threshold) = config.confidence_threshold {
                self.confidence_threshold = threshold;
            }
        }

        if !flag_present(&["--export-cmd"]) {
            if let Some(cmd) = config.export_cmd {
                self.export_cmd = Some(cmd);
            }
        }

        if !flag_present(&["--keep"]) {
            if let Some(keep) = config.keep {
                self.keep = keep;
            }
        }

        // Boolean flags - only apply if currently false (default)
        if !self.validate && !self.no_validate {
            self.validate = config.validate.unwrap_or(false);
        }

        if !self.remove_background {
            self.remove_background = config.remove_background.unwrap_or(false);
        }

        if !self.verbose {
            self.verbose = config.verbose.unwrap_or(false);
        }

        if !self.debug {
            self.debug = config.debug.unwrap_or(false);
        }

        if !self.dry_run {
            self.dry_run = config.dry_run.unwrap_or(false);
        }
    }
}
