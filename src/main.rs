use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::time::Instant;

use patient_photo::cli::Args;
use patient_photo::export::run_export;
use patient_photo::image_processing::headshot;
use patient_photo::image_processing::orientation::load_upright;
use patient_photo::image_processing::{
    analyze, normalize, HeadshotVerdict, ScriptFaceDetector, ScriptPersonSegmenter,
};
use patient_photo::json_output::JsonMessage;
use patient_photo::session::{ExportOutcome, Session, SessionConfig};
use patient_photo::storage::PhotoStore;
use patient_photo::utils::{
    create_progress_bar, error_println, format_duration, parse_hex_rgb, validate_inputs,
    verbose_println, warn_println,
};

fn main() -> Result<()> {
    let mut args = Args::parse();
    args.load_and_merge_config()?;

    if !args.json {
        println!(
            "{}",
            style("Patient Photo - Headshot Capture Processor")
                .bold()
                .blue()
        );
        println!("{}", style("Capture-to-transfer pipeline").dim());
        println!();
    }

    validate_inputs(&args)?;

    let store = PhotoStore::open(&args.store_dir)?;

    if args.list {
        return handle_list(&store, &args);
    }
    if args.cleanup {
        return handle_cleanup(&store, &args);
    }

    if let Err(e) = run_capture(&args, &store) {
        if args.json {
            JsonMessage::error(format!("{:#}", e));
        } else {
            error_println(&format!("{:#}", e));
        }
        std::process::exit(1);
    }
    Ok(())
}

/// List saved transfer files, newest first
fn handle_list(store: &PhotoStore, args: &Args) -> Result<()> {
    let files = store.list_saved()?;

    if args.json {
        for file in &files {
            JsonMessage::listed(file.trim_end_matches(".jpg"), &store.root().join(file));
        }
        return Ok(());
    }

    if files.is_empty() {
        println!("No transfer files in {}", store.root().display());
        return Ok(());
    }

    println!(
        "{}",
        style(format!("Transfer files in {}:", store.root().display())).bold()
    );
    for file in &files {
        println!("  {}", file);
    }
    println!();
    println!("{} file(s)", files.len());
    Ok(())
}

/// Delete all but the most recent transfer files
fn handle_cleanup(store: &PhotoStore, args: &Args) -> Result<()> {
    if args.dry_run {
        let files = store.list_saved()?;
        let would_remove = files.len().saturating_sub(args.keep);
        println!(
            "Dry run: would remove {} of {} file(s), keeping {}",
            would_remove,
            files.len(),
            args.keep
        );
        return Ok(());
    }

    let removed = store.cleanup_old(args.keep)?;
    println!(
        "{}",
        style(format!(
            "Removed {} old transfer file(s), keeping the {} most recent",
            removed, args.keep
        ))
        .green()
    );
    Ok(())
}

/// The capture-to-transfer pipeline for a single patient photo
fn run_capture(args: &Args, store: &PhotoStore) -> Result<()> {
    let start_time = Instant::now();

    let input = args
        .input
        .as_ref()
        .context("No input capture file specified")?;
    let patient_name = args
        .patient_name
        .as_ref()
        .context("No patient name specified")?;

    let (target_width, target_height) = args
        .parse_size()
        .map_err(|e| anyhow::anyhow!(e))?;
    let background = parse_hex_rgb(&args.background)?;

    if args.verbose && !args.json {
        println!("{}", style("Configuration:").bold());
        println!("  Input: {}", input.display());
        println!("  Store: {}", store.root().display());
        println!("  Transfer size: {}x{}", target_width, target_height);
        println!("  Resize policy: {:?}", args.policy);
        println!("  Headshot validation: {}", args.validate);
        println!("  Background removal: {}", args.remove_background);
        if let Some(ref script) = args.detector_script {
            println!("  Detector script: {}", script.display());
        }
        if args.dry_run {
            println!("  Dry run: enabled - no files will be written");
        }
        println!();
    }

    // load + analyze + normalize + save + export
    let total_stages = 2
        + u64::from(args.validate)
        + u64::from(!args.dry_run)
        + u64::from(args.export_cmd.is_some() && !args.dry_run);
    let pb = if args.json {
        None
    } else {
        Some(create_progress_bar(total_stages))
    };
    let stage = |msg: &str| {
        if let Some(ref pb) = pb {
            pb.set_message(msg.to_string());
            pb.inc(1);
        }
    };

    let session = Session::new(SessionConfig {
        headshot_validation_enabled: args.validate,
        background_removal_enabled: args.remove_background,
    })
    .enter_camera(patient_name)?;

    stage("Loading capture");
    let img = load_upright(input)?;
    verbose_println(
        args.verbose && !args.json,
        &format!("Loaded {} ({}x{})", input.display(), img.width(), img.height()),
    );

    // Validation path attaches a verdict and may substitute a derived image
    let (session, working) = if args.validate {
        let session = session.captured()?;
        stage("Analyzing headshot");

        let script = args
            .detector_script
            .as_ref()
            .context("Headshot validation requires a detector script")?;
        let detector = ScriptFaceDetector::new(script, args.confidence_threshold)?;
        let segmenter = if args.remove_background {
            Some(ScriptPersonSegmenter::new(script)?)
        } else {
            None
        };

        let verdict = analyze(&img, &detector, segmenter.as_ref(), background);
        report_verdict(&verdict, args);

        if args.debug && !args.dry_run {
            write_debug_annotation(&img, &verdict, store, patient_name, args)?;
        }

        let session = session.with_verdict(verdict.clone())?;
        let session = session.accept(args.use_anyway)?;

        // Prefer the background-replaced variant, then the headshot crop
        let working = verdict
            .background_replaced
            .or(verdict.cropped)
            .unwrap_or(img);
        (session, working)
    } else if args.remove_background {
        // No validation, but the person mask still drives the backdrop
        stage("Replacing background");
        let script = args
            .detector_script
            .as_ref()
            .context("Background removal requires a detector script")?;
        let segmenter = ScriptPersonSegmenter::new(script)?;
        match headshot::background_replaced_only(&img, &segmenter, background) {
            Some(replaced) => (session, replaced),
            None => {
                warn_println("Person segmentation failed, keeping original background");
                (session, img)
            }
        }
    } else {
        (session, img)
    };

    stage("Normalizing");
    let normalized = normalize(
        &working,
        target_width,
        target_height,
        args.policy.to_policy(),
        background,
    )?;

    if args.dry_run {
        if let Some(ref pb) = pb {
            pb.finish_with_message("Dry run complete");
        }
        if !args.json {
            println!(
                "Dry run: would save {}",
                store.file_path(session.patient_name()).display()
            );
        }
        return Ok(());
    }

    stage("Saving transfer file");
    let saved_path = store.save(&normalized, session.patient_name())?;
    let session = session.file_saved(saved_path.clone())?;

    if args.json {
        JsonMessage::saved(
            session.patient_name(),
            &saved_path,
            normalized.width(),
            normalized.height(),
        );
    } else {
        println!(
            "{} {}",
            style("Saved:").green().bold(),
            saved_path.display()
        );
    }

    let mut exported = false;
    if let Some(ref cmd) = args.export_cmd {
        stage("Exporting");
        let outcome = run_export(cmd, &saved_path)?;

        if args.json {
            JsonMessage::export(&saved_path, outcome);
        } else {
            match outcome {
                ExportOutcome::Exported => {
                    println!("{}", style("Export confirmed").green().bold())
                }
                ExportOutcome::Cancelled => warn_println(
                    "Export cancelled; the transfer file remains in the store for retry",
                ),
            }
        }

        if outcome == ExportOutcome::Exported {
            store.remove(&saved_path)?;
            exported = true;
        }
        session.export_finished(outcome)?;
    }

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    let elapsed = start_time.elapsed();
    if args.json {
        JsonMessage::summary(patient_name, true, exported, elapsed.as_secs_f64());
    } else {
        println!();
        println!(
            "{} in {}",
            style("Completed").bold().green(),
            format_duration(elapsed)
        );
    }
    Ok(())
}

/// Print the headshot verdict in the active output mode
fn report_verdict(verdict: &HeadshotVerdict, args: &Args) {
    if args.json {
        JsonMessage::verdict(verdict);
        return;
    }

    if verdict.is_valid {
        println!(
            "{} {} (face {:.1}% of frame)",
            style("\u{2713}").green().bold(),
            style(&verdict.message).green(),
            verdict.face_area_fraction * 100.0
        );
    } else {
        println!(
            "{} {} ({} face(s) detected)",
            style("\u{2717}").red().bold(),
            style(&verdict.message).red(),
            verdict.face_count
        );
        if args.use_anyway {
            warn_println("Validation failed but --use-anyway is set, keeping photo");
        }
    }
}

/// Write an annotated copy of the capture with the face box drawn in
fn write_debug_annotation(
    img: &image::RgbImage,
    verdict: &HeadshotVerdict,
    store: &PhotoStore,
    patient_name: &str,
    args: &Args,
) -> Result<()> {
    let face = match verdict.face_box {
        Some(ref face) => face,
        None => return Ok(()),
    };

    let annotated = headshot::draw_face_box(img, face);
    let debug_path: PathBuf = store.root().join(format!(
        "{}_debug.jpg",
        patient_photo::utils::sanitize_patient_filename(patient_name)
    ));
    annotated
        .save(&debug_path)
        .with_context(|| format!("Failed to write debug image: {}", debug_path.display()))?;

    verbose_println(
        args.verbose && !args.json,
        &format!("Debug annotation written to {}", debug_path.display()),
    );
    Ok(())
}
