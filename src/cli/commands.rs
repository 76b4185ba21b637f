//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use walkdir::WalkDir;

use crate::cli::EditArgs;
use crate::config::EditorConfig;
use crate::editor::SampleEditor;
use crate::engine::io::import_wav;
use crate::save::SaveReport;

/// Print a summary of a WAV file.
pub fn show_info(input: &Path) -> Result<()> {
    info!("Inspecting: {}", input.display());

    let imported =
        import_wav(input).with_context(|| format!("could not read {}", input.display()))?;
    let sample = &imported.sample;

    println!("File: {}", input.display());
    println!("{:-<60}", "");
    println!("Format:      {}", sample.format());
    println!("Channels:    {}", sample.num_channels());
    println!("Sample rate: {} Hz", sample.sample_rate());
    println!("Frames:      {}", sample.frames());
    println!("Duration:    {:.3} s", sample.duration_secs());
    println!("RMS:         {:.1} dBFS", sample.rms_db());
    println!("Peak:        {:.1} dBFS", sample.peak_db());
    match imported.loop_frames {
        Some((start, end)) => println!("Loop:        {}..{} ({} frames)", start, end, end - start),
        None => println!("Loop:        none"),
    }

    Ok(())
}

/// Edit one file and save it.
pub fn edit_file(input: &Path, output: &Path, args: &EditArgs, config: EditorConfig) -> Result<()> {
    let mut editor = SampleEditor::new(with_flags(config, args))?;
    let report = edit_one(&mut editor, input, output, args)?;
    print_report(input, &report);
    Ok(())
}

/// Apply one edit to every `.wav` under `dir`, mirroring its layout in `out_dir`.
///
/// Failures are reported per file; the command fails if any file failed.
pub fn batch(dir: &Path, out_dir: &Path, args: &EditArgs, config: EditorConfig) -> Result<()> {
    info!("Batch editing {} -> {}", dir.display(), out_dir.display());

    fs::create_dir_all(out_dir)
        .with_context(|| format!("could not create {}", out_dir.display()))?;
    let out_dir_abs = out_dir.canonicalize().unwrap_or_else(|_| out_dir.to_path_buf());

    let inputs: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            // Don't pick up our own output when it lives under the input
            entry
                .path()
                .canonicalize()
                .map(|p| p != out_dir_abs)
                .unwrap_or(true)
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_wav(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    if inputs.is_empty() {
        println!("No .wav files found under {}", dir.display());
        return Ok(());
    }

    let mut editor = SampleEditor::new(with_flags(config, args))?;
    let mut failed = 0usize;
    for input in &inputs {
        let relative = input.strip_prefix(dir).unwrap_or(input.as_path());
        let output = out_dir.join(relative);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("could not create {}", parent.display()))?;
        }

        match edit_one(&mut editor, input, &output, args) {
            Ok(report) => print_report(input, &report),
            Err(e) => {
                failed += 1;
                warn!("{}: {:#}", input.display(), e);
                println!("FAILED {}: {:#}", input.display(), e);
            }
        }
    }

    println!("{:-<60}", "");
    println!(
        "{} of {} files edited",
        inputs.len() - failed,
        inputs.len()
    );
    if failed > 0 {
        bail!("{} file(s) failed", failed);
    }
    Ok(())
}

fn edit_one(
    editor: &mut SampleEditor,
    input: &Path,
    output: &Path,
    args: &EditArgs,
) -> Result<SaveReport> {
    let id = editor
        .load(input)
        .with_context(|| format!("could not load {}", input.display()))?;

    let outcome = editor
        .edit(id, &args.to_request())
        .and_then(|result| editor.save(&result, output));
    // Batch runs would otherwise keep every source in memory
    editor.remove(id)?;

    outcome.with_context(|| format!("could not edit {}", input.display()))
}

fn with_flags(mut config: EditorConfig, args: &EditArgs) -> EditorConfig {
    if args.provenance {
        config.save.write_provenance = true;
    }
    config
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

fn print_report(input: &Path, report: &SaveReport) {
    println!(
        "{} -> {} ({} frames @ {} Hz, {} bytes)",
        input.display(),
        report.path.display(),
        report.frames,
        report.sample_rate,
        report.bytes_written
    );
    println!("  sha256: {}", report.sha256);
    if let Some(sidecar) = &report.sidecar {
        println!("  provenance: {}", sidecar.display());
    }
}
