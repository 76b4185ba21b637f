//! CLI Module
//!
//! Command-line front end for the sample editor.

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::dsp::pitch::RepitchMode;
use crate::engine::{EditRequest, PcmFormat};

/// Samplecraft - trim, loop, repitch and resample audio samples
#[derive(Parser, Debug)]
#[command(name = "samplecraft")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Editor configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show format, length, levels and loop markers of a WAV file
    #[command(name = "info")]
    Info {
        /// WAV file to inspect
        input: PathBuf,
    },

    /// Edit one file and save the result
    #[command(name = "edit")]
    Edit {
        /// Source WAV file
        input: PathBuf,

        /// Destination WAV file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        edit: EditArgs,
    },

    /// Apply the same edit to every WAV file under a directory
    #[command(name = "batch")]
    Batch {
        /// Directory searched recursively for .wav files
        dir: PathBuf,

        /// Where edited files are written (mirrors the input layout)
        #[arg(long)]
        out_dir: PathBuf,

        #[command(flatten)]
        edit: EditArgs,
    },
}

/// Edit flags shared by `edit` and `batch`
#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    /// Region start in frames
    #[arg(long, requires = "end", conflicts_with_all = ["start_pos", "end_pos"])]
    pub start: Option<usize>,

    /// Region end in frames (exclusive)
    #[arg(long, requires = "start")]
    pub end: Option<usize>,

    /// Region start as a fraction of the length (0.0 - 1.0)
    #[arg(long, requires = "end_pos")]
    pub start_pos: Option<f64>,

    /// Region end as a fraction of the length (0.0 - 1.0)
    #[arg(long, requires = "start_pos")]
    pub end_pos: Option<f64>,

    /// Turn the region into a seamless loop
    #[arg(long = "loop")]
    pub looped: bool,

    /// Loop crossfade in frames (default: a tenth of the region, at most 1000)
    #[arg(long, requires = "looped")]
    pub crossfade: Option<usize>,

    /// Pitch shift in semitones
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub semitones: f64,

    /// Keep the original duration when repitching
    #[arg(long)]
    pub preserve_duration: bool,

    /// Output sample rate in Hz
    #[arg(long)]
    pub rate: Option<u32>,

    /// Scale the sample-rate tag without resampling (0.5 - 2.0); changes
    /// speed and pitch together
    #[arg(long)]
    pub rate_multiplier: Option<f64>,

    /// Output format: 8, 16, 24, 32 or float
    #[arg(long, value_parser = parse_format)]
    pub format: Option<PcmFormat>,

    /// Apply TPDF dither when reducing bit depth
    #[arg(long)]
    pub dither: bool,

    /// Write a <output>.edit.json provenance file
    #[arg(long)]
    pub provenance: bool,
}

impl EditArgs {
    pub fn to_request(&self) -> EditRequest {
        let mut request = EditRequest::new().with_semitones(self.semitones);
        if let (Some(start), Some(end)) = (self.start, self.end) {
            request = request.with_region(start, end);
        }
        if let (Some(start), Some(end)) = (self.start_pos, self.end_pos) {
            request = request.with_normalized_region(start, end);
        }
        if self.looped {
            request = request.with_loop(self.crossfade);
        }
        if self.preserve_duration {
            request = request.with_repitch_mode(RepitchMode::PreserveDuration);
        }
        if let Some(rate) = self.rate {
            request = request.with_sample_rate(rate);
        }
        if let Some(multiplier) = self.rate_multiplier {
            request = request.with_rate_multiplier(multiplier);
        }
        if let Some(format) = self.format {
            request = request.with_output_format(format);
        }
        if self.dither {
            request = request.with_dither(true);
        }
        request
    }
}

fn parse_format(value: &str) -> Result<PcmFormat, String> {
    match value.to_ascii_lowercase().as_str() {
        "float" | "f32" => Ok(PcmFormat::Float32),
        bits => bits
            .parse::<u16>()
            .ok()
            .and_then(|bits| PcmFormat::int(bits).ok())
            .ok_or_else(|| format!("unknown format '{}' (expected 8, 16, 24, 32 or float)", value)),
    }
}
