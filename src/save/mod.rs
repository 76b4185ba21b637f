//! Save Pipeline
//!
//! Writes an edit result to disk as WAV. Bytes go to a temporary file in
//! the destination directory, which is synced and then renamed over the
//! destination. A failed or cancelled save removes the temporary file and
//! leaves whatever was at the destination untouched.
//!
//! With a provenance sidecar both files are staged before either rename.
//! The sidecar is renamed first; if the audio rename then fails, the
//! previous sidecar is put back.

mod worker;

pub use worker::{SaveHandle, SaveWorker};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::dsp::region::LoopPoint;
use crate::engine::edit::{EditResult, Provenance};
use crate::engine::io::encode_wav;
use crate::engine::PcmFormat;
use crate::error::{Result, SampleError};

/// Suffix appended to the destination path for the provenance sidecar
pub const SIDECAR_SUFFIX: &str = ".edit.json";

/// Shared flag used to abort a save before it is committed
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How results are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// Bytes written between cancellation checks
    pub chunk_size: usize,
    /// Write the result's loop point as a `smpl` chunk
    pub write_loop_chunk: bool,
    /// Write `<dest>.edit.json` next to the audio
    pub write_provenance: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            write_loop_chunk: true,
            write_provenance: false,
        }
    }
}

impl SaveOptions {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SampleError::InvalidConfig {
                reason: "save chunk_size must be at least 1 byte".to_string(),
            });
        }
        Ok(())
    }
}

/// What a completed save wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub path: PathBuf,
    pub bytes_written: u64,
    /// Hex SHA-256 of the WAV bytes
    pub sha256: String,
    pub frames: usize,
    pub sample_rate: u32,
    /// Provenance sidecar, when one was written
    pub sidecar: Option<PathBuf>,
}

/// Sidecar contents: the provenance plus a summary of the rendered audio
#[derive(Serialize)]
struct Sidecar<'a> {
    #[serde(flatten)]
    provenance: &'a Provenance,
    frames: usize,
    channels: usize,
    sample_rate: u32,
    format: PcmFormat,
    loop_point: Option<&'a LoopPoint>,
    sha256: &'a str,
}

/// Save an edit result to `destination`
///
/// # Errors
/// * `Io` - the directory is missing or a write/rename fails
/// * `Cancelled` - `cancel` was set before the file was committed
pub fn save(
    result: &EditResult,
    destination: &Path,
    options: &SaveOptions,
    cancel: &CancelToken,
) -> Result<SaveReport> {
    options.validate()?;
    if cancel.is_cancelled() {
        return Err(cancelled(destination));
    }

    let sample = result.sample();
    let loop_frames = result
        .loop_point()
        .filter(|_| options.write_loop_chunk)
        .map(|lp| (lp.loop_start(), lp.loop_end()));
    let bytes = encode_wav(sample, loop_frames)?;
    let sha256 = format!("{:x}", Sha256::digest(&bytes));

    let audio = stage(destination, &bytes, options.chunk_size, cancel, |_| {})?;

    let sidecar = if options.write_provenance {
        let path = sidecar_path(destination);
        let record = Sidecar {
            provenance: result.provenance(),
            frames: sample.frames(),
            channels: sample.num_channels(),
            sample_rate: sample.sample_rate(),
            format: sample.format(),
            loop_point: result.loop_point(),
            sha256: &sha256,
        };
        let json = serde_json::to_vec_pretty(&record)?;
        let staged = stage(&path, &json, options.chunk_size, cancel, |_| {})?;
        Some((staged, path))
    } else {
        None
    };

    if cancel.is_cancelled() {
        return Err(cancelled(destination));
    }

    let sidecar = match sidecar {
        Some((staged, path)) => {
            let previous = fs::read(&path).ok();
            commit(staged, &path)?;
            if let Err(e) = commit(audio, destination) {
                restore_sidecar(&path, previous, options.chunk_size);
                return Err(e);
            }
            debug!("Wrote provenance to {}", path.display());
            Some(path)
        }
        None => {
            commit(audio, destination)?;
            None
        }
    };
    info!(
        "Saved {} ({} bytes, {} frames)",
        destination.display(),
        bytes.len(),
        sample.frames()
    );

    Ok(SaveReport {
        path: destination.to_path_buf(),
        bytes_written: bytes.len() as u64,
        sha256,
        frames: sample.frames(),
        sample_rate: sample.sample_rate(),
        sidecar,
    })
}

/// Path of the provenance sidecar for a destination
pub fn sidecar_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Write `bytes` to `destination` through a temp file and rename
pub fn atomic_write(
    destination: &Path,
    bytes: &[u8],
    chunk_size: usize,
    cancel: &CancelToken,
) -> Result<()> {
    let staged = stage(destination, bytes, chunk_size, cancel, |_| {})?;
    commit(staged, destination)
}

fn staging_dir(destination: &Path) -> &Path {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write and sync `bytes` into a temp file next to `destination`
///
/// `on_chunk` sees the bytes written so far after each chunk. Dropping the
/// returned file without committing it deletes it.
fn stage(
    destination: &Path,
    bytes: &[u8],
    chunk_size: usize,
    cancel: &CancelToken,
    mut on_chunk: impl FnMut(usize),
) -> Result<NamedTempFile> {
    let dir = staging_dir(destination);
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| SampleError::io(dir, e))?;

    let mut written = 0;
    for chunk in bytes.chunks(chunk_size.max(1)) {
        if cancel.is_cancelled() {
            return Err(cancelled(destination));
        }
        temp.write_all(chunk)
            .map_err(|e| SampleError::io(temp.path(), e))?;
        written += chunk.len();
        on_chunk(written);
    }

    if cancel.is_cancelled() {
        return Err(cancelled(destination));
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| SampleError::io(temp.path(), e))?;
    Ok(temp)
}

/// Rename a staged file over `destination`
fn commit(staged: NamedTempFile, destination: &Path) -> Result<()> {
    staged
        .persist(destination)
        .map_err(|e| SampleError::io(destination, e.error))?;

    // Make the rename itself durable where the platform allows it
    if let Ok(handle) = fs::File::open(staging_dir(destination)) {
        let _ = handle.sync_all();
    }
    Ok(())
}

/// Put back the sidecar that was there before a failed save
fn restore_sidecar(path: &Path, previous: Option<Vec<u8>>, chunk_size: usize) {
    let restored = match previous {
        Some(bytes) => atomic_write(path, &bytes, chunk_size, &CancelToken::new()),
        None => fs::remove_file(path).map_err(|e| SampleError::io(path, e)),
    };
    if let Err(e) = restored {
        warn!("Could not restore {}: {}", path.display(), e);
    }
}

fn cancelled(destination: &Path) -> SampleError {
    SampleError::Cancelled {
        operation: format!("save to {}", destination.display()),
    }
}
