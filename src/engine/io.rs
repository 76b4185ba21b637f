//! WAV codec for Samplecraft
//!
//! Decodes WAV files into `Sample`s and encodes `Sample`s back to WAV bytes.
//! Integer PCM is scaled symmetrically by 2^(bits-1) in both directions so a
//! decode/encode cycle reproduces the stored integers exactly.
//!
//! Loop points travel in the RIFF `smpl` chunk (first loop only, forward
//! type). The chunk stores the loop end inclusive; in memory we use an
//! exclusive end like every other range in the crate.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::engine::sample::{PcmFormat, Sample};
use crate::error::{Result, SampleError};

/// Extensions the host may hand us that the codec can't decode
const FOREIGN_EXTENSIONS: &[&str] = &["aif", "aiff", "flac"];

/// Size of the `smpl` chunk payload with a single loop (9 + 6 u32 fields)
const SMPL_CHUNK_LEN: usize = 60;

/// MIDI unity note written into the `smpl` header (C4)
const SMPL_UNITY_NOTE: u32 = 60;

/// A decoded WAV file
#[derive(Debug, Clone)]
pub struct ImportedWav {
    /// Decoded audio
    pub sample: Sample,
    /// First loop from the `smpl` chunk as `(start, end_exclusive)` frames
    pub loop_frames: Option<(usize, usize)>,
}

/// Import a WAV file from disk
///
/// # Errors
/// * `FileNotFound` - the path does not exist
/// * `UnsupportedFormat` - AIFF/FLAC containers or unsupported bit depths
/// * `InvalidAudio` - the file is not a readable WAV
/// * `EmptySample` - the file decodes to zero frames
pub fn import_wav(path: &Path) -> Result<ImportedWav> {
    if !path.exists() {
        return Err(SampleError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    if let Some(ext) = extension_lower(path) {
        if FOREIGN_EXTENSIONS.contains(&ext.as_str()) {
            return Err(SampleError::UnsupportedFormat {
                format: format!(".{} container (only WAV can be decoded)", ext),
            });
        }
    }

    let bytes = fs::read(path).map_err(|e| SampleError::io(path, e))?;
    let imported = decode_wav(&bytes).map_err(|e| with_path(e, path))?;

    debug!(
        "Imported {}: {} ch, {} Hz, {}, {} frames",
        path.display(),
        imported.sample.num_channels(),
        imported.sample.sample_rate(),
        imported.sample.format(),
        imported.sample.frames()
    );

    Ok(imported)
}

/// Decode WAV bytes held in memory
pub fn decode_wav(bytes: &[u8]) -> Result<ImportedWav> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| hound_error(e, None))?;
    let spec = reader.spec();

    let format = match spec.sample_format {
        SampleFormat::Float if spec.bits_per_sample == 32 => PcmFormat::Float32,
        SampleFormat::Float => {
            return Err(SampleError::UnsupportedFormat {
                format: format!("{}-bit float audio", spec.bits_per_sample),
            })
        }
        SampleFormat::Int => PcmFormat::int(spec.bits_per_sample)?,
    };

    if spec.channels == 0 {
        return Err(SampleError::UnsupportedFormat {
            format: "audio with zero channels".to_string(),
        });
    }

    let interleaved = read_samples_as_f32(reader, format)?;
    if interleaved.is_empty() {
        return Err(SampleError::EmptySample);
    }

    let sample =
        Sample::from_interleaved(&interleaved, spec.channels as usize, spec.sample_rate, format)?;
    let loop_frames = parse_loop_chunk(bytes).and_then(|(start, end_inclusive)| {
        let end = end_inclusive as usize + 1;
        (end <= sample.frames() && (start as usize) < end).then_some((start as usize, end))
    });

    Ok(ImportedWav {
        sample,
        loop_frames,
    })
}

/// Encode a sample to WAV bytes in its own format
///
/// When `loop_frames` is given (`(start, end_exclusive)`), a `smpl` chunk with
/// one forward loop is appended.
pub fn encode_wav(sample: &Sample, loop_frames: Option<(usize, usize)>) -> Result<Vec<u8>> {
    let format = sample.format();
    let spec = WavSpec {
        channels: sample.num_channels() as u16,
        sample_rate: sample.sample_rate(),
        bits_per_sample: format.bits_per_sample(),
        sample_format: match format {
            PcmFormat::Float32 => SampleFormat::Float,
            PcmFormat::Int { .. } => SampleFormat::Int,
        },
    };

    let mut bytes = Vec::new();
    {
        let mut writer =
            WavWriter::new(Cursor::new(&mut bytes), spec).map_err(|e| hound_error(e, None))?;

        let interleaved = sample.to_interleaved();
        match format {
            PcmFormat::Float32 => {
                for value in interleaved {
                    writer.write_sample(value).map_err(|e| hound_error(e, None))?;
                }
            }
            PcmFormat::Int { bits: 8 } => {
                for value in interleaved {
                    let q = to_int(value, 128.0) as i8;
                    writer.write_sample(q).map_err(|e| hound_error(e, None))?;
                }
            }
            PcmFormat::Int { bits: 16 } => {
                for value in interleaved {
                    let q = to_int(value, 32768.0) as i16;
                    writer.write_sample(q).map_err(|e| hound_error(e, None))?;
                }
            }
            PcmFormat::Int { bits } => {
                let scale = (1u64 << (bits - 1)) as f64;
                for value in interleaved {
                    // 24/32-bit are both stored as i32 in hound
                    let q = to_int(value, scale) as i32;
                    writer.write_sample(q).map_err(|e| hound_error(e, None))?;
                }
            }
        }

        writer.finalize().map_err(|e| hound_error(e, None))?;
    }

    if let Some((start, end)) = loop_frames {
        if end <= start || end > sample.frames() {
            return Err(SampleError::InvalidRange {
                reason: format!(
                    "loop {}..{} does not fit a sample of {} frames",
                    start,
                    end,
                    sample.frames()
                ),
            });
        }
        let start = u32::try_from(start).map_err(|_| SampleError::UnsupportedFormat {
            format: "loop start beyond 32-bit frame range".to_string(),
        })?;
        let end_inclusive = u32::try_from(end - 1).map_err(|_| SampleError::UnsupportedFormat {
            format: "loop end beyond 32-bit frame range".to_string(),
        })?;
        append_loop_chunk(&mut bytes, sample.sample_rate(), start, end_inclusive);
    }

    Ok(bytes)
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read all samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    format: PcmFormat,
) -> Result<Vec<f32>> {
    let read_err = |e: hound::Error| hound_error(e, None);
    match format {
        PcmFormat::Float32 => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_err),
        PcmFormat::Int { bits: 8 } => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_err),
        PcmFormat::Int { bits: 16 } => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_err),
        PcmFormat::Int { bits } => {
            let scale = (1u64 << (bits - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / scale) as f32))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(read_err)
        }
    }
}

/// Scale and round a float sample into the signed integer range of `scale`
#[inline]
fn to_int(value: f32, scale: f64) -> i64 {
    (value as f64 * scale).round().clamp(-scale, scale - 1.0) as i64
}

/// Append a `smpl` chunk with one forward loop and patch the RIFF size
fn append_loop_chunk(bytes: &mut Vec<u8>, sample_rate: u32, start: u32, end_inclusive: u32) {
    let sample_period_ns = 1_000_000_000u32 / sample_rate.max(1);

    let mut chunk: Vec<u8> = Vec::with_capacity(SMPL_CHUNK_LEN);
    for field in [
        0u32,             // manufacturer
        0,                // product
        sample_period_ns, // sample period
        SMPL_UNITY_NOTE,  // MIDI unity note
        0,                // MIDI pitch fraction
        0,                // SMPTE format
        0,                // SMPTE offset
        1,                // number of sample loops
        0,                // sampler data
        0,                // cue point id
        0,                // loop type (0 = forward)
        start,
        end_inclusive,
        0, // fraction
        0, // play count (0 = infinite)
    ] {
        chunk.extend_from_slice(&field.to_le_bytes());
    }

    // hound pads the data chunk, so the file is already word aligned
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes.extend_from_slice(b"smpl");
    bytes.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&chunk);

    let riff_size = (bytes.len() - 8) as u32;
    bytes[4..8].copy_from_slice(&riff_size.to_le_bytes());
}

/// Find the first loop in a `smpl` chunk, returned as `(start, end_inclusive)`
fn parse_loop_chunk(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return None;
    }

    let read_u32 = |offset: usize| -> Option<u32> {
        data.get(offset..offset + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    };

    let mut pos = 12usize;
    while pos + 8 <= data.len() {
        let id = &data[pos..pos + 4];
        let size = read_u32(pos + 4)? as usize;
        let chunk_start = pos + 8;

        if id == b"smpl" {
            if size < SMPL_CHUNK_LEN {
                return None;
            }
            let num_loops = read_u32(chunk_start + 28)?;
            if num_loops == 0 {
                return None;
            }
            let start = read_u32(chunk_start + 44)?;
            let end = read_u32(chunk_start + 48)?;
            return (end >= start).then_some((start, end));
        }

        // chunks are word aligned
        pos = chunk_start.checked_add(size + (size & 1))?;
    }
    None
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Map a hound error onto the crate error type
fn hound_error(err: hound::Error, path: Option<&Path>) -> SampleError {
    match err {
        hound::Error::IoError(source) => SampleError::Io {
            path: path.map(Path::to_path_buf).unwrap_or_default(),
            source,
        },
        hound::Error::Unsupported => SampleError::UnsupportedFormat {
            format: "WAV feature not supported by the decoder".to_string(),
        },
        hound::Error::InvalidSampleFormat => SampleError::UnsupportedFormat {
            format: "WAV sample format does not match its bit depth".to_string(),
        },
        other => SampleError::InvalidAudio {
            reason: other.to_string(),
            source: Some(Box::new(other)),
        },
    }
}

/// Attach a path to I/O errors raised while decoding in-memory bytes
fn with_path(err: SampleError, path: &Path) -> SampleError {
    match err {
        SampleError::Io { path: p, source } if p == PathBuf::new() => SampleError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sample::{sine_wave, stereo_sine_wave};
    use tempfile::tempdir;

    /// Sample whose values sit exactly on the 16-bit grid
    fn quantized_16bit() -> Sample {
        let data: Vec<f32> = (0..1000)
            .map(|i| ((i * 37 % 2000) as i32 - 1000) as f32 / 32768.0)
            .collect();
        Sample::new(vec![data], 44100, PcmFormat::Int { bits: 16 }).unwrap()
    }

    #[test]
    fn test_round_trip_16bit_exact() {
        let original = quantized_16bit();
        let bytes = encode_wav(&original, None).unwrap();
        let decoded = decode_wav(&bytes).unwrap();

        assert_eq!(decoded.sample, original);
        assert!(decoded.loop_frames.is_none());
    }

    #[test]
    fn test_round_trip_float_exact() {
        let original = stereo_sine_wave(440.0, 880.0, 0.1, 48000, PcmFormat::Float32).unwrap();
        let decoded = decode_wav(&encode_wav(&original, None).unwrap()).unwrap();
        assert_eq!(decoded.sample, original);
    }

    #[test]
    fn test_round_trip_24bit_close() {
        let original = sine_wave(1000.0, 0.1, 48000, 0.8, PcmFormat::Int { bits: 24 }).unwrap();
        let decoded = decode_wav(&encode_wav(&original, None).unwrap()).unwrap();

        for (orig, dec) in original.channel(0).iter().zip(decoded.sample.channel(0)) {
            assert!((orig - dec).abs() < 1.0 / 8_388_608.0 + 1e-9);
        }
    }

    #[test]
    fn test_round_trip_8bit() {
        let data: Vec<f32> = (-128..128).map(|v| v as f32 / 128.0).collect();
        let original = Sample::new(vec![data], 8000, PcmFormat::Int { bits: 8 }).unwrap();
        let decoded = decode_wav(&encode_wav(&original, None).unwrap()).unwrap();
        assert_eq!(decoded.sample, original);
    }

    #[test]
    fn test_loop_chunk_round_trip() {
        let original = quantized_16bit();
        let bytes = encode_wav(&original, Some((100, 900))).unwrap();

        assert_eq!(parse_loop_chunk(&bytes), Some((100, 899)));
        let decoded = decode_wav(&bytes).unwrap();
        assert_eq!(decoded.loop_frames, Some((100, 900)));
        assert_eq!(decoded.sample, original);

        // RIFF size must cover the appended chunk
        let riff = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(riff, bytes.len() - 8);
    }

    #[test]
    fn test_loop_outside_sample_rejected() {
        let original = quantized_16bit();
        let result = encode_wav(&original, Some((10, 5000)));
        assert!(matches!(result, Err(SampleError::InvalidRange { .. })));
    }

    #[test]
    fn test_import_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let original = quantized_16bit();
        fs::write(&path, encode_wav(&original, Some((0, 1000))).unwrap()).unwrap();

        let imported = import_wav(&path).unwrap();
        assert_eq!(imported.sample, original);
        assert_eq!(imported.loop_frames, Some((0, 1000)));
    }

    #[test]
    fn test_import_nonexistent_file() {
        match import_wav(Path::new("/nonexistent/path/audio.wav")) {
            Err(SampleError::FileNotFound { path }) => {
                assert!(path.to_string_lossy().contains("nonexistent"));
            }
            other => panic!("Expected FileNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_import_rejects_flac() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("take.flac");
        fs::write(&path, b"fLaC").unwrap();
        assert!(matches!(
            import_wav(&path),
            Err(SampleError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_decode_garbage_is_invalid_audio() {
        let result = decode_wav(b"definitely not a wav file");
        assert!(matches!(
            result,
            Err(SampleError::InvalidAudio { .. }) | Err(SampleError::Io { .. })
        ));
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        let sample = Sample::new(vec![vec![1.5, -1.5]], 48000, PcmFormat::Int { bits: 16 }).unwrap();
        let decoded = decode_wav(&encode_wav(&sample, None).unwrap()).unwrap();
        assert_eq!(decoded.sample.channel(0), &[32767.0 / 32768.0, -1.0]);
    }
}
