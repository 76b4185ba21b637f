//! Editor configuration
//!
//! Defaults for every edit a `SampleEditor` runs. Loaded from JSON; any field
//! left out of the file keeps its default. Values on an individual
//! `EditRequest` take precedence over these.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::pitch::RepitchMode;
use crate::dsp::region::{DEFAULT_CROSSFADE_DIVISOR, MAX_DEFAULT_CROSSFADE};
use crate::dsp::resample::ResamplerConfig;
use crate::dsp::stretch::StretchConfig;
use crate::error::{Result, SampleError};
use crate::save::SaveOptions;

/// How loop crossfades are sized when a request doesn't give a length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeDefaults {
    /// Crossfade is `region_len / divisor`
    pub divisor: usize,
    /// Upper bound in frames
    pub max_frames: usize,
}

impl Default for CrossfadeDefaults {
    fn default() -> Self {
        Self {
            divisor: DEFAULT_CROSSFADE_DIVISOR,
            max_frames: MAX_DEFAULT_CROSSFADE,
        }
    }
}

impl CrossfadeDefaults {
    pub fn frames_for(&self, region_len: usize) -> usize {
        (region_len / self.divisor.max(1)).min(self.max_frames)
    }
}

/// Engine-wide defaults
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub resampler: ResamplerConfig,
    pub stretch: StretchConfig,
    /// Used when a request doesn't pick a repitch mode
    pub repitch_mode: RepitchMode,
    /// Used when a request doesn't say whether to dither
    pub dither: bool,
    pub crossfade: CrossfadeDefaults,
    pub save: SaveOptions,
}

impl EditorConfig {
    /// Load a configuration file
    ///
    /// # Errors
    /// * `FileNotFound` - no file at `path`
    /// * `Serialization` - the file isn't valid JSON for this structure
    /// * `InvalidConfig` - a value is out of range
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SampleError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| SampleError::io(path, e))?;
        let config = Self::from_json(&content)?;
        debug!("Loaded editor config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let config: EditorConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.resampler.validate()?;
        self.stretch.validate()?;
        self.save.validate()?;
        if self.crossfade.divisor == 0 {
            return Err(SampleError::InvalidConfig {
                reason: "crossfade divisor must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
