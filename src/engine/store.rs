//! Buffer Store
//!
//! Owns decoded samples. Samples are shared read-only (`Arc`), and an edit
//! takes an exclusive lease on its source so no two edits run against the
//! same sample at once. The lease is released when it is dropped.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::engine::io::import_wav;
use crate::engine::sample::{Sample, SampleId};
use crate::error::{Result, SampleError};

/// In-memory owner of every loaded or committed sample
#[derive(Debug, Default)]
pub struct BufferStore {
    samples: HashMap<SampleId, Arc<Sample>>,
    /// Loop markers found in the source file, keyed by sample
    loops: HashMap<SampleId, (usize, usize)>,
    leased: Arc<Mutex<HashSet<SampleId>>>,
}

/// Exclusive edit lease on one sample
///
/// While a lease is alive the sample can't be leased again or removed.
#[derive(Debug)]
pub struct EditLease {
    sample: Arc<Sample>,
    leased: Arc<Mutex<HashSet<SampleId>>>,
}

impl EditLease {
    pub fn sample(&self) -> &Sample {
        &self.sample
    }
}

impl Drop for EditLease {
    fn drop(&mut self) {
        self.leased.lock().remove(&self.sample.id());
    }
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a sample and return its id
    pub fn insert(&mut self, sample: Sample) -> SampleId {
        let id = sample.id();
        self.samples.insert(id, Arc::new(sample));
        id
    }

    /// Decode a WAV file into the store
    ///
    /// A `smpl` loop found in the file is remembered and available through
    /// [`BufferStore::source_loop`]; the editor uses it as the default loop
    /// region.
    pub fn load_file(&mut self, path: &Path) -> Result<SampleId> {
        let imported = import_wav(path)?;
        let id = self.insert(imported.sample);
        if let Some(frames) = imported.loop_frames {
            self.loops.insert(id, frames);
        }
        debug!("Stored sample {} from {}", id, path.display());
        Ok(id)
    }

    /// Shared read access to a sample
    pub fn get(&self, id: SampleId) -> Result<Arc<Sample>> {
        self.samples
            .get(&id)
            .cloned()
            .ok_or(SampleError::SampleNotFound { id })
    }

    /// Loop markers read from the sample's source file, if any
    pub fn source_loop(&self, id: SampleId) -> Option<(usize, usize)> {
        self.loops.get(&id).copied()
    }

    pub fn contains(&self, id: SampleId) -> bool {
        self.samples.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SampleId> + '_ {
        self.samples.keys().copied()
    }

    /// Check whether a sample currently has an edit in flight
    pub fn is_leased(&self, id: SampleId) -> bool {
        self.leased.lock().contains(&id)
    }

    /// Take the exclusive edit lease on a sample
    ///
    /// # Errors
    /// * `SampleNotFound` - unknown id
    /// * `SampleBusy` - another lease on the sample is still alive
    pub fn lease(&self, id: SampleId) -> Result<EditLease> {
        let sample = self.get(id)?;
        let mut leased = self.leased.lock();
        if !leased.insert(id) {
            return Err(SampleError::SampleBusy { id });
        }
        Ok(EditLease {
            sample,
            leased: Arc::clone(&self.leased),
        })
    }

    /// Remove a sample from the store
    ///
    /// Fails with `SampleBusy` while the sample is leased.
    pub fn remove(&mut self, id: SampleId) -> Result<Arc<Sample>> {
        if self.is_leased(id) {
            return Err(SampleError::SampleBusy { id });
        }
        self.loops.remove(&id);
        self.samples
            .remove(&id)
            .ok_or(SampleError::SampleNotFound { id })
    }
}
