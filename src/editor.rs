//! Sample Editor
//!
//! Host-facing entry point. The host creates a `SampleEditor`, loads or
//! inserts samples, runs edits and saves results. It owns the buffer store
//! and, once a background save is requested, the save worker; dropping the
//! editor finishes pending saves.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use crate::config::EditorConfig;
use crate::engine::edit::{apply_edit, EditRequest, EditResult};
use crate::engine::{BufferStore, Sample, SampleId};
use crate::error::Result;
use crate::save::{self, CancelToken, SaveHandle, SaveReport, SaveWorker};

pub struct SampleEditor {
    store: BufferStore,
    config: EditorConfig,
    worker: Option<SaveWorker>,
}

impl SampleEditor {
    /// Create an editor with a validated configuration
    pub fn new(config: EditorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: BufferStore::new(),
            config,
            worker: None,
        })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &BufferStore {
        &self.store
    }

    /// Decode a WAV file and keep it for editing
    pub fn load(&mut self, path: &Path) -> Result<SampleId> {
        let id = self.store.load_file(path)?;
        info!("Loaded {} as {}", path.display(), id);
        Ok(id)
    }

    /// Keep a host-decoded sample for editing
    pub fn insert(&mut self, sample: Sample) -> SampleId {
        self.store.insert(sample)
    }

    pub fn sample(&self, id: SampleId) -> Result<Arc<Sample>> {
        self.store.get(id)
    }

    pub fn remove(&mut self, id: SampleId) -> Result<Arc<Sample>> {
        self.store.remove(id)
    }

    /// Run an edit against a stored sample
    ///
    /// The source stays leased for the duration of the edit. A loop request
    /// without a region loops the markers found in the source file, when it
    /// had any; the provenance records that region.
    ///
    /// # Errors
    /// * `SampleNotFound` - unknown id
    /// * `SampleBusy` - another edit holds the sample
    /// * anything [`apply_edit`] returns
    pub fn edit(&self, id: SampleId, request: &EditRequest) -> Result<EditResult> {
        let lease = self.store.lease(id)?;
        match self.store.source_loop(id) {
            Some((start, end)) if request.loop_settings.is_some() && request.region.is_none() => {
                debug!("Looping {} over its file markers {}..{}", id, start, end);
                let request = request.clone().with_region(start, end);
                apply_edit(lease.sample(), &request, &self.config)
            }
            _ => apply_edit(lease.sample(), request, &self.config),
        }
    }

    /// Keep an edit's output in the store so it can be edited further
    pub fn commit(&mut self, result: EditResult) -> SampleId {
        self.store.insert(result.into_sample())
    }

    /// Save on the calling thread
    pub fn save(&self, result: &EditResult, destination: &Path) -> Result<SaveReport> {
        save::save(result, destination, &self.config.save, &CancelToken::new())
    }

    /// Save on the calling thread, stopping when `cancel` is set
    pub fn save_with_cancel(
        &self,
        result: &EditResult,
        destination: &Path,
        cancel: &CancelToken,
    ) -> Result<SaveReport> {
        save::save(result, destination, &self.config.save, cancel)
    }

    /// Hand a result to the background save worker
    pub fn save_in_background(
        &mut self,
        result: EditResult,
        destination: &Path,
    ) -> Result<SaveHandle> {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => SaveWorker::spawn()?,
        };
        let handle = worker.submit(result, destination, self.config.save);
        self.worker = Some(worker);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::encode_wav;
    use crate::engine::sample::sine_wave;
    use crate::engine::{PcmFormat, RegionSpec};
    use crate::error::SampleError;
    use std::fs;
    use tempfile::tempdir;

    fn editor_with_tone() -> (SampleEditor, SampleId) {
        let mut editor = SampleEditor::new(EditorConfig::default()).unwrap();
        let tone = sine_wave(440.0, 0.5, 48000, 0.5, PcmFormat::Float32).unwrap();
        let id = editor.insert(tone);
        (editor, id)
    }

    #[test]
    fn test_edit_leaves_source_untouched() {
        let (editor, id) = editor_with_tone();
        let before = editor.sample(id).unwrap();

        let result = editor
            .edit(id, &EditRequest::new().with_region(0, 1000).with_semitones(5.0))
            .unwrap();
        assert_ne!(result.sample().frames(), before.frames());
        assert_eq!(editor.sample(id).unwrap(), before);
        assert!(!editor.store().is_leased(id));
    }

    #[test]
    fn test_concurrent_edit_is_busy() {
        let (editor, id) = editor_with_tone();
        let _held = editor.store().lease(id).unwrap();
        assert!(matches!(
            editor.edit(id, &EditRequest::new()),
            Err(SampleError::SampleBusy { .. })
        ));
    }

    #[test]
    fn test_commit_and_chain_edits() {
        let (mut editor, id) = editor_with_tone();
        let first = editor.edit(id, &EditRequest::new().with_region(0, 12000)).unwrap();
        let trimmed = editor.commit(first);
        assert_eq!(editor.store().len(), 2);

        let second = editor
            .edit(trimmed, &EditRequest::new().with_region(0, 6000))
            .unwrap();
        assert_eq!(second.sample().frames(), 6000);
        assert_eq!(second.provenance().source_id, trimmed);
    }

    #[test]
    fn test_unknown_sample() {
        let (editor, _) = editor_with_tone();
        assert!(matches!(
            editor.edit(SampleId::new(), &EditRequest::new()),
            Err(SampleError::SampleNotFound { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = EditorConfig::default();
        config.stretch.hop = 0;
        assert!(matches!(
            SampleEditor::new(config),
            Err(SampleError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_background_save() {
        let dir = tempdir().unwrap();
        let (mut editor, id) = editor_with_tone();
        let request = EditRequest::new().with_region(4000, 20000).with_loop(None);
        let result = editor.edit(id, &request).unwrap();
        let dest = dir.path().join("bg.wav");

        let report = editor.save_in_background(result, &dest).unwrap().wait().unwrap();
        assert_eq!(report.path, dest);

        let loaded = editor.load(&dest).unwrap();
        assert_eq!(editor.store().source_loop(loaded), Some((0, 16000)));
    }

    #[test]
    fn test_file_loop_markers_are_the_default_loop_region() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("marked.wav");
        let tone = sine_wave(440.0, 0.5, 48000, 0.5, PcmFormat::Float32).unwrap();
        fs::write(&path, encode_wav(&tone, Some((2000, 20000))).unwrap()).unwrap();

        let mut editor = SampleEditor::new(EditorConfig::default()).unwrap();
        let id = editor.load(&path).unwrap();

        let looped = editor.edit(id, &EditRequest::new().with_loop(Some(400))).unwrap();
        assert_eq!(looped.sample().frames(), 18000);
        assert_eq!(
            looped.provenance().request.region,
            Some(RegionSpec::Frames { start: 2000, end: 20000 })
        );

        // An explicit region wins, and plain edits ignore the markers
        let explicit = editor
            .edit(id, &EditRequest::new().with_region(1000, 5000).with_loop(Some(400)))
            .unwrap();
        assert_eq!(explicit.sample().frames(), 4000);
        let plain = editor.edit(id, &EditRequest::new()).unwrap();
        assert_eq!(plain.sample().frames(), 24000);
    }
}
