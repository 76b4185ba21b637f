//! Background save worker
//!
//! One thread drains a job channel and saves results in submission order.
//! Every submission gets a `SaveHandle` carrying its own cancel token and
//! completion channel.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, warn};

use super::{save, CancelToken, SaveOptions, SaveReport};
use crate::engine::edit::EditResult;
use crate::error::{Result, SampleError};

struct SaveJob {
    result: EditResult,
    destination: PathBuf,
    options: SaveOptions,
    cancel: CancelToken,
    reply: Sender<Result<SaveReport>>,
}

/// Background thread that writes results to disk
///
/// Dropping the worker finishes every queued job, then joins the thread.
pub struct SaveWorker {
    jobs: Option<Sender<SaveJob>>,
    thread: Option<JoinHandle<()>>,
}

impl SaveWorker {
    pub fn spawn() -> Result<Self> {
        let (jobs, queue) = crossbeam_channel::unbounded::<SaveJob>();
        let thread = thread::Builder::new()
            .name("samplecraft-save".to_string())
            .spawn(move || run(queue))
            .map_err(|e| {
                warn!("Could not start save worker: {}", e);
                SampleError::SaveWorkerStopped
            })?;
        Ok(Self {
            jobs: Some(jobs),
            thread: Some(thread),
        })
    }

    /// Queue a save with a fresh cancel token
    pub fn submit(
        &self,
        result: EditResult,
        destination: &Path,
        options: SaveOptions,
    ) -> Result<SaveHandle> {
        self.submit_with_cancel(result, destination, options, CancelToken::new())
    }

    /// Queue a save that stops when `cancel` is set
    pub fn submit_with_cancel(
        &self,
        result: EditResult,
        destination: &Path,
        options: SaveOptions,
        cancel: CancelToken,
    ) -> Result<SaveHandle> {
        let jobs = self.jobs.as_ref().ok_or(SampleError::SaveWorkerStopped)?;
        let (reply, done) = crossbeam_channel::bounded(1);
        jobs.send(SaveJob {
            result,
            destination: destination.to_path_buf(),
            options,
            cancel: cancel.clone(),
            reply,
        })
        .map_err(|_| SampleError::SaveWorkerStopped)?;

        debug!("Queued save to {}", destination.display());
        Ok(SaveHandle {
            destination: destination.to_path_buf(),
            cancel,
            done,
        })
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        // Closing the channel ends the loop once the queue is drained
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Save worker thread panicked");
            }
        }
    }
}

fn run(queue: Receiver<SaveJob>) {
    for job in queue {
        let outcome = save(&job.result, &job.destination, &job.options, &job.cancel);
        if let Err(e) = &outcome {
            warn!("Save to {} failed: {}", job.destination.display(), e);
        }
        // The caller may have dropped its handle
        let _ = job.reply.send(outcome);
    }
    debug!("Save worker stopped");
}

/// Pending save submitted to a `SaveWorker`
#[derive(Debug)]
pub struct SaveHandle {
    destination: PathBuf,
    cancel: CancelToken,
    done: Receiver<Result<SaveReport>>,
}

impl SaveHandle {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Ask the worker to abandon this save
    ///
    /// Has no effect once the file has been renamed into place.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the save finishes
    pub fn wait(self) -> Result<SaveReport> {
        self.done
            .recv()
            .map_err(|_| SampleError::SaveWorkerStopped)?
    }

    /// Outcome if the save has finished, without blocking
    ///
    /// The outcome is handed out once; later calls report `SaveWorkerStopped`.
    pub fn try_result(&self) -> Option<Result<SaveReport>> {
        match self.done.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(SampleError::SaveWorkerStopped)),
        }
    }
}
