//! Background render tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use kiln_core::{KilnError, KilnResult};

/// Cooperative cancellation flag shared by a task and its workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A render running on its own thread. The thread reports its duration
/// once all of its work, completion callback included, is done.
#[derive(Debug)]
pub struct RenderTask {
    cancel: CancelToken,
    done: Receiver<Duration>,
    duration: Option<Duration>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RenderTask {
    pub fn spawn<F>(name: String, work: F) -> KilnResult<Self>
    where
        F: FnOnce(&CancelToken) -> Duration + Send + 'static,
    {
        let cancel = CancelToken::default();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let duration = work(&token);
                // The receiver may already be gone if the frame was dropped
                let _ = tx.send(duration);
            })
            .map_err(|e| KilnError::TaskSpawn(e.to_string()))?;
        Ok(Self { cancel, done: rx, duration: None, handle: Some(handle) })
    }

    /// Ask the workers to skip the tiles they have not started.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Poll for completion without blocking.
    pub fn is_ready(&mut self) -> bool {
        if self.duration.is_some() {
            return true;
        }
        match self.done.try_recv() {
            Ok(duration) => {
                self.finish(duration);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                // The thread died without reporting
                self.finish(Duration::ZERO);
                true
            }
        }
    }

    /// Block until the task is done and return how long it ran.
    pub fn wait(&mut self) -> Duration {
        if let Some(duration) = self.duration {
            return duration;
        }
        let duration = self.done.recv().unwrap_or(Duration::ZERO);
        self.finish(duration);
        duration
    }

    fn finish(&mut self, duration: Duration) {
        self.duration = Some(duration);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("render task panicked");
            }
        }
    }
}

impl Drop for RenderTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel();
            self.wait();
        }
    }
}
