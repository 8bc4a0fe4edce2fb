//! # Host Execution Context
//!
//! The host application's document may only be touched from its own thread.
//! Connection tasks therefore never hold the `Document`; they box a closure,
//! push it onto a bounded queue and await the reply. The single consumer of
//! that queue owns the [`HostState`] and runs one job at a time, which gives:
//!
//! - serialization: jobs never overlap, whatever connection submitted them
//! - visibility: a job observes every job queued before it
//!
//! ```text
//!  conn task ──┐                       ┌─────────────────────────┐
//!  conn task ──┼── HostHandle::run ──► │ HostQueue (host thread) │
//!  conn task ──┘    (mpsc + oneshot)   │   owns HostState        │
//!                                      └─────────────────────────┘
//! ```
//!
//! Jobs are never cancelled. If the submitter goes away while its job is
//! queued or running, the job still completes and the reply is dropped.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};
use wirebridge_core::{BridgeError, Document, NodeCatalog};

/// Everything a job may touch.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    pub document: Document,
    pub catalog: NodeCatalog,
}

impl HostState {
    /// Empty document over `catalog`.
    #[must_use]
    pub fn new(catalog: NodeCatalog) -> Self {
        Self {
            document: Document::new(),
            catalog,
        }
    }
}

type Job = Box<dyn FnOnce(&mut HostState) + Send + 'static>;

/// Create a connected handle/queue pair with room for `capacity` pending jobs.
#[must_use]
pub fn host_channel(state: HostState, capacity: usize) -> (HostHandle, HostQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (HostHandle { tx }, HostQueue { rx, state })
}

// =============================================================================
// SUBMITTER SIDE
// =============================================================================

/// Cloneable submitter used by connection tasks.
#[derive(Debug, Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<Job>,
}

impl HostHandle {
    /// Run `work` on the host and wait for its return value.
    ///
    /// Waits for queue capacity first. Fails with `Internal` only when the
    /// host loop has stopped or the job died before replying.
    pub async fn run<F, R>(&self, work: F) -> Result<R, BridgeError>
    where
        F: FnOnce(&mut HostState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |state| {
            // submitter may be gone; the work is done either way
            let _ = reply_tx.send(work(state));
        });

        self.tx
            .send(job)
            .await
            .map_err(|_| BridgeError::Internal("host loop is not running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| BridgeError::Internal("host job ended without a reply".to_string()))
    }

    /// True once the queue side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// =============================================================================
// HOST SIDE
// =============================================================================

/// The consuming end, owned by whoever plays the host thread.
#[derive(Debug)]
pub struct HostQueue {
    rx: mpsc::Receiver<Job>,
    state: HostState,
}

impl HostQueue {
    /// Block the current thread running jobs until every handle is dropped.
    ///
    /// Must not be called from inside an async runtime.
    pub fn run(mut self) -> HostState {
        tracing::debug!("host loop started");
        while let Some(job) = self.rx.blocking_recv() {
            self.execute(job);
        }
        tracing::debug!("host loop stopped");
        self.state
    }

    /// Run every job queued right now, without waiting. Returns how many ran.
    ///
    /// For hosts that pump the queue from their own idle callback.
    pub fn drain_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            self.execute(job);
            ran += 1;
        }
        ran
    }

    #[must_use]
    pub fn state(&self) -> &HostState {
        &self.state
    }

    fn execute(&mut self, job: Job) {
        let state = &mut self.state;
        if panic::catch_unwind(AssertUnwindSafe(|| job(state))).is_err() {
            tracing::error!("host job panicked; document kept as left by the job");
        }
    }
}

/// Run `queue` on a dedicated `wirebridge-host` thread.
pub fn spawn_host_thread(queue: HostQueue) -> Result<JoinHandle<HostState>, BridgeError> {
    thread::Builder::new()
        .name("wirebridge-host".to_string())
        .spawn(move || queue.run())
        .map_err(|e| BridgeError::Io(format!("cannot start host thread: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================
