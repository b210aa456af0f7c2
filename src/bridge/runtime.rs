//! Cross-runtime call bridge.
//!
//! Lets the blocking remote-network worker submit work to the Matrix
//! event loop and wait for the result. The loop is a current-thread
//! tokio runtime; blocking on it from its own thread is a structural
//! deadlock, so same-thread callers are detected and degraded to
//! fire-and-forget scheduling instead.

use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::common::error::{CallError, CallResult};

/// Default bound on blocking calls. Indefinite blocking is a latent
/// defect, not a feature.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a cross-runtime invocation.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The task ran to completion and this is its output.
    Completed(T),
    /// The call was issued from the loop thread itself; the task was
    /// scheduled for a later turn and no result is available.
    Deferred,
}

impl<T> Outcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Deferred => None,
        }
    }
}

/// Adapter between the worker thread and the event loop.
#[derive(Debug, Clone)]
pub struct CrossRuntimeBridge {
    handle: Handle,
    loop_thread: ThreadId,
    shutdown_rx: watch::Receiver<bool>,
    default_timeout: Duration,
}

impl CrossRuntimeBridge {
    /// `loop_thread` is the thread that drives the runtime behind
    /// `handle`; capture it before `block_on` takes over.
    pub fn new(handle: Handle, loop_thread: ThreadId, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            handle,
            loop_thread,
            shutdown_rx,
            default_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn is_loop_thread(&self) -> bool {
        thread::current().id() == self.loop_thread
    }

    /// Run a task on the event loop and wait for its result, bounded
    /// by the default timeout.
    pub fn invoke<F, T>(&self, task: F) -> CallResult<Outcome<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.invoke_with_timeout(task, self.default_timeout)
    }

    /// Run a task on the event loop and wait for its result.
    ///
    /// From a foreign thread: blocks until the task completes, the
    /// timeout elapses (`Timeout`), or the loop goes away
    /// (`ShuttingDown`). From the loop thread: never blocks — the task
    /// is scheduled for a later turn of the same loop and `Deferred`
    /// is returned immediately.
    pub fn invoke_with_timeout<F, T>(&self, task: F, timeout: Duration) -> CallResult<Outcome<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if *self.shutdown_rx.borrow() {
            return Err(CallError::ShuttingDown);
        }

        if self.is_loop_thread() {
            // Waiting here would block the only thread that can run
            // the task.
            warn!("cross-runtime call from the loop thread; deferring without a result");
            self.handle.spawn(async move {
                let _ = task.await;
            });
            return Ok(Outcome::Deferred);
        }

        // Rendezvous lives outside the runtime so the deadline holds
        // even if the loop is wedged.
        let (tx, rx) = mpsc::sync_channel(1);
        self.handle.spawn(async move {
            // The caller may have given up already; nothing to do then.
            let _ = tx.send(task.await);
        });

        match rx.recv_timeout(timeout) {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(RecvTimeoutError::Timeout) => {
                debug!(?timeout, "cross-runtime call timed out");
                Err(CallError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(CallError::ShuttingDown),
        }
    }
}
