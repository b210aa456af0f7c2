//! Remote-network worker loop.
//!
//! One dedicated thread per bridged account: blocking long-poll for
//! inbound events, outbound drain between polls, exponential backoff
//! on poll failure, cooperative stop checked between blocking calls.

use std::sync::Arc;
use std::time::Duration;

use backon::BackoffBuilder;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::bridge::router::{Disposition, MessageRouter};
use crate::bridge::runtime::{CrossRuntimeBridge, Outcome};
use crate::common::error::CallError;
use crate::common::messages::RemoteSend;
use crate::common::types::RemoteEvent;
use crate::directory::remote::RemoteSession;

/// How often the blocking backoff sleep re-checks the shutdown flag.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Exponential backoff for poll failures. 1s initial, 60s max, with
/// jitter, unlimited retries; reset after any successful poll.
fn poll_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(60))
        .with_jitter()
        .without_max_times()
        .build()
}

pub struct MessengerListener {
    session: Box<dyn RemoteSession>,
    bridge: Arc<CrossRuntimeBridge>,
    router: Arc<MessageRouter>,
    outbound_rx: mpsc::UnboundedReceiver<RemoteSend>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MessengerListener {
    pub fn new(
        session: Box<dyn RemoteSession>,
        bridge: Arc<CrossRuntimeBridge>,
        router: Arc<MessageRouter>,
        outbound_rx: mpsc::UnboundedReceiver<RemoteSend>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session,
            bridge,
            router,
            outbound_rx,
            shutdown_rx,
        }
    }

    /// Blocking receive loop. Runs on its own thread until shutdown.
    pub fn run(mut self) {
        info!("remote listener started");
        let mut backoff = poll_backoff();

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            self.drain_outbound();

            match self.session.poll_events() {
                Ok(events) => {
                    backoff = poll_backoff();
                    for event in events {
                        if !self.dispatch(event) {
                            info!("remote listener stopping mid-batch");
                            return;
                        }
                    }
                }
                Err(err) => {
                    let delay = backoff.next().unwrap_or(Duration::from_secs(60));
                    warn!(
                        error = %err,
                        delay_secs = delay.as_secs_f64(),
                        "poll failed; backing off"
                    );
                    if self.wait_for(delay) {
                        break;
                    }
                }
            }
        }
        info!("remote listener stopped");
    }

    /// Hand one inbound event to the router on the event loop.
    ///
    /// Returns `false` when the loop is shutting down.
    fn dispatch(&self, event: RemoteEvent) -> bool {
        let author = event.author_id.clone();
        let thread = event.thread_id.clone();
        let router = self.router.clone();

        match self
            .bridge
            .invoke(async move { router.handle_remote_event(event).await })
        {
            Ok(Outcome::Completed(Disposition::Delivered)) => true,
            Ok(Outcome::Completed(Disposition::Dropped(reason))) => {
                debug!(author = %author, thread = %thread, ?reason, "remote event dropped");
                true
            }
            Ok(Outcome::Completed(Disposition::Failed(_))) => {
                // Logged with full context on the loop side; dropped,
                // not retried.
                true
            }
            Ok(Outcome::Deferred) => {
                // Unreachable from the worker thread, but harmless.
                true
            }
            Err(CallError::Timeout) => {
                warn!(author = %author, thread = %thread, "delivery timed out; dropping event");
                true
            }
            Err(CallError::ShuttingDown) => false,
        }
    }

    /// Deliver queued outbound messages on this thread.
    fn drain_outbound(&mut self) {
        while let Ok(send) = self.outbound_rx.try_recv() {
            debug!(thread = %send.thread_id, "delivering outbound message");
            if let Err(err) = self.session.send_text(&send.thread_id, &send.text) {
                error!(
                    thread = %send.thread_id,
                    error = %err,
                    "failed to deliver outbound message"
                );
            }
        }
    }

    /// Sleep in slices so shutdown is noticed promptly.
    ///
    /// Returns `true` if shutdown was requested during the wait.
    fn wait_for(&self, delay: Duration) -> bool {
        let mut remaining = delay;
        while remaining > Duration::ZERO {
            if *self.shutdown_rx.borrow() {
                return true;
            }
            let slice = remaining.min(STOP_CHECK_INTERVAL);
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
        *self.shutdown_rx.borrow()
    }
}
