//! Bridge channel management.
//!
//! Groups the channels wiring the event loop, the remote-network
//! worker, and the boundary producers, instead of passing tuples
//! around.

use tokio::sync::{mpsc, watch};

use crate::common::messages::RemoteSend;
use crate::common::types::LocalEvent;

/// Channels consumed on the event loop.
pub struct LoopChannels {
    /// Inbound Matrix events (fed by the appservice transport).
    pub local_rx: mpsc::UnboundedReceiver<LocalEvent>,
    /// Lines destined for the protocol room.
    pub proto_rx: mpsc::UnboundedReceiver<String>,
    /// Shutdown signal.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels consumed on the worker thread.
pub struct WorkerChannels {
    /// Outbound messages for the remote network.
    pub outbound_rx: mpsc::UnboundedReceiver<RemoteSend>,
    /// Shutdown signal, checked between blocking polls.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Producer handles held by the boundaries.
#[derive(Clone)]
pub struct IntakeHandles {
    /// Fed by the appservice transport with inbound Matrix events.
    pub local_tx: mpsc::UnboundedSender<LocalEvent>,
    /// Fed by anything that wants a note in the protocol room.
    pub proto_tx: mpsc::UnboundedSender<String>,
    /// Fed by the router with outbound remote messages.
    pub outbound_tx: mpsc::UnboundedSender<RemoteSend>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
}

/// Bundle of all channels created by the bridge.
pub struct ChannelBundle {
    pub loop_side: LoopChannels,
    pub worker: WorkerChannels,
    pub intake: IntakeHandles,
    pub control: ControlChannels,
}

impl ChannelBundle {
    /// Create a new set of bridge channels.
    pub fn new() -> Self {
        let (local_tx, local_rx) = mpsc::unbounded_channel();
        let (proto_tx, proto_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            loop_side: LoopChannels {
                local_rx,
                proto_rx,
                shutdown_rx: shutdown_rx.clone(),
            },
            worker: WorkerChannels {
                outbound_rx,
                shutdown_rx,
            },
            intake: IntakeHandles {
                local_tx,
                proto_tx,
                outbound_tx,
            },
            control: ControlChannels { shutdown_tx },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
