//! Bridge core: cross-runtime calls, routing, and loop-side wiring.

pub mod channels;
pub mod commands;
pub mod filter;
pub mod orchestrator;
pub mod router;
pub mod runtime;

pub use channels::ChannelBundle;
pub use filter::NamespaceMatcher;
pub use orchestrator::Orchestrator;
pub use router::{Disposition, DropReason, MessageRouter};
pub use runtime::{CrossRuntimeBridge, Outcome};
