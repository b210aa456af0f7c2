//! Directory boundaries for both networks.

pub mod local;
pub mod remote;

#[cfg(test)]
pub mod mock;

pub use local::{LocalDirectory, RoomSpec, RoomVisibility};
pub use remote::{RemoteDirectory, RemoteSession, ThreadMetadata};
