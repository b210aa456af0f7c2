//! Common types, errors, and messages shared across the application.

pub mod error;
pub mod messages;
pub mod types;

pub use error::{AppError, CallError, ConfigError, DirectoryError};
pub use messages::RemoteSend;
pub use types::{LocalEvent, Person, RemoteEvent, RemoteEventKind, Room, ThreadKind};
