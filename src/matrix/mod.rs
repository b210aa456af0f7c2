//! Matrix-side components: homeserver client, invite acceptance, and
//! the protocol room.

pub mod acceptor;
pub mod client;
pub mod protocol_room;

pub use acceptor::InviteAcceptor;
pub use client::MatrixDirectory;
pub use protocol_room::{ensure_protocol_room, forward_to_room, RoomLogger};
