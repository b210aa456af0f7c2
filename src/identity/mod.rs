//! Identity mapping between the two networks: naming scheme, cache,
//! and resolution.

pub mod alias;
pub mod resolver;
pub mod store;

pub use alias::IdScheme;
pub use resolver::IdentityResolver;
pub use store::{IdentityStore, StoreStats};
