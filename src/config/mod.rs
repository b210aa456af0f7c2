//! Configuration parsing, env overrides, and validation.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

pub use types::*;
pub use validate::load_and_validate;
