//! Shared configuration, errors, and domain types for relay.
//!
//! Every other relay crate depends on this one. It carries no runtime
//! state: the session store, router, and visualization selector live in
//! their own crates and only exchange the types defined here.

pub mod config;
pub mod error;
pub mod types;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use types::*;
