//! Shared types for the Drive gateway workspace
//!
//! Holds the configuration error type used by the service binary and the
//! `Secret` wrapper used wherever client secrets or bearer tokens travel
//! through the crates.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
