//! Account pool for multi-account Drive access
//!
//! Holds the ordered per-account credential configs and a 1-based active
//! index. Every Drive client is built from `AccountPool::active()`, which
//! returns a consistent snapshot of the active account and its (refreshed if
//! needed) access token. `rotate()` moves to the next account cyclically.
//!
//! Account lifecycle:
//! 1. Startup authorizes all accounts → pool starts at account #1
//! 2. Callers build clients from `active()`; expiring tokens refresh inline
//!    and are written back to the token file
//! 3. A caller that sees a quota error (`quota::classify_status`) calls
//!    `rotate()`; later clients use the next account
//! 4. A background task refreshes tokens before they expire

pub mod error;
pub mod pool;
pub mod quota;
pub mod refresh;

pub use error::{Error, Result};
pub use pool::{AccountPool, ActiveCredential};
pub use quota::{classify_403, classify_status};
pub use refresh::spawn_refresh_task;
