//! Drive API v3 gateway
//!
//! `Drive` is the entry point for upper layers. Each call builds a
//! `DriveClient` from the account pool's active credential and runs metadata
//! fetches, paginated queries or download size lookups against the Drive API.
//! `ChangePoller` runs beside it, upserting recently modified files into the
//! external cache on a fixed period.
//!
//! Error policy per operation:
//! - `get_object`, `get_file_by_name_and_parent`, `file_size`: propagated
//! - `get_objects_by_parent`: partial success once the first page arrived
//! - change poll ticks: partial, a failed page ends the tick
//! - zero-size follow-up in `get_object`: swallowed, reported size kept

pub mod client;
pub mod error;
pub mod gateway;
pub mod listing;
pub mod mapper;
pub mod poller;
pub mod query;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{DRIVE_API_BASE, DriveClient};
pub use error::{Error, Result};
pub use gateway::Drive;
pub use listing::PartialResult;
pub use mapper::{FOLDER_MIME_TYPE, map_file};
pub use poller::{ChangePoller, MIN_POLL_INTERVAL, PollerSnapshot, TickReport};
pub use types::{DriveFile, FileList};
