//! `Drive`: the gateway facade upper layers call

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use storage::{ApiObject, Buffer, BufferFactory, Cache};
use tracing::debug;

use drive_pool::AccountPool;

use crate::client::DriveClient;
use crate::error::{Error, Result};
use crate::poller::ChangePoller;
use crate::types::DriveFile;

/// Multi-account Drive access.
///
/// Cloning is cheap and clones share the account pool, so a rotation through
/// any clone is seen by all of them.
#[derive(Clone)]
pub struct Drive {
    pool: Arc<AccountPool>,
    api_base: Arc<str>,
    chunk_dir: PathBuf,
    buffers: Option<Arc<dyn BufferFactory>>,
}

impl Drive {
    pub fn new(pool: Arc<AccountPool>, api_base: &str, chunk_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            api_base: Arc::from(api_base),
            chunk_dir: chunk_dir.into(),
            buffers: None,
        }
    }

    /// Attach the chunk buffer collaborator used by `open`.
    pub fn with_buffer_factory(mut self, factory: Arc<dyn BufferFactory>) -> Self {
        self.buffers = Some(factory);
        self
    }

    pub fn pool(&self) -> &Arc<AccountPool> {
        &self.pool
    }

    pub fn chunk_dir(&self) -> &Path {
        &self.chunk_dir
    }

    /// Build a client for the currently active account.
    ///
    /// Fails if the active account's token cannot be produced (missing, or
    /// expired and refresh failed).
    pub async fn client(&self) -> Result<DriveClient> {
        let credential = self.pool.active().await?;
        debug!(account_id = %credential.account_id, index = credential.index, "built drive client");
        Ok(DriveClient::new(
            self.pool.http_client().clone(),
            &self.api_base,
            credential,
        ))
    }

    /// Switch to the next account; returns the new 1-based index.
    pub fn rotate(&self) -> usize {
        self.pool.rotate()
    }

    /// One object by id, with the zero-size lookup applied.
    pub async fn get_object(&self, id: &str) -> Result<ApiObject> {
        self.client().await?.get_object(id).await
    }

    /// All children of `parent_id`; partial once the first page arrived.
    pub async fn get_objects_by_parent(&self, parent_id: &str) -> Result<Vec<ApiObject>> {
        self.client().await?.get_objects_by_parent(parent_id).await
    }

    pub async fn get_file_by_name_and_parent(&self, name: &str, parent: &str) -> Result<DriveFile> {
        self.client()
            .await?
            .get_file_by_name_and_parent(name, parent)
            .await
    }

    pub async fn file_size(&self, id: &str) -> Result<u64> {
        self.client().await?.file_size(id).await
    }

    /// Open a buffered reader over `object`'s content.
    ///
    /// The buffer receives a transport bound to the account active right now;
    /// later rotations do not affect it.
    pub async fn open(&self, object: &ApiObject, chunk_size: u64) -> Result<Box<dyn Buffer>> {
        let factory = self.buffers.as_ref().ok_or(Error::BufferUnavailable)?;
        let client = self.client().await?;
        debug!(id = %object.id, account_id = client.account_id(), chunk_size, "opening buffer");
        let buffer = factory.create(
            client.transport(),
            object.clone(),
            chunk_size,
            &self.chunk_dir,
        )?;
        Ok(buffer)
    }

    /// Change poller that upserts into `cache` every `interval`.
    pub fn change_poller(&self, cache: Arc<dyn Cache>, interval: Duration) -> ChangePoller {
        ChangePoller::new(self.clone(), cache, interval)
    }
}
