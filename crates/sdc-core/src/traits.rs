//! Storage abstraction for containers.
//!
//! The container service only talks to a [`ContainerStore`]; the host system
//! decides where containers actually live.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::SdcFile;

/// Persistence for containers.
///
/// `view_count` is the only field that changes after insertion, and only
/// through [`ContainerStore::record_view`].
#[async_trait]
pub trait ContainerStore: Send + Sync {
    /// Insert a new container. Fails with `Conflict` if the id exists.
    async fn insert(&self, container: &SdcFile) -> Result<()>;

    /// Fetch a container by id. Fails with `NotFound` if absent.
    async fn fetch(&self, id: Uuid) -> Result<SdcFile>;

    /// Increment `view_count` by one, if it still equals `expected_view_count`.
    ///
    /// Compare-and-swap: a concurrent reader that recorded a view first makes
    /// this fail with `Conflict` rather than losing an increment. Returns the
    /// updated container.
    async fn record_view(
        &self,
        id: Uuid,
        expected_view_count: u32,
        now: DateTime<Utc>,
    ) -> Result<SdcFile>;

    /// Delete a container. Fails with `NotFound` if absent.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// All stored container ids, sorted.
    async fn list_ids(&self) -> Result<Vec<Uuid>>;
}
