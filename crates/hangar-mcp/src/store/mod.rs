//! Deployment persistence seams.
//!
//! `DeploymentStore` owns the record lifecycle and stage machine;
//! `ResultPersister` writes discovery results. Both are keyed by
//! [`DeploymentId`] and unique by `(owner, title)`.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::mcp::CapabilityDocument;
use crate::model::{DeploymentDetails, DeploymentId, DeploymentRecord, ProxyCommand, Stage};

pub type StoreResult<T> = Result<T, StoreError>;

/// Record lifecycle storage.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Atomic find-or-create by `(owner, title)`.
    ///
    /// An existing record only has its descriptive fields refreshed. Returns
    /// the stored record and whether it was created by this call.
    async fn ensure(
        &self,
        owner: &str,
        title: &str,
        details: DeploymentDetails,
        image: &str,
        command: ProxyCommand,
    ) -> StoreResult<(DeploymentRecord, bool)>;

    async fn get(&self, id: DeploymentId) -> StoreResult<DeploymentRecord>;

    /// Take exclusive ownership of a `Pending` record's provisioning job.
    ///
    /// Check and claim happen atomically and succeed once per record. Later
    /// claims fail with `AlreadyClaimed`; a record that left `Pending`
    /// without a claim fails with `InvalidTransition`.
    async fn claim(&self, id: DeploymentId) -> StoreResult<()>;

    /// Move a record to `stage`, optionally storing its endpoint.
    ///
    /// Fails with `InvalidTransition` unless the stage machine allows it.
    async fn advance(
        &self,
        id: DeploymentId,
        stage: Stage,
        endpoint: Option<&str>,
    ) -> StoreResult<DeploymentRecord>;

    /// Published records, for the public registry listing.
    async fn list_public(&self) -> StoreResult<Vec<DeploymentRecord>>;
}

/// Writes the outcome of a successful discovery.
#[async_trait]
pub trait ResultPersister: Send + Sync {
    /// Store endpoint and capability document, and mark the record public.
    /// Returns the number of affected records.
    async fn upsert(
        &self,
        id: DeploymentId,
        endpoint: &str,
        doc: &CapabilityDocument,
    ) -> StoreResult<u64>;
}
