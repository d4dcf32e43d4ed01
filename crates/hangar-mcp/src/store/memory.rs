//! In-memory store implementing both persistence seams under one lock.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{DeploymentStore, ResultPersister, StoreResult};
use crate::error::StoreError;
use crate::mcp::CapabilityDocument;
use crate::model::{DeploymentDetails, DeploymentId, DeploymentRecord, ProxyCommand, Stage};

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<DeploymentId, DeploymentRecord>,
    by_key: HashMap<(String, String), DeploymentId>,
    claimed: HashSet<DeploymentId>,
}

/// Process-local store. Data is lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> StoreResult<usize> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.records.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn ensure(
        &self,
        owner: &str,
        title: &str,
        details: DeploymentDetails,
        image: &str,
        command: ProxyCommand,
    ) -> StoreResult<(DeploymentRecord, bool)> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let key = (owner.to_string(), title.to_string());

        if let Some(id) = tables.by_key.get(&key).copied()
            && let Some(record) = tables.records.get_mut(&id)
        {
            record.refresh(details, image, command);
            return Ok((record.clone(), false));
        }

        let record = DeploymentRecord::pending(owner, title, details, image, command);
        tables.by_key.insert(key, record.id);
        tables.records.insert(record.id, record.clone());
        Ok((record, true))
    }

    async fn get(&self, id: DeploymentId) -> StoreResult<DeploymentRecord> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        tables.records.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn claim(&self, id: DeploymentId) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let stage = tables.records.get(&id).ok_or(StoreError::NotFound(id))?.stage;
        if tables.claimed.contains(&id) {
            return Err(StoreError::AlreadyClaimed(id));
        }
        if stage != Stage::Pending {
            return Err(StoreError::InvalidTransition {
                id,
                from: stage,
                to: Stage::FunctionCreated,
            });
        }
        tables.claimed.insert(id);
        Ok(())
    }

    async fn advance(
        &self,
        id: DeploymentId,
        stage: Stage,
        endpoint: Option<&str>,
    ) -> StoreResult<DeploymentRecord> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let record = tables.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !record.stage.can_advance_to(stage) {
            return Err(StoreError::InvalidTransition {
                id,
                from: record.stage,
                to: stage,
            });
        }
        record.stage = stage;
        if let Some(endpoint) = endpoint {
            record.endpoint = Some(endpoint.to_string());
        }
        Ok(record.clone())
    }

    async fn list_public(&self) -> StoreResult<Vec<DeploymentRecord>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut public: Vec<_> = tables
            .records
            .values()
            .filter(|r| r.is_public && r.stage == Stage::Published)
            .cloned()
            .collect();
        public.sort_by(|a, b| (&a.owner, &a.title).cmp(&(&b.owner, &b.title)));
        Ok(public)
    }
}

#[async_trait]
impl ResultPersister for MemoryStore {
    async fn upsert(
        &self,
        id: DeploymentId,
        endpoint: &str,
        doc: &CapabilityDocument,
    ) -> StoreResult<u64> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(record) = tables.records.get_mut(&id) else {
            return Ok(0);
        };
        record.endpoint = Some(endpoint.to_string());
        record.capabilities = Some(doc.capabilities.clone());
        record.tools = doc.tools.clone();
        record.prompts = doc.prompts.clone();
        record.resources = doc.resources.clone();
        record.is_public = true;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::model::{LaunchSpec, PipelineStep};
    use serde_json::json;
    use std::sync::Arc;

    fn command() -> ProxyCommand {
        compile(&LaunchSpec::new("uvx", vec!["mcp-server-fetch".into()]))
    }

    fn details(description: &str) -> DeploymentDetails {
        DeploymentDetails {
            description: Some(description.to_string()),
            source: Some("https://git.example/fetch".to_string()),
        }
    }

    #[tokio::test]
    async fn ensure_is_find_or_create_by_key() {
        let store = MemoryStore::new();
        let (first, created) = store
            .ensure("alice", "fetch", details("v1"), "img", command())
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.stage, Stage::Pending);

        let (second, created) = store
            .ensure("alice", "fetch", details("v2"), "img", command())
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.description.as_deref(), Some("v2"));

        let (other, created) = store
            .ensure("bob", "fetch", details("v1"), "img", command())
            .await
            .unwrap();
        assert!(created);
        assert_ne!(other.id, first.id);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_ensures_create_one_record() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .ensure("alice", "fetch", details("v"), "img", command())
                    .await
                    .unwrap()
            }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().1 {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn advance_enforces_stage_order() {
        let store = MemoryStore::new();
        let (rec, _) = store
            .ensure("alice", "fetch", details("v"), "img", command())
            .await
            .unwrap();

        let err = store
            .advance(rec.id, Stage::TriggerCreated, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        store.advance(rec.id, Stage::FunctionCreated, None).await.unwrap();
        let rec = store
            .advance(rec.id, Stage::TriggerCreated, Some("https://fn.example"))
            .await
            .unwrap();
        assert_eq!(rec.endpoint.as_deref(), Some("https://fn.example"));

        let failed = Stage::Failed {
            step: PipelineStep::Discovery,
        };
        store.advance(rec.id, failed, None).await.unwrap();
        assert!(
            store
                .advance(rec.id, Stage::EndpointVerified, None)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn claim_succeeds_once() {
        let store = Arc::new(MemoryStore::new());
        let (rec, _) = store
            .ensure("alice", "fetch", details("v"), "img", command())
            .await
            .unwrap();
        let id = rec.id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.claim(id).await }));
        }
        let mut won = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => won += 1,
                Err(e) => assert!(matches!(e, StoreError::AlreadyClaimed(other) if other == id)),
            }
        }
        assert_eq!(won, 1);
        assert!(matches!(
            store.claim(DeploymentId::new()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn claim_rejects_records_past_pending() {
        let store = MemoryStore::new();
        let (rec, _) = store
            .ensure("alice", "fetch", details("v"), "img", command())
            .await
            .unwrap();
        store.advance(rec.id, Stage::FunctionCreated, None).await.unwrap();
        let err = store.claim(rec.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: Stage::FunctionCreated,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn upsert_publishes_capabilities() {
        let store = MemoryStore::new();
        let (rec, _) = store
            .ensure("alice", "fetch", details("v"), "img", command())
            .await
            .unwrap();
        let mut doc = CapabilityDocument::new(json!({"serverInfo": {"name": "fetch"}}));
        doc.tools = Some(json!({"tools": []}));

        assert_eq!(store.upsert(rec.id, "https://fn.example", &doc).await.unwrap(), 1);
        let stored = store.get(rec.id).await.unwrap();
        assert!(stored.is_public);
        assert_eq!(stored.endpoint.as_deref(), Some("https://fn.example"));
        assert_eq!(stored.tools, Some(json!({"tools": []})));
        assert!(stored.prompts.is_none());

        assert_eq!(
            store
                .upsert(DeploymentId::new(), "https://x", &doc)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn list_public_only_returns_published() {
        let store = MemoryStore::new();
        let (rec, _) = store
            .ensure("alice", "fetch", details("v"), "img", command())
            .await
            .unwrap();
        store
            .ensure("bob", "time", details("v"), "img", command())
            .await
            .unwrap();
        assert!(store.list_public().await.unwrap().is_empty());

        for stage in [
            Stage::FunctionCreated,
            Stage::TriggerCreated,
            Stage::EndpointVerified,
        ] {
            store.advance(rec.id, stage, None).await.unwrap();
        }
        let doc = CapabilityDocument::new(json!({}));
        store.upsert(rec.id, "https://fn.example", &doc).await.unwrap();
        store.advance(rec.id, Stage::Published, None).await.unwrap();

        let public = store.list_public().await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].title, "fetch");
    }
}
