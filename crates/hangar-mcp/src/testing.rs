//! In-process fakes for the pipeline's remote collaborators.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use crate::compiler::RuntimeImages;
use crate::error::{ProvisionError, RequestError, SessionError};
use crate::mcp::{
    CapabilityDiscoverer, CapabilityFlags, CapabilityKind, CapabilitySession, InitializeOutcome,
    McpConnector, RetryPolicy,
};
use crate::orchestrator::{DeployJob, DeploymentOrchestrator, PipelineSettings};
use crate::provision::{FunctionInfo, HttpTrigger, ProvisionRequest, ProvisioningApi, TriggerInfo};
use crate::queue::JobSubmitter;
use crate::store::MemoryStore;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Scripted server behaviour for [`FakeConnector`].
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeServer {
    flags: CapabilityFlags,
    failing: HashSet<CapabilityKind>,
    handshake_failures: u32,
}

impl FakeServer {
    pub(crate) fn new(flags: CapabilityFlags) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }

    /// Make the list request for `kind` fail on every session.
    pub(crate) fn failing(mut self, kind: CapabilityKind) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Time out the first `n` handshakes.
    pub(crate) fn handshake_failures(mut self, n: u32) -> Self {
        self.handshake_failures = n;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU32,
    opened: AtomicU32,
    closed: AtomicU32,
    handshakes: AtomicU32,
    list_calls: Mutex<Vec<CapabilityKind>>,
    endpoints: Mutex<Vec<String>>,
}

pub(crate) struct FakeConnector {
    server: FakeServer,
    refuse_first: u32,
    counters: Arc<Counters>,
}

impl FakeConnector {
    pub(crate) fn new(server: FakeServer) -> Self {
        Self {
            server,
            refuse_first: 0,
            counters: Arc::default(),
        }
    }

    /// Refuse the first `n` connection attempts.
    pub(crate) fn refuse_first(mut self, n: u32) -> Self {
        self.refuse_first = n;
        self
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.counters.attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn sessions_opened(&self) -> u32 {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn sessions_closed(&self) -> u32 {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn list_calls(&self) -> Vec<CapabilityKind> {
        lock(&self.counters.list_calls).clone()
    }

    /// Distinct endpoints connected to, in first-seen order.
    pub(crate) fn endpoints(&self) -> Vec<String> {
        lock(&self.counters.endpoints).clone()
    }
}

#[async_trait]
impl McpConnector for FakeConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn CapabilitySession>, SessionError> {
        let attempt = self.counters.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut endpoints = lock(&self.counters.endpoints);
            if !endpoints.iter().any(|e| e == endpoint) {
                endpoints.push(endpoint.to_string());
            }
        }
        if attempt <= self.refuse_first {
            return Err(SessionError::Connect(format!("connection refused: {}", endpoint)));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            server: self.server.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct FakeSession {
    server: FakeServer,
    counters: Arc<Counters>,
}

#[async_trait]
impl CapabilitySession for FakeSession {
    async fn initialize(&mut self) -> Result<InitializeOutcome, SessionError> {
        let n = self.counters.handshakes.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.server.handshake_failures {
            return Err(SessionError::HandshakeTimeout(Duration::from_secs(10)));
        }
        Ok(InitializeOutcome {
            flags: self.server.flags,
            server_info: json!({
                "protocolVersion": "2025-06-18",
                "serverInfo": {"name": "fake", "version": "1.0.0"},
                "capabilities": {}
            }),
        })
    }

    async fn list(&mut self, kind: CapabilityKind) -> Result<JsonValue, SessionError> {
        lock(&self.counters.list_calls).push(kind);
        if self.server.failing.contains(&kind) {
            return Err(SessionError::Request {
                kind,
                message: "internal error".into(),
            });
        }
        let field = match kind {
            CapabilityKind::Tools => "tools",
            CapabilityKind::Prompts => "prompts",
            CapabilityKind::Resources => "resources",
        };
        let mut body = serde_json::Map::new();
        body.insert(field.to_string(), json!([]));
        Ok(JsonValue::Object(body))
    }

    async fn close(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Provisioning API recording every call as `"<op>:<function>"`.
#[derive(Debug, Default)]
pub(crate) struct FakeProvisioningApi {
    url: String,
    fail_function: bool,
    fail_trigger: bool,
    fail_delete: bool,
    yielding: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeProvisioningApi {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn failing_function(mut self) -> Self {
        self.fail_function = true;
        self
    }

    pub(crate) fn failing_trigger(mut self) -> Self {
        self.fail_trigger = true;
        self
    }

    pub(crate) fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Yield to the scheduler before each create call, so concurrent jobs
    /// interleave there.
    pub(crate) fn yielding(mut self) -> Self {
        self.yielding = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, op: &str, name: &str, fail: bool) -> Result<(), ProvisionError> {
        lock(&self.calls).push(format!("{}:{}", op, name));
        if fail {
            return Err(ProvisionError::Status {
                status: 500,
                body: format!("{} rejected", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProvisioningApi for FakeProvisioningApi {
    async fn create_function(&self, req: &ProvisionRequest) -> Result<FunctionInfo, ProvisionError> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        self.record("create_function", &req.name, self.fail_function)?;
        Ok(FunctionInfo {
            function_name: req.name.clone(),
            function_id: Some(format!("id-{}", req.name)),
        })
    }

    async fn create_trigger(&self, function_name: &str) -> Result<TriggerInfo, ProvisionError> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        self.record("create_trigger", function_name, self.fail_trigger)?;
        Ok(TriggerInfo {
            trigger_name: Some(function_name.to_string()),
            http_trigger: Some(HttpTrigger {
                url_internet: Some(self.url.clone()),
            }),
        })
    }

    async fn delete_function(&self, function_name: &str) -> Result<(), ProvisionError> {
        self.record("delete_function", function_name, self.fail_delete)
    }
}

/// Submitter that only records jobs.
#[derive(Debug, Default)]
pub(crate) struct RecordingSubmitter {
    jobs: Mutex<Vec<DeployJob>>,
}

impl RecordingSubmitter {
    pub(crate) fn jobs(&self) -> Vec<DeployJob> {
        lock(&self.jobs).clone()
    }
}

#[async_trait]
impl JobSubmitter for RecordingSubmitter {
    async fn submit(&self, job: DeployJob) -> Result<(), RequestError> {
        lock(&self.jobs).push(job);
        Ok(())
    }
}

/// Orchestrator wired to fakes and an in-memory store.
pub(crate) struct Rig {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) api: Arc<FakeProvisioningApi>,
    pub(crate) connector: Arc<FakeConnector>,
    pub(crate) orchestrator: DeploymentOrchestrator,
}

impl Rig {
    /// Discovery attempt bound used by every rig.
    pub(crate) const ATTEMPTS: u32 = 3;

    pub(crate) fn new(api: FakeProvisioningApi, connector: FakeConnector) -> Self {
        Self::with_settings(api, connector, PipelineSettings::default())
    }

    pub(crate) fn with_settings(
        api: FakeProvisioningApi,
        connector: FakeConnector,
        settings: PipelineSettings,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(api);
        let connector = Arc::new(connector);
        let discoverer = CapabilityDiscoverer::new(
            connector.clone(),
            RetryPolicy {
                max_attempts: Self::ATTEMPTS,
                delay: Duration::ZERO,
            },
        );
        let orchestrator = DeploymentOrchestrator::new(
            store.clone(),
            store.clone(),
            api.clone(),
            discoverer,
            RuntimeImages::default(),
            settings,
        );
        Self {
            store,
            api,
            connector,
            orchestrator,
        }
    }
}
