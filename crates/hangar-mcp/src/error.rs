//! Error taxonomy for the deployment pipeline.
//!
//! Per-attempt errors (`SessionError`) never escape discovery on their own;
//! they surface wrapped in `DiscoveryError::EndpointUnreachable` once the
//! retry bound is exhausted. Partial capability loss is not an error.

use std::time::Duration;

use crate::mcp::CapabilityKind;
use crate::model::{DeploymentId, PipelineStep, Stage};

/// Launch spec compilation errors. Raised before anything is provisioned.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("unsupported runtime '{command}': no base image registered for this command")]
    UnsupportedRuntime { command: String },
}

/// Remote provisioning API errors.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provisioning API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provisioning response: {0}")]
    MalformedResponse(String),
}

/// Errors scoped to a single discovery attempt.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("no initialize response within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("initialize failed: {0}")]
    Handshake(String),

    #[error("{kind} request timed out after {after:?}")]
    RequestTimeout { kind: CapabilityKind, after: Duration },

    #[error("{kind} request failed: {message}")]
    Request { kind: CapabilityKind, message: String },
}

/// Discovery failure across all attempts.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("endpoint {endpoint} unreachable after {attempts} attempt(s): {last_error}")]
    EndpointUnreachable {
        endpoint: String,
        attempts: u32,
        #[source]
        last_error: SessionError,
    },
}

/// Persistence collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("deployment not found: {0}")]
    NotFound(DeploymentId),

    #[error("invalid stage transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: DeploymentId,
        from: Stage,
        to: Stage,
    },

    #[error("deployment {0} is already claimed by another job")]
    AlreadyClaimed(DeploymentId),

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Errors from the deployment front door.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("mcpServers cannot be empty")]
    EmptyServers,

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("job submission failed: {0}")]
    Submit(String),
}

/// Fatal job errors. Each maps to the pipeline step recorded as `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("provisioning failed at {step}: {source}")]
    Provisioning {
        step: PipelineStep,
        #[source]
        source: ProvisionError,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("store error during {step}: {source}")]
    Store {
        step: PipelineStep,
        #[source]
        source: StoreError,
    },
}

impl DeployError {
    pub fn step(&self) -> PipelineStep {
        match self {
            DeployError::Provisioning { step, .. } | DeployError::Store { step, .. } => *step,
            DeployError::Discovery(_) => PipelineStep::Discovery,
        }
    }

    pub(crate) fn store(step: PipelineStep) -> impl FnOnce(StoreError) -> Self {
        move |source| DeployError::Store { step, source }
    }
}

pub type DeployResult<T> = Result<T, DeployError>;
