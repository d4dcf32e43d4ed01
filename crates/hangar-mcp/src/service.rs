//! Front door: accept a `mcpServers` deployment request for an owner.

use std::sync::Arc;

use crate::error::RequestError;
use crate::model::{AddServerRequest, DeploymentDetails, DeploymentRecord};
use crate::orchestrator::DeploymentOrchestrator;
use crate::queue::JobSubmitter;

pub struct DeployService {
    orchestrator: Arc<DeploymentOrchestrator>,
    submitter: Arc<dyn JobSubmitter>,
}

impl DeployService {
    pub fn new(orchestrator: Arc<DeploymentOrchestrator>, submitter: Arc<dyn JobSubmitter>) -> Self {
        Self {
            orchestrator,
            submitter,
        }
    }

    /// Ensure the first server of `request` for `owner`.
    ///
    /// A job is queued only when the record is new; repeat requests only
    /// refresh the record's descriptive fields. Returns the record as stored
    /// at submission time.
    pub async fn deploy(
        &self,
        owner: &str,
        request: AddServerRequest,
    ) -> Result<DeploymentRecord, RequestError> {
        let AddServerRequest {
            description,
            git,
            mcp_servers,
        } = request;
        let mut servers = mcp_servers.into_iter();
        let (title, spec) = servers.next().ok_or(RequestError::EmptyServers)?;
        let ignored = servers.count();
        if ignored > 0 {
            tracing::warn!("only '{}' is deployed; ignoring {} more server(s)", title, ignored);
        }

        let details = DeploymentDetails {
            description,
            source: git,
        };
        let ensured = self
            .orchestrator
            .ensure_deployment(owner, &title, &spec, details)
            .await?;
        if ensured.needs_provisioning {
            let job = self.orchestrator.job_for(&ensured.record, &spec);
            self.submitter.submit(job).await?;
        }
        Ok(ensured.record)
    }
}
