//! Deployment orchestration: ensure a record, provision its function and
//! trigger, discover the server's capabilities and publish the result.
//!
//! Each job runs its steps strictly in order and records progress on the
//! record's stage. Any fatal error is recorded as `Failed { step }`.

use std::sync::Arc;

use crate::compiler::{RuntimeImages, compile, resolve_image};
use crate::error::{DeployError, DeployResult, ProvisionError, RequestError, StoreError};
use crate::mcp::{CapabilityDiscoverer, CapabilityDocument};
use crate::model::{
    DeploymentDetails, DeploymentId, DeploymentRecord, LaunchSpec, PipelineStep, Stage,
    function_name_for,
};
use crate::provision::{ProvisionRequest, ProvisioningApi};
use crate::store::{DeploymentStore, ResultPersister};

/// Pipeline knobs that are not tied to a single collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Prepended to every remote function name.
    pub function_prefix: String,
    /// Delete the function when trigger creation fails.
    pub rollback_orphaned_functions: bool,
    /// Appended to the trigger URL to reach the proxy's SSE stream.
    pub sse_path: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            function_prefix: "mcp-".to_string(),
            rollback_orphaned_functions: true,
            sse_path: "/sse".to_string(),
        }
    }
}

/// Outcome of `ensure_deployment`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensured {
    pub record: DeploymentRecord,
    /// True only when this call created the record.
    pub needs_provisioning: bool,
}

/// Unit of asynchronous work: provision and discover one deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployJob {
    pub id: DeploymentId,
    pub request: ProvisionRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub id: DeploymentId,
    pub endpoint: String,
    pub document: CapabilityDocument,
}

pub struct DeploymentOrchestrator {
    store: Arc<dyn DeploymentStore>,
    persister: Arc<dyn ResultPersister>,
    api: Arc<dyn ProvisioningApi>,
    discoverer: CapabilityDiscoverer,
    images: RuntimeImages,
    settings: PipelineSettings,
}

impl DeploymentOrchestrator {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        persister: Arc<dyn ResultPersister>,
        api: Arc<dyn ProvisioningApi>,
        discoverer: CapabilityDiscoverer,
        images: RuntimeImages,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            persister,
            api,
            discoverer,
            images,
            settings,
        }
    }

    /// Records currently listed in the public registry.
    pub async fn published(&self) -> Result<Vec<DeploymentRecord>, StoreError> {
        self.store.list_public().await
    }

    /// Find or create the record for `(owner, title)`.
    ///
    /// Compilation and image resolution happen first, so an unsupported
    /// runtime never touches the store. Existing records are refreshed and
    /// never scheduled for provisioning again.
    pub async fn ensure_deployment(
        &self,
        owner: &str,
        title: &str,
        spec: &LaunchSpec,
        details: DeploymentDetails,
    ) -> Result<Ensured, RequestError> {
        let command = compile(spec);
        let image = resolve_image(&self.images, &spec.command)?;
        let (record, created) = self
            .store
            .ensure(owner, title, details, image, command)
            .await?;
        if created {
            tracing::info!("created deployment {} for {}/{}", record.id, owner, title);
        } else {
            tracing::info!(
                "refreshed deployment {} for {}/{} (stage {})",
                record.id,
                owner,
                title,
                record.stage
            );
        }
        Ok(Ensured {
            record,
            needs_provisioning: created,
        })
    }

    /// Build the provisioning job for a freshly ensured record.
    pub fn job_for(&self, record: &DeploymentRecord, spec: &LaunchSpec) -> DeployJob {
        DeployJob {
            id: record.id,
            request: ProvisionRequest {
                name: function_name_for(
                    &self.settings.function_prefix,
                    &record.owner,
                    &record.title,
                    record.id,
                ),
                image: record.image.clone(),
                env: spec.env.clone(),
                command: record.command.clone(),
            },
        }
    }

    /// Create the function, then its HTTP trigger. Returns the trigger URL.
    pub async fn provision(&self, id: DeploymentId, req: &ProvisionRequest) -> DeployResult<String> {
        let function = self
            .api
            .create_function(req)
            .await
            .map_err(|source| DeployError::Provisioning {
                step: PipelineStep::CreateFunction,
                source,
            })?;
        tracing::info!("function {} created for {}", function.function_name, id);
        self.store
            .advance(id, Stage::FunctionCreated, None)
            .await
            .map_err(DeployError::store(PipelineStep::CreateFunction))?;

        let url = match self.create_trigger(&req.name).await {
            Ok(url) => url,
            Err(source) => {
                if self.settings.rollback_orphaned_functions {
                    self.rollback(&req.name).await;
                }
                return Err(DeployError::Provisioning {
                    step: PipelineStep::CreateTrigger,
                    source,
                });
            }
        };
        tracing::info!("trigger ready for {}: {}", id, url);
        self.store
            .advance(id, Stage::TriggerCreated, Some(&url))
            .await
            .map_err(DeployError::store(PipelineStep::CreateTrigger))?;
        Ok(url)
    }

    async fn create_trigger(&self, function_name: &str) -> Result<String, ProvisionError> {
        let trigger = self.api.create_trigger(function_name).await?;
        trigger.url().map(str::to_string).ok_or_else(|| {
            ProvisionError::MalformedResponse("trigger response has no httpTrigger.urlInternet".into())
        })
    }

    async fn rollback(&self, function_name: &str) {
        match self.api.delete_function(function_name).await {
            Ok(()) => tracing::info!("rolled back orphaned function {}", function_name),
            Err(e) => tracing::warn!("rollback of function {} failed: {}", function_name, e),
        }
    }

    /// SSE URL for a trigger endpoint.
    pub fn sse_url(&self, endpoint: &str) -> String {
        format!("{}{}", endpoint.trim_end_matches('/'), self.settings.sse_path)
    }

    /// Run one job end to end and record its terminal stage.
    ///
    /// The job must win the store claim before any remote call. A job that
    /// loses it returns an error and leaves the record alone.
    pub async fn run_job(&self, job: DeployJob) -> DeployResult<JobReport> {
        let id = job.id;
        if let Err(source) = self.store.claim(id).await {
            tracing::warn!("skipping job for {}: {}", id, source);
            return Err(DeployError::Store {
                step: PipelineStep::CreateFunction,
                source,
            });
        }

        match self.execute(&job).await {
            Ok(report) => {
                tracing::info!("deployment {} published at {}", id, report.endpoint);
                Ok(report)
            }
            Err(e) => {
                let step = e.step();
                tracing::error!("deployment {} failed at {}: {}", id, step, e);
                if let Err(store_err) = self.store.advance(id, Stage::Failed { step }, None).await {
                    tracing::error!("could not record failure of {}: {}", id, store_err);
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &DeployJob) -> DeployResult<JobReport> {
        let id = job.id;
        let endpoint = self.provision(id, &job.request).await?;

        let document = self.discoverer.discover(&self.sse_url(&endpoint)).await?;
        self.store
            .advance(id, Stage::EndpointVerified, None)
            .await
            .map_err(DeployError::store(PipelineStep::Discovery))?;

        let affected = self
            .persister
            .upsert(id, &endpoint, &document)
            .await
            .map_err(DeployError::store(PipelineStep::Persist))?;
        if affected == 0 {
            return Err(DeployError::Store {
                step: PipelineStep::Persist,
                source: StoreError::NotFound(id),
            });
        }
        self.store
            .advance(id, Stage::Published, None)
            .await
            .map_err(DeployError::store(PipelineStep::Persist))?;

        Ok(JobReport {
            id,
            endpoint,
            document,
        })
    }
}
