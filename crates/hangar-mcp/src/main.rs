use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use env_flags::env_flags;

use hangar_mcp::config::{Settings, hangar_home, load_user_config};
use hangar_mcp::logging::init_tracing;
use hangar_mcp::mcp::{CapabilityDiscoverer, SseConnector};
use hangar_mcp::model::AddServerRequest;
use hangar_mcp::orchestrator::DeploymentOrchestrator;
use hangar_mcp::provision::HttpProvisioningClient;
use hangar_mcp::queue::JobQueue;
use hangar_mcp::service::DeployService;
use hangar_mcp::store::{DeploymentStore, MemoryStore};

/// Request JSON from the first argument (a file path, or `-` for stdin).
fn read_request() -> anyhow::Result<AddServerRequest> {
    let raw = match std::env::args().nth(1).filter(|a| a != "-") {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading deployment request {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading deployment request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("parsing deployment request")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let home = hangar_home();
    let loaded = load_user_config(&home);
    let user_cfg = loaded.as_ref().ok().and_then(Option::as_ref);
    init_tracing(&home, user_cfg);
    if let Err(e) = &loaded {
        tracing::warn!("ignoring unreadable {}/config.toml: {}", home.display(), e);
    }

    env_flags! {
        /// Owner recorded on the deployment.
        DEPLOY_OWNER: &str = "local";
    }

    let request = read_request()?;
    let settings = Settings::from_env(user_cfg);
    tracing::debug!(
        "provisioning api {} ({} discovery attempts)",
        settings.endpoint.base_url,
        settings.retry.max_attempts
    );

    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(HttpProvisioningClient::new(&settings.endpoint, settings.limits)?);
    let discoverer =
        CapabilityDiscoverer::new(Arc::new(SseConnector::new(settings.timeouts)), settings.retry);
    let orchestrator = Arc::new(DeploymentOrchestrator::new(
        store.clone(),
        store.clone(),
        api,
        discoverer,
        settings.images,
        settings.pipeline,
    ));

    let queue = JobQueue::start(orchestrator.clone(), settings.queue);
    let service = DeployService::new(orchestrator.clone(), Arc::new(queue.handle()));
    let deployed = service.deploy(*DEPLOY_OWNER, request).await;
    drop(service);
    queue.shutdown().await;

    let record = store.get(deployed?.id).await?;
    let published = orchestrator.published().await?;
    tracing::info!("registry lists {} published server(s)", published.len());
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
