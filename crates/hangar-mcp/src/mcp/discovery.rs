//! Capability discovery with bounded retries.
//!
//! One attempt is `connect → initialize → list advertised categories`. The
//! whole unit is retried with a fixed delay until the handshake succeeds or
//! the attempt bound is exhausted. A freshly created trigger usually needs a
//! few attempts before the container answers.

use std::sync::Arc;
use std::time::Duration;

use super::session::{CapabilitySession, McpConnector};
use super::{CapabilityDocument, InitializeOutcome};
use crate::error::{DiscoveryError, SessionError};

/// Fixed-delay retry bound. No backoff growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_secs(3),
        }
    }
}

/// Issue list requests for every advertised category, one at a time.
///
/// A failing list request leaves its category absent and does not stop the
/// remaining ones.
pub async fn discover_advertised(
    session: &mut dyn CapabilitySession,
    outcome: InitializeOutcome,
) -> CapabilityDocument {
    let mut doc = CapabilityDocument::new(outcome.server_info);
    for kind in outcome.flags.advertised() {
        match session.list(kind).await {
            Ok(value) => doc.set(kind, value),
            Err(e) => tracing::warn!("{} failed; recording as absent: {}", kind, e),
        }
    }
    doc
}

/// Retrying discovery driver.
pub struct CapabilityDiscoverer {
    connector: Arc<dyn McpConnector>,
    policy: RetryPolicy,
}

impl CapabilityDiscoverer {
    pub fn new(connector: Arc<dyn McpConnector>, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    /// Discover capabilities at `endpoint`, retrying whole attempts.
    pub async fn discover(&self, endpoint: &str) -> Result<CapabilityDocument, DiscoveryError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            tracing::debug!("discovery attempt {}/{} ({})", attempt, max_attempts, endpoint);
            match self.attempt(endpoint).await {
                Ok(doc) => {
                    tracing::info!(
                        "discovered {} after {} attempt(s) (tools={}, prompts={}, resources={})",
                        endpoint,
                        attempt,
                        doc.tools.is_some(),
                        doc.prompts.is_some(),
                        doc.resources.is_some()
                    );
                    return Ok(doc);
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(
                        "discovery gave up on {} after {} attempt(s): {}",
                        endpoint,
                        attempt,
                        e
                    );
                    return Err(DiscoveryError::EndpointUnreachable {
                        endpoint: endpoint.to_string(),
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    tracing::debug!("discovery attempt {} failed: {}", attempt, e);
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, endpoint: &str) -> Result<CapabilityDocument, SessionError> {
        let mut session = self.connector.connect(endpoint).await?;
        let result = match session.initialize().await {
            Ok(outcome) => Ok(discover_advertised(session.as_mut(), outcome).await),
            Err(e) => Err(e),
        };
        session.close().await;
        result
    }
}
