//! Remote serverless provisioning: function + HTTP trigger lifecycle.

pub mod http;
pub mod types;

pub use http::{HttpProvisioningClient, ProvisioningEndpoint};
pub use types::*;

use async_trait::async_trait;

use crate::error::ProvisionError;

/// Provisioning API seam. Calls are independent and each one is bounded by
/// the implementation's own timeout.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    async fn create_function(&self, req: &ProvisionRequest) -> Result<FunctionInfo, ProvisionError>;

    async fn create_trigger(&self, function_name: &str) -> Result<TriggerInfo, ProvisionError>;

    /// Remove a function. Used to clean up after a failed trigger.
    async fn delete_function(&self, function_name: &str) -> Result<(), ProvisionError>;
}
