//! HTTP client for the serverless provisioning API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{
    CreateFunctionBody, FunctionInfo, ProvisionRequest, ProvisioningApi, ResourceLimits,
    TriggerBody, TriggerInfo,
};
use crate::error::ProvisionError;

const API_VERSION: &str = "2023-03-30";

/// Connection settings for [`HttpProvisioningClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningEndpoint {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpProvisioningClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    limits: ResourceLimits,
}

impl HttpProvisioningClient {
    pub fn new(endpoint: &ProvisioningEndpoint, limits: ResourceLimits) -> Result<Self, ProvisionError> {
        let client = Client::builder().timeout(endpoint.timeout).build()?;
        Ok(Self {
            client,
            base_url: endpoint.base_url.trim_end_matches('/').to_owned(),
            token: endpoint.token.clone().filter(|t| !t.is_empty()),
            limits,
        })
    }

    fn functions_url(&self) -> String {
        format!("{}/{}/functions", self.base_url, API_VERSION)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, ProvisionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProvisionError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProvisionError> {
        let bytes = Self::check(response).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ProvisionError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ProvisioningApi for HttpProvisioningClient {
    async fn create_function(&self, req: &ProvisionRequest) -> Result<FunctionInfo, ProvisionError> {
        let body = CreateFunctionBody::new(req, &self.limits);
        tracing::debug!("POST {} ({})", self.functions_url(), req.name);
        let response = self
            .authorized(self.client.post(self.functions_url()))
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn create_trigger(&self, function_name: &str) -> Result<TriggerInfo, ProvisionError> {
        let url = format!("{}/{}/triggers", self.functions_url(), function_name);
        tracing::debug!("POST {}", url);
        let response = self
            .authorized(self.client.post(&url))
            .json(&TriggerBody::http(function_name))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn delete_function(&self, function_name: &str) -> Result<(), ProvisionError> {
        let url = format!("{}/{}", self.functions_url(), function_name);
        tracing::debug!("DELETE {}", url);
        let response = self.authorized(self.client.delete(&url)).send().await?;
        // already gone counts as deleted
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await.map(|_| ())
    }
}
