//! Scoped MCP client sessions against a deployed endpoint.
//!
//! A session lives for exactly one discovery attempt. Requests take
//! `&mut self`, so at most one request is ever in flight. Callers must
//! `close` the session on every path; the SSE session additionally shuts its
//! client down on drop in case the attempt future is cancelled.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_mcp_sdk::McpClient;
use rust_mcp_sdk::mcp_client::{ClientHandlerCore, client_runtime_core};
use rust_mcp_sdk::schema::schema_utils::{
    NotificationFromServer, RequestFromServer, ResultFromClient,
};
use rust_mcp_sdk::schema::{
    ClientCapabilities, Implementation, InitializeRequestParams, LATEST_PROTOCOL_VERSION, RpcError,
};
use rust_mcp_sdk::{ClientSseTransport, ClientSseTransportOptions};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::net::TcpStream;

use super::{CapabilityFlags, CapabilityKind, InitializeOutcome};
use crate::error::SessionError;

/// One discovery attempt's view of a server.
#[async_trait]
pub trait CapabilitySession: Send {
    /// Send `initialize` and wait for its single response.
    async fn initialize(&mut self) -> Result<InitializeOutcome, SessionError>;

    /// Issue the list request for `kind` and wait for its response.
    async fn list(&mut self, kind: CapabilityKind) -> Result<JsonValue, SessionError>;

    /// Release the transport. Must not fail.
    async fn close(&mut self);
}

/// Opens sessions against an endpoint URL.
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn CapabilitySession>, SessionError>;
}

/// Per-request bounds for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub handshake: Duration,
    pub request: Duration,
    pub shutdown: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(10),
            request: Duration::from_secs(10),
            shutdown: Duration::from_secs(3),
        }
    }
}

/// Connector speaking MCP over SSE.
#[derive(Debug, Clone)]
pub struct SseConnector {
    timeouts: SessionTimeouts,
}

impl SseConnector {
    pub fn new(timeouts: SessionTimeouts) -> Self {
        Self { timeouts }
    }

    fn client_details() -> InitializeRequestParams {
        InitializeRequestParams {
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "hangar-mcp-discovery".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
            },
            protocol_version: LATEST_PROTOCOL_VERSION.into(),
        }
    }
}

/// Open and drop one TCP connection to the endpoint's host.
///
/// The SSE transport only dials inside `start`, where a refused port looks
/// like a silent server.
async fn dial(endpoint: &str, within: Duration) -> Result<(), SessionError> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| SessionError::Connect(format!("invalid endpoint {}: {}", endpoint, e)))?;
    let host = url
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .ok_or_else(|| SessionError::Connect(format!("endpoint {} has no host", endpoint)))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| SessionError::Connect(format!("endpoint {} has no port", endpoint)))?;
    tokio::time::timeout(within, TcpStream::connect((host, port)))
        .await
        .map_err(|_| SessionError::Connect(format!("{}:{} did not accept within {:?}", host, port, within)))?
        .map_err(|e| SessionError::Connect(format!("{}:{}: {}", host, port, e)))?;
    Ok(())
}

#[async_trait]
impl McpConnector for SseConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn CapabilitySession>, SessionError> {
        dial(endpoint, self.timeouts.handshake).await?;
        tracing::debug!("opening sse transport: {}", endpoint);
        let transport = ClientSseTransport::new(endpoint, ClientSseTransportOptions::default())
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let client =
            client_runtime_core::create_client(Self::client_details(), transport, NoopClientHandler);
        Ok(Box::new(SseSession {
            client,
            timeouts: self.timeouts,
            closed: false,
        }))
    }
}

struct SseSession<C: McpClient + 'static> {
    client: Arc<C>,
    timeouts: SessionTimeouts,
    closed: bool,
}

fn to_json<T: Serialize, E: fmt::Display>(result: Result<T, E>) -> Result<JsonValue, String> {
    let value = result.map_err(|e| e.to_string())?;
    serde_json::to_value(value).map_err(|e| e.to_string())
}

#[async_trait]
impl<C: McpClient + 'static> CapabilitySession for SseSession<C> {
    async fn initialize(&mut self) -> Result<InitializeOutcome, SessionError> {
        tokio::time::timeout(self.timeouts.handshake, self.client.clone().start())
            .await
            .map_err(|_| SessionError::HandshakeTimeout(self.timeouts.handshake))?
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        let info = self
            .client
            .server_info()
            .ok_or_else(|| SessionError::Handshake("server returned no initialize result".into()))?;
        let flags = CapabilityFlags {
            has_tools: self.client.server_has_tools().unwrap_or(false),
            has_prompts: self.client.server_has_prompts().unwrap_or(false),
            has_resources: self.client.server_has_resources().unwrap_or(false),
        };
        let server_info =
            serde_json::to_value(info).map_err(|e| SessionError::Handshake(e.to_string()))?;
        Ok(InitializeOutcome { flags, server_info })
    }

    async fn list(&mut self, kind: CapabilityKind) -> Result<JsonValue, SessionError> {
        let client = &self.client;
        let request = async {
            match kind {
                CapabilityKind::Tools => to_json(client.list_tools(None).await),
                CapabilityKind::Prompts => to_json(client.list_prompts(None).await),
                CapabilityKind::Resources => to_json(client.list_resources(None).await),
            }
        };
        tokio::time::timeout(self.timeouts.request, request)
            .await
            .map_err(|_| SessionError::RequestTimeout {
                kind,
                after: self.timeouts.request,
            })?
            .map_err(|message| SessionError::Request { kind, message })
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match tokio::time::timeout(self.timeouts.shutdown, self.client.shut_down()).await {
            Ok(Ok(())) => tracing::debug!("sse session closed"),
            Ok(Err(e)) => tracing::debug!("sse session shutdown error: {}", e),
            Err(_) => tracing::warn!("sse session shutdown timed out"),
        }
    }
}

impl<C: McpClient + 'static> Drop for SseSession<C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // cancelled mid-attempt; finish the shutdown in the background
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = self.client.clone();
            handle.spawn(async move {
                if let Err(e) = client.shut_down().await {
                    tracing::debug!("background sse shutdown error: {}", e);
                }
            });
        }
    }
}

/// Client-side handler: rejects server-initiated requests and ignores
/// notifications, so unknown message kinds never disturb discovery.
#[derive(Clone)]
struct NoopClientHandler;

#[async_trait]
impl ClientHandlerCore for NoopClientHandler {
    async fn handle_request(
        &self,
        _request: RequestFromServer,
        _runtime: &dyn McpClient,
    ) -> std::result::Result<ResultFromClient, RpcError> {
        Err(RpcError::method_not_found())
    }

    async fn handle_notification(
        &self,
        _notification: NotificationFromServer,
        _runtime: &dyn McpClient,
    ) -> std::result::Result<(), RpcError> {
        Ok(())
    }

    async fn handle_error(
        &self,
        _error: &RpcError,
        _runtime: &dyn McpClient,
    ) -> std::result::Result<(), RpcError> {
        Ok(())
    }
}
