//! Wire bodies for the serverless provisioning API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::ProxyCommand;

/// Runtime handler name expected for custom containers.
pub const CUSTOM_CONTAINER_HANDLER: &str = "index.handler";
pub const CUSTOM_CONTAINER_RUNTIME: &str = "custom-container";

/// Trigger config sent as a JSON string: public HTTP, anonymous auth.
pub const HTTP_TRIGGER_CONFIG: &str = r#"{"methods":["GET","POST","PUT","OPTIONS","HEAD"],"authType":"anonymous","disableURLInternet":false}"#;

/// Sizing of every provisioned function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    pub cpu: f64,
    pub memory_mb: u32,
    pub disk_mb: u32,
    pub timeout_secs: u32,
    pub instance_concurrency: u32,
    /// Container port; must match the proxy's `--sse-port`.
    pub port: u16,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu: 0.5,
            memory_mb: 512,
            disk_mb: 512,
            timeout_secs: 600,
            instance_concurrency: 10,
            port: 8080,
        }
    }
}

/// Everything needed to provision one function.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionRequest {
    pub name: String,
    pub image: String,
    pub env: HashMap<String, String>,
    pub command: ProxyCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomContainerConfig {
    pub image: String,
    pub port: u16,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFunctionBody {
    pub function_name: String,
    pub runtime: &'static str,
    pub handler: &'static str,
    pub timeout: u32,
    pub instance_concurrency: u32,
    pub cpu: f64,
    pub memory_size: u32,
    pub disk_size: u32,
    pub environment_variables: HashMap<String, String>,
    pub custom_container_config: CustomContainerConfig,
}

impl CreateFunctionBody {
    pub fn new(req: &ProvisionRequest, limits: &ResourceLimits) -> Self {
        Self {
            function_name: req.name.clone(),
            runtime: CUSTOM_CONTAINER_RUNTIME,
            handler: CUSTOM_CONTAINER_HANDLER,
            timeout: limits.timeout_secs,
            instance_concurrency: limits.instance_concurrency,
            cpu: limits.cpu,
            memory_size: limits.memory_mb,
            disk_size: limits.disk_mb,
            environment_variables: req.env.clone(),
            custom_container_config: CustomContainerConfig {
                image: req.image.clone(),
                port: limits.port,
                command: req.command.tokens().to_vec(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerBody {
    pub trigger_name: String,
    pub trigger_type: &'static str,
    pub trigger_config: &'static str,
}

impl TriggerBody {
    /// HTTP trigger named after its function.
    pub fn http(function_name: &str) -> Self {
        Self {
            trigger_name: function_name.to_string(),
            trigger_type: "http",
            trigger_config: HTTP_TRIGGER_CONFIG,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub function_name: String,
    #[serde(default)]
    pub function_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTrigger {
    pub url_internet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerInfo {
    #[serde(default)]
    pub trigger_name: Option<String>,
    pub http_trigger: Option<HttpTrigger>,
}

impl TriggerInfo {
    /// Public URL of the trigger, if the API reported one.
    pub fn url(&self) -> Option<&str> {
        self.http_trigger
            .as_ref()
            .and_then(|t| t.url_internet.as_deref())
            .filter(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::model::LaunchSpec;
    use serde_json::json;

    #[test]
    fn function_body_matches_api_shape() {
        let spec = LaunchSpec::new("uvx", vec!["mcp-server-fetch".into()]);
        let req = ProvisionRequest {
            name: "mcp-alice-fetch".into(),
            image: "img:1".into(),
            env: HashMap::from([("TOKEN".to_string(), "t".to_string())]),
            command: compile(&spec),
        };
        let v = serde_json::to_value(CreateFunctionBody::new(&req, &ResourceLimits::default())).unwrap();
        assert_eq!(v["functionName"], "mcp-alice-fetch");
        assert_eq!(v["runtime"], "custom-container");
        assert_eq!(v["handler"], "index.handler");
        assert_eq!(v["timeout"], 600);
        assert_eq!(v["instanceConcurrency"], 10);
        assert_eq!(v["cpu"], 0.5);
        assert_eq!(v["memorySize"], 512);
        assert_eq!(v["diskSize"], 512);
        assert_eq!(v["environmentVariables"], json!({"TOKEN": "t"}));
        assert_eq!(v["customContainerConfig"]["image"], "img:1");
        assert_eq!(v["customContainerConfig"]["port"], 8080);
        assert_eq!(v["customContainerConfig"]["command"][0], "mcp-proxy");
        assert_eq!(v["customContainerConfig"]["command"][10], "mcp-server-fetch");
    }

    #[test]
    fn trigger_config_is_a_json_string() {
        let v = serde_json::to_value(TriggerBody::http("fn")).unwrap();
        assert_eq!(v["triggerName"], "fn");
        assert_eq!(v["triggerType"], "http");
        let config: serde_json::Value =
            serde_json::from_str(v["triggerConfig"].as_str().unwrap()).unwrap();
        assert_eq!(config["authType"], "anonymous");
        assert_eq!(config["disableURLInternet"], false);
        assert_eq!(config["methods"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn trigger_url_extraction() {
        let info: TriggerInfo = serde_json::from_value(json!({
            "triggerName": "fn",
            "httpTrigger": {"urlInternet": "https://fn.example.com"}
        }))
        .unwrap();
        assert_eq!(info.url(), Some("https://fn.example.com"));

        let empty: TriggerInfo =
            serde_json::from_value(json!({"httpTrigger": {"urlInternet": ""}})).unwrap();
        assert_eq!(empty.url(), None);
        let missing: TriggerInfo = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.url(), None);
    }
}
