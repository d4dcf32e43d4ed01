//! Settings resolution: `env_flags` defaults, overridden by the optional
//! `<HANGAR_HOME>/config.toml` wherever the env var is unset.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use env_flags::env_flags;
use serde::Deserialize;

use crate::compiler::RuntimeImages;
use crate::mcp::{RetryPolicy, SessionTimeouts};
use crate::orchestrator::PipelineSettings;
use crate::provision::{ProvisioningEndpoint, ResourceLimits};
use crate::queue::QueueSettings;

#[derive(Debug, Default, Deserialize)]
pub struct UserConfig {
    pub logging: Option<LoggingCfg>,
    pub provisioning: Option<ProvisioningCfg>,
    pub discovery: Option<DiscoveryCfg>,
    pub queue: Option<QueueCfg>,
    /// Extra or replacement runtime aliases: `alias = "image"`.
    pub images: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingCfg {
    pub to_file: Option<bool>,
    pub dir: Option<String>,
    pub json: Option<bool>,
    pub compact: Option<bool>,
    pub pretty: Option<bool>,
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProvisioningCfg {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub function_prefix: Option<String>,
    pub rollback_orphaned_functions: Option<bool>,
    pub sse_path: Option<String>,
    /// Function sizing; unset fields keep their defaults.
    pub limits: Option<ResourceLimits>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryCfg {
    pub max_attempts: Option<u32>,
    pub delay_secs: Option<u64>,
    pub handshake_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueueCfg {
    pub workers: Option<usize>,
    pub capacity: Option<usize>,
}

pub fn load_user_config(home: &Path) -> anyhow::Result<Option<UserConfig>> {
    let path = home.join("config.toml");
    if !path.exists() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path)?;
    let cfg: UserConfig = toml::from_str(&s)?;
    Ok(Some(cfg))
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

/// Resolve the hangar home directory. Defaults to `$HOME/.hangar`.
pub fn hangar_home() -> PathBuf {
    env_flags! {
        /// Hangar home directory (absolute). Defaults to $HOME/.hangar
        HANGAR_HOME: &str = "";
    }

    if !(*HANGAR_HOME).is_empty() {
        expand_home(*HANGAR_HOME)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".hangar")
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".hangar")
    }
}

/// `cfg` unless the env var `key` is explicitly set.
fn pick<T>(env_set: &dyn Fn(&str) -> bool, key: &str, env_value: T, cfg: Option<T>) -> T {
    if env_set(key) {
        env_value
    } else {
        cfg.unwrap_or(env_value)
    }
}

/// Everything the pipeline needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: ProvisioningEndpoint,
    pub limits: ResourceLimits,
    pub pipeline: PipelineSettings,
    pub retry: RetryPolicy,
    pub timeouts: SessionTimeouts,
    pub queue: QueueSettings,
    pub images: RuntimeImages,
}

impl Settings {
    /// Merge the user config (if any) under the process environment.
    pub fn from_env(user: Option<&UserConfig>) -> Self {
        let env_set = |k: &str| std::env::var_os(k).is_some();
        Self::resolve(user, &env_set)
    }

    pub fn resolve(user: Option<&UserConfig>, env_set: &dyn Fn(&str) -> bool) -> Self {
        env_flags! {
            /// Base URL of the serverless provisioning API.
            PROVISIONING_URL: &str = "http://127.0.0.1:9000";
            /// Bearer token for the provisioning API. Empty means none.
            PROVISIONING_TOKEN: &str = "";
            /// HTTP timeout for each provisioning call.
            PROVISIONING_TIMEOUT_SECS: u64 = 30;
            /// Prefix for remote function names.
            FUNCTION_PREFIX: &str = "mcp-";
            /// Delete the function when its trigger cannot be created.
            ROLLBACK_ORPHANED_FUNCTIONS: bool = true;
            /// Path of the proxy's SSE stream under the trigger URL.
            SSE_PATH: &str = "/sse";
            /// Discovery attempts before giving up on an endpoint.
            DISCOVERY_MAX_ATTEMPTS: u32 = 20;
            /// Fixed delay between discovery attempts.
            DISCOVERY_DELAY_SECS: u64 = 3;
            DISCOVERY_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
            DISCOVERY_REQUEST_TIMEOUT_SECS: u64 = 10;
            /// Deployment worker tasks.
            QUEUE_WORKERS: usize = 2;
            /// Pending jobs before submitters wait.
            QUEUE_CAPACITY: usize = 64;
        }

        let prov = user.and_then(|c| c.provisioning.as_ref());
        let disc = user.and_then(|c| c.discovery.as_ref());
        let queue = user.and_then(|c| c.queue.as_ref());

        let token = pick(
            env_set,
            "PROVISIONING_TOKEN",
            (*PROVISIONING_TOKEN).to_string(),
            prov.and_then(|p| p.token.clone()),
        );
        let endpoint = ProvisioningEndpoint {
            base_url: pick(
                env_set,
                "PROVISIONING_URL",
                (*PROVISIONING_URL).to_string(),
                prov.and_then(|p| p.base_url.clone()),
            ),
            token: Some(token).filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(pick(
                env_set,
                "PROVISIONING_TIMEOUT_SECS",
                *PROVISIONING_TIMEOUT_SECS,
                prov.and_then(|p| p.timeout_secs),
            )),
        };

        let pipeline = PipelineSettings {
            function_prefix: pick(
                env_set,
                "FUNCTION_PREFIX",
                (*FUNCTION_PREFIX).to_string(),
                prov.and_then(|p| p.function_prefix.clone()),
            ),
            rollback_orphaned_functions: pick(
                env_set,
                "ROLLBACK_ORPHANED_FUNCTIONS",
                *ROLLBACK_ORPHANED_FUNCTIONS,
                prov.and_then(|p| p.rollback_orphaned_functions),
            ),
            sse_path: pick(
                env_set,
                "SSE_PATH",
                (*SSE_PATH).to_string(),
                prov.and_then(|p| p.sse_path.clone()),
            ),
        };

        let retry = RetryPolicy {
            max_attempts: pick(
                env_set,
                "DISCOVERY_MAX_ATTEMPTS",
                *DISCOVERY_MAX_ATTEMPTS,
                disc.and_then(|d| d.max_attempts),
            ),
            delay: Duration::from_secs(pick(
                env_set,
                "DISCOVERY_DELAY_SECS",
                *DISCOVERY_DELAY_SECS,
                disc.and_then(|d| d.delay_secs),
            )),
        };

        let timeouts = SessionTimeouts {
            handshake: Duration::from_secs(pick(
                env_set,
                "DISCOVERY_HANDSHAKE_TIMEOUT_SECS",
                *DISCOVERY_HANDSHAKE_TIMEOUT_SECS,
                disc.and_then(|d| d.handshake_timeout_secs),
            )),
            request: Duration::from_secs(pick(
                env_set,
                "DISCOVERY_REQUEST_TIMEOUT_SECS",
                *DISCOVERY_REQUEST_TIMEOUT_SECS,
                disc.and_then(|d| d.request_timeout_secs),
            )),
            ..SessionTimeouts::default()
        };

        let queue = QueueSettings {
            workers: pick(
                env_set,
                "QUEUE_WORKERS",
                *QUEUE_WORKERS,
                queue.and_then(|q| q.workers),
            ),
            capacity: pick(
                env_set,
                "QUEUE_CAPACITY",
                *QUEUE_CAPACITY,
                queue.and_then(|q| q.capacity),
            ),
        };

        let images = match user.and_then(|c| c.images.clone()) {
            Some(overrides) => RuntimeImages::with_overrides(overrides),
            None => RuntimeImages::default(),
        };

        Self {
            endpoint,
            limits: prov.and_then(|p| p.limits).unwrap_or_default(),
            pipeline,
            retry,
            timeouts,
            queue,
            images,
        }
    }
}
