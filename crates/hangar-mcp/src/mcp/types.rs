//! Shared types for capability discovery.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Listable capability categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Tools,
    Prompts,
    Resources,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 3] = [
        CapabilityKind::Tools,
        CapabilityKind::Prompts,
        CapabilityKind::Resources,
    ];

    /// Name of the list request for this category.
    pub fn list_request(&self) -> &'static str {
        match self {
            CapabilityKind::Tools => "list_tools",
            CapabilityKind::Prompts => "list_prompts",
            CapabilityKind::Resources => "list_resources",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.list_request())
    }
}

/// Categories the server advertised in its initialize result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlags {
    pub has_tools: bool,
    pub has_prompts: bool,
    pub has_resources: bool,
}

impl CapabilityFlags {
    pub fn has(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Tools => self.has_tools,
            CapabilityKind::Prompts => self.has_prompts,
            CapabilityKind::Resources => self.has_resources,
        }
    }

    /// Advertised categories in request order: tools, prompts, resources.
    pub fn advertised(&self) -> Vec<CapabilityKind> {
        CapabilityKind::ALL
            .into_iter()
            .filter(|k| self.has(*k))
            .collect()
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct InitializeOutcome {
    pub flags: CapabilityFlags,
    /// Raw initialize result (server info, protocol version, capabilities).
    pub server_info: JsonValue,
}

/// Discovered capabilities. A list field is `None` when the category was not
/// advertised or its list request failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDocument {
    pub capabilities: JsonValue,
    pub tools: Option<JsonValue>,
    pub prompts: Option<JsonValue>,
    pub resources: Option<JsonValue>,
}

impl CapabilityDocument {
    pub fn new(capabilities: JsonValue) -> Self {
        Self {
            capabilities,
            tools: None,
            prompts: None,
            resources: None,
        }
    }

    pub fn set(&mut self, kind: CapabilityKind, value: JsonValue) {
        let slot = match kind {
            CapabilityKind::Tools => &mut self.tools,
            CapabilityKind::Prompts => &mut self.prompts,
            CapabilityKind::Resources => &mut self.resources,
        };
        *slot = Some(value);
    }
}
