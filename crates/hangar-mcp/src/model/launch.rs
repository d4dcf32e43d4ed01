//! Launch descriptions and the compiled proxy command.

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Declarative description of a stdio tool server: `{ command, args?, env? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub env: HashMap<String, String>,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
        }
    }
}

/// Ordered process invocation produced by the compiler. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyCommand(Vec<String>);

impl ProxyCommand {
    pub(crate) fn from_tokens(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Space-joined form stored as the record's `run_command`.
    pub fn joined(&self) -> String {
        self.0.join(" ")
    }
}

impl fmt::Display for ProxyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

/// Deployment request body in the common `mcpServers` client config shape.
///
/// ```json
/// { "description": "...", "git": "https://...",
///   "mcpServers": { "fetch": { "command": "uvx", "args": ["mcp-server-fetch"] } } }
/// ```
///
/// Server entries keep their document order; only the first one is deployed.
#[derive(Debug, Clone, Deserialize)]
pub struct AddServerRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub git: Option<String>,
    #[serde(rename = "mcpServers", default, deserialize_with = "ordered_servers")]
    pub mcp_servers: Vec<(String, LaunchSpec)>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn ordered_servers<'de, D>(deserializer: D) -> Result<Vec<(String, LaunchSpec)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedServers;

    impl<'de> Visitor<'de> for OrderedServers {
        type Value = Vec<(String, LaunchSpec)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of server title to launch spec")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(1));
            while let Some((title, spec)) = map.next_entry::<String, LaunchSpec>()? {
                out.push((title, spec));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(OrderedServers)
}
