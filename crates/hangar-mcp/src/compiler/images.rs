//! Runtime alias → base image table.

use std::collections::HashMap;

use crate::error::CompileError;

pub const NODE_IMAGE: &str = "hangar/mcp-runtime:node20-v3";
pub const PYTHON_IMAGE: &str = "hangar/mcp-runtime:python3.10-v8";

/// Lookup table from launch command name to container base image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeImages {
    by_alias: HashMap<String, String>,
}

impl Default for RuntimeImages {
    fn default() -> Self {
        let mut by_alias = HashMap::new();
        for (alias, image) in [
            ("npx", NODE_IMAGE),
            ("node", NODE_IMAGE),
            ("uvx", PYTHON_IMAGE),
            ("python", PYTHON_IMAGE),
        ] {
            by_alias.insert(alias.to_string(), image.to_string());
        }
        Self { by_alias }
    }
}

impl RuntimeImages {
    /// Defaults overlaid with `overrides` (alias → image). Later wins.
    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut images = Self::default();
        for (alias, image) in overrides {
            tracing::debug!("runtime image override: {} -> {}", alias, image);
            images.by_alias.insert(alias, image);
        }
        images
    }

    /// Resolve the base image for a command name. Exact match only.
    pub fn resolve(&self, command: &str) -> Result<&str, CompileError> {
        self.by_alias
            .get(command)
            .map(String::as_str)
            .ok_or_else(|| CompileError::UnsupportedRuntime {
                command: command.to_string(),
            })
    }
}
