//! Deployment records and the provisioning stage machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::launch::ProxyCommand;

/// Opaque deployment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(Uuid);

impl DeploymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, for use in remote resource names.
    pub fn short(&self) -> String {
        let mut hex = self.0.simple().to_string();
        hex.truncate(8);
        hex
    }
}

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    CreateFunction,
    CreateTrigger,
    Discovery,
    Persist,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStep::CreateFunction => "create_function",
            PipelineStep::CreateTrigger => "create_trigger",
            PipelineStep::Discovery => "discovery",
            PipelineStep::Persist => "persist",
        };
        f.write_str(s)
    }
}

/// Provisioning stage of a deployment.
///
/// `Pending → FunctionCreated → TriggerCreated → EndpointVerified → Published`,
/// or `Failed { step }` from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Pending,
    FunctionCreated,
    TriggerCreated,
    EndpointVerified,
    Published,
    Failed { step: PipelineStep },
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Published | Stage::Failed { .. })
    }

    fn successor(&self) -> Option<Stage> {
        match self {
            Stage::Pending => Some(Stage::FunctionCreated),
            Stage::FunctionCreated => Some(Stage::TriggerCreated),
            Stage::TriggerCreated => Some(Stage::EndpointVerified),
            Stage::EndpointVerified => Some(Stage::Published),
            Stage::Published | Stage::Failed { .. } => None,
        }
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(&self, next: Stage) -> bool {
        match next {
            Stage::Failed { .. } => !self.is_terminal(),
            other => self.successor() == Some(other),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Pending => f.write_str("pending"),
            Stage::FunctionCreated => f.write_str("function_created"),
            Stage::TriggerCreated => f.write_str("trigger_created"),
            Stage::EndpointVerified => f.write_str("endpoint_verified"),
            Stage::Published => f.write_str("published"),
            Stage::Failed { step } => write!(f, "failed({})", step),
        }
    }
}

/// Mutable descriptive fields refreshed on every ensure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDetails {
    pub description: Option<String>,
    /// Source reference, typically a git URL.
    pub source: Option<String>,
}

/// Persisted deployment surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    pub owner: String,
    pub title: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub image: String,
    /// Compiled command tokens; always `compile(spec)` of the last ensured spec.
    pub command: ProxyCommand,
    /// Space-joined `command`.
    pub run_command: String,
    pub endpoint: Option<String>,
    pub capabilities: Option<JsonValue>,
    pub tools: Option<JsonValue>,
    pub prompts: Option<JsonValue>,
    pub resources: Option<JsonValue>,
    pub is_public: bool,
    pub stage: Stage,
}

impl DeploymentRecord {
    /// Fresh record in `Pending` with no endpoint or capabilities.
    pub fn pending(
        owner: &str,
        title: &str,
        details: DeploymentDetails,
        image: &str,
        command: ProxyCommand,
    ) -> Self {
        let run_command = command.joined();
        Self {
            id: DeploymentId::new(),
            owner: owner.to_string(),
            title: title.to_string(),
            description: details.description,
            source: details.source,
            image: image.to_string(),
            command,
            run_command,
            endpoint: None,
            capabilities: None,
            tools: None,
            prompts: None,
            resources: None,
            is_public: false,
            stage: Stage::Pending,
        }
    }

    /// Refresh descriptive fields and the compiled command; never touches
    /// endpoint, capabilities, visibility or stage.
    pub fn refresh(&mut self, details: DeploymentDetails, image: &str, command: ProxyCommand) {
        self.description = details.description;
        self.source = details.source;
        self.image = image.to_string();
        self.run_command = command.joined();
        self.command = command;
    }
}
