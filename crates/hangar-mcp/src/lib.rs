//! Deploy command-line MCP tool servers as serverless functions and publish
//! what they can do.
//!
//! The pipeline compiles a launch description into a proxied container
//! command, provisions a function with a public HTTP trigger, connects to the
//! trigger over MCP/SSE to discover tools, prompts and resources, and stores
//! the result on the deployment record.

pub mod compiler;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod model;
pub mod orchestrator;
pub mod provision;
pub mod queue;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
