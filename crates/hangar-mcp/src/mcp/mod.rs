//! MCP client side of the pipeline: scoped SSE sessions and retrying
//! capability discovery against freshly deployed endpoints.

pub mod discovery;
pub mod session;
pub mod types;

pub use discovery::*;
pub use session::*;
pub use types::*;
