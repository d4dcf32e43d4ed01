//! Deployment domain types: launch specs, records, naming.

pub mod launch;
pub mod naming;
pub mod record;

pub use launch::*;
pub use naming::*;
pub use record::*;
