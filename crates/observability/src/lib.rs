//! Process-wide logging setup for the agent and its host binary.

/// Subscriber installation (filters, JSON formatting).
pub mod tracing;

pub use self::tracing::{init, init_with_default};
