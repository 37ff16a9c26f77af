//! Error types for traversal and configuration.
//!
//! Only caller contract violations are reported as errors. Broken CSR
//! invariants are bugs in the builder and fail via assertions instead.

/// Errors surfaced by traversal entry points and CompactGraph lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraversalError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("index {index} out of range for graph with {len} nodes")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("graph must be undirected")]
    DirectedGraph,
}

impl TraversalError {
    /// Build an `UnknownNode` error from any debuggable node identifier.
    pub fn unknown<N: std::fmt::Debug>(node: &N) -> Self {
        TraversalError::UnknownNode(format!("{:?}", node))
    }
}

pub type TraversalResult<T> = Result<T, TraversalError>;

/// Errors from loading or validating a [`TraversalConfig`](crate::TraversalConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
