//! Traversal configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Node count above which `Strategy::Auto` routes to the optimized engine.
pub const DEFAULT_OPTIMIZED_THRESHOLD: usize = 10_000;

/// Which engine a dispatcher call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Pick by node count against `optimized_threshold`.
    #[default]
    Auto,
    /// Always run the queue-based BFS against the mutable graph.
    Baseline,
    /// Always build (or fetch) a CompactGraph and run the hybrid engine.
    Optimized,
}

/// Tuning for [`DirectionOptimizedBfs`](crate::DirectionOptimizedBfs).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BfsConfig {
    /// Switch to bottom-up when frontier out-edges exceed `total_edges / alpha`.
    pub alpha: f64,
    /// Switch back to top-down when the frontier drops below `node_count / beta`.
    pub beta: f64,
    /// Run bottom-up levels across the rayon pool.
    pub parallel: bool,
    /// Minimum node count before `parallel` takes effect.
    pub parallel_threshold: usize,
}

impl Default for BfsConfig {
    fn default() -> Self {
        Self {
            alpha: 15.0,
            beta: 20.0,
            parallel: false,
            parallel_threshold: 65_536,
        }
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub optimized_threshold: usize,
    pub strategy: Strategy,
    pub bfs: BfsConfig,
    /// Maximum number of CompactGraphs held by the cache.
    pub cache_capacity: u64,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            optimized_threshold: DEFAULT_OPTIMIZED_THRESHOLD,
            strategy: Strategy::Auto,
            bfs: BfsConfig::default(),
            cache_capacity: 64,
        }
    }
}

impl TraversalConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: TraversalConfig =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("bfs.alpha", self.bfs.alpha)?;
        check_positive("bfs.beta", self.bfs.beta)?;
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn check_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("must be a positive number, got {}", value),
        })
    }
}
