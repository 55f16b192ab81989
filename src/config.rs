//! # Pipeline Configuration
//!
//! Tunables for the section pipeline, loaded from JSON with `serde_json`.
//! Every field has a default, so an empty object (`{}`) is a valid config.
//!
//! ```json
//! {
//!     "worker_threads": 4,
//!     "buffer_pool_capacity": 4,
//!     "scratch_vertex_capacity": 8192,
//!     "scratch_index_capacity": 12288
//! }
//! ```

use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of worker threads running geometry builds and sorts.
    pub worker_threads: usize,
    /// Number of scratch buffer sets; bounds how many tasks run at once.
    pub buffer_pool_capacity: usize,
    /// Vertices each scratch layer keeps allocated after a reset.
    pub scratch_vertex_capacity: usize,
    /// Indices each scratch layer keeps allocated after a reset.
    pub scratch_index_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let worker_threads = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(2)
            .saturating_sub(1)
            .max(1);

        Self {
            worker_threads,
            buffer_pool_capacity: worker_threads,
            scratch_vertex_capacity: 8192,
            scratch_index_capacity: 12288,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.worker_threads == 0 {
            return Err(PipelineError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.buffer_pool_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "buffer_pool_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.worker_threads >= 1);
        assert_eq!(config.buffer_pool_capacity, config.worker_threads);
    }

    #[test]
    fn partial_config_overrides_fields() {
        let config =
            PipelineConfig::from_json_str(r#"{ "worker_threads": 3, "buffer_pool_capacity": 1 }"#)
                .unwrap();
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.buffer_pool_capacity, 1);
        assert_eq!(config.scratch_vertex_capacity, 8192);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let error = PipelineConfig::from_json_str(r#"{ "buffer_pool_capacity": 0 }"#).unwrap_err();
        assert!(matches!(error, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let error = PipelineConfig::from_json_str("{ worker_threads: ").unwrap_err();
        assert!(matches!(error, PipelineError::ConfigParse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let error = PipelineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(error, PipelineError::ConfigRead { .. }));
    }
}
