//! Configuration for query engines and their result runners.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SemsearchError};
use crate::terms::counts::CountsStrategy;

/// Default number of documents ranked or hit-collected per background batch.
pub const DEFAULT_DOCUMENT_BLOCK_SIZE: usize = 1000;

/// Configuration for a [`QueryEngine`](crate::engine::QueryEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Batch size for incremental ranking and hit collection.
    pub document_block_size: usize,

    /// Stop words removed by index-terms queries that opt into filtering.
    pub default_stop_words: Vec<String>,

    /// Counts strategy used by compound terms queries built without one.
    pub default_counts_strategy: CountsStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            document_block_size: DEFAULT_DOCUMENT_BLOCK_SIZE,
            default_stop_words: Vec::new(),
            default_counts_strategy: CountsStrategy::First,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document block size.
    pub fn with_document_block_size(mut self, block_size: usize) -> Self {
        self.document_block_size = block_size;
        self
    }

    /// Set the default stop words.
    pub fn with_stop_words<I, S>(mut self, stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_stop_words = stop_words.into_iter().map(Into::into).collect();
        self
    }

    /// Set the default counts strategy.
    pub fn with_counts_strategy(mut self, strategy: CountsStrategy) -> Self {
        self.default_counts_strategy = strategy;
        self
    }

    /// Check the configuration for values the runners cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.document_block_size == 0 {
            return Err(SemsearchError::invalid_config(
                "document_block_size must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Write the configuration to a JSON file.
    pub fn save_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.document_block_size, DEFAULT_DOCUMENT_BLOCK_SIZE);
        assert!(config.default_stop_words.is_empty());
        assert_eq!(config.default_counts_strategy, CountsStrategy::First);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_document_block_size(16)
            .with_stop_words(["the", "of"])
            .with_counts_strategy(CountsStrategy::Sum);

        assert_eq!(config.document_block_size, 16);
        assert_eq!(config.default_stop_words, vec!["the", "of"]);
        assert_eq!(config.default_counts_strategy, CountsStrategy::Sum);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let config = EngineConfig::new().with_document_block_size(0);
        assert!(config.validate().is_err());
        assert!(EngineConfig::from_json_str(r#"{"document_block_size": 0}"#).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"document_block_size": 8}"#).unwrap();
        assert_eq!(config.document_block_size, 8);
        assert_eq!(config.default_counts_strategy, CountsStrategy::First);
    }

    #[test]
    fn test_json_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.json");

        let config = EngineConfig::new()
            .with_document_block_size(32)
            .with_stop_words(["a"])
            .with_counts_strategy(CountsStrategy::Max);
        config.save_json_file(&path).unwrap();

        let loaded = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
