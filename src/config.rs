//! Converter configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! whatever the command line sets explicitly:
//!
//! ```toml
//! strict = true
//! verbose = false
//! source_suffixes = [".java", ".kt", ".groovy"]
//! test_name = "unit-tests"
//! ```

use crate::errors::{ConvertError, Result};
use crate::source_index::DEFAULT_SOURCE_SUFFIXES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Abort on the first load failure or mismatched class
    pub strict: bool,

    /// Debug-level logging
    pub verbose: bool,

    /// File name suffixes indexed under the source roots
    pub source_suffixes: Vec<String>,

    /// `TN` label; the output file name when unset
    pub test_name: Option<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            strict: false,
            verbose: false,
            source_suffixes: DEFAULT_SOURCE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            test_name: None,
        }
    }
}

impl ConverterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConvertError::config(path, format!("failed to read: {}", e)))?;
        let config = Self::parse(&contents).map_err(|message| ConvertError::config(path, message))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(contents).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.source_suffixes.is_empty() {
            return Err("source_suffixes must not be empty".to_string());
        }
        if let Some(suffix) = self.source_suffixes.iter().find(|s| s.is_empty()) {
            return Err(format!("invalid source suffix {:?}", suffix));
        }
        Ok(())
    }

    /// Apply command-line flags; a flag only overrides when it is set.
    pub fn with_overrides(mut self, strict: bool, verbose: bool) -> Self {
        self.strict |= strict;
        self.verbose |= verbose;
        self
    }
}
