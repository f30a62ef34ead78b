use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ast::truncate_identifier;

/// SQL dialect flavour that changes a few naming rules.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SqlDialect {
    /// Standard behaviour (default).
    #[default]
    Postgres,
    /// A-compatible mode: `NVL(...)` output columns keep the `nvl` name.
    A,
}

/// Whether failed lookups run the relaxed diagnostic search for hints.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum HintMode {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read analyzer config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid analyzer config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings threaded through one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub dialect: SqlDialect,
    pub hints: HintMode,
    /// Longest identifier kept before truncation.
    pub max_identifier_length: usize,
    pub truncate_identifiers: bool,
    /// Catalog part accepted in four-part column references.
    pub current_database: String,
    /// Most dotted parts a column reference may have.
    pub max_name_parts: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            hints: HintMode::default(),
            max_identifier_length: 63,
            truncate_identifiers: true,
            current_database: "postgres".to_string(),
            max_name_parts: 4,
        }
    }
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn a_compatible() -> Self {
        Self { dialect: SqlDialect::A, ..Self::default() }
    }

    pub fn with_database(mut self, name: &str) -> Self {
        self.current_database = name.to_string();
        self
    }

    pub fn with_hints(mut self, hints: HintMode) -> Self {
        self.hints = hints;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn hints_enabled(&self) -> bool {
        self.hints == HintMode::Enabled
    }

    /// Apply the identifier length limit, if truncation is on. Names arrive
    /// already case-folded.
    pub fn identifier(&self, ident: &str) -> String {
        if self.truncate_identifiers {
            truncate_identifier(ident, self.max_identifier_length).into_owned()
        } else {
            ident.to_string()
        }
    }
}
