//! Protocol files: file name pattern, JSON schema and rule definitions.
//!
//! Each kind is looked up as `<location>/<kind>/<schema_path>.json`; the
//! first location that has the file wins.

use crate::model::Definitions;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Protocol loading errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("no pattern could be found for {0}")]
    PatternNotFound(String),

    #[error("no schema could be found for {0}")]
    SchemaNotFound(String),

    #[error("no definitions could be found for {0}")]
    DefinitionsNotFound(String),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid file pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid schema: {0}")]
    Schema(String),
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    file: String,
    #[serde(default)]
    suffix: Vec<String>,
}

/// File naming scheme
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Regex with named groups, matched against the file name
    pub file: Regex,
    /// Accepted file suffixes, including the dot
    pub suffix: Vec<String>,
}

impl Pattern {
    pub fn new(file: &str, suffix: Vec<String>) -> Result<Self, ProtocolError> {
        Ok(Self {
            file: Regex::new(file)?,
            suffix,
        })
    }

    pub fn accepts_suffix(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.suffix.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// Suffix shown in "wrong suffix" messages
    pub fn preferred_suffix(&self) -> &str {
        self.suffix.first().map_or("", String::as_str)
    }
}

/// Everything loaded from the protocol for one schema path
pub struct Protocol {
    pub pattern: Pattern,
    pub schema: jsonschema::Validator,
    pub definitions: Definitions,
}

fn find(locations: &[PathBuf], kind: &str, schema_path: &str) -> Option<PathBuf> {
    locations
        .iter()
        .map(|loc| loc.join(kind).join(format!("{schema_path}.json")))
        .find(|path| path.is_file())
}

fn read_json(path: &Path) -> Result<Value, ProtocolError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProtocolError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ProtocolError::Json {
        path: path.to_path_buf(),
        source,
    })
}

impl Protocol {
    pub fn new(
        pattern: Pattern,
        schema: &Value,
        definitions: Definitions,
    ) -> Result<Self, ProtocolError> {
        let schema =
            jsonschema::validator_for(schema).map_err(|e| ProtocolError::Schema(e.to_string()))?;
        Ok(Self {
            pattern,
            schema,
            definitions,
        })
    }

    pub fn load(locations: &[PathBuf], schema_path: &str) -> Result<Self, ProtocolError> {
        let schema_path = schema_path.trim_matches('/');

        let pattern_path = find(locations, "pattern", schema_path)
            .ok_or_else(|| ProtocolError::PatternNotFound(schema_path.to_string()))?;
        let schema_file = find(locations, "schema", schema_path)
            .ok_or_else(|| ProtocolError::SchemaNotFound(schema_path.to_string()))?;
        let definitions_path = find(locations, "definitions", schema_path)
            .ok_or_else(|| ProtocolError::DefinitionsNotFound(schema_path.to_string()))?;

        let pattern: PatternFile =
            serde_json::from_value(read_json(&pattern_path)?).map_err(|source| {
                ProtocolError::Json {
                    path: pattern_path.clone(),
                    source,
                }
            })?;
        let definitions: Definitions = serde_json::from_value(read_json(&definitions_path)?)
            .map_err(|source| ProtocolError::Json {
                path: definitions_path.clone(),
                source,
            })?;

        Self::new(
            Pattern::new(&pattern.file, pattern.suffix)?,
            &read_json(&schema_file)?,
            definitions,
        )
    }
}
