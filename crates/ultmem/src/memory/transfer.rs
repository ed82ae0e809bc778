//! Export and import document types
//!
//! Memories are exported as a single JSON document:
//! `{version, exportDate, count, memories: [{uri, content, metadata, phi, createdAt, updatedAt}]}`.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UltError};
use crate::memory::types::Metadata;

/// Format version written into every export
pub const EXPORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
}

impl FromStr for ExportFormat {
    type Err = UltError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            other => Err(UltError::Config(format!("Unsupported export format: {other}"))),
        }
    }
}

/// A complete export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub count: usize,
    pub memories: Vec<ExportedMemory>,
}

impl ExportDocument {
    pub fn new(memories: Vec<ExportedMemory>) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            export_date: Utc::now(),
            count: memories.len(),
            memories,
        }
    }
}

/// One exported memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedMemory {
    pub uri: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub phi: f32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// How an import treats URIs that already exist
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Count existing URIs as skipped
    pub skip_duplicates: bool,
    /// Overwrite existing URIs with the imported content and metadata
    pub update_existing: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            update_existing: false,
        }
    }
}

/// Per-record outcome counts of an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Records that were malformed or failed to store
    pub failed: usize,
}

/// Parse an export document into its records.
///
/// The envelope must be a JSON object; a missing `memories` field is an
/// empty import. Each record is decoded on its own so one malformed entry
/// does not reject the rest: those come back as `Err`.
pub fn parse_import(data: &str) -> Result<Vec<std::result::Result<ExportedMemory, String>>> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| UltError::Import(format!("Invalid import document: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| UltError::Import("Import document must be a JSON object".to_string()))?;

    let records = match object.get("memories") {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(records)) => records,
        Some(_) => {
            return Err(UltError::Import(
                "`memories` must be an array".to_string(),
            ));
        }
    };

    Ok(records
        .iter()
        .map(|record| {
            serde_json::from_value::<ExportedMemory>(record.clone()).map_err(|e| e.to_string())
        })
        .collect())
}
