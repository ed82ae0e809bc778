//! On-disk record format for the L1 and L2 tiers
//!
//! Every file holds one [`StoredRecord`]: a format version plus the item.
//! Files with any other version are rejected on load rather than guessed at.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UltError};
use crate::memory::types::MemoryItem;

pub const RECORD_VERSION: u32 = 1;

pub const L1_DIR: &str = "L1";
pub const L2_DIR: &str = "L2";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub version: u32,
    pub item: MemoryItem,
}

impl StoredRecord {
    pub fn new(item: MemoryItem) -> Self {
        Self {
            version: RECORD_VERSION,
            item,
        }
    }
}

/// Serialize `item` as a pretty-printed record
pub fn encode(item: &MemoryItem) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&StoredRecord::new(item.clone()))?)
}

/// Parse a record file's bytes, rejecting blank files and unknown versions
pub fn decode(bytes: &[u8]) -> Result<MemoryItem> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(UltError::Storage("empty record file".to_string()));
    }

    let record: StoredRecord = serde_json::from_slice(bytes)?;
    if record.version != RECORD_VERSION {
        return Err(UltError::Storage(format!(
            "unsupported record version {} (expected {})",
            record.version, RECORD_VERSION
        )));
    }
    Ok(record.item)
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// Distinct URIs can collapse to the same name (`ult://a/b` and `ult://a_b`);
/// the later write wins the file.
pub fn sanitize_uri(uri: &str) -> String {
    uri.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<data_dir>/L1/<sanitized-uri>.json`
pub fn l1_path(data_dir: &Path, uri: &str) -> PathBuf {
    data_dir
        .join(L1_DIR)
        .join(format!("{}.json", sanitize_uri(uri)))
}

/// `<data_dir>/L2/<id>.json`
pub fn l2_path(data_dir: &Path, item: &MemoryItem) -> PathBuf {
    data_dir.join(L2_DIR).join(format!("{}.json", item.id))
}

pub fn is_record_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}
