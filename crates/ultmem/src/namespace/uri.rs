//! `ult://<category>/<path>` addresses

use crate::error::{Result, UltError};

pub const SCHEME: &str = "ult://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    pub category: String,
    pub path: String,
}

pub fn generate_uri(category: &str, path: &str) -> String {
    format!("{SCHEME}{category}/{path}")
}

/// Split a URI into category and path. Both parts must be non-empty.
pub fn parse_uri(uri: &str) -> Result<ParsedUri> {
    let rest = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| UltError::InvalidUri(uri.to_string()))?;

    match rest.split_once('/') {
        Some((category, path)) if !category.is_empty() && !path.is_empty() => Ok(ParsedUri {
            category: category.to_string(),
            path: path.to_string(),
        }),
        _ => Err(UltError::InvalidUri(uri.to_string())),
    }
}

/// The enclosing directory URI. `ult://memories` has no parent.
pub fn parent_uri(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix(SCHEME)?;
    let trimmed = rest.trim_end_matches('/');
    let cut = trimmed.rfind('/')?;
    Some(&uri[..SCHEME.len() + cut])
}
