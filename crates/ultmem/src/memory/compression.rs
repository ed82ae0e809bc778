//! Context compression
//!
//! Collapses a set of memories into a short bulleted summary made of the
//! first sentence of each one.

use serde::Serialize;

use crate::memory::phi::SENTENCE_TERMINATORS;

/// Characters taken from an item that has no usable first sentence
const FALLBACK_CHARS: usize = 100;

/// Result of compressing a set of contents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedContext {
    pub summary: String,
    /// Characters in all contents joined by blank lines
    pub original_size: usize,
    /// Characters in `summary`
    pub compressed_size: usize,
    /// `compressed_size / original_size`, or 1 when there is nothing to compress
    pub compression_ratio: f32,
}

impl CompressedContext {
    fn empty() -> Self {
        Self {
            summary: String::new(),
            original_size: 0,
            compressed_size: 0,
            compression_ratio: 1.0,
        }
    }
}

/// Compress `contents` into a key point summary.
pub fn compress<S: AsRef<str>>(contents: &[S]) -> CompressedContext {
    if contents.is_empty() {
        return CompressedContext::empty();
    }

    let key_points: Vec<&str> = contents.iter().map(|c| key_point(c.as_ref())).collect();
    let summary = format!(
        "Key points:\n- {}\n\nTotal: {} items",
        key_points.join("\n- "),
        contents.len()
    );

    // contents are joined with "\n\n", two characters per gap
    let original_size = contents
        .iter()
        .map(|c| c.as_ref().chars().count())
        .sum::<usize>()
        + 2 * (contents.len() - 1);
    let compressed_size = summary.chars().count();
    let compression_ratio = if original_size == 0 {
        1.0
    } else {
        compressed_size as f32 / original_size as f32
    };

    CompressedContext {
        summary,
        original_size,
        compressed_size,
        compression_ratio,
    }
}

/// Text before the first sentence terminator, or the first
/// [`FALLBACK_CHARS`] characters when there is none or it is empty.
fn key_point(content: &str) -> &str {
    match content.find(SENTENCE_TERMINATORS) {
        Some(end) if end > 0 => &content[..end],
        _ => match content.char_indices().nth(FALLBACK_CHARS) {
            Some((cut, _)) => &content[..cut],
            None => content,
        },
    }
}
