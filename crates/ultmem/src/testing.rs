//! Test utilities for ultmem - shared fixtures
//!
//! Builders for configs rooted in a temporary directory and for file items
//! with real vectors and phi scores, plus a small sample corpus.

use std::path::Path;

use crate::config::{Config, StorageConfig};
use crate::embedding::HashEmbedder;
use crate::memory::phi::score_phi;
use crate::memory::types::{FileBody, MemoryItem, Metadata};

/// Short texts on distinct topics, used by retrieval tests
pub const SAMPLE_CORPUS: [&str; 5] = [
    "Alice is a backend engineer who uses Rust for storage services.",
    "The tokio runtime schedules async tasks across worker threads.",
    "Bob was hired at Microsoft to work on TypeScript tooling.",
    "Sourdough bread needs a mature starter and a long cold proof.",
    "Vector similarity search ranks documents by cosine distance.",
];

/// Storage config rooted at `dir` with default limits
pub fn storage_config(dir: &Path) -> StorageConfig {
    StorageConfig {
        data_dir: dir.to_path_buf(),
        ..StorageConfig::default()
    }
}

/// Full config rooted at `dir` without the default directory layout, so
/// tier sizes only count the items a test adds
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::with_data_dir(dir);
    config.namespace.create_default_layout = false;
    config
}

/// A file body with its vector and phi computed from `content`
pub fn file_body(content: &str) -> FileBody {
    FileBody::new(
        content.to_string(),
        Metadata::new(),
        HashEmbedder::new().embed(content),
        score_phi(content),
    )
}

pub fn file_item(uri: &str, content: &str) -> MemoryItem {
    MemoryItem::new_file(uri, file_body(content))
}

/// Enable log output in tests that want it; `RUST_LOG` overrides
pub fn init_test_logging() {
    crate::logging::init_logging("warn,ultmem=debug");
}
