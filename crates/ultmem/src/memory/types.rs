//! Memory types for the ultmem system
//!
//! Defines the stored item, its file/directory payloads, and the storage
//! tier an item currently resides in.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form metadata attached to a file item.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A single item stored in the tier hierarchy, addressed by its URI.
///
/// The `tier` field records where the item currently lives. Migrating an
/// item moves it; a URI is never owned by two tiers at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Identifier used for the L2 archive file name
    pub id: Uuid,
    /// Namespace address of this item
    pub uri: String,
    /// File or directory payload
    pub kind: ItemKind,
    /// Which storage tier this item is in
    pub tier: StorageTier,
    /// When this item was first stored
    pub created_at: DateTime<Utc>,
    /// When the payload last changed
    pub updated_at: DateTime<Utc>,
    /// When this item was last read
    pub accessed_at: DateTime<Utc>,
    /// How many times this item has been read
    pub access_count: u32,
}

impl MemoryItem {
    fn with_kind(uri: impl Into<String>, kind: ItemKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            uri: uri.into(),
            kind,
            tier: StorageTier::L0,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
        }
    }

    /// Create a file item
    pub fn new_file(uri: impl Into<String>, body: FileBody) -> Self {
        Self::with_kind(uri, ItemKind::File(body))
    }

    /// Create an empty directory item
    pub fn new_directory(uri: impl Into<String>) -> Self {
        Self::with_kind(uri, ItemKind::Directory(DirectoryBody::default()))
    }

    /// Mark this item as read, updating access count and timestamp
    pub fn mark_accessed(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.accessed_at = Utc::now();
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, ItemKind::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, ItemKind::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileBody> {
        match &self.kind {
            ItemKind::File(body) => Some(body),
            ItemKind::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileBody> {
        match &mut self.kind {
            ItemKind::File(body) => Some(body),
            ItemKind::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryBody> {
        match &self.kind {
            ItemKind::Directory(body) => Some(body),
            ItemKind::File(_) => None,
        }
    }

    pub fn as_directory_mut(&mut self) -> Option<&mut DirectoryBody> {
        match &mut self.kind {
            ItemKind::Directory(body) => Some(body),
            ItemKind::File(_) => None,
        }
    }

    /// Text content of a file item
    pub fn content(&self) -> Option<&str> {
        self.as_file().map(|f| f.content.as_str())
    }

    /// Content length in characters; directories have size 0
    pub fn size(&self) -> usize {
        self.content().map(|c| c.chars().count()).unwrap_or(0)
    }
}

/// Payload of a stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    File(FileBody),
    Directory(DirectoryBody),
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::File(_) => "file",
            ItemKind::Directory(_) => "directory",
        }
    }
}

/// Content, metadata and derived scores of a file item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBody {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Hash-bucket embedding of `content`
    pub vector: Vec<f32>,
    /// Entropy heuristic in [0, 1], see [`crate::memory::phi`]
    pub phi: f32,
    /// Source URI when this file was produced by a copy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_from: Option<String>,
}

impl FileBody {
    pub fn new(content: String, metadata: Metadata, vector: Vec<f32>, phi: f32) -> Self {
        Self {
            content,
            metadata,
            vector,
            phi,
            copied_from: None,
        }
    }
}

/// Children listing of a directory item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryBody {
    pub children: Vec<String>,
}

/// Storage tier indicating residency and access latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Bounded, in process memory
    L0,
    /// Bounded, one JSON file per URI
    L1,
    /// Unbounded archive directory, scanned linearly
    L2,
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageTier::L0 => write!(f, "L0"),
            StorageTier::L1 => write!(f, "L1"),
            StorageTier::L2 => write!(f, "L2"),
        }
    }
}
