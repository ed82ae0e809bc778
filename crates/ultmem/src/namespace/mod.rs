//! Hierarchical namespace over the tier store
//!
//! Files and directories are [`MemoryItem`]s addressed by `ult://` URIs.
//! Symlinks and mount points are in-process maps: a symlink redirects reads
//! from one URI to another, a mount point only records an external source
//! descriptor and performs no I/O.
//!
//! Moves and copies are a read, a write and (for moves) a delete. They are
//! not atomic: a crash in between can leave both or neither location.

pub mod uri;

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, UltError};
use crate::memory::types::{FileBody, ItemKind, MemoryItem, StorageTier};
use crate::storage::TierStore;

pub use uri::{ParsedUri, generate_uri, parent_uri, parse_uri};

/// Directories created on startup when `create_default_layout` is set
pub const DEFAULT_LAYOUT: [&str; 13] = [
    "ult://memories",
    "ult://memories/preferences",
    "ult://memories/relationships",
    "ult://memories/knowledge",
    "ult://memories/context",
    "ult://skills",
    "ult://skills/coding",
    "ult://skills/analysis",
    "ult://skills/communication",
    "ult://resources",
    "ult://resources/conversations",
    "ult://resources/documents",
    "ult://resources/images",
];

/// Directories live in the file-backed tier
const DIRECTORY_TIER: StorageTier = StorageTier::L1;

/// An external resource recorded at a URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPoint {
    pub uri: String,
    pub source: String,
    pub mounted_at: DateTime<Utc>,
}

/// Metadata about a stored item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStat {
    pub uri: String,
    pub kind: &'static str,
    pub size: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: u32,
    pub tier: StorageTier,
}

/// Symlinks and mount points, for export
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStructure {
    pub symlinks: Vec<(String, String)>,
    pub mount_points: Vec<MountPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    pub symlinks: usize,
    pub mount_points: usize,
}

pub struct Namespace {
    store: TierStore,
    symlinks: BTreeMap<String, String>,
    mounts: BTreeMap<String, MountPoint>,
    create_default_layout: bool,
}

impl Namespace {
    pub async fn open(config: &Config) -> Result<Self> {
        let store = TierStore::open(config.storage.clone()).await?;
        let mut namespace = Self {
            store,
            symlinks: BTreeMap::new(),
            mounts: BTreeMap::new(),
            create_default_layout: config.namespace.create_default_layout,
        };

        if namespace.create_default_layout {
            namespace.ensure_default_layout().await?;
        }
        Ok(namespace)
    }

    pub fn store(&self) -> &TierStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TierStore {
        &mut self.store
    }

    async fn ensure_default_layout(&mut self) -> Result<()> {
        let mut created = 0;
        for dir in DEFAULT_LAYOUT {
            if !self.store.contains(dir).await {
                self.create_directory(dir).await?;
                created += 1;
            }
        }
        if created > 0 {
            tracing::info!("Created {} default directories", created);
        }
        Ok(())
    }

    /// Store a new file at `uri` in `tier` and register it with its parent
    /// directory, if that directory exists.
    pub async fn add_file(
        &mut self,
        uri: &str,
        body: FileBody,
        tier: StorageTier,
    ) -> Result<MemoryItem> {
        self.insert_file(MemoryItem::new_file(uri, body), tier).await
    }

    /// Store a prepared file item as is. Timestamps on a new URI are kept.
    pub async fn insert_file(&mut self, item: MemoryItem, tier: StorageTier) -> Result<MemoryItem> {
        parse_uri(&item.uri)?;
        if !item.is_file() {
            return Err(UltError::General(format!("Not a file: {}", item.uri)));
        }
        if self.store.peek(&item.uri).await.is_some_and(|existing| !existing.is_file()) {
            return Err(UltError::General(format!(
                "Cannot replace directory {} with a file",
                item.uri
            )));
        }

        let uri = item.uri.clone();
        let size = item.size();
        let stored = self.store.store(item, tier).await?;
        self.link_child(&uri).await?;

        tracing::info!("Added file {} ({} chars) to {}", uri, size, tier);
        Ok(stored)
    }

    /// Read a file through any symlinks, without counting an access
    pub async fn get_file(&self, uri: &str) -> Result<Option<MemoryItem>> {
        let target = self.resolve_symlink(uri)?;
        Ok(self
            .store
            .peek(&target)
            .await
            .filter(MemoryItem::is_file))
    }

    /// Replace the body of the file at `uri`, keeping its tier
    pub async fn update_file(&mut self, uri: &str, body: FileBody) -> Result<MemoryItem> {
        let Some(mut item) = self.store.peek(uri).await.filter(MemoryItem::is_file) else {
            return Err(UltError::NotFound(format!("File not found: {uri}")));
        };

        let tier = item.tier;
        item.kind = ItemKind::File(body);
        item.updated_at = Utc::now();
        let stored = self.store.store(item, tier).await?;

        tracing::info!("Updated file {}", uri);
        Ok(stored)
    }

    /// Remove a URI's symlink, mount point, parent registration and stored
    /// item. Returns whether anything was removed.
    pub async fn delete(&mut self, uri: &str) -> Result<bool> {
        let mut removed = self.symlinks.remove(uri).is_some();
        removed |= self.mounts.remove(uri).is_some();
        self.unlink_child(uri).await?;
        removed |= self.store.delete(uri).await;

        if removed {
            tracing::info!("Deleted {}", uri);
        }
        Ok(removed)
    }

    /// Rewrite the item at `from` under `to` in the same tier, then delete `from`
    pub async fn move_item(&mut self, from: &str, to: &str) -> Result<MemoryItem> {
        parse_uri(to)?;
        let mut item = self
            .store
            .peek(from)
            .await
            .ok_or_else(|| UltError::NotFound(format!("Source not found: {from}")))?;
        if from == to {
            return Ok(item);
        }

        let tier = item.tier;
        item.id = Uuid::new_v4();
        item.uri = to.to_string();
        item.updated_at = Utc::now();
        let moved = self.store.store(item, tier).await?;
        self.link_child(to).await?;

        self.unlink_child(from).await?;
        self.store.delete(from).await;

        tracing::info!("Moved {} -> {}", from, to);
        Ok(moved)
    }

    /// Duplicate the item at `from` under `to` in the same tier
    pub async fn copy_item(&mut self, from: &str, to: &str) -> Result<MemoryItem> {
        parse_uri(to)?;
        let source = self
            .store
            .peek(from)
            .await
            .ok_or_else(|| UltError::NotFound(format!("Source not found: {from}")))?;

        let tier = source.tier;
        let mut copy = match source.kind {
            ItemKind::File(mut body) => {
                body.copied_from = Some(from.to_string());
                MemoryItem::new_file(to, body)
            }
            ItemKind::Directory(body) => {
                let mut dir = MemoryItem::new_directory(to);
                dir.kind = ItemKind::Directory(body);
                dir
            }
        };
        copy.tier = tier;

        let copied = self.store.store(copy, tier).await?;
        self.link_child(to).await?;

        tracing::info!("Copied {} -> {}", from, to);
        Ok(copied)
    }

    /// Create an empty directory. An existing directory is returned as is.
    pub async fn create_directory(&mut self, uri: &str) -> Result<MemoryItem> {
        if !uri.starts_with(uri::SCHEME) || uri.len() == uri::SCHEME.len() {
            return Err(UltError::InvalidUri(uri.to_string()));
        }

        if let Some(existing) = self.store.peek(uri).await {
            if existing.is_directory() {
                return Ok(existing);
            }
            return Err(UltError::General(format!(
                "Cannot create directory {uri}: a file exists there"
            )));
        }

        let dir = self
            .store
            .store(MemoryItem::new_directory(uri), DIRECTORY_TIER)
            .await?;
        self.link_child(uri).await?;

        tracing::debug!("Created directory {}", uri);
        Ok(dir)
    }

    /// Children registered in a directory; empty for anything else
    pub async fn list_directory(&self, uri: &str) -> Vec<String> {
        self.store
            .peek(uri)
            .await
            .and_then(|item| item.as_directory().map(|d| d.children.clone()))
            .unwrap_or_default()
    }

    pub fn create_symlink(&mut self, from: &str, to: &str) {
        self.symlinks.insert(from.to_string(), to.to_string());
        tracing::info!("Created symlink {} -> {}", from, to);
    }

    /// Follow symlinks from `uri` to the final target. A URI with no
    /// symlink resolves to itself.
    pub fn resolve_symlink(&self, uri: &str) -> Result<String> {
        let mut current = uri;
        let mut visited = HashSet::new();

        while let Some(next) = self.symlinks.get(current) {
            if !visited.insert(current) {
                return Err(UltError::SymlinkCycle(uri.to_string()));
            }
            current = next.as_str();
        }
        Ok(current.to_string())
    }

    pub fn mount(&mut self, uri: &str, source: &str) -> MountPoint {
        let mount = MountPoint {
            uri: uri.to_string(),
            source: source.to_string(),
            mounted_at: Utc::now(),
        };
        self.mounts.insert(uri.to_string(), mount.clone());
        tracing::info!("Mounted {} at {}", source, uri);
        mount
    }

    pub fn unmount(&mut self, uri: &str) -> bool {
        let removed = self.mounts.remove(uri).is_some();
        if removed {
            tracing::info!("Unmounted {}", uri);
        }
        removed
    }

    pub fn get_mount(&self, uri: &str) -> Option<&MountPoint> {
        self.mounts.get(uri)
    }

    /// Describe the item at `uri` without counting an access
    pub async fn stat(&self, uri: &str) -> Option<ItemStat> {
        self.store.peek(uri).await.map(|item| ItemStat {
            kind: item.kind.name(),
            size: item.size(),
            created_at: item.created_at,
            updated_at: item.updated_at,
            access_count: item.access_count,
            tier: item.tier,
            uri: item.uri,
        })
    }

    pub fn export_structure(&self) -> NamespaceStructure {
        NamespaceStructure {
            symlinks: self
                .symlinks
                .iter()
                .map(|(from, to)| (from.clone(), to.clone()))
                .collect(),
            mount_points: self.mounts.values().cloned().collect(),
        }
    }

    pub fn stats(&self) -> NamespaceStats {
        NamespaceStats {
            symlinks: self.symlinks.len(),
            mount_points: self.mounts.len(),
        }
    }

    /// Empty the store, symlinks and mounts; recreate the default layout
    pub async fn clear(&mut self) -> Result<()> {
        self.store.clear().await;
        self.symlinks.clear();
        self.mounts.clear();
        if self.create_default_layout {
            self.ensure_default_layout().await?;
        }
        Ok(())
    }

    async fn link_child(&mut self, child: &str) -> Result<()> {
        self.edit_parent(child, |children| {
            if children.iter().any(|c| c == child) {
                false
            } else {
                children.push(child.to_string());
                true
            }
        })
        .await
    }

    async fn unlink_child(&mut self, child: &str) -> Result<()> {
        self.edit_parent(child, |children| {
            let before = children.len();
            children.retain(|c| c != child);
            children.len() != before
        })
        .await
    }

    /// Apply `edit` to the children of `child`'s parent directory and store
    /// it back if `edit` reports a change. Missing parents are ignored.
    async fn edit_parent<F>(&mut self, child: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<String>) -> bool,
    {
        let Some(parent) = parent_uri(child) else {
            return Ok(());
        };
        let Some(mut dir) = self.store.peek(parent).await else {
            return Ok(());
        };
        let tier = dir.tier;
        let Some(body) = dir.as_directory_mut() else {
            return Ok(());
        };

        if edit(&mut body.children) {
            dir.updated_at = Utc::now();
            self.store.store(dir, tier).await?;
        }
        Ok(())
    }
}
