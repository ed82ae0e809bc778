//! Tiered item storage
//!
//! Items live in exactly one of three tiers:
//!
//! - **L0**: bounded, in process. When full, the least recently accessed
//!   item is demoted to L1 before a new one is written.
//! - **L1**: bounded, one JSON file per URI under `<data_dir>/L1/`, mirrored
//!   in memory. When full, the least recently accessed item is demoted to L2.
//! - **L2**: unbounded archive of one JSON file per item id under
//!   `<data_dir>/L2/`. Lookups scan the directory linearly.
//!
//! Reads bump `access_count`/`accessed_at`. With `auto_migrate` on, an L1
//! item read more than `promote_l1_after` times moves to L0, and an L2 item
//! read more than `promote_l2_after` times moves to L1.
//!
//! There is no cross-process locking: only one process may use a data
//! directory at a time.

use std::path::{Path, PathBuf};

use chrono::Utc;
use lru::LruCache;
use serde::Serialize;

use crate::config::StorageConfig;
use crate::error::{Result, UltError};
use crate::memory::types::{MemoryItem, StorageTier};
use crate::storage::record::{self, L1_DIR, L2_DIR};

/// Usage of one tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierUsage {
    pub size: usize,
    /// `None` for the unbounded archive
    pub max_size: Option<usize>,
    pub hits: u64,
}

/// Snapshot of tier sizes, hit counters and migrations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    #[serde(rename = "L0")]
    pub l0: TierUsage,
    #[serde(rename = "L1")]
    pub l1: TierUsage,
    #[serde(rename = "L2")]
    pub l2: TierUsage,
    pub migrations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    l0_hits: u64,
    l1_hits: u64,
    l2_hits: u64,
    migrations: u64,
}

/// An item taken out of its tier's map while it is rewritten elsewhere
struct Detached {
    tier: StorageTier,
    item: MemoryItem,
}

pub struct TierStore {
    config: StorageConfig,
    l0: LruCache<String, MemoryItem>,
    l1: LruCache<String, MemoryItem>,
    counters: Counters,
}

impl TierStore {
    /// Open the store rooted at `config.data_dir`, creating the tier
    /// directories and loading every readable L1 record. L1 records beyond
    /// `l1_max_size` are demoted to L2.
    pub async fn open(config: StorageConfig) -> Result<Self> {
        if config.l0_max_size == 0 || config.l1_max_size == 0 {
            return Err(UltError::Config(format!(
                "Tier capacities must be at least 1 (l0_max_size = {}, l1_max_size = {})",
                config.l0_max_size, config.l1_max_size
            )));
        }

        let l1_dir = config.data_dir.join(L1_DIR);
        let l2_dir = config.data_dir.join(L2_DIR);
        for dir in [&l1_dir, &l2_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                UltError::Storage(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }

        let mut store = Self {
            config,
            l0: LruCache::unbounded(),
            l1: LruCache::unbounded(),
            counters: Counters::default(),
        };
        store.load_l1(&l1_dir).await?;

        tracing::info!(
            "Tier store opened at {} (L1: {} items)",
            store.config.data_dir.display(),
            store.l1.len()
        );
        Ok(store)
    }

    async fn load_l1(&mut self, l1_dir: &Path) -> Result<()> {
        let mut items = Vec::new();
        for path in list_record_files(l1_dir).await? {
            match read_record(&path).await {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!("Skipping L1 record {}: {}", path.display(), e),
            }
        }

        // oldest first, so LRU order matches accessed_at order
        items.sort_by(|a, b| a.accessed_at.cmp(&b.accessed_at).then(a.uri.cmp(&b.uri)));
        for mut item in items {
            item.tier = StorageTier::L1;
            self.l1.put(item.uri.clone(), item);
        }

        let excess = self.l1.len().saturating_sub(self.config.l1_max_size);
        for _ in 0..excess {
            self.demote_l1().await?;
        }
        if excess > 0 {
            tracing::info!("Demoted {} L1 items over capacity to L2", excess);
        }
        Ok(())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Write `item` into `tier`, removing it from whichever tier held it
    /// before. Access count, creation time and archive id carry over from
    /// the previous copy.
    pub async fn store(&mut self, mut item: MemoryItem, tier: StorageTier) -> Result<MemoryItem> {
        let previous = self.locate(&item.uri).await;
        if let Some((_, prev)) = &previous {
            item.id = prev.id;
            item.created_at = prev.created_at;
            item.access_count = item.access_count.max(prev.access_count);
        }
        item.accessed_at = Utc::now();
        item.tier = tier;

        let detached = match previous {
            Some((prev_tier, prev)) if prev_tier != tier => Some(self.detach(prev_tier, prev)),
            _ => None,
        };

        let written = match tier {
            StorageTier::L0 => self.put_l0(item.clone()).await,
            StorageTier::L1 => self.put_l1(item.clone()).await,
            StorageTier::L2 => write_record(&record::l2_path(self.data_dir(), &item), &item).await,
        };

        if let Err(e) = written {
            if let Some(detached) = detached {
                self.reattach(detached);
            }
            return Err(e);
        }

        if let Some(detached) = detached {
            self.remove_detached_file(&detached).await;
        }

        tracing::debug!("Stored {} in {}", item.uri, tier);
        Ok(item)
    }

    /// Read an item, bumping its access statistics and possibly promoting
    /// it. The returned copy reports the tier it was served from.
    pub async fn retrieve(&mut self, uri: &str) -> Result<Option<MemoryItem>> {
        if let Some(item) = self.l0.get_mut(uri) {
            item.mark_accessed();
            self.counters.l0_hits += 1;
            return Ok(Some(item.clone()));
        }

        if let Some(item) = self.l1.get_mut(uri) {
            item.mark_accessed();
            self.counters.l1_hits += 1;
            let served = item.clone();

            let path = record::l1_path(&self.config.data_dir, uri);
            if let Err(e) = write_record(&path, &served).await {
                tracing::warn!("Failed to persist access stats for {}: {}", uri, e);
            }

            if self.config.auto_migrate && served.access_count > self.config.promote_l1_after {
                self.promote_l1(uri).await?;
            }
            return Ok(Some(served));
        }

        if let Some((path, mut item)) = self.scan_l2(uri).await {
            item.mark_accessed();
            item.tier = StorageTier::L2;
            self.counters.l2_hits += 1;

            if self.config.auto_migrate && item.access_count > self.config.promote_l2_after {
                self.promote_l2(&path, item.clone()).await?;
            } else if let Err(e) = write_record(&path, &item).await {
                tracing::warn!("Failed to persist access stats for {}: {}", uri, e);
            }
            return Ok(Some(item));
        }

        Ok(None)
    }

    /// Read an item without touching access statistics or tiers
    pub async fn peek(&self, uri: &str) -> Option<MemoryItem> {
        self.locate(uri).await.map(|(_, item)| item)
    }

    /// Tier currently holding `uri`
    pub async fn tier_of(&self, uri: &str) -> Option<StorageTier> {
        self.locate(uri).await.map(|(tier, _)| tier)
    }

    pub async fn contains(&self, uri: &str) -> bool {
        self.locate(uri).await.is_some()
    }

    /// Remove `uri` from every tier. Returns whether anything was removed.
    /// File removal failures are logged, not returned.
    pub async fn delete(&mut self, uri: &str) -> bool {
        let mut deleted = self.l0.pop(uri).is_some();

        if self.l1.pop(uri).is_some() {
            remove_file_logged(&record::l1_path(&self.config.data_dir, uri)).await;
            deleted = true;
        }

        let l2_dir = self.config.data_dir.join(L2_DIR);
        for (path, item) in read_dir_records(&l2_dir).await {
            if item.uri == uri {
                remove_file_logged(&path).await;
                deleted = true;
            }
        }

        if deleted {
            tracing::debug!("Deleted {}", uri);
        }
        deleted
    }

    /// URIs held by `tier`, least recently accessed first for L0 and L1
    pub async fn uris_in(&self, tier: StorageTier) -> Vec<String> {
        match tier {
            StorageTier::L0 => self.l0.iter().rev().map(|(k, _)| k.clone()).collect(),
            StorageTier::L1 => self.l1.iter().rev().map(|(k, _)| k.clone()).collect(),
            StorageTier::L2 => read_dir_records(&self.config.data_dir.join(L2_DIR))
                .await
                .into_iter()
                .map(|(_, item)| item.uri)
                .collect(),
        }
    }

    /// Every stored item, without touching access statistics
    pub async fn list_all(&self) -> Vec<MemoryItem> {
        let mut items: Vec<MemoryItem> = self.l0.iter().rev().map(|(_, v)| v.clone()).collect();
        items.extend(self.l1.iter().rev().map(|(_, v)| v.clone()));
        items.extend(
            read_dir_records(&self.config.data_dir.join(L2_DIR))
                .await
                .into_iter()
                .map(|(_, mut item)| {
                    item.tier = StorageTier::L2;
                    item
                }),
        );
        items
    }

    /// Spill all of L0 into L1 so it survives a restart
    pub async fn flush(&mut self) -> Result<()> {
        let mut spilled = 0;
        while let Some((uri, item)) = self.l0.peek_lru().map(|(k, v)| (k.clone(), v.clone())) {
            self.put_l1(item).await?;
            self.l0.pop(&uri);
            spilled += 1;
        }
        if spilled > 0 {
            tracing::info!("Flushed {} L0 items to L1", spilled);
        }
        Ok(())
    }

    /// Drop every item from every tier, deleting the record files
    pub async fn clear(&mut self) {
        self.l0.clear();
        self.l1.clear();

        for dir in [L1_DIR, L2_DIR] {
            let dir = self.config.data_dir.join(dir);
            match list_record_files(&dir).await {
                Ok(paths) => {
                    for path in paths {
                        remove_file_logged(&path).await;
                    }
                }
                Err(e) => tracing::warn!("Failed to clear {}: {}", dir.display(), e),
            }
        }

        tracing::info!("Tier store cleared");
    }

    pub async fn stats(&self) -> TierStats {
        let l2_size = list_record_files(&self.config.data_dir.join(L2_DIR))
            .await
            .map(|paths| paths.len())
            .unwrap_or(0);

        TierStats {
            l0: TierUsage {
                size: self.l0.len(),
                max_size: Some(self.config.l0_max_size),
                hits: self.counters.l0_hits,
            },
            l1: TierUsage {
                size: self.l1.len(),
                max_size: Some(self.config.l1_max_size),
                hits: self.counters.l1_hits,
            },
            l2: TierUsage {
                size: l2_size,
                max_size: None,
                hits: self.counters.l2_hits,
            },
            migrations: self.counters.migrations,
        }
    }

    async fn locate(&self, uri: &str) -> Option<(StorageTier, MemoryItem)> {
        if let Some(item) = self.l0.peek(uri) {
            return Some((StorageTier::L0, item.clone()));
        }
        if let Some(item) = self.l1.peek(uri) {
            return Some((StorageTier::L1, item.clone()));
        }
        self.scan_l2(uri).await.map(|(_, mut item)| {
            item.tier = StorageTier::L2;
            (StorageTier::L2, item)
        })
    }

    async fn scan_l2(&self, uri: &str) -> Option<(PathBuf, MemoryItem)> {
        read_dir_records(&self.config.data_dir.join(L2_DIR))
            .await
            .into_iter()
            .find(|(_, item)| item.uri == uri)
    }

    /// Insert into L0, demoting the least recently accessed item when full
    async fn put_l0(&mut self, mut item: MemoryItem) -> Result<()> {
        item.tier = StorageTier::L0;

        if !self.l0.contains(&item.uri) && self.l0.len() >= self.config.l0_max_size {
            if let Some((uri, oldest)) = least_recently_accessed(&self.l0) {
                self.put_l1(oldest).await?;
                self.l0.pop(&uri);
                self.counters.migrations += 1;
                tracing::debug!("Demoted {} from L0 to L1", uri);
            }
        }

        self.l0.put(item.uri.clone(), item);
        Ok(())
    }

    /// Insert into L1, demoting the least recently accessed item to L2 when full
    async fn put_l1(&mut self, mut item: MemoryItem) -> Result<()> {
        item.tier = StorageTier::L1;

        if !self.l1.contains(&item.uri) && self.l1.len() >= self.config.l1_max_size {
            self.demote_l1().await?;
        }

        write_record(&record::l1_path(&self.config.data_dir, &item.uri), &item).await?;
        self.l1.put(item.uri.clone(), item);
        Ok(())
    }

    /// Move the least recently accessed L1 item to L2
    async fn demote_l1(&mut self) -> Result<()> {
        let Some((uri, mut oldest)) = least_recently_accessed(&self.l1) else {
            return Ok(());
        };

        oldest.tier = StorageTier::L2;
        write_record(&record::l2_path(&self.config.data_dir, &oldest), &oldest).await?;
        self.l1.pop(&uri);
        remove_file_logged(&record::l1_path(&self.config.data_dir, &uri)).await;
        self.counters.migrations += 1;
        tracing::debug!("Demoted {} from L1 to L2", uri);
        Ok(())
    }

    async fn promote_l1(&mut self, uri: &str) -> Result<()> {
        let Some(item) = self.l1.pop(uri) else {
            return Ok(());
        };

        if let Err(e) = self.put_l0(item.clone()).await {
            self.l1.put(uri.to_string(), item);
            return Err(e);
        }
        remove_file_logged(&record::l1_path(&self.config.data_dir, uri)).await;
        self.counters.migrations += 1;
        tracing::debug!("Promoted {} from L1 to L0", uri);
        Ok(())
    }

    async fn promote_l2(&mut self, archive_path: &Path, item: MemoryItem) -> Result<()> {
        let uri = item.uri.clone();
        self.put_l1(item).await?;
        remove_file_logged(archive_path).await;
        self.counters.migrations += 1;
        tracing::debug!("Promoted {} from L2 to L1", uri);
        Ok(())
    }

    fn detach(&mut self, tier: StorageTier, item: MemoryItem) -> Detached {
        match tier {
            StorageTier::L0 => {
                self.l0.pop(&item.uri);
            }
            StorageTier::L1 => {
                self.l1.pop(&item.uri);
            }
            StorageTier::L2 => {}
        }
        Detached { tier, item }
    }

    fn reattach(&mut self, detached: Detached) {
        let Detached { tier, item } = detached;
        match tier {
            StorageTier::L0 => {
                self.l0.put(item.uri.clone(), item);
            }
            StorageTier::L1 => {
                self.l1.put(item.uri.clone(), item);
            }
            StorageTier::L2 => {}
        }
    }

    async fn remove_detached_file(&self, detached: &Detached) {
        match detached.tier {
            StorageTier::L0 => {}
            StorageTier::L1 => {
                remove_file_logged(&record::l1_path(&self.config.data_dir, &detached.item.uri))
                    .await
            }
            StorageTier::L2 => {
                remove_file_logged(&record::l2_path(&self.config.data_dir, &detached.item)).await
            }
        }
    }
}

/// The item with the oldest `accessed_at`, ties going to the least recently
/// used entry
fn least_recently_accessed(cache: &LruCache<String, MemoryItem>) -> Option<(String, MemoryItem)> {
    cache
        .iter()
        .rev()
        .min_by_key(|(_, item)| item.accessed_at)
        .map(|(uri, item)| (uri.clone(), item.clone()))
}

async fn write_record(path: &Path, item: &MemoryItem) -> Result<()> {
    let bytes = record::encode(item)?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| UltError::Storage(format!("Failed to write {}: {e}", path.display())))
}

async fn read_record(path: &Path) -> Result<MemoryItem> {
    let bytes = tokio::fs::read(path).await?;
    record::decode(&bytes)
}

async fn list_record_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if record::is_record_file(&path) {
            paths.push(path);
        }
    }
    // read_dir order is platform dependent
    paths.sort();
    Ok(paths)
}

/// Every readable record in `dir`. Unreadable files are skipped.
async fn read_dir_records(dir: &Path) -> Vec<(PathBuf, MemoryItem)> {
    let paths = match list_record_files(dir).await {
        Ok(paths) => paths,
        Err(e) => {
            tracing::debug!("Failed to list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match read_record(&path).await {
            Ok(item) => records.push((path, item)),
            Err(e) => tracing::debug!("Skipping archive record {}: {}", path.display(), e),
        }
    }
    records
}

async fn remove_file_logged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("Failed to remove {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{file_item, storage_config};
    use tempfile::tempdir;

    async fn open_store(dir: &Path, l0_max: usize, l1_max: usize) -> TierStore {
        let mut config = storage_config(dir);
        config.l0_max_size = l0_max;
        config.l1_max_size = l1_max;
        TierStore::open(config).await.expect("Failed to open store")
    }

    mod store_tests {
        use super::*;

        #[tokio::test]
        async fn test_store_and_retrieve_l0() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;

            store.store(file_item("ult://m/a", "alpha"), StorageTier::L0).await.unwrap();

            let item = store.retrieve("ult://m/a").await.unwrap().unwrap();
            assert_eq!(item.content(), Some("alpha"));
            assert_eq!(item.tier, StorageTier::L0);
            assert_eq!(item.access_count, 1);
            assert_eq!(store.stats().await.l0.hits, 1);
        }

        #[tokio::test]
        async fn test_store_each_tier() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;

            store.store(file_item("ult://m/l1", "one"), StorageTier::L1).await.unwrap();
            store.store(file_item("ult://m/l2", "two"), StorageTier::L2).await.unwrap();

            assert_eq!(store.tier_of("ult://m/l1").await, Some(StorageTier::L1));
            assert_eq!(store.tier_of("ult://m/l2").await, Some(StorageTier::L2));
            assert!(record::l1_path(dir.path(), "ult://m/l1").exists());
        }

        #[tokio::test]
        async fn test_restore_moves_between_tiers() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;

            store.store(file_item("ult://m/a", "first"), StorageTier::L1).await.unwrap();
            store.store(file_item("ult://m/a", "second"), StorageTier::L0).await.unwrap();

            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L0));
            assert!(store.uris_in(StorageTier::L1).await.is_empty());
            assert!(!record::l1_path(dir.path(), "ult://m/a").exists());
            assert_eq!(
                store.peek("ult://m/a").await.unwrap().content(),
                Some("second")
            );
        }

        #[tokio::test]
        async fn test_restore_keeps_access_count_and_created_at() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;

            let first = store.store(file_item("ult://m/a", "v1"), StorageTier::L0).await.unwrap();
            store.retrieve("ult://m/a").await.unwrap();
            store.retrieve("ult://m/a").await.unwrap();

            let second = store.store(file_item("ult://m/a", "v2"), StorageTier::L2).await.unwrap();
            assert_eq!(second.access_count, 2);
            assert_eq!(second.created_at, first.created_at);
            assert_eq!(second.id, first.id);
        }

        #[tokio::test]
        async fn test_missing_is_none() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;
            assert!(store.retrieve("ult://nope").await.unwrap().is_none());
            assert!(store.peek("ult://nope").await.is_none());
        }

        #[tokio::test]
        async fn test_write_failure_propagates() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;

            std::fs::remove_dir_all(dir.path().join(L1_DIR)).unwrap();
            let result = store.store(file_item("ult://m/a", "x"), StorageTier::L1).await;
            assert!(matches!(result, Err(UltError::Storage(_))));
        }
    }

    mod capacity_tests {
        use super::*;

        #[tokio::test]
        async fn test_l0_demotes_least_recently_accessed() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 2, 10).await;

            for uri in ["ult://m/a", "ult://m/b", "ult://m/c"] {
                store.store(file_item(uri, uri), StorageTier::L0).await.unwrap();
            }

            assert_eq!(store.uris_in(StorageTier::L0).await, vec!["ult://m/b", "ult://m/c"]);
            assert_eq!(store.uris_in(StorageTier::L1).await, vec!["ult://m/a"]);
            assert_eq!(store.stats().await.migrations, 1);
        }

        #[tokio::test]
        async fn test_read_protects_from_demotion() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 2, 10).await;

            store.store(file_item("ult://m/a", "a"), StorageTier::L0).await.unwrap();
            store.store(file_item("ult://m/b", "b"), StorageTier::L0).await.unwrap();
            store.retrieve("ult://m/a").await.unwrap();
            store.store(file_item("ult://m/c", "c"), StorageTier::L0).await.unwrap();

            assert_eq!(store.tier_of("ult://m/b").await, Some(StorageTier::L1));
            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L0));
        }

        #[tokio::test]
        async fn test_rewrite_in_full_l0_does_not_demote() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 2, 10).await;

            store.store(file_item("ult://m/a", "a"), StorageTier::L0).await.unwrap();
            store.store(file_item("ult://m/b", "b"), StorageTier::L0).await.unwrap();
            store.store(file_item("ult://m/a", "a2"), StorageTier::L0).await.unwrap();

            assert_eq!(store.stats().await.l0.size, 2);
            assert!(store.uris_in(StorageTier::L1).await.is_empty());
        }

        #[tokio::test]
        async fn test_l1_overflow_demotes_to_l2() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 1, 1).await;

            for uri in ["ult://m/a", "ult://m/b", "ult://m/c"] {
                store.store(file_item(uri, uri), StorageTier::L0).await.unwrap();
            }

            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L2));
            assert_eq!(store.tier_of("ult://m/b").await, Some(StorageTier::L1));
            assert_eq!(store.tier_of("ult://m/c").await, Some(StorageTier::L0));
            assert_eq!(store.stats().await.l2.size, 1);
        }

        #[tokio::test]
        async fn test_l1_demotes_oldest_access_not_newest_arrival() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 1, 2).await;

            store.store(file_item("ult://m/a", "a"), StorageTier::L0).await.unwrap();
            store.store(file_item("ult://m/x", "x"), StorageTier::L1).await.unwrap();
            // a moves into L1 behind x but keeps its older access time
            store.store(file_item("ult://m/b", "b"), StorageTier::L0).await.unwrap();
            store.store(file_item("ult://m/c", "c"), StorageTier::L0).await.unwrap();

            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L2));
            assert_eq!(store.tier_of("ult://m/x").await, Some(StorageTier::L1));
            assert_eq!(store.tier_of("ult://m/b").await, Some(StorageTier::L1));
            assert_eq!(store.tier_of("ult://m/c").await, Some(StorageTier::L0));
        }

        #[tokio::test]
        async fn test_zero_capacity_is_rejected() {
            let dir = tempdir().unwrap();
            for (l0_max, l1_max) in [(0, 10), (10, 0)] {
                let mut config = storage_config(dir.path());
                config.l0_max_size = l0_max;
                config.l1_max_size = l1_max;
                assert!(matches!(
                    TierStore::open(config).await,
                    Err(UltError::Config(_))
                ));
            }
        }
    }

    mod promotion_tests {
        use super::*;

        #[tokio::test]
        async fn test_l1_promotes_after_threshold() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;
            store.store(file_item("ult://m/a", "a"), StorageTier::L1).await.unwrap();

            for _ in 0..5 {
                let item = store.retrieve("ult://m/a").await.unwrap().unwrap();
                assert_eq!(item.tier, StorageTier::L1);
            }
            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L1));

            // sixth read crosses `> 5`
            let item = store.retrieve("ult://m/a").await.unwrap().unwrap();
            assert_eq!(item.tier, StorageTier::L1);
            assert_eq!(item.access_count, 6);
            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L0));
            assert!(!record::l1_path(dir.path(), "ult://m/a").exists());
        }

        #[tokio::test]
        async fn test_l2_promotes_after_threshold() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;
            store.store(file_item("ult://m/a", "a"), StorageTier::L2).await.unwrap();

            for expected in 1..=3 {
                let item = store.retrieve("ult://m/a").await.unwrap().unwrap();
                assert_eq!(item.access_count, expected);
                assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L2));
            }

            let item = store.retrieve("ult://m/a").await.unwrap().unwrap();
            assert_eq!(item.tier, StorageTier::L2);
            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L1));
            assert_eq!(store.stats().await.l2.size, 0);
            assert_eq!(store.stats().await.l2.hits, 4);
        }

        #[tokio::test]
        async fn test_no_promotion_when_auto_migrate_off() {
            let dir = tempdir().unwrap();
            let mut config = storage_config(dir.path());
            config.auto_migrate = false;
            let mut store = TierStore::open(config).await.unwrap();
            store.store(file_item("ult://m/a", "a"), StorageTier::L1).await.unwrap();

            for _ in 0..10 {
                store.retrieve("ult://m/a").await.unwrap();
            }
            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L1));
        }

        #[tokio::test]
        async fn test_peek_does_not_count() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;
            store.store(file_item("ult://m/a", "a"), StorageTier::L0).await.unwrap();

            store.peek("ult://m/a").await.unwrap();
            assert_eq!(store.peek("ult://m/a").await.unwrap().access_count, 0);
            assert_eq!(store.stats().await.l0.hits, 0);
        }
    }

    mod persistence_tests {
        use super::*;

        #[tokio::test]
        async fn test_l1_survives_reopen() {
            let dir = tempdir().unwrap();
            {
                let mut store = open_store(dir.path(), 10, 10).await;
                store.store(file_item("ult://m/a", "kept"), StorageTier::L1).await.unwrap();
                store.retrieve("ult://m/a").await.unwrap();
            }

            let store = open_store(dir.path(), 10, 10).await;
            let item = store.peek("ult://m/a").await.unwrap();
            assert_eq!(item.content(), Some("kept"));
            assert_eq!(item.access_count, 1);
        }

        #[tokio::test]
        async fn test_reopen_with_smaller_l1_demotes_excess() {
            let dir = tempdir().unwrap();
            {
                let mut store = open_store(dir.path(), 10, 10).await;
                for uri in ["ult://m/a", "ult://m/b", "ult://m/c"] {
                    store.store(file_item(uri, uri), StorageTier::L1).await.unwrap();
                }
            }

            let store = open_store(dir.path(), 10, 1).await;
            assert_eq!(store.uris_in(StorageTier::L1).await, vec!["ult://m/c"]);
            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L2));
            assert_eq!(store.tier_of("ult://m/b").await, Some(StorageTier::L2));
            assert_eq!(std::fs::read_dir(dir.path().join(L1_DIR)).unwrap().count(), 1);
        }

        #[tokio::test]
        async fn test_corrupt_l1_files_are_skipped() {
            let dir = tempdir().unwrap();
            let l1 = dir.path().join(L1_DIR);
            std::fs::create_dir_all(&l1).unwrap();
            std::fs::write(l1.join("empty.json"), "").unwrap();
            std::fs::write(l1.join("broken.json"), "{not json").unwrap();
            std::fs::write(l1.join("old.json"), r#"{"uri": "ult://legacy"}"#).unwrap();

            let store = open_store(dir.path(), 10, 10).await;
            assert_eq!(store.stats().await.l1.size, 0);
        }

        #[tokio::test]
        async fn test_flush_spills_l0() {
            let dir = tempdir().unwrap();
            {
                let mut store = open_store(dir.path(), 10, 10).await;
                store.store(file_item("ult://m/a", "hot"), StorageTier::L0).await.unwrap();
                store.flush().await.unwrap();
                assert_eq!(store.stats().await.l0.size, 0);
            }

            let store = open_store(dir.path(), 10, 10).await;
            assert_eq!(store.tier_of("ult://m/a").await, Some(StorageTier::L1));
        }

        #[tokio::test]
        async fn test_delete_from_every_tier() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;
            store.store(file_item("ult://m/a", "a"), StorageTier::L0).await.unwrap();
            store.store(file_item("ult://m/b", "b"), StorageTier::L1).await.unwrap();
            store.store(file_item("ult://m/c", "c"), StorageTier::L2).await.unwrap();

            for uri in ["ult://m/a", "ult://m/b", "ult://m/c"] {
                assert!(store.delete(uri).await);
                assert!(store.peek(uri).await.is_none());
            }
            assert!(!store.delete("ult://m/a").await);
            assert!(store.list_all().await.is_empty());
        }

        #[tokio::test]
        async fn test_clear_removes_files() {
            let dir = tempdir().unwrap();
            let mut store = open_store(dir.path(), 10, 10).await;
            store.store(file_item("ult://m/b", "b"), StorageTier::L1).await.unwrap();
            store.store(file_item("ult://m/c", "c"), StorageTier::L2).await.unwrap();

            store.clear().await;

            assert!(store.list_all().await.is_empty());
            assert_eq!(std::fs::read_dir(dir.path().join(L1_DIR)).unwrap().count(), 0);
            assert_eq!(std::fs::read_dir(dir.path().join(L2_DIR)).unwrap().count(), 0);
        }
    }
}
