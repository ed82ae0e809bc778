//! The `UltMemory` facade
//!
//! Composes the namespace (and through it the tier store) with the
//! knowledge index. Every write goes to both so the vector index, the graph
//! and the stored items stay in lockstep.
//!
//! Operations take `&mut self`; share an instance across tasks with
//! `Arc<tokio::sync::Mutex<UltMemory>>`.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::knowledge::render;
use crate::knowledge::{GraphNode, KnowledgeIndex, KnowledgeStats};
use crate::memory::compression::{CompressedContext, compress};
use crate::memory::retrieval::{RetrieveOptions, RetrievedMemory};
use crate::memory::transfer::{
    ExportDocument, ExportFormat, ExportedMemory, ImportOptions, ImportReport, parse_import,
};
use crate::memory::types::{MemoryItem, Metadata, StorageTier};
use crate::namespace::{MountPoint, Namespace, NamespaceStats, generate_uri};
use crate::storage::TierStats;

pub const DEFAULT_MEMORY_TYPE: &str = "general";
pub const DEFAULT_CATEGORY: &str = "memories";
/// Hops followed by [`UltMemory::reason`] callers that have no preference
pub const DEFAULT_REASON_DEPTH: usize = 2;

const GRAPH_TITLE: &str = "ultmem knowledge graph";

/// How a new memory is addressed and tagged
#[derive(Debug, Clone)]
pub struct AddOptions {
    /// Second URI segment and the `type` metadata value
    pub memory_type: String,
    /// First URI segment and the `category` metadata value
    pub category: String,
    pub metadata: Metadata,
    /// Overrides `storage.default_tier`
    pub tier: Option<StorageTier>,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            memory_type: DEFAULT_MEMORY_TYPE.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            metadata: Metadata::new(),
            tier: None,
        }
    }
}

impl AddOptions {
    pub fn with_type(mut self, memory_type: impl Into<String>) -> Self {
        self.memory_type = memory_type.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn in_tier(mut self, tier: StorageTier) -> Self {
        self.tier = Some(tier);
        self
    }
}

/// Results of one query in a batch retrieval
#[derive(Debug, Clone, Serialize)]
pub struct QueryResults {
    pub query: String,
    pub results: Vec<RetrievedMemory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UltStats {
    pub version: &'static str,
    pub storage: TierStats,
    pub namespace: NamespaceStats,
    pub knowledge: KnowledgeStats,
}

pub struct UltMemory {
    config: Config,
    namespace: Namespace,
    index: KnowledgeIndex,
}

impl UltMemory {
    /// Open the store under `config.storage.data_dir` and rebuild the
    /// vector index and graph from every persisted file item.
    pub async fn open(config: Config) -> Result<Self> {
        let namespace = Namespace::open(&config).await?;
        let index = KnowledgeIndex::new(config.knowledge.clone());

        let mut memory = Self {
            config,
            namespace,
            index,
        };
        memory.rebuild_index().await;

        tracing::info!(
            "ultmem {} opened at {} ({} memories indexed)",
            env!("CARGO_PKG_VERSION"),
            memory.config.storage.data_dir.display(),
            memory.index.len()
        );
        Ok(memory)
    }

    async fn rebuild_index(&mut self) {
        let mut items: Vec<MemoryItem> = self
            .namespace
            .store()
            .list_all()
            .await
            .into_iter()
            .filter(MemoryItem::is_file)
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.uri.cmp(&b.uri)));

        for item in &items {
            self.index.index_item(item);
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn index(&self) -> &KnowledgeIndex {
        &self.index
    }

    /// Store `content` under a fresh `ult://<category>/<type>/<id>` URI
    pub async fn add_memory(&mut self, content: &str, opts: AddOptions) -> Result<String> {
        let uri = generate_uri(
            &opts.category,
            &format!("{}/{}", opts.memory_type, new_memory_id()),
        );

        let mut metadata = opts.metadata;
        metadata.insert("type".into(), opts.memory_type.clone().into());
        metadata.insert("category".into(), opts.category.clone().into());

        let tier = opts.tier.unwrap_or(self.config.storage.default_tier);
        self.index
            .add_knowledge(&mut self.namespace, &uri, content, metadata, tier)
            .await?;

        tracing::info!("Added memory {} ({}/{})", uri, opts.category, opts.memory_type);
        Ok(uri)
    }

    /// Hybrid search. Each returned memory counts as one access and may be
    /// promoted; `tier` reports where it was served from.
    pub async fn retrieve_memory(
        &mut self,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<Vec<RetrievedMemory>> {
        let hits = self.index.retrieve(self.namespace.store(), query, opts).await?;

        let mut memories = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(item) = self.namespace.store_mut().retrieve(&hit.uri).await? else {
                tracing::warn!("Indexed memory {} is missing from storage", hit.uri);
                continue;
            };
            let tier = item.tier;
            let Some(body) = item.as_file() else {
                continue;
            };

            memories.push(RetrievedMemory {
                uri: hit.uri,
                similarity: hit.similarity,
                final_score: hit.final_score,
                phi: hit.phi,
                methods: hit.methods,
                content: body.content.clone(),
                metadata: body.metadata.clone(),
                tier,
            });
        }

        tracing::info!("Retrieved {} memories for {:?}", memories.len(), query);
        Ok(memories)
    }

    /// Read a memory through symlinks without counting an access
    pub async fn get_memory(&self, uri: &str) -> Result<Option<MemoryItem>> {
        let item = self.namespace.get_file(uri).await?;
        if item.is_none() {
            tracing::debug!("Memory not found: {}", uri);
        }
        Ok(item)
    }

    /// Replace the content of a memory and merge `metadata` into its
    /// existing metadata. Returns `false` if there is no such memory.
    pub async fn update_memory(
        &mut self,
        uri: &str,
        content: &str,
        metadata: Metadata,
    ) -> Result<bool> {
        let Some(existing) = self.namespace.get_file(uri).await? else {
            return Ok(false);
        };

        let mut merged = existing
            .as_file()
            .map(|body| body.metadata.clone())
            .unwrap_or_default();
        merged.extend(metadata);

        self.index
            .add_knowledge(&mut self.namespace, &existing.uri, content, merged, existing.tier)
            .await?;

        tracing::info!("Updated memory {}", existing.uri);
        Ok(true)
    }

    /// Remove a memory from storage and the vector index, tombstoning its
    /// graph node. Returns whether anything was removed.
    pub async fn delete_memory(&mut self, uri: &str) -> Result<bool> {
        let stored = self.namespace.delete(uri).await?;
        let indexed = self.index.remove(uri);

        if stored || indexed {
            tracing::info!("Deleted memory {}", uri);
        }
        Ok(stored || indexed)
    }

    pub async fn move_memory(&mut self, from: &str, to: &str) -> Result<MemoryItem> {
        let moved = self.namespace.move_item(from, to).await?;
        if from != to {
            self.index.remove(from);
            self.index.index_item(&moved);
        }
        Ok(moved)
    }

    pub async fn copy_memory(&mut self, from: &str, to: &str) -> Result<MemoryItem> {
        let copied = self.namespace.copy_item(from, to).await?;
        self.index.index_item(&copied);
        Ok(copied)
    }

    /// Create an empty namespace directory. Directories are not indexed.
    pub async fn create_directory(&mut self, uri: &str) -> Result<MemoryItem> {
        self.namespace.create_directory(uri).await
    }

    /// Point `from` at `to`; reads through `from` resolve to `to`
    pub fn create_symlink(&mut self, from: &str, to: &str) {
        self.namespace.create_symlink(from, to);
    }

    pub fn mount(&mut self, uri: &str, source: &str) -> MountPoint {
        self.namespace.mount(uri, source)
    }

    pub fn unmount(&mut self, uri: &str) -> bool {
        self.namespace.unmount(uri)
    }

    /// Graph nodes reachable from the memory at `uri` within `depth` hops
    pub async fn reason(&self, uri: &str, depth: usize) -> Vec<GraphNode> {
        let nodes = self.index.reason(uri, depth);
        tracing::info!("Reasoned from {} (depth {}): {} nodes", uri, depth, nodes.len());
        nodes
    }

    /// Summarize the memories at `uris`. Missing URIs are skipped; each
    /// found memory counts as an access.
    pub async fn compress_context<S: AsRef<str>>(&mut self, uris: &[S]) -> Result<CompressedContext> {
        let mut contents = Vec::with_capacity(uris.len());
        for uri in uris {
            let uri = uri.as_ref();
            match self.namespace.store_mut().retrieve(uri).await? {
                Some(item) => {
                    if let Some(content) = item.content() {
                        contents.push(content.to_string());
                    }
                }
                None => tracing::debug!("Skipping missing memory {} in compression", uri),
            }
        }

        let compressed = compress(&contents);
        tracing::info!(
            "Compressed {} memories (ratio {:.2})",
            contents.len(),
            compressed.compression_ratio
        );
        Ok(compressed)
    }

    pub async fn add_memories(&mut self, memories: Vec<(String, AddOptions)>) -> Result<Vec<String>> {
        let mut uris = Vec::with_capacity(memories.len());
        for (content, opts) in memories {
            uris.push(self.add_memory(&content, opts).await?);
        }
        tracing::info!("Added {} memories", uris.len());
        Ok(uris)
    }

    pub async fn retrieve_memories<S: AsRef<str>>(
        &mut self,
        queries: &[S],
        opts: &RetrieveOptions,
    ) -> Result<Vec<QueryResults>> {
        let mut batches = Vec::with_capacity(queries.len());
        for query in queries {
            let query = query.as_ref();
            batches.push(QueryResults {
                query: query.to_string(),
                results: self.retrieve_memory(query, opts).await?,
            });
        }
        Ok(batches)
    }

    /// Delete each URI, returning how many were removed
    pub async fn delete_memories<S: AsRef<str>>(&mut self, uris: &[S]) -> Result<usize> {
        let mut deleted = 0;
        for uri in uris {
            if self.delete_memory(uri.as_ref()).await? {
                deleted += 1;
            }
        }
        tracing::info!("Deleted {} of {} memories", deleted, uris.len());
        Ok(deleted)
    }

    /// Serialize every indexed memory. Reads do not count as accesses.
    pub async fn export_memories(&self, format: ExportFormat) -> Result<String> {
        let mut memories = Vec::with_capacity(self.index.len());
        for uri in self.index.uris() {
            let Some(item) = self.namespace.store().peek(uri).await else {
                continue;
            };
            let Some(body) = item.as_file() else {
                continue;
            };
            memories.push(ExportedMemory {
                uri: item.uri.clone(),
                content: body.content.clone(),
                metadata: body.metadata.clone(),
                phi: body.phi,
                created_at: Some(item.created_at),
                updated_at: Some(item.updated_at),
            });
        }

        let document = ExportDocument::new(memories);
        let output = match format {
            ExportFormat::Json => serde_json::to_string_pretty(&document)?,
        };

        tracing::info!("Exported {} memories", document.count);
        Ok(output)
    }

    /// Load memories from an export document. Records are handled one at a
    /// time; a malformed or failing record is counted and the rest continue.
    pub async fn import_memories(&mut self, data: &str, opts: ImportOptions) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for record in parse_import(data)? {
            let memory = match record {
                Ok(memory) => memory,
                Err(e) => {
                    tracing::warn!("Skipping malformed import record: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            let exists = match self.namespace.get_file(&memory.uri).await {
                Ok(found) => found.is_some(),
                Err(e) => {
                    tracing::warn!("Failed to import {}: {}", memory.uri, e);
                    report.failed += 1;
                    continue;
                }
            };

            if exists {
                if opts.update_existing {
                    match self
                        .update_memory(&memory.uri, &memory.content, memory.metadata)
                        .await
                    {
                        Ok(_) => report.updated += 1,
                        Err(e) => {
                            tracing::warn!("Failed to update {}: {}", memory.uri, e);
                            report.failed += 1;
                        }
                    }
                } else if opts.skip_duplicates {
                    report.skipped += 1;
                } else {
                    tracing::debug!("Leaving existing memory {} untouched", memory.uri);
                }
                continue;
            }

            let uri = memory.uri.clone();
            match self.import_one(memory).await {
                Ok(()) => report.imported += 1,
                Err(e) => {
                    tracing::warn!("Failed to import {}: {}", uri, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Import finished: {} imported, {} updated, {} skipped, {} failed",
            report.imported,
            report.updated,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Store a new record under its own URI, keeping its timestamps
    async fn import_one(&mut self, memory: ExportedMemory) -> Result<()> {
        let body = self.index.prepare(&memory.content, memory.metadata);
        let mut item = MemoryItem::new_file(memory.uri, body);
        if let Some(created_at) = memory.created_at {
            item.created_at = created_at;
        }
        item.updated_at = memory.updated_at.unwrap_or_else(Utc::now);

        let stored = self
            .namespace
            .insert_file(item, self.config.storage.default_tier)
            .await?;
        self.index.index_item(&stored);
        Ok(())
    }

    pub async fn get_stats(&self) -> UltStats {
        UltStats {
            version: env!("CARGO_PKG_VERSION"),
            storage: self.namespace.store().stats().await,
            namespace: self.namespace.stats(),
            knowledge: self.index.stats(),
        }
    }

    /// Graphviz DOT rendering of the knowledge graph
    pub fn graph_dot(&self) -> String {
        render::to_dot(self.index.graph(), GRAPH_TITLE)
    }

    /// Mermaid rendering of the knowledge graph
    pub fn graph_mermaid(&self) -> String {
        render::to_mermaid(self.index.graph())
    }

    /// Remove every memory, directory, symlink and mount, and reset the index
    pub async fn clear(&mut self) -> Result<()> {
        self.namespace.clear().await?;
        self.index.clear();
        tracing::info!("Cleared all memories");
        Ok(())
    }

    /// Spill L0 to disk and close
    pub async fn close(mut self) -> Result<()> {
        self.namespace.store_mut().flush().await?;
        tracing::info!("ultmem closed");
        Ok(())
    }
}

/// Millisecond timestamp plus a short random suffix, unique within a process
fn new_memory_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
