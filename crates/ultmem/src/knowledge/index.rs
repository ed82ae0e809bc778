//! Hybrid knowledge index
//!
//! Keeps one vector and phi score per stored file item, in lockstep with
//! the namespace, and answers queries by merging vector and full-text hits
//! under a single rerank.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::KnowledgeConfig;
use crate::embedding::{HashEmbedder, cosine_similarity};
use crate::error::Result;
use crate::knowledge::extractor::EntityExtractor;
use crate::knowledge::graph::{GraphNode, KnowledgeGraph};
use crate::memory::phi::score_phi;
use crate::memory::retrieval::{self, MatchMethod, RetrieveOptions, SearchHit};
use crate::memory::types::{FileBody, MemoryItem, Metadata, StorageTier};
use crate::namespace::Namespace;
use crate::storage::TierStore;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub phi: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeStats {
    pub vectors: usize,
    pub nodes: usize,
    pub edges: usize,
    pub tombstoned: usize,
}

pub struct KnowledgeIndex {
    /// Ordered by URI so searches are reproducible
    entries: BTreeMap<String, IndexEntry>,
    embedder: HashEmbedder,
    graph: KnowledgeGraph,
    config: KnowledgeConfig,
}

impl KnowledgeIndex {
    pub fn new(config: KnowledgeConfig) -> Self {
        let graph = KnowledgeGraph::new(&config);
        Self::with_graph(config, graph)
    }

    pub fn with_extractor(config: KnowledgeConfig, extractor: Box<dyn EntityExtractor>) -> Self {
        tracing::debug!("Knowledge index using {} extractor", extractor.name());
        let graph = KnowledgeGraph::with_extractor(&config, extractor);
        Self::with_graph(config, graph)
    }

    fn with_graph(config: KnowledgeConfig, graph: KnowledgeGraph) -> Self {
        Self {
            entries: BTreeMap::new(),
            embedder: HashEmbedder::new(),
            graph,
            config,
        }
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn entry(&self, uri: &str) -> Option<&IndexEntry> {
        self.entries.get(uri)
    }

    /// Indexed URIs in order
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Vectorize and score `content` into a file body
    pub fn prepare(&self, content: &str, metadata: Metadata) -> FileBody {
        FileBody::new(
            content.to_string(),
            metadata,
            self.embedder.embed(content),
            score_phi(content),
        )
    }

    /// Store `content` at `uri` and index it. An existing file is updated in
    /// place and keeps its tier; a new one goes to `tier`.
    pub async fn add_knowledge(
        &mut self,
        namespace: &mut Namespace,
        uri: &str,
        content: &str,
        metadata: Metadata,
        tier: StorageTier,
    ) -> Result<MemoryItem> {
        let body = self.prepare(content, metadata);

        let stored = if namespace.store().contains(uri).await {
            namespace.update_file(uri, body).await?
        } else {
            namespace.add_file(uri, body, tier).await?
        };

        self.index_item(&stored);
        Ok(stored)
    }

    /// Index an already stored file item, replacing any previous entry and
    /// graph node. Directories are ignored. Returns whether the item was
    /// indexed.
    pub fn index_item(&mut self, item: &MemoryItem) -> bool {
        let Some(body) = item.as_file() else {
            return false;
        };

        let vector = if body.vector.len() == self.embedder.dimension() {
            body.vector.clone()
        } else {
            tracing::warn!(
                "Re-embedding {} (stored vector has {} dimensions)",
                item.uri,
                body.vector.len()
            );
            self.embedder.embed(&body.content)
        };

        self.entries.insert(
            item.uri.clone(),
            IndexEntry {
                vector,
                phi: body.phi.clamp(0.0, 1.0),
            },
        );
        self.graph.add_item(&item.uri, &body.content, &body.metadata);
        true
    }

    /// Drop the vector entry and tombstone the graph node for `uri`
    pub fn remove(&mut self, uri: &str) -> bool {
        let removed = self.entries.remove(uri).is_some();
        self.graph.tombstone(uri);
        removed
    }

    /// Indexed items whose cosine similarity to `query` reaches the
    /// configured threshold, best first
    pub fn vector_search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query);

        let mut hits = Vec::new();
        for (uri, entry) in &self.entries {
            let similarity = cosine_similarity(&query_vector, &entry.vector)?;
            if similarity >= self.config.similarity_threshold {
                hits.push(SearchHit::new(uri.clone(), similarity, entry.phi, MatchMethod::Vector));
            }
        }

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Token match over content and serialized metadata. Each lowercase
    /// query token scores 1 when found in the content and 0.5 when found in
    /// the metadata. Searching does not count as an access.
    pub async fn full_text_search(
        &self,
        store: &TierStore,
        query: &str,
        top_k: usize,
    ) -> Vec<SearchHit> {
        let lowered = query.to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let items: HashMap<String, MemoryItem> = store
            .list_all()
            .await
            .into_iter()
            .map(|item| (item.uri.clone(), item))
            .collect();

        let mut hits = Vec::new();
        for (uri, entry) in &self.entries {
            let Some(body) = items.get(uri).and_then(MemoryItem::as_file) else {
                continue;
            };

            let content = body.content.to_lowercase();
            let metadata = serde_json::to_string(&body.metadata)
                .unwrap_or_default()
                .to_lowercase();

            let mut score = 0.0;
            for token in &tokens {
                if content.contains(token) {
                    score += 1.0;
                }
                if metadata.contains(token) {
                    score += 0.5;
                }
            }

            if score > 0.0 {
                hits.push(SearchHit::new(uri.clone(), score, entry.phi, MatchMethod::FullText));
            }
        }

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);
        hits
    }

    /// Run the selected searches, merge by URI, filter by phi, rerank and
    /// keep the best `top_k`
    pub async fn retrieve(
        &self,
        store: &TierStore,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<Vec<SearchHit>> {
        if opts.top_k == 0 {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        if opts.include_vector {
            hits.extend(self.vector_search(query, opts.top_k.saturating_mul(2))?);
        }
        if opts.include_full_text {
            hits.extend(self.full_text_search(store, query, opts.top_k).await);
        }

        let mut merged = retrieval::merge(hits);
        if opts.min_phi > 0.0 {
            merged.retain(|hit| hit.phi >= opts.min_phi);
        }

        let mut ranked =
            retrieval::rerank(merged, self.config.phi_weight, self.config.multi_method_bonus);
        ranked.truncate(opts.top_k);

        tracing::debug!("Query {:?} matched {} items", query, ranked.len());
        Ok(ranked)
    }

    pub fn reason(&self, uri: &str, depth: usize) -> Vec<GraphNode> {
        self.graph.reason(uri, depth)
    }

    pub fn stats(&self) -> KnowledgeStats {
        let graph = self.graph.stats();
        KnowledgeStats {
            vectors: self.entries.len(),
            nodes: graph.nodes,
            edges: graph.edges,
            tombstoned: graph.tombstoned,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.graph.clear();
    }
}
