//! Knowledge graph built from indexed items
//!
//! Every indexed item becomes a node. Extracted entities become nodes keyed
//! by exact name, shared across items. Edges are append-only: removing or
//! re-indexing an item tombstones its node instead of deleting it, and
//! traversal never enters a tombstoned node.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;

use crate::config::KnowledgeConfig;
use crate::knowledge::extractor::{EntityExtractor, PatternExtractor, RelationKind};
use crate::memory::types::Metadata;

pub type NodeId = u64;
pub type EdgeId = u64;

pub const MENTIONS_EDGE: &str = "mentions";
pub const KEYWORD_EDGE: &str = "keyword_match";
const MENTIONS_WEIGHT: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeType {
    Knowledge,
    Identity,
    Preference,
    Organization,
    Technology,
    Location,
    Entity,
    /// Any other `type` metadata value
    Custom(String),
}

impl NodeType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "knowledge" => NodeType::Knowledge,
            "identity" => NodeType::Identity,
            "preference" => NodeType::Preference,
            "organization" => NodeType::Organization,
            "technology" => NodeType::Technology,
            "location" => NodeType::Location,
            "entity" => NodeType::Entity,
            other => NodeType::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Knowledge => "knowledge",
            NodeType::Identity => "identity",
            NodeType::Preference => "preference",
            NodeType::Organization => "organization",
            NodeType::Technology => "technology",
            NodeType::Location => "location",
            NodeType::Entity => "entity",
            NodeType::Custom(label) => label,
        }
    }

    fn for_relation_target(kind: RelationKind) -> Self {
        match kind {
            RelationKind::Uses => NodeType::Technology,
            RelationKind::WorksAt => NodeType::Organization,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    /// Set for item nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Set for entity nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    pub tombstoned: bool,
}

impl GraphNode {
    /// Entity name, or the first 30 characters of content
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.content {
            Some(content) => {
                let head: String = content.chars().take(30).collect();
                format!("{head}...")
            }
            None => format!("Node {}", self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub weight: f32,
    /// Shared keyword for `keyword_match` edges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub tombstoned: usize,
}

pub struct KnowledgeGraph {
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: BTreeMap<EdgeId, GraphEdge>,
    outgoing: HashMap<NodeId, Vec<EdgeId>>,
    /// Live item node per URI
    by_uri: HashMap<String, NodeId>,
    /// Entity node per exact name
    by_name: HashMap<String, NodeId>,
    next_node: NodeId,
    next_edge: EdgeId,
    extractor: Box<dyn EntityExtractor>,
    keyword_edge_weight: f32,
    graph_keywords: usize,
}

impl KnowledgeGraph {
    pub fn new(config: &KnowledgeConfig) -> Self {
        Self::with_extractor(config, Box::new(PatternExtractor::new()))
    }

    pub fn with_extractor(config: &KnowledgeConfig, extractor: Box<dyn EntityExtractor>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            outgoing: HashMap::new(),
            by_uri: HashMap::new(),
            by_name: HashMap::new(),
            next_node: 0,
            next_edge: 0,
            extractor,
            keyword_edge_weight: config.keyword_edge_weight,
            graph_keywords: config.graph_keywords,
        }
    }

    /// Add a node for the item at `uri`, tombstoning any previous node for
    /// it, then derive entity, relation and keyword edges from `content`.
    pub fn add_item(&mut self, uri: &str, content: &str, metadata: &Metadata) -> NodeId {
        self.tombstone(uri);

        let node_type = metadata
            .get("type")
            .and_then(|v| v.as_str())
            .map(NodeType::from_label)
            .unwrap_or(NodeType::Knowledge);

        let item_id = self.insert_node(GraphNode {
            id: 0,
            uri: Some(uri.to_string()),
            name: None,
            node_type,
            content: Some(content.to_string()),
            metadata: metadata.clone(),
            tombstoned: false,
        });
        self.by_uri.insert(uri.to_string(), item_id);

        let entities = self.extractor.extract_entities(content);
        let relations = self.extractor.extract_relations(content, &entities);
        for relation in relations {
            let person = self.entity_node(&relation.from, NodeType::Identity);
            let target = self.entity_node(&relation.to, NodeType::for_relation_target(relation.kind));

            if self.find_edge(item_id, person, Some(MENTIONS_EDGE)).is_none() {
                self.insert_edge(item_id, person, MENTIONS_EDGE, MENTIONS_WEIGHT, None);
            }
            if self.find_edge(person, target, Some(relation.kind.as_str())).is_none() {
                self.insert_edge(person, target, relation.kind.as_str(), relation.confidence, None);
            }
        }

        let keywords = self.extractor.extract_keywords(content, self.graph_keywords);
        for keyword in keywords {
            let matches: Vec<NodeId> = self
                .nodes
                .values()
                .filter(|node| node.id != item_id && !node.tombstoned)
                .filter(|node| {
                    node.content
                        .as_ref()
                        .is_some_and(|c| c.to_lowercase().contains(&keyword.word))
                })
                .map(|node| node.id)
                .collect();

            for existing in matches {
                if self.find_edge(item_id, existing, None).is_none() {
                    self.insert_edge(
                        item_id,
                        existing,
                        KEYWORD_EDGE,
                        self.keyword_edge_weight,
                        Some(keyword.word.clone()),
                    );
                }
            }
        }

        tracing::debug!(
            "Graph node {} for {} ({} nodes, {} edges)",
            item_id,
            uri,
            self.nodes.len(),
            self.edges.len()
        );
        item_id
    }

    /// Tombstone the live node for `uri`. Returns whether one existed.
    pub fn tombstone(&mut self, uri: &str) -> bool {
        let Some(id) = self.by_uri.remove(uri) else {
            return false;
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.tombstoned = true;
        }
        true
    }

    /// Breadth-first traversal along outgoing edges from the live node for
    /// `start_uri`, at most `depth` hops. Each node is returned once, in
    /// visitation order. An unknown URI yields no nodes.
    pub fn reason(&self, start_uri: &str, depth: usize) -> Vec<GraphNode> {
        let Some(&start) = self.by_uri.get(start_uri) else {
            return Vec::new();
        };

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::from([(start, 0usize)]);

        while let Some((id, hops)) = queue.pop_front() {
            if hops > depth || !visited.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            result.push(node.clone());

            for edge_id in self.outgoing.get(&id).into_iter().flatten() {
                let Some(edge) = self.edges.get(edge_id) else {
                    continue;
                };
                let live = self.nodes.get(&edge.to).is_some_and(|n| !n.tombstoned);
                if live && !visited.contains(&edge.to) {
                    queue.push_back((edge.to, hops + 1));
                }
            }
        }

        result
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn node_by_uri(&self, uri: &str) -> Option<&GraphNode> {
        self.by_uri.get(uri).and_then(|id| self.nodes.get(id))
    }

    pub fn node_by_name(&self, name: &str) -> Option<&GraphNode> {
        self.by_name.get(name).and_then(|id| self.nodes.get(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    /// Edges leaving `id`
    pub fn edges_from(&self, id: NodeId) -> Vec<&GraphEdge> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            tombstoned: self.nodes.values().filter(|n| n.tombstoned).count(),
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.outgoing.clear();
        self.by_uri.clear();
        self.by_name.clear();
        self.next_node = 0;
        self.next_edge = 0;
    }

    fn entity_node(&mut self, name: &str, node_type: NodeType) -> NodeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.insert_node(GraphNode {
            id: 0,
            uri: None,
            name: Some(name.to_string()),
            node_type,
            content: None,
            metadata: Metadata::new(),
            tombstoned: false,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn insert_node(&mut self, mut node: GraphNode) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        node.id = id;
        self.nodes.insert(id, node);
        id
    }

    fn insert_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        edge_type: &str,
        weight: f32,
        keyword: Option<String>,
    ) -> EdgeId {
        let id = self.next_edge;
        self.next_edge += 1;
        self.edges.insert(
            id,
            GraphEdge {
                id,
                from,
                to,
                edge_type: edge_type.to_string(),
                weight,
                keyword,
            },
        );
        self.outgoing.entry(from).or_default().push(id);
        id
    }

    /// Edge `from -> to`, optionally restricted to one type
    fn find_edge(&self, from: NodeId, to: NodeId, edge_type: Option<&str>) -> Option<EdgeId> {
        self.outgoing.get(&from)?.iter().copied().find(|edge_id| {
            self.edges.get(edge_id).is_some_and(|edge| {
                edge.to == to && edge_type.is_none_or(|t| edge.edge_type == t)
            })
        })
    }
}
