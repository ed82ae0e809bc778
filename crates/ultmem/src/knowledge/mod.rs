//! Knowledge layer: hybrid index, entity extraction and the knowledge graph

pub mod extractor;
pub mod graph;
pub mod index;
pub mod render;

pub use extractor::{Entities, EntityExtractor, Keyword, PatternExtractor, Relation, RelationKind};
pub use graph::{GraphEdge, GraphNode, GraphStats, KnowledgeGraph, NodeId, NodeType};
pub use index::{IndexEntry, KnowledgeIndex, KnowledgeStats};
