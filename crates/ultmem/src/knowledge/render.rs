//! Text renderings of the knowledge graph
//!
//! ```text
//! dot -Tsvg graph.dot -o graph.svg
//! ```

use crate::knowledge::graph::{GraphNode, KnowledgeGraph, NodeType};

fn node_color(node_type: &NodeType) -> &'static str {
    match node_type {
        NodeType::Knowledge => "#3498db",
        NodeType::Identity => "#e74c3c",
        NodeType::Preference => "#2ecc71",
        NodeType::Organization => "#9b59b6",
        NodeType::Technology => "#f39c12",
        NodeType::Location => "#1abc9c",
        NodeType::Entity | NodeType::Custom(_) => "#95a5a6",
    }
}

fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Mermaid labels cannot hold quotes, brackets or raw newlines
fn escape_mermaid_label(s: &str) -> String {
    s.replace('"', "'")
        .replace(['[', ']'], " ")
        .replace('\n', " ")
}

fn dot_style(node: &GraphNode) -> &'static str {
    if node.tombstoned {
        "filled,rounded,dashed"
    } else {
        "filled,rounded"
    }
}

/// Render the whole graph in Graphviz DOT format
pub fn to_dot(graph: &KnowledgeGraph, title: &str) -> String {
    let mut dot = String::new();

    dot.push_str(&format!("digraph \"{}\" {{\n", escape_dot_string(title)));
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [shape=box, fontsize=10];\n");
    dot.push_str("  edge [fontsize=8];\n\n");

    for node in graph.nodes() {
        dot.push_str(&format!(
            "  \"{}\" [label=\"{}\", fillcolor=\"{}\", style=\"{}\"];\n",
            node.id,
            escape_dot_string(&node.label()),
            node_color(&node.node_type),
            dot_style(node)
        ));
    }

    dot.push('\n');

    for edge in graph.edges() {
        dot.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\", penwidth={}];\n",
            edge.from,
            edge.to,
            escape_dot_string(&edge.edge_type),
            edge.weight
        ));
    }

    dot.push_str("}\n");
    dot
}

/// Render the whole graph as a Mermaid flowchart
pub fn to_mermaid(graph: &KnowledgeGraph) -> String {
    let mut mermaid = String::from("graph LR\n");

    for node in graph.nodes() {
        mermaid.push_str(&format!(
            "  {}[\"{}<br/>Type: {}\"]\n",
            node.id,
            escape_mermaid_label(&node.label()),
            node.node_type
        ));
    }

    for edge in graph.edges() {
        let arrow = if graph.node(edge.to).is_some_and(|n| n.tombstoned) {
            "-.->"
        } else {
            "-->"
        };
        mermaid.push_str(&format!(
            "  {} {}|{}| {}\n",
            edge.from, arrow, edge.edge_type, edge.to
        ));
    }

    mermaid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnowledgeConfig;
    use crate::memory::types::Metadata;

    fn sample_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new(&KnowledgeConfig::default());
        graph.add_item("ult://m/a", "Alice is using Rust", &Metadata::new());
        graph
    }

    #[test]
    fn test_to_dot() {
        let dot = to_dot(&sample_graph(), "Knowledge Graph");

        assert!(dot.starts_with("digraph \"Knowledge Graph\" {"));
        assert!(dot.contains("label=\"Alice\""));
        assert!(dot.contains("fillcolor=\"#e74c3c\""));
        assert!(dot.contains("\"0\" -> \"1\" [label=\"mentions\""));
        assert!(dot.contains("[label=\"uses\", penwidth=0.7]"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_to_dot_marks_tombstones() {
        let mut graph = sample_graph();
        graph.tombstone("ult://m/a");

        let dot = to_dot(&graph, "g");
        assert_eq!(dot.matches("dashed").count(), 1);
    }

    #[test]
    fn test_to_mermaid() {
        let mermaid = to_mermaid(&sample_graph());

        assert!(mermaid.starts_with("graph LR\n"));
        assert!(mermaid.contains("1[\"Alice<br/>Type: identity\"]"));
        assert!(mermaid.contains("1 -->|uses| 2"));
    }

    #[test]
    fn test_escape_dot_string() {
        assert_eq!(escape_dot_string("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_dot_string("a\nb"), "a\\nb");
    }

    #[test]
    fn test_escape_mermaid_label() {
        assert_eq!(escape_mermaid_label("[x] \"y\""), " x  'y'");
    }
}
