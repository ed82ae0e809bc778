//! Multi-source retrieval merging and reranking
//!
//! Vector and full-text search each produce a list of [`SearchHit`]s. The
//! lists are merged by URI, optionally filtered by phi, and then reranked
//! with a single scoring function:
//!
//! `final = similarity * (1 + phi * phi_weight) * (bonus if found by >1 method)`

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::memory::types::{Metadata, StorageTier};

/// Which search produced a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Vector,
    FullText,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMethod::Vector => write!(f, "vector"),
            MatchMethod::FullText => write!(f, "fulltext"),
        }
    }
}

/// A candidate produced by one or more searches
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub uri: String,
    /// Cosine similarity for vector hits, token score for full-text hits
    pub similarity: f32,
    pub phi: f32,
    /// Contributing methods, in the order they were first seen
    pub methods: Vec<MatchMethod>,
    /// Rerank score; zero until [`rerank`] runs
    pub final_score: f32,
}

impl SearchHit {
    pub fn new(uri: impl Into<String>, similarity: f32, phi: f32, method: MatchMethod) -> Self {
        Self {
            uri: uri.into(),
            similarity,
            phi,
            methods: vec![method],
            final_score: 0.0,
        }
    }
}

/// Options for a retrieval
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub top_k: usize,
    /// Drop hits whose phi is below this; `0.0` disables the filter
    pub min_phi: f32,
    pub include_vector: bool,
    pub include_full_text: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_phi: 0.0,
            include_vector: true,
            include_full_text: true,
        }
    }
}

impl RetrieveOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_phi(mut self, min_phi: f32) -> Self {
        self.min_phi = min_phi;
        self
    }

    pub fn vector_only(mut self) -> Self {
        self.include_vector = true;
        self.include_full_text = false;
        self
    }

    pub fn full_text_only(mut self) -> Self {
        self.include_vector = false;
        self.include_full_text = true;
        self
    }
}

/// A retrieved memory with scoring information and hydrated content
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedMemory {
    pub uri: String,
    pub similarity: f32,
    pub final_score: f32,
    pub phi: f32,
    pub methods: Vec<MatchMethod>,
    pub content: String,
    pub metadata: Metadata,
    /// Tier the item was served from
    pub tier: StorageTier,
}

/// Group hits by URI, keeping the maximum similarity and the union of
/// contributing methods. Output order is first appearance.
pub fn merge(hits: impl IntoIterator<Item = SearchHit>) -> Vec<SearchHit> {
    let mut merged: Vec<SearchHit> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for hit in hits {
        match positions.get(&hit.uri) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                existing.similarity = existing.similarity.max(hit.similarity);
                for method in hit.methods {
                    if !existing.methods.contains(&method) {
                        existing.methods.push(method);
                    }
                }
            }
            None => {
                positions.insert(hit.uri.clone(), merged.len());
                merged.push(hit);
            }
        }
    }

    merged
}

/// Compute `final_score` for every hit and sort descending. The sort is
/// stable, so equal scores keep their input order.
pub fn rerank(mut hits: Vec<SearchHit>, phi_weight: f32, multi_method_bonus: f32) -> Vec<SearchHit> {
    for hit in &mut hits {
        let bonus = if hit.methods.len() > 1 {
            multi_method_bonus
        } else {
            1.0
        };
        hit.final_score = hit.similarity * (1.0 + hit.phi * phi_weight) * bonus;
    }

    hits.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    mod merge_tests {
        use super::*;

        #[test]
        fn test_merge_keeps_max_similarity() {
            let merged = merge(vec![
                SearchHit::new("ult://a", 0.6, 0.0, MatchMethod::Vector),
                SearchHit::new("ult://a", 2.0, 0.0, MatchMethod::FullText),
            ]);

            assert_eq!(merged.len(), 1);
            assert_eq!(merged[0].similarity, 2.0);
            assert_eq!(
                merged[0].methods,
                vec![MatchMethod::Vector, MatchMethod::FullText]
            );
        }

        #[test]
        fn test_merge_preserves_first_appearance_order() {
            let merged = merge(vec![
                SearchHit::new("ult://b", 0.9, 0.0, MatchMethod::Vector),
                SearchHit::new("ult://a", 0.8, 0.0, MatchMethod::Vector),
                SearchHit::new("ult://b", 1.0, 0.0, MatchMethod::FullText),
            ]);

            let uris: Vec<&str> = merged.iter().map(|h| h.uri.as_str()).collect();
            assert_eq!(uris, vec!["ult://b", "ult://a"]);
        }

        #[test]
        fn test_merge_does_not_duplicate_methods() {
            let merged = merge(vec![
                SearchHit::new("ult://a", 0.6, 0.0, MatchMethod::Vector),
                SearchHit::new("ult://a", 0.7, 0.0, MatchMethod::Vector),
            ]);
            assert_eq!(merged[0].methods, vec![MatchMethod::Vector]);
            assert_eq!(merged[0].similarity, 0.7);
        }

        #[test]
        fn test_merge_empty() {
            assert!(merge(Vec::new()).is_empty());
        }
    }

    mod rerank_tests {
        use super::*;

        #[test]
        fn test_rerank_formula() {
            let mut hit = SearchHit::new("ult://a", 0.5, 0.5, MatchMethod::Vector);
            hit.methods.push(MatchMethod::FullText);

            let ranked = rerank(vec![hit], 0.2, 1.1);
            let expected = 0.5 * (1.0 + 0.5 * 0.2) * 1.1;
            assert!((ranked[0].final_score - expected).abs() < 1e-6);
        }

        #[test]
        fn test_rerank_multi_method_wins() {
            let single = SearchHit::new("ult://single", 0.8, 0.0, MatchMethod::Vector);
            let mut both = SearchHit::new("ult://both", 0.75, 0.0, MatchMethod::Vector);
            both.methods.push(MatchMethod::FullText);

            let ranked = rerank(vec![single, both], 0.2, 1.1);
            assert_eq!(ranked[0].uri, "ult://both");
        }

        #[test]
        fn test_rerank_ties_keep_input_order() {
            let hits = vec![
                SearchHit::new("ult://first", 0.5, 0.0, MatchMethod::Vector),
                SearchHit::new("ult://second", 0.5, 0.0, MatchMethod::Vector),
                SearchHit::new("ult://third", 0.5, 0.0, MatchMethod::Vector),
            ];

            let ranked = rerank(hits, 0.2, 1.1);
            let uris: Vec<&str> = ranked.iter().map(|h| h.uri.as_str()).collect();
            assert_eq!(uris, vec!["ult://first", "ult://second", "ult://third"]);
        }

        #[test]
        fn test_rerank_phi_boost() {
            let low = SearchHit::new("ult://low", 0.6, 0.0, MatchMethod::Vector);
            let high = SearchHit::new("ult://high", 0.6, 1.0, MatchMethod::Vector);

            let ranked = rerank(vec![low, high], 0.2, 1.1);
            assert_eq!(ranked[0].uri, "ult://high");
        }
    }

    #[test]
    fn test_method_display() {
        assert_eq!(MatchMethod::Vector.to_string(), "vector");
        assert_eq!(MatchMethod::FullText.to_string(), "fulltext");
    }

    #[test]
    fn test_options_builders() {
        let opts = RetrieveOptions::default().with_top_k(3).with_min_phi(0.4).vector_only();
        assert_eq!(opts.top_k, 3);
        assert_eq!(opts.min_phi, 0.4);
        assert!(opts.include_vector);
        assert!(!opts.include_full_text);
    }
}
