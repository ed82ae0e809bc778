//! Entity, relation and keyword extraction
//!
//! The graph only talks to the [`EntityExtractor`] trait. The bundled
//! [`PatternExtractor`] uses fixed regular expressions over five entity
//! categories; a model-backed extractor can replace it without touching the
//! graph or the index.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

/// Matches a capitalized name followed by a form of "to be": "Alice is".
static PERSON_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-z]+)\s+(?:is|was|are|am)\b").expect("Invalid regex")
});

static TECHNOLOGY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(JavaScript|Python|Java|Go|Rust|TypeScript|AI|ML|Deep Learning|Neural Network)\b",
    )
    .expect("Invalid regex")
});

static ORGANIZATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(Google|Microsoft|OpenAI|GitHub|Facebook|Amazon|Apple)\b")
        .expect("Invalid regex")
});

static LOCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(China|USA|UK|Japan|Beijing|Shanghai|New York|San Francisco)\b")
        .expect("Invalid regex")
});

/// ISO dates or month abbreviations ("Jan", "January", "sept").
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{4}-\d{2}-\d{2}|Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\b")
        .expect("Invalid regex")
});

/// Anything that is not an ASCII word character, whitespace or a CJK ideograph.
static NON_WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_\s\x{4e00}-\x{9fa5}]").expect("Invalid regex")
});

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "should", "could", "may", "might", "must", "shall",
        "can", "need", "dare", "ought", "used", "to", "of", "in", "for", "on", "with", "at", "by",
        "from", "as", "into", "through", "during", "before", "after", "above", "below", "between",
        "under", "again", "further", "then", "once", "and", "but", "or", "nor", "so", "yet",
        "both", "either", "neither", "not", "only", "own", "same", "than", "too", "very", "just",
        "also", "now", "here", "there", "when", "where", "why", "how", "all", "each", "every",
        "few", "more", "most", "other", "some", "such", "no", "any", "that", "this", "it",
        "these", "those", "的", "是", "了", "在", "有", "和", "与", "或", "但", "而", "因为",
        "所以",
    ]
    .into_iter()
    .collect()
});

pub const USES_CONFIDENCE: f32 = 0.7;
pub const WORKS_AT_CONFIDENCE: f32 = 0.6;

/// Entities found in a text, deduplicated, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    pub persons: Vec<String>,
    pub technologies: Vec<String>,
    pub organizations: Vec<String>,
    pub locations: Vec<String>,
    pub dates: Vec<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
            && self.technologies.is_empty()
            && self.organizations.is_empty()
            && self.locations.is_empty()
            && self.dates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// person -> technology
    Uses,
    /// person -> organization
    WorksAt,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationKind::Uses => "uses",
            RelationKind::WorksAt => "works_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub word: String,
    pub freq: u32,
}

/// Pulls structured signals out of free text
pub trait EntityExtractor: Send + Sync {
    fn extract_entities(&self, text: &str) -> Entities;

    fn extract_relations(&self, text: &str, entities: &Entities) -> Vec<Relation>;

    /// The `top_k` most frequent non-stop-word terms
    fn extract_keywords(&self, text: &str, top_k: usize) -> Vec<Keyword>;

    /// Extractor name for logging
    fn name(&self) -> &'static str;
}

/// Regex-backed extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn captures(pattern: &Regex, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in pattern.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let value = m.as_str();
            if !found.iter().any(|f| f == value) {
                found.push(value.to_string());
            }
        }
    }
    found
}

impl EntityExtractor for PatternExtractor {
    fn extract_entities(&self, text: &str) -> Entities {
        Entities {
            persons: captures(&PERSON_PATTERN, text),
            technologies: captures(&TECHNOLOGY_PATTERN, text),
            organizations: captures(&ORGANIZATION_PATTERN, text),
            locations: captures(&LOCATION_PATTERN, text),
            dates: captures(&DATE_PATTERN, text),
        }
    }

    fn extract_relations(&self, text: &str, entities: &Entities) -> Vec<Relation> {
        let mut relations = Vec::new();

        for person in entities.persons.iter().filter(|p| text.contains(p.as_str())) {
            for tech in entities.technologies.iter().filter(|t| text.contains(t.as_str())) {
                relations.push(Relation {
                    from: person.clone(),
                    to: tech.clone(),
                    kind: RelationKind::Uses,
                    confidence: USES_CONFIDENCE,
                });
            }
        }

        for person in entities.persons.iter().filter(|p| text.contains(p.as_str())) {
            for org in entities.organizations.iter().filter(|o| text.contains(o.as_str())) {
                relations.push(Relation {
                    from: person.clone(),
                    to: org.clone(),
                    kind: RelationKind::WorksAt,
                    confidence: WORKS_AT_CONFIDENCE,
                });
            }
        }

        relations
    }

    fn extract_keywords(&self, text: &str, top_k: usize) -> Vec<Keyword> {
        let lowered = text.to_lowercase();
        let cleaned = NON_WORD_PATTERN.replace_all(&lowered, " ");

        let mut order: Vec<&str> = Vec::new();
        let mut freq: HashMap<&str, u32> = HashMap::new();
        for word in cleaned.split_whitespace() {
            if word.chars().count() > 2 && !STOP_WORDS.contains(word) {
                let count = freq.entry(word).or_insert(0);
                if *count == 0 {
                    order.push(word);
                }
                *count += 1;
            }
        }

        // stable sort keeps first-occurrence order among equal counts
        order.sort_by(|a, b| freq[b].cmp(&freq[a]));
        order
            .into_iter()
            .take(top_k)
            .map(|word| Keyword {
                word: word.to_string(),
                freq: freq[word],
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "pattern"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod entity_tests {
        use super::*;

        #[test]
        fn test_extract_persons() {
            let entities =
                PatternExtractor.extract_entities("Alice is an engineer. Bob was here. Alice is back.");
            assert_eq!(entities.persons, vec!["Alice", "Bob"]);
        }

        #[test]
        fn test_extract_technologies_case_insensitive() {
            let entities =
                PatternExtractor.extract_entities("We write rust and Python, mostly Rust.");
            assert_eq!(entities.technologies, vec!["rust", "Python", "Rust"]);
        }

        #[test]
        fn test_extract_multi_word_entities() {
            let entities = PatternExtractor
                .extract_entities("Deep Learning research in San Francisco at OpenAI");
            assert_eq!(entities.technologies, vec!["Deep Learning"]);
            assert_eq!(entities.locations, vec!["San Francisco"]);
            assert_eq!(entities.organizations, vec!["OpenAI"]);
        }

        #[test]
        fn test_extract_dates() {
            let entities =
                PatternExtractor.extract_entities("Shipped on 2024-03-15, planned since January");
            assert_eq!(entities.dates, vec!["2024-03-15", "Jan"]);
        }

        #[test]
        fn test_no_entities() {
            assert!(PatternExtractor.extract_entities("nothing notable here").is_empty());
        }
    }

    mod relation_tests {
        use super::*;

        #[test]
        fn test_person_relations() {
            let text = "Alice is a developer at Google who loves Rust";
            let entities = PatternExtractor.extract_entities(text);
            let relations = PatternExtractor.extract_relations(text, &entities);

            assert_eq!(relations.len(), 2);
            assert_eq!(relations[0].from, "Alice");
            assert_eq!(relations[0].to, "Rust");
            assert_eq!(relations[0].kind, RelationKind::Uses);
            assert_eq!(relations[0].confidence, USES_CONFIDENCE);
            assert_eq!(relations[1].to, "Google");
            assert_eq!(relations[1].kind.as_str(), "works_at");
        }

        #[test]
        fn test_no_person_no_relations() {
            let text = "Rust at Google";
            let entities = PatternExtractor.extract_entities(text);
            assert!(PatternExtractor.extract_relations(text, &entities).is_empty());
        }
    }

    mod keyword_tests {
        use super::*;

        #[test]
        fn test_keywords_by_frequency() {
            let keywords = PatternExtractor.extract_keywords(
                "memory tiers and memory promotion; tiers demote, memory wins",
                3,
            );
            let words: Vec<&str> = keywords.iter().map(|k| k.word.as_str()).collect();
            assert_eq!(words, vec!["memory", "tiers", "promotion"]);
            assert_eq!(keywords[0].freq, 3);
        }

        #[test]
        fn test_keywords_skip_stop_words_and_short_tokens() {
            let keywords = PatternExtractor.extract_keywords("the and of it is an ox", 10);
            assert!(keywords.is_empty());
        }

        #[test]
        fn test_keywords_strip_punctuation() {
            let keywords = PatternExtractor.extract_keywords("tokio! tokio? (tokio)", 5);
            assert_eq!(keywords.len(), 1);
            assert_eq!(keywords[0].word, "tokio");
            assert_eq!(keywords[0].freq, 3);
        }

        #[test]
        fn test_keywords_keep_cjk() {
            let keywords = PatternExtractor.extract_keywords("知识图谱 知识图谱 推理", 5);
            assert_eq!(keywords[0].word, "知识图谱");
            assert_eq!(keywords[0].freq, 2);
        }
    }
}
