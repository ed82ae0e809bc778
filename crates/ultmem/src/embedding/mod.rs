//! Deterministic text embeddings
//!
//! Texts are embedded as hash-bucket term frequencies: every token longer
//! than two characters is hashed into one of [`EMBEDDING_DIMENSION`] buckets
//! and the resulting count vector is L2-normalized. No model download, no
//! randomness: the same text always yields the same vector.

use std::collections::HashMap;

use crate::error::{Result, UltError};

pub const EMBEDDING_DIMENSION: usize = 128;

/// Tokens with this many characters or fewer are ignored
const MIN_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }

    pub fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    /// Embed `text` into a unit-length (or all-zero) vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for token in lowered.split_whitespace() {
            if token.chars().count() >= MIN_TOKEN_CHARS {
                *counts.entry(token).or_default() += 1;
            }
        }

        let mut vector = vec![0.0_f32; EMBEDDING_DIMENSION];
        for (token, count) in counts {
            vector[bucket(token)] += count as f32;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// 32-bit rolling string hash (`h * 31 + unit` over UTF-16 code units)
/// folded into a bucket index.
fn bucket(token: &str) -> usize {
    let mut hash: i32 = 0;
    for unit in token.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    (i64::from(hash).unsigned_abs() % EMBEDDING_DIMENSION as u64) as usize
}

/// Cosine similarity between two vectors of equal length.
///
/// Comparing vectors of different length is a caller bug and is reported as
/// [`UltError::DimensionMismatch`]. A zero vector has similarity 0 with
/// everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(UltError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_is_deterministic() {
        let embedder = HashEmbedder::new();
        assert_eq!(
            embedder.embed("rust memory engine"),
            embedder.embed("rust memory engine")
        );
    }

    #[test]
    fn test_embed_has_fixed_dimension() {
        let embedder = HashEmbedder::new();
        assert_eq!(embedder.embed("anything at all").len(), EMBEDDING_DIMENSION);
        assert_eq!(embedder.embed("").len(), EMBEDDING_DIMENSION);
        assert_eq!(embedder.dimension(), EMBEDDING_DIMENSION);
    }

    #[test]
    fn test_embed_is_unit_length() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed("the quick brown fox jumps over the lazy dog");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn test_short_tokens_give_zero_vector() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed("a an to of");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_embed_is_case_insensitive() {
        let embedder = HashEmbedder::new();
        assert_eq!(embedder.embed("Rust Memory"), embedder.embed("rust memory"));
    }

    #[test]
    fn test_bucket_matches_rolling_hash() {
        // "abc": ((97 * 31) + 98) * 31 + 99 = 96354, 96354 % 128 = 98
        assert_eq!(bucket("abc"), 96354 % 128);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_similarity_mismatched_length() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            UltError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_shared_words_are_similar() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("rust ownership and borrowing rules");
        let b = embedder.embed("borrowing rules in rust");
        let c = embedder.embed("gardening tomatoes during summer");

        let sim_ab = cosine_similarity(&a, &b).unwrap();
        let sim_ac = cosine_similarity(&a, &c).unwrap();
        assert!(sim_ab > sim_ac, "{sim_ab} should exceed {sim_ac}");
    }
}
