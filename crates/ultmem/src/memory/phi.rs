//! Phi: an entropy-based information density score
//!
//! Phi is the Shannon entropy of the whole text's term distribution minus
//! the summed entropies of its sentences, clamped to `[0, 1]`. It is a cheap
//! deterministic heuristic used as a secondary ranking signal. It is not a
//! measure of integrated information or consciousness, whatever the name
//! suggests.

use std::collections::BTreeMap;

/// Sentence terminators, ASCII and full-width
pub const SENTENCE_TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Score `content`. Always returns a value in `[0, 1]`.
pub fn score_phi(content: &str) -> f32 {
    let whole = term_entropy(content);
    let parts: f64 = sentences(content).map(term_entropy).sum();

    (whole - parts).clamp(0.0, 1.0) as f32
}

/// Non-blank sentences of `content`, split on [`SENTENCE_TERMINATORS`]
pub fn sentences(content: &str) -> impl Iterator<Item = &str> {
    content
        .split(SENTENCE_TERMINATORS)
        .filter(|s| !s.trim().is_empty())
}

/// Shannon entropy (base 2) of the frequency distribution of whitespace
/// tokens longer than two characters. Tokens are case-sensitive.
fn term_entropy(text: &str) -> f64 {
    let mut freq: BTreeMap<&str, u32> = BTreeMap::new();
    for word in text.split_whitespace() {
        if word.chars().count() > 2 {
            *freq.entry(word).or_default() += 1;
        }
    }

    let total: u32 = freq.values().sum();
    if total == 0 {
        return 0.0;
    }

    freq.values()
        .map(|&count| {
            let p = f64::from(count) / f64::from(total);
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_scores_zero() {
        assert_eq!(score_phi(""), 0.0);
        assert_eq!(score_phi("   "), 0.0);
    }

    #[test]
    fn test_single_sentence_scores_zero() {
        // whole and part are the same distribution
        assert_eq!(score_phi("Rust makes systems programming pleasant"), 0.0);
    }

    #[test]
    fn test_repeated_sentences_gain_nothing() {
        // each sentence carries the full entropy, so parts exceed the whole
        assert_eq!(score_phi("alpha beta. alpha beta. alpha beta."), 0.0);
    }

    #[test]
    fn test_disjoint_single_word_sentences_score_positive() {
        // whole: two equiprobable words = 1 bit; each sentence: one word = 0 bits
        let phi = score_phi("alpha. gamma.");
        assert!((phi - 1.0).abs() < 1e-6, "phi was {phi}");
    }

    #[test]
    fn test_phi_is_bounded() {
        let inputs = [
            "",
            "one",
            "Tokyo Berlin Paris. Lima Oslo Rome! Cairo Quito Delhi?",
            "很长的句子。另一个句子！第三个？",
            "word word word word word word word",
            "The quick brown fox. Jumps over the lazy dog. Again and again and again.",
        ];
        for input in inputs {
            let phi = score_phi(input);
            assert!((0.0..=1.0).contains(&phi), "phi {phi} out of range for {input:?}");
        }
    }

    #[test]
    fn test_sentences_skip_blank_segments() {
        let parts: Vec<&str> = sentences("First. Second!  ?Third").collect();
        assert_eq!(parts, vec!["First", " Second", "Third"]);
    }

    #[test]
    fn test_sentences_full_width_terminators() {
        let parts: Vec<&str> = sentences("你好。世界！").collect();
        assert_eq!(parts, vec!["你好", "世界"]);
    }
}
