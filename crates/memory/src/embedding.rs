//! Deterministic bag-of-words embedding.
//!
//! Each distinct token lands in one bucket chosen by a 32-bit rolling hash
//! over its UTF-16 code units; the bucket accumulates the token's relative
//! frequency. The result is L2-normalized. No model weights, no network.

use std::collections::HashMap;
use warden_core::{EmbeddingProvider, tokenize};

/// Dimension used when none is configured. Matches the default collection.
pub const DEFAULT_DIMENSION: usize = 384;

/// Hash-bucket embedding provider.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    /// A zero `dimension` is bumped to 1 so the output is never empty.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed `text`. Text without usable tokens maps to the zero vector.
    pub fn to_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vector;
        }

        // Distinct tokens in first-occurrence order, so float accumulation
        // into a shared bucket always happens in the same order.
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            match index.get(token.as_str()) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(token.as_str(), counts.len());
                    counts.push((token.as_str(), 1));
                }
            }
        }

        let total = tokens.len() as f32;
        for (token, count) in counts {
            let bucket = bucket_for(token, self.dimension);
            vector[bucket] += count as f32 / total;
        }

        normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl EmbeddingProvider for HashEmbedding {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        self.to_vector(text)
    }
}

/// `hash = hash * 31 + unit`, wrapping at 32 bits.
fn rolling_hash(token: &str) -> i32 {
    token
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

fn bucket_for(token: &str, dimension: usize) -> usize {
    rolling_hash(token).unsigned_abs() as usize % dimension
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashEmbedding::default();
        let v = e.to_vector("");
        assert_eq!(v.len(), DEFAULT_DIMENSION);
        assert!(v.iter().all(|x| *x == 0.0));

        // Only short tokens
        assert!(e.to_vector("a to be").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn output_is_unit_length() {
        let e = HashEmbedding::default();
        let v = e.to_vector("the quick brown fox jumps over the lazy dog");
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn deterministic() {
        let e = HashEmbedding::new(64);
        assert_eq!(e.to_vector("deploy the service"), e.to_vector("deploy the service"));
    }

    #[test]
    fn deterministic_with_colliding_unequal_weights() {
        // Tiny dimension forces many distinct weights into each bucket.
        let text: String = (0..600)
            .map(|i| format!("tok{i} ").repeat(i % 7 + 1))
            .collect();
        for dimension in [2, DEFAULT_DIMENSION] {
            let e = HashEmbedding::new(dimension);
            let first: Vec<u32> = e.to_vector(&text).iter().map(|v| v.to_bits()).collect();
            for _ in 0..50 {
                let again: Vec<u32> = e.to_vector(&text).iter().map(|v| v.to_bits()).collect();
                assert_eq!(first, again);
            }
        }
    }

    #[test]
    fn rolling_hash_matches_known_values() {
        // "abc": ((97 * 31) + 98) * 31 + 99
        assert_eq!(rolling_hash("abc"), 96354);
        assert_eq!(bucket_for("abc", 384), 96354 % 384);
        assert_eq!(rolling_hash(""), 0);
    }

    #[test]
    fn rolling_hash_wraps_without_panicking() {
        let long = "z".repeat(200);
        let _ = bucket_for(&long, 384);
        assert!(bucket_for(&long, 384) < 384);
    }

    #[test]
    fn single_token_is_one_hot() {
        let e = HashEmbedding::new(16);
        let v = e.to_vector("hello");
        let hot: Vec<_> = v.iter().filter(|x| **x != 0.0).collect();
        assert_eq!(hot.len(), 1);
        assert!((hot[0] - 1.0).abs() < 1e-6);
        assert_eq!(v[bucket_for("hello", 16)], 1.0);
    }

    #[test]
    fn case_does_not_change_embedding() {
        let e = HashEmbedding::default();
        assert_eq!(e.to_vector("Rust Memory"), e.to_vector("rust memory"));
    }

    #[test]
    fn zero_dimension_is_clamped() {
        let e = HashEmbedding::new(0);
        assert_eq!(e.dimension(), 1);
        assert_eq!(e.embed("anything").len(), 1);
    }
}
