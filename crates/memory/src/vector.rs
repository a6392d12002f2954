//! Vector similarity utilities.

use warden_core::{Metadata, SearchFilter, VectorHit};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length, empty, or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank stored points against a query vector.
///
/// Points failing `filter` are skipped. Returns hits sorted by descending
/// similarity, at most `limit`.
pub fn rank_points<'a, I>(
    points: I,
    query: &[f32],
    limit: usize,
    filter: Option<&SearchFilter>,
) -> Vec<VectorHit>
where
    I: IntoIterator<Item = (&'a String, &'a (Vec<f32>, Metadata))>,
{
    let mut hits: Vec<VectorHit> = points
        .into_iter()
        .filter(|(_, (_, payload))| filter.is_none_or(|f| f.matches(payload)))
        .map(|(id, (vector, payload))| VectorHit {
            id: id.clone(),
            score: cosine_similarity(vector, query),
            payload: payload.clone(),
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn point(vector: Vec<f32>, episodic: bool) -> (Vec<f32>, Metadata) {
        let mut payload = Metadata::new();
        payload.insert("episodic".into(), json!(episodic));
        (vector, payload)
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn rank_orders_and_limits() {
        let mut points = HashMap::new();
        points.insert("a".to_string(), point(vec![0.0, 1.0, 0.0], false));
        points.insert("b".to_string(), point(vec![1.0, 0.0, 0.0], false));
        points.insert("c".to_string(), point(vec![0.5, 0.5, 0.0], false));

        let hits = rank_points(&points, &[1.0, 0.0, 0.0], 10, None);
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);

        let hits = rank_points(&points, &[1.0, 0.0, 0.0], 2, None);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn rank_applies_filter() {
        let mut points = HashMap::new();
        points.insert("plain".to_string(), point(vec![1.0, 0.0], false));
        points.insert("episode".to_string(), point(vec![0.0, 1.0], true));

        let filter = SearchFilter::matching("episodic", true);
        let hits = rank_points(&points, &[1.0, 0.0], 10, Some(&filter));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "episode");
    }
}
