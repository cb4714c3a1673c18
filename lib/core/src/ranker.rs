use crate::{EmbeddingIndex, Error, Result, Vector};
use serde::Serialize;

/// One ranked entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub path: String,
    pub score: f32,
}

/// Top-k ranking over an index.
///
/// Any structure that answers the same contract (approximate or not) can
/// replace [`ExhaustiveRanker`] without touching callers.
pub trait Ranker: Send + Sync {
    /// Return `min(k, index.len())` entries, best first.
    fn rank(&self, query: &Vector, index: &EmbeddingIndex, k: usize) -> Result<Vec<RankedMatch>>;
}

/// Cosine similarity against every entry, then a stable sort.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveRanker;

impl Ranker for ExhaustiveRanker {
    fn rank(&self, query: &Vector, index: &EmbeddingIndex, k: usize) -> Result<Vec<RankedMatch>> {
        if index.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let mut scored = Vec::with_capacity(index.len());
        for (id, vector) in index.items() {
            if vector.dim() != query.dim() {
                return Err(Error::DimensionMismatch {
                    expected: vector.dim(),
                    actual: query.dim(),
                });
            }
            scored.push((id, query.cosine_similarity(vector)));
        }

        // sort_by is stable: equal scores keep index order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(id, score)| RankedMatch {
                path: id.to_string(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuildReport, ExtractorStamp, IndexWriter};
    use rand::prelude::*;

    fn build(entries: &[(&str, Vec<f32>)]) -> EmbeddingIndex {
        let dim = entries.first().map(|(_, v)| v.len()).unwrap_or(3);
        let mut writer = IndexWriter::new(ExtractorStamp::new("test/v1", dim, "pre"));
        for (id, v) in entries {
            writer.insert(*id, Vector::new(v.clone())).unwrap();
        }
        writer.finish(BuildReport::default())
    }

    fn random_index(n: usize, dim: usize) -> EmbeddingIndex {
        let mut rng = rand::rng();
        let mut writer = IndexWriter::new(ExtractorStamp::new("test/v1", dim, "pre"));
        for i in 0..n {
            let v: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0f32..1.0f32)).collect();
            writer.insert(format!("img{}.png", i), Vector::new(v)).unwrap();
        }
        writer.finish(BuildReport::default())
    }

    #[test]
    fn test_rank_orders_by_cosine() {
        let index = build(&[
            ("far", vec![0.0, 1.0, 0.0]),
            ("exact", vec![2.0, 0.0, 0.0]),
            ("near", vec![1.0, 0.2, 0.0]),
        ]);
        let results = ExhaustiveRanker
            .rank(&Vector::new(vec![1.0, 0.0, 0.0]), &index, 3)
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near", "far"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_returns_k_sorted() {
        let index = random_index(50, 16);
        let query = index.get("img7.png").unwrap().clone();
        for k in [1, 5, 50] {
            let results = ExhaustiveRanker.rank(&query, &index, k).unwrap();
            assert_eq!(results.len(), k);
            assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
            assert!(results.iter().all(|r| (-1.0..=1.0).contains(&r.score)));
        }
    }

    #[test]
    fn test_rank_k_larger_than_index() {
        let index = random_index(4, 8);
        let query = Vector::new(vec![0.5; 8]);
        let results = ExhaustiveRanker.rank(&query, &index, 10).unwrap();
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_rank_k_zero() {
        let index = random_index(4, 8);
        let results = ExhaustiveRanker.rank(&Vector::new(vec![1.0; 8]), &index, 0).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_rank_ties_keep_index_order() {
        let index = build(&[
            ("c", vec![0.6, 0.8]),
            ("z", vec![1.0, 0.0]),
            ("a", vec![0.6, 0.8]),
            ("b", vec![0.6, 0.8]),
        ]);
        let results = ExhaustiveRanker
            .rank(&Vector::new(vec![0.0, 1.0]), &index, 4)
            .unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b", "z"]);
    }

    #[test]
    fn test_rank_empty_index() {
        let index = EmbeddingIndex::empty(ExtractorStamp::new("test/v1", 3, "pre"));
        let err = ExhaustiveRanker
            .rank(&Vector::new(vec![1.0, 0.0, 0.0]), &index, 5)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyIndex));
    }

    #[test]
    fn test_rank_dimension_mismatch() {
        let index = build(&[("a", vec![1.0, 0.0, 0.0])]);
        let err = ExhaustiveRanker
            .rank(&Vector::new(vec![1.0, 0.0]), &index, 1)
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
    }
}
