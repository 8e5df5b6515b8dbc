use crate::error::Result;
use async_trait::async_trait;

/// Text-to-vector capability consumed by the index writer and search.
///
/// Implementations must return vectors of a fixed [`dimension`] and fail
/// with [`VectorStoreError::ModelUnavailable`] when the backing model
/// cannot serve the request.
///
/// [`dimension`]: Embedder::dimension
/// [`VectorStoreError::ModelUnavailable`]: crate::VectorStoreError::ModelUnavailable
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector produced by this embedder.
    fn dimension(&self) -> usize;

    /// Embed one piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic hashed bag-of-words embedder.
///
/// Lower-cased alphanumeric tokens are hashed into a fixed number of
/// buckets and the resulting term-frequency vector is L2-normalized, so
/// cosine similarity reflects token overlap. Not a substitute for a real
/// model, but deterministic and dependency-free, which is what the
/// pipeline needs as a default and what the tests need to assert ranking.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 384;

    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let bucket = (fnv1a64(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 14695981039346656037;
    const PRIME: u64 = 1099511628211;
    let mut hash = OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("the quick brown fox").await.unwrap();
        let b = embedder.embed("the quick brown fox").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn vectors_have_fixed_dimension_and_unit_norm() {
        let embedder = HashingEmbedder::new(128);
        let v = embedder.embed("some document text").await.unwrap();
        assert_eq!(v.len(), 128);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn overlapping_text_scores_higher_than_unrelated() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("orbital mechanics").await.unwrap();
        let related = embedder
            .embed("an introduction to orbital mechanics for engineers")
            .await
            .unwrap();
        let unrelated = embedder.embed("sourdough bread recipe").await.unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
