//! Embedding seam for query text.
//!
//! The engine treats text-to-vector as a black box behind the `Embedder`
//! trait. The default implementation is a deterministic character-level
//! embedder, so identical text always produces the identical vector and no
//! network service is needed.

use crate::error::{Result, WardError};
use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// Pure function of the input text; failures are `WardError::Encoding`.
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Character-level embedder: half the dimensions hold character-frequency
/// buckets, a quarter bigram-hash buckets, a quarter position-weighted
/// buckets. The result is L2-normalized.
pub struct CharNgramEmbedder {
    dimension: usize,
}

pub const DEFAULT_EMBEDDING_DIM: usize = 128;

impl CharNgramEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension < 4 {
            return Err(WardError::Encoding(format!(
                "embedding dimension {} is too small",
                self.dimension
            )));
        }
        let freq_buckets = self.dimension / 2;
        let bigram_buckets = self.dimension / 4;
        let position_buckets = self.dimension - freq_buckets - bigram_buckets;

        let mut embedding = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for &c in &chars {
            let idx = (c as usize) % freq_buckets;
            embedding[idx] += 1.0;
        }

        for window in chars.windows(2) {
            let bigram = (window[0] as usize) * 31 + window[1] as usize;
            let idx = freq_buckets + bigram % bigram_buckets;
            embedding[idx] += 1.0;
        }

        // Earlier characters weigh more.
        for (i, &c) in chars.iter().enumerate() {
            let weight = 1.0 / (i + 1) as f32;
            let idx = freq_buckets + bigram_buckets + (c as usize) % position_buckets;
            embedding[idx] += weight;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        Ok(embedding)
    }
}

impl Default for CharNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

#[async_trait]
impl Embedder for CharNgramEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }
}
