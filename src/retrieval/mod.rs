//! Retrieval engine: nearest-neighbor exemplar lookup for prompt steering.
//!
//! Seeded once at startup from historical (query, SQL) pairs, then grown by
//! appending every pair that survives the SQL gate. Search encodes the
//! incoming query and returns the closest stored exemplars within a
//! distance threshold.

pub mod embedder;
pub mod index;
pub mod store;

pub use embedder::{CharNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIM};
pub use index::VectorIndex;
pub use store::{Exemplar, ExemplarStore, RetrievalMatch};

use crate::error::Result;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_TOP_K: usize = 1;
pub const DEFAULT_MAX_DISTANCE: f32 = 1.0;
pub const DEFAULT_SEED_LIMIT: usize = 50;

/// Fallback pair used when no historical pair qualifies at seeding time.
const FALLBACK_PAIR: (&str, &str) = ("show person", "select * from person");

pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    store: ExemplarStore,
}

impl RetrievalEngine {
    /// Build the engine and seed the store in one batch. Pairs with an
    /// empty query or SQL are dropped, at most `DEFAULT_SEED_LIMIT` pairs
    /// are kept, and the built-in fallback pair steps in when nothing
    /// survives.
    pub async fn seeded(
        embedder: Arc<dyn Embedder>,
        pairs: Vec<(String, String)>,
    ) -> Result<Self> {
        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .filter(|(query, sql)| !query.is_empty() && !sql.is_empty())
            .collect();
        pairs.truncate(DEFAULT_SEED_LIMIT);
        if pairs.is_empty() {
            pairs.push((FALLBACK_PAIR.0.to_string(), FALLBACK_PAIR.1.to_string()));
        }

        let store = ExemplarStore::new(embedder.dimension());
        let mut seeds = Vec::with_capacity(pairs.len());
        for (query, sql) in pairs {
            let embedding = embedder.encode(&query).await?;
            seeds.push(Exemplar {
                query,
                sql,
                embedding,
            });
        }
        store.seed(seeds)?;
        info!("exemplar store seeded with {} pairs", store.len());

        Ok(Self { embedder, store })
    }

    pub async fn search(
        &self,
        query: &str,
        k: usize,
        max_distance: f32,
    ) -> Result<Vec<RetrievalMatch>> {
        let vector = self.embedder.encode(query).await?;
        self.store.search(&vector, k, max_distance)
    }

    pub async fn search_default(&self, query: &str) -> Result<Vec<RetrievalMatch>> {
        self.search(query, DEFAULT_TOP_K, DEFAULT_MAX_DISTANCE).await
    }

    /// Encode the query and append the pair atomically. Called only after
    /// the generated SQL has passed the gate.
    pub async fn append(&self, query: &str, sql: &str) -> Result<()> {
        let embedding = self.embedder.encode(query).await?;
        self.store.append(Exemplar {
            query: query.to_string(),
            sql: sql.to_string(),
            embedding,
        })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(CharNgramEmbedder::default())
    }

    #[tokio::test]
    async fn empty_history_seeds_the_fallback_pair() {
        let engine = RetrievalEngine::seeded(embedder(), Vec::new()).await.unwrap();
        assert_eq!(engine.len(), 1);
        assert!(!engine.is_empty());
        let matches = engine.search_default("show person").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].sql, "select * from person");
        assert_eq!(matches[0].distance, 0.0);
    }

    #[tokio::test]
    async fn pairs_with_empty_fields_are_dropped() {
        let pairs = vec![
            ("".to_string(), "select 1".to_string()),
            ("show visits".to_string(), "".to_string()),
        ];
        let engine = RetrievalEngine::seeded(embedder(), pairs).await.unwrap();
        // Nothing qualified, so the fallback steps in.
        assert_eq!(engine.len(), 1);
        let matches = engine.search_default("show person").await.unwrap();
        assert_eq!(matches[0].query, "show person");
    }

    #[tokio::test]
    async fn seeding_is_capped_at_the_limit() {
        let pairs: Vec<(String, String)> = (0..80)
            .map(|i| (format!("query number {}", i), format!("select {}", i)))
            .collect();
        let engine = RetrievalEngine::seeded(embedder(), pairs).await.unwrap();
        assert_eq!(engine.len(), DEFAULT_SEED_LIMIT);
    }

    #[tokio::test]
    async fn appended_pair_is_found_by_its_own_query() {
        let engine = RetrievalEngine::seeded(embedder(), Vec::new()).await.unwrap();
        engine
            .append("count all visits", "select count(visit_id) from visit")
            .await
            .unwrap();
        let matches = engine.search("count all visits", 1, 0.0).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].sql, "select count(visit_id) from visit");
        assert_eq!(matches[0].distance, 0.0);
    }

    #[tokio::test]
    async fn threshold_excludes_distant_queries() {
        let engine = RetrievalEngine::seeded(embedder(), Vec::new()).await.unwrap();
        // Unit vectors are at most 2.0 apart; a zero threshold keeps only
        // exact matches.
        let matches = engine
            .search("entirely unrelated wording", 1, 0.0)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}
