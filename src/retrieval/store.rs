//! Exemplar store: (query, SQL, embedding) triples plus the vector index.
//!
//! The exemplar list and the index live behind one `RwLock`, always the
//! same length and in the same order; position i of the index corresponds
//! to exemplar i. Appends take the write lock, so a concurrent search
//! observes either the state before or after an append, never in between.
//! The store is append-only: no delete, no reorder, no update.

use crate::error::Result;
use crate::retrieval::index::VectorIndex;
use std::sync::RwLock;

/// One historical (query, SQL) pair with its embedding.
#[derive(Debug, Clone)]
pub struct Exemplar {
    pub query: String,
    pub sql: String,
    pub embedding: Vec<f32>,
}

/// Transient search result; not persisted.
#[derive(Debug, Clone)]
pub struct RetrievalMatch {
    pub query: String,
    pub sql: String,
    pub distance: f32,
}

struct StoreInner {
    exemplars: Vec<Exemplar>,
    index: VectorIndex,
}

pub struct ExemplarStore {
    inner: RwLock<StoreInner>,
}

impl ExemplarStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                exemplars: Vec::new(),
                index: VectorIndex::new(dimension),
            }),
        }
    }

    /// Batch insert used at startup, before the store is shared.
    pub fn seed(&self, exemplars: Vec<Exemplar>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for exemplar in exemplars {
            Self::push_locked(&mut inner, exemplar)?;
        }
        Ok(())
    }

    /// Atomic with respect to readers: index and list are updated under one
    /// write-lock section, or not at all when the dimension check fails.
    pub fn append(&self, exemplar: Exemplar) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        Self::push_locked(&mut inner, exemplar)
    }

    fn push_locked(inner: &mut StoreInner, exemplar: Exemplar) -> Result<()> {
        inner.index.push(exemplar.embedding.clone())?;
        inner.exemplars.push(exemplar);
        debug_assert_eq!(inner.exemplars.len(), inner.index.len());
        Ok(())
    }

    /// Up to `k` nearest exemplars, ascending by distance, filtered to
    /// `distance <= max_distance`. Empty store yields an empty result.
    pub fn search(&self, query: &[f32], k: usize, max_distance: f32) -> Result<Vec<RetrievalMatch>> {
        let inner = self.inner.read().unwrap();
        if inner.exemplars.is_empty() {
            return Ok(Vec::new());
        }
        let hits = inner.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter(|(_, distance)| *distance <= max_distance)
            .map(|(position, distance)| {
                let exemplar = &inner.exemplars[position];
                RetrievalMatch {
                    query: exemplar.query.clone(),
                    sql: exemplar.sql.clone(),
                    distance,
                }
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().exemplars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
