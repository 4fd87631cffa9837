use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::config::SalienceConfig;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::{
    PersistentMemoryIndex, RetrievedRecord, cosine_similarity, embed_blocking, newest_first,
    rank_matches,
};
use crate::memory::salience::refresh_salience;
use crate::memory::types::{MemoryKind, MemoryRecord, OwnerId};

/// In-process index sharded by owner. Contents are lost on drop.
pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    shards: DashMap<OwnerId, Vec<MemoryRecord>>,
    salience: SalienceConfig,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_salience(embedder, SalienceConfig::default())
    }

    pub fn with_salience(embedder: Arc<dyn Embedder>, salience: SalienceConfig) -> Self {
        Self {
            embedder,
            shards: DashMap::new(),
            salience,
        }
    }

    /// Snapshot of an owner's records in insertion order
    pub fn records(&self, owner: &OwnerId) -> Vec<MemoryRecord> {
        self.shards
            .get(owner)
            .map(|shard| shard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PersistentMemoryIndex for InMemoryIndex {
    async fn search(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<RetrievedRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = embed_blocking(&self.embedder, query)
            .await
            .map_err(|e| e.into_memory_unavailable())?;

        let Some(mut shard) = self.shards.get_mut(owner) else {
            return Ok(Vec::new());
        };

        let candidates: Vec<RetrievedRecord> = shard
            .iter()
            .filter_map(|record| {
                record.embedding().map(|embedding| RetrievedRecord {
                    similarity: cosine_similarity(&query_embedding, embedding),
                    record: record.clone(),
                })
            })
            .collect();
        let mut ranked = rank_matches(candidates, limit);

        let now = Utc::now();
        for hit in &mut ranked {
            if let Some(stored) = shard.iter_mut().find(|r| r.id() == hit.record.id()) {
                stored.record_hit();
                hit.record = stored.clone();
            }
            refresh_salience(&mut hit.record, now, &self.salience);
        }

        debug!(
            "In-memory search for owner {} returned {} of {} candidates",
            owner,
            ranked.len(),
            shard.len()
        );
        Ok(ranked)
    }

    async fn list(
        &self,
        owner: &OwnerId,
        kind: MemoryKind,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let records: Vec<MemoryRecord> = self
            .shards
            .get(owner)
            .map(|shard| shard.iter().filter(|r| r.kind() == kind).cloned().collect())
            .unwrap_or_default();
        Ok(newest_first(records, limit))
    }

    async fn add(&self, record: MemoryRecord) -> Result<Uuid> {
        let embedding = match record.embedding() {
            Some(embedding) => embedding.to_vec(),
            None => embed_blocking(&self.embedder, record.content())
                .await
                .map_err(|e| e.into_memory_unavailable())?,
        };

        let id = record.id();
        let owner = record.owner().clone();
        self.shards
            .entry(owner)
            .or_default()
            .push(record.with_embedding(embedding));
        Ok(id)
    }

    async fn count(&self, owner: &OwnerId) -> Result<usize> {
        Ok(self.shards.get(owner).map(|shard| shard.len()).unwrap_or(0))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
