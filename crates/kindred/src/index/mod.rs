//! Persistent memory index
//!
//! Durable, embedding-backed storage for Preference, Fact and Emotion
//! records. Two implementations share one ranking contract:
//! - [`LanceMemoryIndex`]: LanceDB table on disk
//! - [`InMemoryIndex`]: concurrent in-process index for ephemeral runs
//!
//! Results are ordered by similarity (quantized), then newer first, then by
//! id, so identical queries over identical data return identical orders.

mod lance;
mod memory;

pub use lance::LanceMemoryIndex;
pub use memory::InMemoryIndex;

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{KindredError, Result};
use crate::memory::types::{MemoryKind, MemoryRecord, OwnerId};

/// Decimal places kept when comparing similarity scores
const SIMILARITY_DECIMAL_PLACES: i32 = 4;

/// A stored record returned by a search, with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedRecord {
    pub record: MemoryRecord,
    pub similarity: f32,
}

/// Durable semantic store shared by every session of an owner.
///
/// Both operations may fail; failures surface as
/// [`KindredError::MemoryUnavailable`].
#[async_trait]
pub trait PersistentMemoryIndex: Send + Sync {
    /// Up to `limit` records of `owner`, most similar to `query` first
    async fn search(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<RetrievedRecord>>;

    /// Up to `limit` records of `owner` with the given kind, newest first
    async fn list(
        &self,
        owner: &OwnerId,
        kind: MemoryKind,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>>;

    /// Embed and store a record, returning its id
    async fn add(&self, record: MemoryRecord) -> Result<Uuid>;

    /// Number of records stored for `owner`
    async fn count(&self, owner: &OwnerId) -> Result<usize>;

    /// Return the name of this backend for logging
    fn name(&self) -> &'static str;
}

/// Sort matches into the deterministic search order and keep `limit`
pub fn rank_matches(mut matches: Vec<RetrievedRecord>, limit: usize) -> Vec<RetrievedRecord> {
    matches.sort_by(compare_matches);
    matches.truncate(limit);
    matches
}

/// Sort records newer first, then by id, and keep `limit`
pub fn newest_first(mut records: Vec<MemoryRecord>, limit: usize) -> Vec<MemoryRecord> {
    records.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
    records.truncate(limit);
    records
}

fn compare_matches(a: &RetrievedRecord, b: &RetrievedRecord) -> Ordering {
    quantize(b.similarity)
        .total_cmp(&quantize(a.similarity))
        .then_with(|| b.record.created_at().cmp(&a.record.created_at()))
        .then_with(|| a.record.id().cmp(&b.record.id()))
}

fn quantize(score: f32) -> f32 {
    let multiplier = 10_f32.powi(SIMILARITY_DECIMAL_PLACES);
    (score * multiplier).round() / multiplier
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Run the embedder on the blocking pool so a caller's timeout can fire
/// while the model is busy.
pub(crate) async fn embed_blocking(embedder: &Arc<dyn Embedder>, text: &str) -> Result<Vec<f32>> {
    let embedder = Arc::clone(embedder);
    let text = text.to_string();
    let embedding = tokio::task::spawn_blocking(move || embedder.embed(&text))
        .await
        .map_err(|e| KindredError::Embedding(format!("Embedding task failed: {e}")))??;
    Ok(embedding)
}
