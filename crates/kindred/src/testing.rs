//! Test utilities for kindred - deterministic models and failing doubles
//!
//! This module provides stand-ins for every external capability so the
//! orchestrator can be exercised without a real model or network:
//! - [`KeywordEmbedder`]: bag-of-words embedder with real lexical overlap
//! - [`UnavailableIndex`] / [`SlowIndex`]: persistent tiers that fail or stall
//! - [`StubClassifier`] / [`FailingClassifier`]: fixed classifications
//! - [`StubGenerator`] / [`UnavailableGenerator`]: canned or failing replies

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::classifier::{Classification, Classifier};
use crate::embedding::{EMBEDDING_DIMENSION, Embedder};
use crate::error::{KindredError, Result};
use crate::generation::Generator;
use crate::index::{PersistentMemoryIndex, RetrievedRecord};
use crate::memory::types::{MemoryKind, MemoryRecord, OwnerId};
use crate::personality::InstructionEnvelope;

/// Deterministic embedder for tests that need meaningful similarity.
///
/// Each lowercased word (trailing plural `s` dropped) is hashed into one of
/// 384 buckets and the vector is L2-normalized, so texts sharing words score
/// higher than texts that share none.
#[derive(Debug, Clone, Default)]
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn stem(word: &str) -> &str {
        if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
            &word[..word.len() - 1]
        } else {
            word
        }
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; EMBEDDING_DIMENSION];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            Self::stem(word).hash(&mut hasher);
            let bucket = (hasher.finish() % EMBEDDING_DIMENSION as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}

/// Persistent tier that is always down
#[derive(Debug, Default)]
pub struct UnavailableIndex {
    adds: AtomicUsize,
    searches: AtomicUsize,
}

impl UnavailableIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of add attempts seen
    pub fn add_attempts(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    pub fn search_attempts(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistentMemoryIndex for UnavailableIndex {
    async fn search(&self, _: &str, _: &OwnerId, _: usize) -> Result<Vec<RetrievedRecord>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Err(KindredError::MemoryUnavailable("index offline".to_string()))
    }

    async fn list(&self, _: &OwnerId, _: MemoryKind, _: usize) -> Result<Vec<MemoryRecord>> {
        Err(KindredError::MemoryUnavailable("index offline".to_string()))
    }

    async fn add(&self, _: MemoryRecord) -> Result<Uuid> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        Err(KindredError::MemoryUnavailable("index offline".to_string()))
    }

    async fn count(&self, _: &OwnerId) -> Result<usize> {
        Err(KindredError::MemoryUnavailable("index offline".to_string()))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Persistent tier that sleeps before answering, for timeout tests
pub struct SlowIndex<I> {
    inner: I,
    delay: Duration,
}

impl<I> SlowIndex<I> {
    pub fn new(inner: I, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<I: PersistentMemoryIndex> PersistentMemoryIndex for SlowIndex<I> {
    async fn search(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<RetrievedRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.search(query, owner, limit).await
    }

    async fn list(
        &self,
        owner: &OwnerId,
        kind: MemoryKind,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list(owner, kind, limit).await
    }

    async fn add(&self, record: MemoryRecord) -> Result<Uuid> {
        tokio::time::sleep(self.delay).await;
        self.inner.add(record).await
    }

    async fn count(&self, owner: &OwnerId) -> Result<usize> {
        self.inner.count(owner).await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Classifier returning the same classification for every message
#[derive(Debug, Clone)]
pub struct StubClassifier {
    classification: Classification,
}

impl StubClassifier {
    pub fn new(classification: Classification) -> Self {
        Self { classification }
    }
}

impl Classifier for StubClassifier {
    fn classify(&self, _: &str) -> Result<Classification> {
        Ok(self.classification.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Classifier that always fails
#[derive(Debug, Clone, Default)]
pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn classify(&self, _: &str) -> Result<Classification> {
        Err(KindredError::Classification("classifier offline".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Generator returning a canned reply and remembering what it was sent
#[derive(Debug, Default)]
pub struct StubGenerator {
    reply: String,
    seen: Mutex<Vec<InstructionEnvelope>>,
}

impl StubGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Envelopes received so far
    pub fn envelopes(&self) -> Vec<InstructionEnvelope> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, envelope: &InstructionEnvelope) -> Result<String> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(envelope.clone());
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Generator whose provider is always down
#[derive(Debug, Clone, Default)]
pub struct UnavailableGenerator;

#[async_trait]
impl Generator for UnavailableGenerator {
    async fn generate(&self, _: &InstructionEnvelope) -> Result<String> {
        Err(KindredError::ProviderUnavailable("provider offline".to_string()))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cosine_similarity;

    #[test]
    fn keyword_embedding_is_deterministic() {
        let model = KeywordEmbedder::new();
        assert_eq!(model.embed("hello world").unwrap(), model.embed("hello world").unwrap());
    }

    #[test]
    fn keyword_embedding_has_correct_dimensions() {
        let model = KeywordEmbedder::new();
        assert_eq!(model.embed("test").unwrap().len(), EMBEDDING_DIMENSION);
    }

    #[test]
    fn keyword_embedding_reflects_overlap() {
        let model = KeywordEmbedder::new();
        let query = model.embed("what do I enjoy?").unwrap();
        let related = model.embed("User enjoys hiking").unwrap();
        let unrelated = model.embed("We talked about the weather today").unwrap();

        assert!(cosine_similarity(&query, &related) > 0.0);
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn keyword_embedding_of_empty_text_is_zero() {
        let model = KeywordEmbedder::new();
        assert!(model.embed("").unwrap().iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn unavailable_index_counts_attempts() {
        let index = UnavailableIndex::new();
        let owner = OwnerId::try_from("u1").unwrap();
        assert!(index.search("q", &owner, 3).await.is_err());
        assert_eq!(index.search_attempts(), 1);
        assert_eq!(index.add_attempts(), 0);
    }
}
