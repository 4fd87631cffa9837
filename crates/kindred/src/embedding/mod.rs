use std::sync::Mutex;

use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};

use crate::error::{KindredError, Result};

pub const EMBEDDING_DIMENSION: usize = 384;

/// Turns text into a fixed-length vector for similarity search.
///
/// Implementations are blocking; async callers should run them on the
/// blocking pool.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector returned by [`Embedder::embed`]
    fn dimension(&self) -> usize;
}

/// Multilingual e5-small via fastembed (384 dimensions, handles Korean)
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedder {
    pub fn new() -> Result<Self> {
        let model = TextEmbedding::try_new(InitOptions::new(FastEmbedModel::MultilingualE5Small))
            .map_err(|e| KindredError::Embedding(e.to_string()))?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| KindredError::Embedding("Embedding model lock poisoned".to_string()))?;
        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| KindredError::Embedding(e.to_string()))?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| KindredError::Embedding("No embedding returned".to_string()))
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}

#[cfg(all(test, feature = "ml-tests"))]
mod tests {
    use super::*;
    use crate::index::cosine_similarity;

    #[test]
    fn test_embed_returns_correct_dimension() {
        let model = FastEmbedder::new().expect("Failed to load model");
        let embedding = model.embed("Hello, world!").expect("Failed to embed");
        assert_eq!(embedding.len(), EMBEDDING_DIMENSION);
    }

    #[test]
    fn test_preference_is_closer_to_related_question() {
        let model = FastEmbedder::new().expect("Failed to load model");

        let question = model.embed("what do I enjoy?").unwrap();
        let preference = model.embed("User enjoys hiking").unwrap();
        let unrelated = model.embed("The invoice was paid on Tuesday").unwrap();

        assert!(
            cosine_similarity(&question, &preference) > cosine_similarity(&question, &unrelated)
        );
    }
}
