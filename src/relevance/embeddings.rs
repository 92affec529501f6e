//! Sentence-embedding backbone.
//!
//! Wraps fastembed's TextEmbedding behind a small interface:
//! - model name parsing (startup configuration, not runtime-mutable)
//! - dimension probing at load time
//! - single and batch embedding
//! - SHA-256 model identity hash for persisted artifacts
//!
//! Loading is driven by the relevance service, which guarantees the model
//! is initialized at most once per process.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{InitOptions, TextEmbedding};

/// Errors from the embedding backbone.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// The pretrained model could not be resolved or loaded. Not retried
    /// here; the caller decides.
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),
}

/// A loaded sentence-embedding model.
///
/// fastembed's embed() takes &mut self, so the model sits behind a Mutex;
/// everything else is read-only after construction.
pub struct Embedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl Embedder {
    /// Load the named model, downloading weights into `cache_dir/models`
    /// on first use.
    pub fn load(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let which = parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::ModelUnavailable(format!(
                "failed to create model cache directory: {e}"
            ))
        })?;

        let options = InitOptions::new(which)
            .with_cache_dir(models_dir)
            .with_show_download_progress(false);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        let dimensions = probe_dimensions(&mut model)?;
        log::info!("loaded embedding model '{model_name}' ({dimensions} dims)");

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    pub fn name(&self) -> &str {
        &self.model_name
    }

    /// Embedding dimension. Constant for the life of the process once the
    /// model is loaded.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed a single text.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut batch = self.embed_batch(&[text.to_string()])?;
        batch
            .pop()
            .ok_or_else(|| EmbeddingError::Embedding("no embedding returned".to_string()))
    }

    /// Embed several texts in one forward pass.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::Embedding(format!("model lock poisoned: {e}")))?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Embedding(e.to_string()))
    }

    /// SHA-256 of the model name, stored in classifier artifacts so a model
    /// switch is detected on load.
    pub fn model_id_hash(&self) -> [u8; 32] {
        model_name_hash(&self.model_name)
    }
}

/// Hash a model name without loading the model.
pub fn model_name_hash(model_name: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(model_name.as_bytes());
    hasher.finalize().into()
}

fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l6-v2-q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-small-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGESmallENV15Q),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-base-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGEBaseENV15Q),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "bge-large-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGELargeENV15Q),
        _ => Err(EmbeddingError::ModelUnavailable(format!(
            "unknown model '{name}'; supported: all-MiniLM-L6-v2, bge-small-en-v1.5, \
             bge-base-en-v1.5, bge-large-en-v1.5 (-q suffix for quantized)"
        ))),
    }
}

fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
    let probe = model
        .embed(vec!["probe"], None)
        .map_err(|e| EmbeddingError::ModelUnavailable(format!("dimension probe failed: {e}")))?;

    probe
        .first()
        .map(|v| v.len())
        .ok_or_else(|| EmbeddingError::ModelUnavailable("model returned no embedding".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_name_is_unavailable() {
        let err = parse_model_name("word2vec-classic").unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelUnavailable(_)));
    }

    #[test]
    fn test_model_name_parse_is_case_insensitive() {
        assert!(parse_model_name("All-MiniLM-L6-v2").is_ok());
        assert!(parse_model_name("BGE-BASE-EN-V1.5").is_ok());
    }

    #[test]
    fn test_model_name_hash_is_deterministic() {
        assert_eq!(
            model_name_hash("all-MiniLM-L6-v2"),
            model_name_hash("all-MiniLM-L6-v2")
        );
        assert_ne!(
            model_name_hash("all-MiniLM-L6-v2"),
            model_name_hash("bge-base-en-v1.5")
        );
    }

    // Model-backed tests live behind --ignored; they download weights.
    #[test]
    #[ignore = "requires model download"]
    fn test_load_and_embed() {
        let dir = std::env::temp_dir().join("jobfit-embed-test");
        let embedder = Embedder::load("all-MiniLM-L6-v2", dir.clone()).unwrap();
        assert_eq!(embedder.dimensions(), 384);

        let embedding = embedder.embed("software engineer").unwrap();
        assert_eq!(embedding.len(), 384);

        // Same text, same model, same vector
        let again = embedder.embed("software engineer").unwrap();
        assert_eq!(embedding, again);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
