//! Relevance scoring service.
//!
//! High-level facade over the pipeline: normalization -> embedding ->
//! {similarity | keywords | classifier}. Owns the lazily-initialized
//! embedding backbone (guarded check-and-init, loaded at most once per
//! process) and the classifier with its artifact store. Construct one at
//! startup and share it by reference; there are no module-level globals.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::relevance::classifier::{
    Classifier, ClassifierError, Prediction, TrainOptions, TrainReport,
};
use crate::relevance::embeddings::{model_name_hash, Embedder, EmbeddingError};
use crate::relevance::keywords::extract_keywords;
use crate::relevance::normalize::normalize;
use crate::relevance::similarity::{cosine_similarity, SimilarityError, SimilarityResult};
use crate::relevance::store::ModelStore;

/// Errors surfaced at the service seam. Kind is preserved from the
/// component that failed; nothing is retried here.
#[derive(Debug, thiserror::Error)]
pub enum RelevanceError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Similarity(#[from] SimilarityError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A résumé or job description. The two are structurally identical and
/// differ only in which argument slot they occupy when scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub raw_text: String,
    /// Derived; None until processed. Once computed it is a pure function
    /// of raw_text.
    pub normalized_text: Option<String>,
}

impl Document {
    pub fn new(raw_text: String) -> Self {
        Self {
            raw_text,
            normalized_text: None,
        }
    }
}

/// One labeled résumé/job pair, consumed transiently when training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub resume: String,
    pub job: String,
    /// 1 = relevant, 0 = not relevant
    pub label: u8,
}

/// Directory under the base path holding classifier artifacts
const CLASSIFIER_DIR: &str = "classifier";

pub struct RelevanceService {
    config: Config,
    base_path: PathBuf,
    /// Lazily-initialized backbone. Mutex<Option<_>> serializes the
    /// initialize-if-absent check so the model loads exactly once.
    embedder: Mutex<Option<Embedder>>,
    classifier: Classifier,
}

impl RelevanceService {
    /// Create the service. The embedding model is not loaded until the
    /// first operation that needs it (or an explicit `initialize`).
    pub fn new(config: Config, base_path: PathBuf) -> Self {
        let store = ModelStore::new(
            base_path.join(CLASSIFIER_DIR),
            model_name_hash(&config.model),
            config.artifact_retention,
        );
        Self {
            config,
            base_path,
            embedder: Mutex::new(None),
            classifier: Classifier::new(store),
        }
    }

    /// Normalize raw text. Pure; never touches the model.
    pub fn normalize(&self, raw: &str) -> String {
        normalize(raw)
    }

    /// Fill in a document's derived normalized text.
    pub fn process(&self, document: &mut Document) {
        document.normalized_text = Some(normalize(&document.raw_text));
    }

    /// Eagerly load the embedding model. Normally loading happens lazily.
    pub fn initialize(&self) -> Result<(), RelevanceError> {
        self.with_embedder(|_| Ok(()))
    }

    /// Embed raw text (normalized first).
    pub fn embed(&self, raw: &str) -> Result<Vec<f32>, RelevanceError> {
        let text = normalize(raw);
        self.with_embedder(|embedder| Ok(embedder.embed(&text)?))
    }

    /// Cosine similarity between a résumé and a job description.
    ///
    /// Both texts are normalized before embedding; callers holding
    /// pre-normalized text get the same result by idempotence.
    pub fn score(
        &self,
        resume_raw: &str,
        job_raw: &str,
        resume_ref: &str,
        job_ref: &str,
    ) -> Result<SimilarityResult, RelevanceError> {
        let batch = vec![normalize(resume_raw), normalize(job_raw)];

        let embeddings = self.with_embedder(|embedder| Ok(embedder.embed_batch(&batch)?))?;
        let [resume_embedding, job_embedding]: [Vec<f32>; 2] = embeddings
            .try_into()
            .map_err(|_| RelevanceError::Internal("embedding batch size mismatch".to_string()))?;

        let score = cosine_similarity(&resume_embedding, &job_embedding)?;
        Ok(SimilarityResult {
            resume_ref: resume_ref.to_string(),
            job_ref: job_ref.to_string(),
            score,
        })
    }

    /// Top keyphrases of a document, most relevant first. `top_n` falls
    /// back to the configured default. Blank input never loads the model.
    pub fn keywords(
        &self,
        raw: &str,
        top_n: Option<usize>,
    ) -> Result<Vec<String>, RelevanceError> {
        let top_n = top_n.unwrap_or(self.config.default_top_n);
        let text = normalize(raw);
        if top_n == 0 || text.is_empty() {
            return Ok(vec![]);
        }

        self.with_embedder(|embedder| Ok(extract_keywords(embedder, &text, top_n)?))
    }

    /// Train the relevance classifier from labeled text pairs.
    ///
    /// Each pair is normalized, embedded, and concatenated
    /// (résumé embedding first) into a 2 x dim feature vector.
    pub fn train(&self, examples: &[TrainingExample]) -> Result<TrainReport, RelevanceError> {
        // Reject bad batches before paying for any embedding work
        if examples.iter().any(|e| e.label > 1) {
            return Err(ClassifierError::InsufficientTrainingData(
                "labels must be 0 or 1".to_string(),
            )
            .into());
        }
        if examples.len() < 2 {
            return Err(ClassifierError::InsufficientTrainingData(format!(
                "need at least 2 examples, got {}",
                examples.len()
            ))
            .into());
        }
        if examples.iter().all(|e| e.label == 0) || examples.iter().all(|e| e.label == 1) {
            return Err(ClassifierError::InsufficientTrainingData(
                "both labels must be represented".to_string(),
            )
            .into());
        }

        let mut batch = Vec::with_capacity(examples.len() * 2);
        batch.extend(examples.iter().map(|e| normalize(&e.resume)));
        batch.extend(examples.iter().map(|e| normalize(&e.job)));

        let embeddings = self.with_embedder(|embedder| Ok(embedder.embed_batch(&batch)?))?;
        let (resumes, jobs) = embeddings.split_at(examples.len());

        let features: Vec<(Vec<f32>, u8)> = examples
            .iter()
            .zip(resumes.iter().zip(jobs.iter()))
            .map(|(example, (resume_embedding, job_embedding))| {
                let mut concat =
                    Vec::with_capacity(resume_embedding.len() + job_embedding.len());
                concat.extend_from_slice(resume_embedding);
                concat.extend_from_slice(job_embedding);
                (concat, example.label)
            })
            .collect();

        let opts = TrainOptions {
            test_split: self.config.test_split,
            seed: self.config.seed,
        };
        Ok(self.classifier.train(&features, opts)?)
    }

    /// Predict relevance of a résumé/job pair with the trained classifier.
    pub fn predict(
        &self,
        resume_raw: &str,
        job_raw: &str,
    ) -> Result<Prediction, RelevanceError> {
        let batch = vec![normalize(resume_raw), normalize(job_raw)];
        let embeddings = self.with_embedder(|embedder| Ok(embedder.embed_batch(&batch)?))?;

        let mut features = Vec::with_capacity(embeddings.iter().map(Vec::len).sum());
        for embedding in &embeddings {
            features.extend_from_slice(embedding);
        }

        Ok(self.classifier.predict(&features)?)
    }

    /// Whether a trained classifier artifact exists. Never loads it.
    pub fn classifier_status(&self) -> bool {
        self.classifier.is_trained()
    }

    /// Path of the current classifier artifact, if any.
    pub fn classifier_artifact(&self) -> Option<PathBuf> {
        self.classifier.artifact_ref()
    }

    /// Run `f` against the loaded backbone, initializing it first if this
    /// is the first use.
    fn with_embedder<R>(
        &self,
        f: impl FnOnce(&Embedder) -> Result<R, RelevanceError>,
    ) -> Result<R, RelevanceError> {
        let mut guard = self
            .embedder
            .lock()
            .map_err(|e| RelevanceError::Internal(format!("embedder lock poisoned: {e}")))?;

        if guard.is_none() {
            log::info!("initializing embedding backbone '{}'", self.config.model);
            *guard = Some(Embedder::load(&self.config.model, self.base_path.clone())?);
        }

        f(guard.as_ref().expect("initialized above"))
    }
}
