//! Résumé/job relevance scoring core.
//!
//! Pipeline: raw text -> normalizer -> embedding backbone ->
//! {similarity scorer | keyword extractor | classifier}.
//!
//! # Architecture
//!
//! - `normalize`: canonical token stream from raw text
//! - `embeddings`: fastembed backbone, loaded lazily once per process
//! - `similarity`: cosine similarity between embeddings
//! - `keywords`: embedding-ranked keyphrase extraction
//! - `classifier`: logistic relevance classifier with lazy load/reload
//! - `store`: versioned on-disk persistence for trained artifacts
//! - `service`: explicit-lifecycle facade tying the pieces together

pub mod classifier;
pub mod embeddings;
pub mod keywords;
pub mod normalize;
pub mod service;
pub mod similarity;
pub mod store;

pub use classifier::{Classifier, ClassifierError, Prediction, TrainOptions, TrainReport};
pub use embeddings::{Embedder, EmbeddingError};
pub use keywords::extract_keywords;
pub use normalize::normalize;
pub use service::{Document, RelevanceError, RelevanceService, TrainingExample};
pub use similarity::{cosine_similarity, SimilarityError, SimilarityResult};
pub use store::{ModelStore, StoreError, StoredArtifact};
