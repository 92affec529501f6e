//! Binary relevance classifier over concatenated embedding pairs.
//!
//! A logistic regression fitted with full-batch gradient descent. Features
//! are the résumé embedding followed by the job embedding, so the feature
//! dimension is exactly twice the embedding dimension. Training persists
//! the fitted parameters through the model store and swaps the in-memory
//! cache; prediction lazily loads the current artifact on first use.

use std::path::PathBuf;
use std::sync::Mutex;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::relevance::store::{ModelStore, StoreError, StoredArtifact};

/// Fixed optimization schedule. The loss is convex; with unit-norm
/// embedding features this converges well before the cap.
const TRAIN_EPOCHS: usize = 300;
const LEARNING_RATE: f32 = 0.5;

/// Errors from training and prediction.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("insufficient training data: {0}")]
    InsufficientTrainingData(String),

    #[error("no trained classifier available; train one first")]
    NoTrainedModel,

    #[error("feature dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Training options; defaults mirror the configuration surface.
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    /// Fraction of examples held out for the accuracy report.
    pub test_split: f32,
    /// Seed for the deterministic shuffle behind the split.
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            test_split: 0.2,
            seed: 42,
        }
    }
}

/// Report returned by a successful training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    /// Accuracy on the held-out partition.
    pub accuracy: f32,
    /// Path of the persisted artifact.
    pub artifact: String,
    pub trained_on: usize,
    pub evaluated_on: usize,
}

/// A single prediction.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub label: u8,
    /// Maximum class probability. Not a calibrated guarantee.
    pub confidence: f32,
}

/// Fitted logistic regression parameters.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    weights: Vec<f32>,
    bias: f32,
}

impl LogisticModel {
    pub fn dimensions(&self) -> usize {
        self.weights.len()
    }

    /// P(label = 1 | features)
    fn probability(&self, features: &[f32]) -> f32 {
        let z: f32 = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(w, x)| w * x)
            .sum::<f32>()
            + self.bias;
        sigmoid(z)
    }

    fn predict(&self, features: &[f32]) -> Prediction {
        let p = self.probability(features);
        let label = u8::from(p >= 0.5);
        Prediction {
            label,
            confidence: p.max(1.0 - p),
        }
    }
}

/// Trainer/predictor with a lazily-loaded model cache.
///
/// Training fits and persists outside the cache lock and swaps the cache
/// in a short critical section, so a racing predict observes either the
/// old or the new model, never a partial one.
pub struct Classifier {
    store: ModelStore,
    cache: Mutex<Option<LogisticModel>>,
}

impl Classifier {
    pub fn new(store: ModelStore) -> Self {
        Self {
            store,
            cache: Mutex::new(None),
        }
    }

    /// Fit on `examples` of (concatenated embedding, label), persist the
    /// result, and make it current.
    ///
    /// Requires at least two examples with both labels represented. The
    /// held-out partition (deterministic seeded shuffle) is used only to
    /// report accuracy; the fit consumes every example.
    pub fn train(
        &self,
        examples: &[(Vec<f32>, u8)],
        opts: TrainOptions,
    ) -> Result<TrainReport, ClassifierError> {
        validate_examples(examples)?;
        let n = examples.len();
        let dim = examples[0].0.len();

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(opts.seed);
        indices.shuffle(&mut rng);

        let held = ((n as f32 * opts.test_split).round() as usize).clamp(1, n - 1);
        let eval_indices = &indices[n - held..];

        let model = fit(examples, dim);

        let correct = eval_indices
            .iter()
            .filter(|&&i| model.predict(&examples[i].0).label == examples[i].1)
            .count();
        let accuracy = correct as f32 / held as f32;

        let artifact = StoredArtifact {
            weights: model.weights.clone(),
            bias: model.bias,
            accuracy,
            created_at: chrono::Utc::now().timestamp(),
        };
        let path = self.store.save(&artifact)?;

        let mut cache = self.lock_cache()?;
        *cache = Some(model);
        drop(cache);

        log::info!("trained classifier on {n} examples, held-out accuracy {accuracy:.3}");

        Ok(TrainReport {
            accuracy,
            artifact: path.to_string_lossy().into_owned(),
            trained_on: n,
            evaluated_on: held,
        })
    }

    /// Predict from a concatenated embedding pair. Loads the current
    /// artifact on first use.
    pub fn predict(&self, features: &[f32]) -> Result<Prediction, ClassifierError> {
        let mut cache = self.lock_cache()?;

        if cache.is_none() {
            let artifact = match self.store.load_current() {
                Ok(artifact) => artifact,
                Err(StoreError::NotFound) => return Err(ClassifierError::NoTrainedModel),
                Err(e) => return Err(e.into()),
            };
            *cache = Some(LogisticModel {
                weights: artifact.weights,
                bias: artifact.bias,
            });
        }

        let model = cache.as_ref().expect("cache populated above");
        if features.len() != model.dimensions() {
            return Err(ClassifierError::DimensionMismatch {
                expected: model.dimensions(),
                got: features.len(),
            });
        }

        Ok(model.predict(features))
    }

    /// Path of the current artifact, if any.
    pub fn artifact_ref(&self) -> Option<PathBuf> {
        self.store.current_ref()
    }

    /// Whether a trained artifact exists. Answers from the cache flag or
    /// the store; never forces a load.
    pub fn is_trained(&self) -> bool {
        if let Ok(cache) = self.cache.lock() {
            if cache.is_some() {
                return true;
            }
        }
        self.store.exists()
    }

    fn lock_cache(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Option<LogisticModel>>, ClassifierError> {
        self.cache
            .lock()
            .map_err(|e| ClassifierError::Internal(format!("cache lock poisoned: {e}")))
    }
}

fn validate_examples(examples: &[(Vec<f32>, u8)]) -> Result<(), ClassifierError> {
    if examples.len() < 2 {
        return Err(ClassifierError::InsufficientTrainingData(format!(
            "need at least 2 examples, got {}",
            examples.len()
        )));
    }

    let has_positive = examples.iter().any(|(_, label)| *label == 1);
    let has_negative = examples.iter().any(|(_, label)| *label == 0);
    if !has_positive || !has_negative {
        return Err(ClassifierError::InsufficientTrainingData(
            "both labels must be represented".to_string(),
        ));
    }

    let dim = examples[0].0.len();
    if dim == 0 {
        return Err(ClassifierError::InsufficientTrainingData(
            "feature vectors are empty".to_string(),
        ));
    }
    for (features, _) in examples {
        if features.len() != dim {
            return Err(ClassifierError::DimensionMismatch {
                expected: dim,
                got: features.len(),
            });
        }
    }
    Ok(())
}

/// Full-batch gradient descent on the logistic loss. Deterministic:
/// zero-initialized parameters, fixed epoch count and learning rate.
fn fit(examples: &[(Vec<f32>, u8)], dim: usize) -> LogisticModel {
    let n = examples.len() as f32;
    let mut weights = vec![0.0f32; dim];
    let mut bias = 0.0f32;

    let mut grad = vec![0.0f32; dim];
    for _ in 0..TRAIN_EPOCHS {
        grad.iter_mut().for_each(|g| *g = 0.0);
        let mut bias_grad = 0.0f32;

        for (features, label) in examples {
            let z: f32 = weights
                .iter()
                .zip(features.iter())
                .map(|(w, x)| w * x)
                .sum::<f32>()
                + bias;
            let err = sigmoid(z) - *label as f32;

            for (g, x) in grad.iter_mut().zip(features.iter()) {
                *g += err * x;
            }
            bias_grad += err;
        }

        for (w, g) in weights.iter_mut().zip(grad.iter()) {
            *w -= LEARNING_RATE * g / n;
        }
        bias -= LEARNING_RATE * bias_grad / n;
    }

    LogisticModel { weights, bias }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store(dir: &TempDir) -> ModelStore {
        ModelStore::new(dir.path().to_path_buf(), [7u8; 32], 3)
    }

    /// Linearly separable toy set: label 1 leans on the first axis,
    /// label 0 on the second.
    fn separable_examples() -> Vec<(Vec<f32>, u8)> {
        vec![
            (vec![0.9, 0.1, 0.0, 0.0], 1),
            (vec![0.8, 0.2, 0.1, 0.0], 1),
            (vec![0.7, 0.0, 0.2, 0.1], 1),
            (vec![0.9, 0.2, 0.0, 0.1], 1),
            (vec![0.1, 0.9, 0.0, 0.0], 0),
            (vec![0.2, 0.8, 0.1, 0.0], 0),
            (vec![0.0, 0.7, 0.2, 0.1], 0),
            (vec![0.2, 0.9, 0.1, 0.0], 0),
        ]
    }

    #[test]
    fn test_single_class_rejected() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::new(test_store(&dir));

        let examples = vec![
            (vec![1.0, 0.0], 0),
            (vec![0.9, 0.1], 0),
            (vec![0.8, 0.0], 0),
        ];
        let err = classifier.train(&examples, TrainOptions::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::InsufficientTrainingData(_)));
        assert!(!classifier.is_trained());
    }

    #[test]
    fn test_fewer_than_two_examples_rejected() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::new(test_store(&dir));

        let err = classifier
            .train(&[(vec![1.0, 0.0], 1)], TrainOptions::default())
            .unwrap_err();
        assert!(matches!(err, ClassifierError::InsufficientTrainingData(_)));
    }

    #[test]
    fn test_two_examples_one_per_class_succeeds() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::new(test_store(&dir));

        let examples = vec![(vec![1.0, 0.0], 1), (vec![0.0, 1.0], 0)];
        let report = classifier.train(&examples, TrainOptions::default()).unwrap();

        assert!((0.0..=1.0).contains(&report.accuracy));
        assert_eq!(report.trained_on, 2);
        assert_eq!(report.evaluated_on, 1);
        assert!(classifier.is_trained());
    }

    #[test]
    fn test_ragged_dimensions_rejected() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::new(test_store(&dir));

        let examples = vec![(vec![1.0, 0.0], 1), (vec![0.0, 1.0, 0.5], 0)];
        let err = classifier.train(&examples, TrainOptions::default()).unwrap_err();
        assert!(matches!(err, ClassifierError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_predict_before_train_fails() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::new(test_store(&dir));

        let err = classifier.predict(&[0.5, 0.5]).unwrap_err();
        assert!(matches!(err, ClassifierError::NoTrainedModel));
    }

    #[test]
    fn test_train_then_predict_separable() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::new(test_store(&dir));

        let report = classifier
            .train(&separable_examples(), TrainOptions::default())
            .unwrap();
        assert!(report.accuracy >= 0.5);

        let positive = classifier.predict(&[0.9, 0.1, 0.0, 0.0]).unwrap();
        assert_eq!(positive.label, 1);
        let negative = classifier.predict(&[0.1, 0.9, 0.0, 0.0]).unwrap();
        assert_eq!(negative.label, 0);

        assert!((0.0..=1.0).contains(&positive.confidence));
        assert!(positive.confidence >= 0.5);
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::new(test_store(&dir));
        classifier
            .train(&separable_examples(), TrainOptions::default())
            .unwrap();

        let err = classifier.predict(&[0.5, 0.5]).unwrap_err();
        match err {
            ClassifierError::DimensionMismatch { expected, got } => {
                assert_eq!(expected, 4);
                assert_eq!(got, 2);
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_lazy_reload_from_store() {
        let dir = TempDir::new().unwrap();

        {
            let classifier = Classifier::new(test_store(&dir));
            classifier
                .train(&separable_examples(), TrainOptions::default())
                .unwrap();
        }

        // Fresh instance, cold cache: predict must load from disk
        let reloaded = Classifier::new(test_store(&dir));
        assert!(reloaded.is_trained());
        let prediction = reloaded.predict(&[0.9, 0.1, 0.0, 0.0]).unwrap();
        assert_eq!(prediction.label, 1);
    }

    #[test]
    fn test_training_is_deterministic() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let a = Classifier::new(test_store(&dir_a));
        let b = Classifier::new(test_store(&dir_b));

        let report_a = a.train(&separable_examples(), TrainOptions::default()).unwrap();
        let report_b = b.train(&separable_examples(), TrainOptions::default()).unwrap();

        assert_eq!(report_a.accuracy, report_b.accuracy);

        let features = [0.6, 0.3, 0.1, 0.0];
        let pred_a = a.predict(&features).unwrap();
        let pred_b = b.predict(&features).unwrap();
        assert_eq!(pred_a.label, pred_b.label);
        assert_eq!(pred_a.confidence, pred_b.confidence);
    }

    #[test]
    fn test_retrain_overwrites_current() {
        let dir = TempDir::new().unwrap();
        let classifier = Classifier::new(test_store(&dir));

        classifier
            .train(&separable_examples(), TrainOptions::default())
            .unwrap();

        // Retrain with inverted labels; predictions must flip
        let inverted: Vec<(Vec<f32>, u8)> = separable_examples()
            .into_iter()
            .map(|(features, label)| (features, 1 - label))
            .collect();
        classifier.train(&inverted, TrainOptions::default()).unwrap();

        let prediction = classifier.predict(&[0.9, 0.1, 0.0, 0.0]).unwrap();
        assert_eq!(prediction.label, 0);
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert!(sigmoid(-20.0) < 0.01);
        assert!(sigmoid(20.0) > 0.99);
        assert!((sigmoid(0.0) - 0.5).abs() < f32::EPSILON);
    }
}
