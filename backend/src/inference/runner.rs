use std::sync::Arc;

use crate::inference::labels::{ClassLabel, LabelSet};
use crate::inference::model::Classifier;
use crate::inference::preprocess::{InputBatch, PreprocessError, Preprocessor};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error("Model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("Inference engine error: {0}")]
    Engine(String),
    #[error("Model returned an empty probability vector")]
    EmptyOutput,
    #[error("Model returned no finite probabilities")]
    NonFiniteOutput,
    #[error("Model returned {actual} probabilities but {expected} classes are configured")]
    OutputSize { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub class_index: usize,
    pub label: ClassLabel,
    /// Highest probability as a percentage.
    pub confidence: f32,
    pub probabilities: Vec<f32>,
}

/// Index of the largest value; the lowest index wins ties. NaNs never win.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

#[derive(Clone)]
pub struct InferenceRunner {
    classifier: Arc<dyn Classifier>,
    labels: Arc<LabelSet>,
    preprocessor: Arc<Preprocessor>,
}

impl InferenceRunner {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        labels: Arc<LabelSet>,
        preprocessor: Arc<Preprocessor>,
    ) -> Self {
        Self {
            classifier,
            labels,
            preprocessor,
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Runs one prediction on a blank batch and checks that the model's
    /// output width matches the configured label set.
    pub fn warm_up(&self) -> Result<(), InferenceError> {
        let (width, height) = self.preprocessor.input_size();
        let probabilities = self.classifier.predict(&InputBatch::zeros(width, height))?;
        self.check_output(&probabilities)?;
        log::info!(
            "Model {} warmed up with {} output classes",
            self.classifier.name(),
            probabilities.len()
        );
        Ok(())
    }

    pub fn analyze(&self, image: &[u8]) -> Result<PredictionResult, InferenceError> {
        let batch = self.preprocessor.process(image)?;
        self.run(&batch)
    }

    pub fn run(&self, batch: &InputBatch) -> Result<PredictionResult, InferenceError> {
        let probabilities = self.classifier.predict(batch)?;
        self.check_output(&probabilities)?;

        let class_index = argmax(&probabilities).ok_or(InferenceError::NonFiniteOutput)?;
        let label = self
            .labels
            .get(class_index)
            .cloned()
            .ok_or(InferenceError::OutputSize {
                expected: self.labels.len(),
                actual: probabilities.len(),
            })?;
        let confidence = probabilities[class_index] * 100.0;

        Ok(PredictionResult {
            class_index,
            label,
            confidence,
            probabilities,
        })
    }

    fn check_output(&self, probabilities: &[f32]) -> Result<(), InferenceError> {
        if probabilities.is_empty() {
            return Err(InferenceError::EmptyOutput);
        }
        if probabilities.len() != self.labels.len() {
            return Err(InferenceError::OutputSize {
                expected: self.labels.len(),
                actual: probabilities.len(),
            });
        }
        Ok(())
    }
}
