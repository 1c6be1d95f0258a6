pub mod labels;
pub mod model;
pub mod preprocess;
pub mod runner;

pub use labels::LabelSet;
pub use model::{Classifier, TorchClassifier};
pub use preprocess::Preprocessor;
pub use runner::{InferenceError, InferenceRunner, PredictionResult};
