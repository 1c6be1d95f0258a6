use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

use crate::config::DeviceKind;
use crate::inference::preprocess::InputBatch;
use crate::inference::runner::InferenceError;

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Model artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to load model artifact {path}: {source}")]
    Torch {
        path: PathBuf,
        #[source]
        source: tch::TchError,
    },
}

/// Maps a `(1, H, W, 3)` batch to a probability vector over the class set.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, batch: &InputBatch) -> Result<Vec<f32>, InferenceError>;
}

/// TorchScript classifier taking an NHWC `float32` tensor of raw pixel values.
pub struct TorchClassifier {
    module: Mutex<CModule>,
    device: Device,
    name: String,
}

impl TorchClassifier {
    pub fn load(path: &Path, device: DeviceKind) -> Result<Self, ModelLoadError> {
        if !path.is_file() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }

        let device = match device {
            DeviceKind::Auto => Device::cuda_if_available(),
            DeviceKind::Cpu => Device::Cpu,
            DeviceKind::Cuda => Device::Cuda(0),
        };
        let mut module =
            CModule::load_on_device(path, device).map_err(|source| ModelLoadError::Torch {
                path: path.to_path_buf(),
                source,
            })?;
        module.set_eval();

        log::info!("Loaded model {} on {:?}", path.display(), device);
        Ok(Self {
            module: Mutex::new(module),
            device,
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        })
    }

    fn to_tensor(&self, batch: &InputBatch) -> Result<Tensor, tch::TchError> {
        let [n, h, w, c] = batch.shape();
        let data = batch.to_f32_vec();
        let tensor = Tensor::from_slice(&data)
            .f_reshape([n as i64, h as i64, w as i64, c as i64])?
            .to_device(self.device);
        Ok(tensor)
    }
}

impl Classifier for TorchClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, batch: &InputBatch) -> Result<Vec<f32>, InferenceError> {
        let input = self.to_tensor(batch)?;
        let module = self
            .module
            .lock()
            .map_err(|_| InferenceError::Engine("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| module.forward_ts(&[input]))?;
        let output = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .flatten(0, -1);
        let probabilities = Vec::<f32>::try_from(&output)?;
        Ok(probabilities)
    }
}
