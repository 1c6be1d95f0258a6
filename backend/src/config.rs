use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::inference::preprocess::{AcceptedFormat, ChannelOrder, ChannelPolicy, Interpolation};

const CONFIG_ENV: &str = "CLASSIFIER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "config/classifier.yaml";
/// Major config version this build understands; minor bumps only add keys.
const SUPPORTED_CONFIG_MAJOR: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: f32,
    pub model: ModelConfig,
    pub labels: Vec<String>,
    pub preprocessing: PreprocessingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub device: DeviceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Auto,
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Model input as `[width, height]`.
    pub size: [u32; 2],
    pub interpolation: Interpolation,
    pub channel_order: ChannelOrder,
    pub channel_policy: ChannelPolicy,
    pub accepted_formats: Vec<AcceptedFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub frontend_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            model: ModelConfig::default(),
            labels: vec![
                "Tomato-Bacterial_spot".to_string(),
                "Potato-Barly blight".to_string(),
                "Corn-Common_rust".to_string(),
            ],
            preprocessing: PreprocessingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("plant_disease_model.pt"),
            device: DeviceKind::Auto,
        }
    }
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            size: [256, 256],
            interpolation: Interpolation::Linear,
            channel_order: ChannelOrder::Bgr,
            channel_policy: ChannelPolicy::Convert,
            accepted_formats: vec![AcceptedFormat::Jpeg, AcceptedFormat::Png],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            max_upload_bytes: 20 * 1024 * 1024,
            frontend_dir: None,
        }
    }
}

impl AppConfig {
    /// Loads the YAML config (falling back to defaults when no file exists),
    /// applies environment overrides and validates the result.
    ///
    /// Returns the config together with the file it was read from, if any.
    pub fn load() -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = Self::config_path();
        let (mut config, source) = if path.is_file() {
            (Self::from_file(&path)?, Some(path))
        } else {
            (Self::default(), None)
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok((config, source))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        match std::env::var("CARGO_MANIFEST_DIR") {
            Ok(manifest_dir) => Path::new(&manifest_dir).join("..").join(DEFAULT_CONFIG_FILE),
            Err(_) => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                reason: format!("{:?} is not a valid port", port),
            })?;
        }
        if let Some(dir) = lookup("FRONTEND_DIR") {
            self.server.frontend_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.version.is_finite() || self.version.trunc() as u32 != SUPPORTED_CONFIG_MAJOR {
            return Err(ConfigError::Invalid {
                key: "version",
                reason: format!(
                    "{} is not supported, expected {}.x",
                    self.version, SUPPORTED_CONFIG_MAJOR
                ),
            });
        }
        let [width, height] = self.preprocessing.size;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid {
                key: "preprocessing.size",
                reason: format!("{}x{} has a zero dimension", width, height),
            });
        }
        if self.preprocessing.accepted_formats.is_empty() {
            return Err(ConfigError::Invalid {
                key: "preprocessing.accepted_formats",
                reason: "at least one image format must be accepted".to_string(),
            });
        }
        if self.labels.is_empty() {
            return Err(ConfigError::Invalid {
                key: "labels",
                reason: "label list is empty".to_string(),
            });
        }
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "server.max_upload_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn resolved_frontend_dir(&self) -> String {
        if let Some(dir) = &self.frontend_dir {
            return dir.display().to_string();
        }
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            format!("{}/../frontend/dist", manifest_dir)
        } else {
            "/usr/src/app/frontend/dist".to_string()
        }
    }
}
