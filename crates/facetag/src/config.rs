use facetag_core::{DetectorSettings, RegistryEntry, DEFAULT_CONFIDENCE_THRESHOLD};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Pipeline configuration: a TOML file with `FACETAG_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing model files.
    pub model_dir: PathBuf,
    /// SeetaFace frontal model, relative to `model_dir` unless absolute.
    pub detector_model: PathBuf,
    /// res10 SSD ONNX model, relative to `model_dir` unless absolute.
    pub gate_model: PathBuf,
    /// Gate confidence must be strictly greater than this to label a region.
    pub confidence_threshold: f32,
    /// Draw name labels above accepted regions; `false` draws boxes only.
    pub labels: bool,
    /// Font for region labels (default: the embedded DejaVu Sans).
    pub font_path: Option<PathBuf>,
    pub window_title: String,
    pub detector: DetectorSettings,
    /// Known faces, in matching order.
    pub registry: Vec<RegistryEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: PathBuf::from("models"),
            detector_model: PathBuf::from("seeta_fd_frontal_v1.0.bin"),
            gate_model: PathBuf::from("res10_300x300_ssd.onnx"),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            labels: true,
            font_path: None,
            window_title: "video image".to_string(),
            detector: DetectorSettings::default(),
            registry: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `path` (or `FACETAG_CONFIG`), falling back to defaults when
    /// neither is set, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var("FACETAG_CONFIG").ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML config file. Registry paths are resolved against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        if let Some(base) = path.parent() {
            for entry in &mut config.registry {
                if entry.path.is_relative() {
                    entry.path = base.join(&entry.path);
                }
            }
        }

        tracing::debug!(path = %path.display(), entries = config.registry.len(), "config loaded");
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(device) = std::env::var("FACETAG_CAMERA_DEVICE") {
            self.camera_device = device;
        }
        if let Ok(dir) = std::env::var("FACETAG_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Ok(font) = std::env::var("FACETAG_FONT_PATH") {
            self.font_path = Some(PathBuf::from(font));
        }
        self.confidence_threshold = env_f32("FACETAG_CONFIDENCE_THRESHOLD", self.confidence_threshold);
    }

    /// Path to the SeetaFace detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(&self.detector_model)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the SSD gate model.
    pub fn gate_model_path(&self) -> String {
        self.model_dir
            .join(&self.gate_model)
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
