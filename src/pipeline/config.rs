//! Configuration file loading utilities for the OCR pipeline.
//!
//! A [`PipelineConfig`] lists the stage configurations of one pipeline. It
//! can be read from TOML or JSON, or built from the standard model layout
//! with [`PipelineConfig::for_task`].

use crate::core::OCRError;
use crate::core::config::{ConfigError, ConfigValidator, InferBackend, StageConfig, TaskKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory of each stage's model under the model root.
pub const DET_MODEL_DIR: &str = "PP-OCRv5_mobile_det_infer";
pub const CLS_MODEL_DIR: &str = "PP-LCNet_x1_0_textline_ori_infer";
pub const REC_MODEL_DIR: &str = "PP-OCRv5_mobile_rec_infer";

const MODEL_FILE: &str = "inference.onnx";
const CONFIG_FILE: &str = "inference.yml";

/// Stage configurations of one pipeline, in any order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl PipelineConfig {
    pub fn new(stages: Vec<StageConfig>) -> Self {
        Self { stages }
    }

    /// Stage configurations for `task` using `<root>/<model dir>/inference.{onnx,yml}`.
    pub fn for_task(task: TaskKind, model_root: impl AsRef<Path>) -> Self {
        let root = model_root.as_ref();
        let stage = |kind: TaskKind, dir: &str| {
            StageConfig::new(kind, root.join(dir).join(MODEL_FILE), root.join(dir).join(CONFIG_FILE))
        };
        let stages = match task {
            TaskKind::Detection => vec![stage(TaskKind::Detection, DET_MODEL_DIR)],
            TaskKind::Orientation => vec![stage(TaskKind::Orientation, CLS_MODEL_DIR)],
            TaskKind::Recognition => vec![stage(TaskKind::Recognition, REC_MODEL_DIR)],
            TaskKind::Combined => vec![
                stage(TaskKind::Detection, DET_MODEL_DIR),
                stage(TaskKind::Orientation, CLS_MODEL_DIR),
                stage(TaskKind::Recognition, REC_MODEL_DIR),
            ],
        };
        Self { stages }
    }

    pub fn stage(&self, task: TaskKind) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.task == task)
    }

    pub fn stage_mut(&mut self, task: TaskKind) -> Option<&mut StageConfig> {
        self.stages.iter_mut().find(|s| s.task == task)
    }

    /// Applies one setting to every stage.
    pub fn for_each_stage(mut self, f: impl Fn(&mut StageConfig)) -> Self {
        self.stages.iter_mut().for_each(f);
        self
    }

    pub fn with_backend(self, backend: InferBackend) -> Self {
        self.for_each_stage(|s| s.backend = backend)
    }

    pub fn with_threads(self, intra: usize, inter: usize) -> Self {
        self.for_each_stage(|s| {
            s.intra_threads = intra;
            s.inter_threads = inter;
        })
    }

    pub fn with_save_images(self, save: bool, output_dir: impl Into<PathBuf>) -> Self {
        let dir = output_dir.into();
        self.for_each_stage(|s| {
            s.save_images = save;
            s.output_dir = dir.clone();
        })
    }
}

impl ConfigValidator for PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "pipeline has no stages".to_string(),
            });
        }
        for (i, stage) in self.stages.iter().enumerate() {
            stage.validate()?;
            if self.stages[..i].iter().any(|s| s.task == stage.task) {
                return Err(ConfigError::InvalidConfig {
                    message: format!("stage {} is configured twice", stage.task),
                });
            }
        }
        Ok(())
    }
}

/// Configuration file format
#[derive(Debug, Clone, Copy)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration loader for OCR pipeline
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file, auto-detecting the format from the extension
    pub fn load_from_file(path: &Path) -> Result<PipelineConfig, OCRError> {
        let format = ConfigFormat::from_extension(path).ok_or_else(|| OCRError::ConfigError {
            message: format!("Unsupported config file extension: {:?}", path.extension()),
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| OCRError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        Self::load_from_string(&content, format)
    }

    pub fn load_from_string(content: &str, format: ConfigFormat) -> Result<PipelineConfig, OCRError> {
        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| OCRError::ConfigError {
                message: format!("Failed to parse TOML config: {e}"),
            }),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| OCRError::ConfigError {
                message: format!("Failed to parse JSON config: {e}"),
            }),
        }
    }

    /// Save configuration to a file, auto-detecting the format from the extension
    pub fn save_to_file(config: &PipelineConfig, path: &Path) -> Result<(), OCRError> {
        let format = ConfigFormat::from_extension(path).ok_or_else(|| OCRError::ConfigError {
            message: format!("Unsupported config file extension: {:?}", path.extension()),
        })?;

        let content = Self::save_to_string(config, format)?;

        std::fs::write(path, content).map_err(|e| OCRError::ConfigError {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    pub fn save_to_string(config: &PipelineConfig, format: ConfigFormat) -> Result<String, OCRError> {
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| OCRError::ConfigError {
                message: format!("Failed to serialize config to TOML: {e}"),
            }),
            ConfigFormat::Json => {
                serde_json::to_string_pretty(config).map_err(|e| OCRError::ConfigError {
                    message: format!("Failed to serialize config to JSON: {e}"),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_format_detection() {
        assert!(matches!(
            ConfigFormat::from_extension(Path::new("config.toml")),
            Some(ConfigFormat::Toml)
        ));
        assert!(matches!(
            ConfigFormat::from_extension(Path::new("config.json")),
            Some(ConfigFormat::Json)
        ));
        assert!(ConfigFormat::from_extension(Path::new("config.txt")).is_none());
    }

    #[test]
    fn combined_preset_uses_model_layout() {
        let config = PipelineConfig::for_task(TaskKind::Combined, "models");
        assert_eq!(config.stages.len(), 3);
        let rec = config.stage(TaskKind::Recognition).unwrap();
        assert_eq!(
            rec.model_path,
            PathBuf::from("models/PP-OCRv5_mobile_rec_infer/inference.onnx")
        );
        assert_eq!(
            rec.config_path,
            PathBuf::from("models/PP-OCRv5_mobile_rec_infer/inference.yml")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        let config = PipelineConfig::for_task(TaskKind::Detection, "m")
            .with_backend(InferBackend::OrtCuda)
            .with_threads(4, 2);
        ConfigLoader::save_to_file(&config, &path).unwrap();
        assert_eq!(ConfigLoader::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let json = r#"{"stages":[{"task":"recognition","model_path":"r.onnx","config_path":"r.yml"}]}"#;
        let config = ConfigLoader::load_from_string(json, ConfigFormat::Json).unwrap();
        let rec = &config.stages[0];
        assert_eq!(rec.intra_threads, 1);
        assert_eq!(rec.input_shape, [3, 960, 960]);
        assert_eq!(rec.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn duplicate_stage_is_rejected() {
        let mut config = PipelineConfig::for_task(TaskKind::Detection, "m");
        config.stages.push(config.stages[0].clone());
        assert!(config.validate().is_err());
    }
}
