//! Configuration management for the OCR pipeline.
//!
//! This module provides the per-stage configuration, its validation, the ONNX
//! Runtime session settings derived from it, and the schema for the model
//! YAML files that ship next to each exported model.

pub mod errors;
pub mod model_yaml;
pub mod onnx;

pub use errors::{ConfigError, ConfigValidator};
pub use model_yaml::{
    ConfigDiagnostics, DetectorParams, ModelYaml, OrientationParams, RecognizerParams,
};
pub use onnx::*;

use crate::core::constants::{DEFAULT_DET_IMAGE_SHAPE, DEFAULT_OUTPUT_DIR};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The job a stage (or a whole pipeline) performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Text region detection.
    Detection,
    /// Text line orientation classification.
    Orientation,
    /// Text recognition.
    Recognition,
    /// Detection, orientation and recognition chained together.
    Combined,
}

impl TaskKind {
    /// Short name used on the command line and in benchmark reports.
    pub fn short_name(&self) -> &'static str {
        match self {
            TaskKind::Detection => "dec",
            TaskKind::Orientation => "angle",
            TaskKind::Recognition => "reg",
            TaskKind::Combined => "ocr",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Detection => write!(f, "Detection"),
            TaskKind::Orientation => write!(f, "Orientation"),
            TaskKind::Recognition => write!(f, "Recognition"),
            TaskKind::Combined => write!(f, "OCR"),
        }
    }
}

impl FromStr for TaskKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dec" | "det" | "detection" => Ok(TaskKind::Detection),
            "angle" | "cls" | "orientation" => Ok(TaskKind::Orientation),
            "reg" | "rec" | "recognition" => Ok(TaskKind::Recognition),
            "ocr" | "combined" => Ok(TaskKind::Combined),
            other => Err(ConfigError::InvalidConfig {
                message: format!("unknown task '{other}', expected dec, angle, reg or ocr"),
            }),
        }
    }
}

/// Where the inference engine executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferBackend {
    /// ONNX Runtime on the CPU.
    #[default]
    OrtCpu,
    /// ONNX Runtime with the CUDA execution provider.
    OrtCuda,
    /// ONNX Runtime with the TensorRT execution provider.
    TensorRt,
}

impl InferBackend {
    /// Returns true for the GPU-backed variants.
    pub fn is_accelerated(&self) -> bool {
        !matches!(self, InferBackend::OrtCpu)
    }
}

impl fmt::Display for InferBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferBackend::OrtCpu => write!(f, "ORT-CPU"),
            InferBackend::OrtCuda => write!(f, "ORT-CUDA"),
            InferBackend::TensorRt => write!(f, "TRT"),
        }
    }
}

impl FromStr for InferBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace(['-', '_'], "").as_str() {
            "ORTCPU" | "CPU" => Ok(InferBackend::OrtCpu),
            "ORTCUDA" | "CUDA" => Ok(InferBackend::OrtCuda),
            "TRT" | "TENSORRT" => Ok(InferBackend::TensorRt),
            _ => Err(ConfigError::InvalidConfig {
                message: format!("unknown backend '{s}', expected ORTCPU, ORTCUDA or TRT"),
            }),
        }
    }
}

/// Numeric precision requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    #[default]
    Fp32,
    Fp16,
    Int8,
}

fn default_input_shape() -> [usize; 3] {
    DEFAULT_DET_IMAGE_SHAPE
}

fn default_threads() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

/// Configuration owned by a single stage.
///
/// Built once at startup and never mutated afterwards; the stage reads it
/// when it opens its session and when it writes intermediate images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Which stage this configuration describes.
    pub task: TaskKind,
    /// Execution backend.
    #[serde(default)]
    pub backend: InferBackend,
    /// Requested numeric precision.
    #[serde(default)]
    pub precision: Precision,
    /// Model input as (channels, height, width). Only the detector reads it.
    #[serde(default = "default_input_shape")]
    pub input_shape: [usize; 3],
    /// Path to the ONNX model.
    pub model_path: PathBuf,
    /// Path to the YAML file exported with the model.
    pub config_path: PathBuf,
    /// Intra-op thread count hint.
    #[serde(default = "default_threads")]
    pub intra_threads: usize,
    /// Inter-op thread count hint.
    #[serde(default = "default_threads")]
    pub inter_threads: usize,
    /// Write intermediate images while running.
    #[serde(default)]
    pub save_images: bool,
    /// Directory receiving intermediate images.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl StageConfig {
    /// Creates a CPU configuration with default settings for the given task.
    pub fn new(
        task: TaskKind,
        model_path: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            task,
            backend: InferBackend::default(),
            precision: Precision::default(),
            input_shape: default_input_shape(),
            model_path: model_path.into(),
            config_path: config_path.into(),
            intra_threads: default_threads(),
            inter_threads: default_threads(),
            save_images: false,
            output_dir: default_output_dir(),
        }
    }

    pub fn with_backend(mut self, backend: InferBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_input_shape(mut self, shape: [usize; 3]) -> Self {
        self.input_shape = shape;
        self
    }

    pub fn with_threads(mut self, intra: usize, inter: usize) -> Self {
        self.intra_threads = intra;
        self.inter_threads = inter;
        self
    }

    pub fn with_save_images(mut self, save: bool, output_dir: impl Into<PathBuf>) -> Self {
        self.save_images = save;
        self.output_dir = output_dir.into();
        self
    }

    /// Model name used in logs and errors, taken from the model's parent directory
    /// when the file itself has a generic name.
    pub fn model_name(&self) -> String {
        let stem = self
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model");
        if stem == "inference" || stem == "model" {
            self.model_path
                .parent()
                .and_then(Path::file_name)
                .and_then(|s| s.to_str())
                .unwrap_or(stem)
                .to_string()
        } else {
            stem.to_string()
        }
    }
}

impl ConfigValidator for StageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.task == TaskKind::Combined {
            return Err(ConfigError::InvalidConfig {
                message: "a single stage cannot run the combined task".to_string(),
            });
        }
        self.validate_thread_count(self.intra_threads, "intra_threads")?;
        self.validate_thread_count(self.inter_threads, "inter_threads")?;
        for (dim, name) in self.input_shape.iter().zip(["channels", "height", "width"]) {
            self.validate_positive_usize(*dim, name)?;
        }
        if self.input_shape[0] != 3 {
            return Err(ConfigError::InvalidConfig {
                message: format!("expected 3 input channels, got {}", self.input_shape[0]),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_parses_cli_names() {
        assert_eq!("dec".parse::<TaskKind>().unwrap(), TaskKind::Detection);
        assert_eq!("angle".parse::<TaskKind>().unwrap(), TaskKind::Orientation);
        assert_eq!("reg".parse::<TaskKind>().unwrap(), TaskKind::Recognition);
        assert_eq!("OCR".parse::<TaskKind>().unwrap(), TaskKind::Combined);
        assert!("layout".parse::<TaskKind>().is_err());
    }

    #[test]
    fn backend_parses_cli_names() {
        assert_eq!("ORTCPU".parse::<InferBackend>().unwrap(), InferBackend::OrtCpu);
        assert_eq!("ort-cuda".parse::<InferBackend>().unwrap(), InferBackend::OrtCuda);
        assert_eq!("TRT".parse::<InferBackend>().unwrap(), InferBackend::TensorRt);
        assert!(!InferBackend::OrtCpu.is_accelerated());
        assert!(InferBackend::TensorRt.is_accelerated());
    }

    #[test]
    fn stage_config_validation_rejects_zero_threads() {
        let config = StageConfig::new(TaskKind::Detection, "det.onnx", "det.yml").with_threads(0, 1);
        assert!(config.validate().is_err());
        let config = StageConfig::new(TaskKind::Detection, "det.onnx", "det.yml");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stage_config_rejects_combined_task() {
        let config = StageConfig::new(TaskKind::Combined, "m.onnx", "m.yml");
        assert!(config.validate().is_err());
    }

    #[test]
    fn model_name_prefers_directory_for_generic_files() {
        let config = StageConfig::new(
            TaskKind::Detection,
            "models/PP-OCRv5_mobile_det_infer/inference.onnx",
            "models/PP-OCRv5_mobile_det_infer/inference.yml",
        );
        assert_eq!(config.model_name(), "PP-OCRv5_mobile_det_infer");
        let config = StageConfig::new(TaskKind::Detection, "det_v5.onnx", "det.yml");
        assert_eq!(config.model_name(), "det_v5");
    }

    #[test]
    fn stage_config_deserializes_with_defaults() {
        let json = r#"{"task":"recognition","model_path":"rec.onnx","config_path":"rec.yml"}"#;
        let config: StageConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.task, TaskKind::Recognition);
        assert_eq!(config.backend, InferBackend::OrtCpu);
        assert_eq!(config.intra_threads, 1);
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }
}
