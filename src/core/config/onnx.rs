//! Session settings derived from a [`StageConfig`].

use super::{InferBackend, Precision, StageConfig};
use serde::{Deserialize, Serialize};

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrtGraphOptimizationLevel {
    DisableAll,
    Level1,
    Level2,
    #[default]
    Level3,
}

/// Execution providers for ONNX Runtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum OrtExecutionProvider {
    #[default]
    CPU,
    CUDA {
        device_id: Option<i32>,
    },
    TensorRT {
        device_id: Option<i32>,
        /// Bytes.
        max_workspace_size: Option<usize>,
        fp16_enable: Option<bool>,
    },
}

/// TensorRT workspace handed to the engine builder (256 MiB).
const TENSORRT_WORKSPACE_SIZE: usize = 1 << 28;

/// Threading, optimization and provider settings for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes
    pub inter_threads: Option<usize>,
    /// Graph optimization level
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in order of preference
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
}

impl OrtSessionConfig {
    /// Derives the session settings for a stage.
    ///
    /// The backend decides the provider chain: CPU alone, CUDA with a CPU
    /// fallback, or TensorRT in front of CUDA and CPU. FP16 precision is only
    /// honoured by the TensorRT provider.
    pub fn from_stage_config(config: &StageConfig) -> Self {
        let providers = match config.backend {
            InferBackend::OrtCpu => vec![OrtExecutionProvider::CPU],
            InferBackend::OrtCuda => vec![
                OrtExecutionProvider::CUDA { device_id: Some(0) },
                OrtExecutionProvider::CPU,
            ],
            InferBackend::TensorRt => vec![
                OrtExecutionProvider::TensorRT {
                    device_id: Some(0),
                    max_workspace_size: Some(TENSORRT_WORKSPACE_SIZE),
                    fp16_enable: Some(config.precision == Precision::Fp16),
                },
                OrtExecutionProvider::CUDA { device_id: Some(0) },
                OrtExecutionProvider::CPU,
            ],
        };

        Self {
            intra_threads: Some(config.intra_threads),
            inter_threads: Some(config.inter_threads),
            optimization_level: Some(OrtGraphOptimizationLevel::Level3),
            execution_providers: Some(providers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TaskKind;

    #[test]
    fn cpu_backend_uses_cpu_provider_only() {
        let config = StageConfig::new(TaskKind::Detection, "det.onnx", "det.yml")
            .with_threads(4, 2);
        let ort = OrtSessionConfig::from_stage_config(&config);
        assert_eq!(ort.intra_threads, Some(4));
        assert_eq!(ort.inter_threads, Some(2));
        assert_eq!(
            ort.execution_providers,
            Some(vec![OrtExecutionProvider::CPU])
        );
        assert_eq!(
            ort.optimization_level,
            Some(OrtGraphOptimizationLevel::Level3)
        );
    }

    #[test]
    fn tensorrt_backend_falls_back_to_cuda_and_cpu() {
        let config = StageConfig::new(TaskKind::Recognition, "rec.onnx", "rec.yml")
            .with_backend(InferBackend::TensorRt)
            .with_precision(Precision::Fp16);
        let providers = OrtSessionConfig::from_stage_config(&config)
            .execution_providers
            .unwrap();
        assert_eq!(providers.len(), 3);
        assert!(matches!(
            providers[0],
            OrtExecutionProvider::TensorRT {
                fp16_enable: Some(true),
                ..
            }
        ));
        assert_eq!(providers[2], OrtExecutionProvider::CPU);
    }
}
