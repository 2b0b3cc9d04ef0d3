use super::*;
use crate::core::config::{
    OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig, StageConfig,
};
use crate::core::errors::OCRError;
use ort::execution_providers::ExecutionProviderDispatch;
use ort::logging::LogLevel;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use std::path::Path;
use tracing::info;

impl OrtInfer {
    /// Opens the stage's model with the threading and provider settings
    /// derived from its configuration.
    pub fn from_stage_config(config: &StageConfig) -> OcrResult<Self> {
        let ort_config = OrtSessionConfig::from_stage_config(config);
        Self::from_file(&config.model_path, &ort_config, config.model_name())
    }

    /// Opens a model file with explicit session settings.
    pub fn from_file(
        model_path: impl AsRef<Path>,
        ort_config: &OrtSessionConfig,
        model_name: impl Into<String>,
    ) -> OcrResult<Self> {
        let path = model_path.as_ref();
        let model_name = model_name.into();

        let builder = Session::builder()?.with_log_level(LogLevel::Error)?;
        let session = Self::apply_ort_config(builder, ort_config)
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| {
                OCRError::model_load_error(path, "failed to create ONNX session", Some(e))
            })?;

        let input = session.inputs.first().ok_or_else(|| {
            OCRError::model_load_error(path, "model declares no inputs", None::<OCRError>)
        })?;
        let output = session.outputs.first().ok_or_else(|| {
            OCRError::model_load_error(path, "model declares no outputs", None::<OCRError>)
        })?;
        info!(
            model = %model_name,
            input = %input.name,
            input_type = ?input.input_type,
            output = %output.name,
            output_type = ?output.output_type,
            "model session ready"
        );
        let input_name = input.name.clone();
        let output_name = output.name.clone();

        Ok(OrtInfer {
            session: Mutex::new(session),
            input_name,
            output_name,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    fn apply_ort_config(
        mut builder: SessionBuilder,
        cfg: &OrtSessionConfig,
    ) -> Result<SessionBuilder, ort::Error> {
        if let Some(intra) = cfg.intra_threads {
            builder = builder.with_intra_threads(intra)?;
        }
        if let Some(inter) = cfg.inter_threads {
            builder = builder.with_inter_threads(inter)?;
        }
        if let Some(level) = cfg.optimization_level {
            let mapped = match level {
                OrtGraphOptimizationLevel::DisableAll => GraphOptimizationLevel::Disable,
                OrtGraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
                OrtGraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
                OrtGraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
            };
            builder = builder.with_optimization_level(mapped)?;
        }
        if let Some(eps) = &cfg.execution_providers {
            let providers = Self::build_execution_providers(eps)?;
            if !providers.is_empty() {
                builder = builder.with_execution_providers(providers)?;
            }
        }
        Ok(builder)
    }

    fn build_execution_providers(
        eps: &[OrtExecutionProvider],
    ) -> Result<Vec<ExecutionProviderDispatch>, ort::Error> {
        let mut providers = Vec::new();

        for ep in eps {
            match ep {
                OrtExecutionProvider::CPU => {
                    providers
                        .push(ort::execution_providers::CPUExecutionProvider::default().build());
                }
                #[cfg(feature = "cuda")]
                OrtExecutionProvider::CUDA { device_id } => {
                    let mut cuda = ort::execution_providers::CUDAExecutionProvider::default();
                    if let Some(id) = device_id {
                        cuda = cuda.with_device_id(*id);
                    }
                    providers.push(cuda.build());
                }
                #[cfg(feature = "tensorrt")]
                OrtExecutionProvider::TensorRT {
                    device_id,
                    max_workspace_size,
                    fp16_enable,
                } => {
                    let mut trt = ort::execution_providers::TensorRTExecutionProvider::default();
                    if let Some(id) = device_id {
                        trt = trt.with_device_id(*id);
                    }
                    if let Some(workspace) = max_workspace_size {
                        trt = trt.with_max_workspace_size(*workspace);
                    }
                    if let Some(fp16) = fp16_enable {
                        trt = trt.with_fp16(*fp16);
                    }
                    providers.push(trt.build());
                }
                #[cfg(not(feature = "cuda"))]
                OrtExecutionProvider::CUDA { .. } => {
                    return Err(ort::Error::new(
                        "CUDA execution provider requested but the cuda feature is not enabled",
                    ));
                }
                #[cfg(not(feature = "tensorrt"))]
                OrtExecutionProvider::TensorRT { .. } => {
                    return Err(ort::Error::new(
                        "TensorRT execution provider requested but the tensorrt feature is not enabled",
                    ));
                }
            }
        }

        Ok(providers)
    }
}
