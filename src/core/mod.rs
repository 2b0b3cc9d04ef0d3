//! Building blocks shared by every stage: configuration, errors, the ONNX
//! Runtime session, the per-call [`CallContext`] and the [`Stage`] trait.

pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod inference;
pub mod traits;

pub use config::{ConfigError, InferBackend, Precision, StageConfig, TaskKind};
pub use constants::*;
pub use context::{CallContext, Region, StageTimings};
pub use errors::{OCRError, OcrResult, ProcessingStage};
pub use inference::{
    InferenceEngine, InferenceEnvironment, ModelSession, ModelState, OrtInfer, Tensor4D, TensorD,
};
pub use traits::Stage;

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Like [`init_tracing`], but falls back to `default_level` when `RUST_LOG` is unset.
pub fn init_tracing_with_level(default_level: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
