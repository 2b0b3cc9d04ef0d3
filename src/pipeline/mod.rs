//! The OCR pipeline module.
//!
//! Combines the detection, orientation and recognition stages into one call
//! per image, loads pipeline configuration files, and aggregates run and
//! benchmark statistics.

mod config;
mod orchestrator;
pub mod stats;

pub use config::{
    CLS_MODEL_DIR, ConfigFormat, ConfigLoader, DET_MODEL_DIR, PipelineConfig, REC_MODEL_DIR,
};
pub use orchestrator::{Pipeline, PipelineBuilder, PipelineResult};
pub use stats::{BenchmarkLabel, BenchmarkStats, PipelineStats, StatsManager};
