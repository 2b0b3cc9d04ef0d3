//! # PP-OCR on ONNX Runtime
//!
//! Reads text from images with the PP-OCR model family exported to ONNX:
//! a DB text detector, a 0/180 degree text line classifier and a CRNN
//! recognizer with greedy CTC decoding.
//!
//! ## Components
//!
//! - **Text Detection**: probability map to ordered text quadrilaterals, each
//!   rectified into an upright crop
//! - **Text Line Classification**: flags crops that are upside down
//! - **Text Recognition**: turns crops into strings with a confidence score
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration, the ONNX Runtime session and the `Stage` trait
//! * [`predictor`] - The three stages
//! * [`pipeline`] - Chaining stages, config files and statistics
//! * [`processors`] - Resizing, normalization, DB post-processing and CTC decoding
//! * [`utils`] - Image loading, perspective rectification and visualization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ppocr_onnx::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::for_task(TaskKind::Combined, "models")
//!     .with_threads(4, 1);
//! let pipeline = Pipeline::from_config(&config)?;
//!
//! let result = pipeline.run_path("document.jpg")?;
//! for (text, score) in result.texts.iter().zip(&result.text_scores) {
//!     println!("{text} ({score:.3})");
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod pipeline;
pub mod predictor;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use ppocr_onnx::prelude::*;
/// ```
///
/// Covers building and running a pipeline. Single stages and the
/// pre/post-processing building blocks are imported from their modules.
pub mod prelude {
    pub use crate::core::{
        CallContext, InferBackend, OCRError, OcrResult, Region, Stage, StageConfig, TaskKind,
    };
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineResult};
    pub use crate::utils::load_image;
}
