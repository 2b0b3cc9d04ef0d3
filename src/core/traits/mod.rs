//! Trait definitions for the OCR pipeline.

pub mod stage;

pub use stage::Stage;
