//! Pre- and post-processing for the three OCR stages.
//!
//! # Modules
//!
//! * `geometry` - Points, quads and polygon helpers used by detection
//! * `db_postprocess` - Probability map to text quads
//! * `normalization` - Image to NCHW tensor conversion
//! * `resize_detection` - Aspect-preserving resize with padding for the detector
//! * `resize_recognition` - Fixed and height-normalized resizes for text lines
//! * `decode` - Greedy CTC decoding of recognizer output

pub mod db_postprocess;
mod decode;
mod geometry;
mod normalization;
pub mod resize_detection;
pub mod resize_recognition;

pub use db_postprocess::*;
pub use decode::*;
pub use geometry::*;
pub use normalization::*;
pub use resize_detection::*;
pub use resize_recognition::*;
