//! Utility functions for the OCR pipeline.
//!
//! Image I/O, perspective rectification of detected regions, and drawing of
//! detection results.

pub mod image;
pub mod transform;
pub mod visualization;

pub use image::{bounding_crop, dynamic_to_rgb, load_image, save_image_logged};
pub use transform::{RectifyPlan, order_points, rectify};
pub use visualization::draw_regions;
