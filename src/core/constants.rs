//! Constants used throughout the OCR pipeline.
//!
//! Default values for the image processing parameters of each stage. They are
//! used whenever the model configuration leaves a field out.

/// The default input shape (channels, height, width) of the detection model.
pub const DEFAULT_DET_IMAGE_SHAPE: [usize; 3] = [3, 960, 960];

/// Probability above which a detection map pixel counts as text.
pub const DEFAULT_DET_THRESH: f32 = 0.3;

/// Minimum mean probability a candidate box must reach to be kept.
pub const DEFAULT_DET_BOX_THRESH: f32 = 0.6;

/// Maximum number of contours examined per detection map.
pub const DEFAULT_DET_MAX_CANDIDATES: usize = 1000;

/// Ratio controlling how far detected boxes are expanded.
pub const DEFAULT_DET_UNCLIP_RATIO: f32 = 1.5;

/// Shorter side, in detection-map pixels, below which boxes are dropped.
pub const DEFAULT_DET_MIN_SIDE: f32 = 3.0;

/// Smallest width or height of a rectified crop.
pub const MIN_CROP_SIDE: f32 = 2.0;

/// ImageNet channel means in RGB order.
pub const DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations in RGB order.
pub const DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Default pixel scale factor (1 / 255).
pub const DEFAULT_SCALE: f32 = 1.0 / 255.0;

/// Default orientation classifier input size as (width, height).
pub const DEFAULT_CLS_IMAGE_SIZE: [u32; 2] = [160, 80];

/// The default shape (channels, height, width) for recognition images.
pub const DEFAULT_REC_IMAGE_SHAPE: [usize; 3] = [3, 48, 320];

/// Mean and standard deviation applied to every channel of recognition input.
pub const REC_NORM_VALUE: f32 = 0.5;

/// Label reserved for the CTC blank class.
pub const CTC_BLANK: &str = "blank";

/// Directory that receives intermediate images when saving is enabled.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Fill value used when padding images.
pub const PAD_VALUE: u8 = 255;
