//! Schema for the YAML file exported next to each model.
//!
//! The file is parsed into typed structs in one pass. Each stage then derives
//! its constants from the parsed document through [`DetectorParams`],
//! [`OrientationParams`] or [`RecognizerParams`], collecting every field that
//! was missing or malformed into a single [`ConfigDiagnostics`] value. Fields
//! with a documented default only produce a warning; required fields turn the
//! diagnostics into a [`ConfigError::MissingFields`].

use super::errors::ConfigError;
use crate::core::constants::{
    DEFAULT_CLS_IMAGE_SIZE, DEFAULT_DET_BOX_THRESH, DEFAULT_DET_MAX_CANDIDATES,
    DEFAULT_DET_THRESH, DEFAULT_DET_UNCLIP_RATIO, DEFAULT_MEAN, DEFAULT_REC_IMAGE_SHAPE,
    DEFAULT_SCALE, DEFAULT_STD,
};
use serde::Deserialize;
use serde_yaml::Value;
use std::path::Path;
use tracing::warn;

/// A leaf value that either matched its expected type or was kept verbatim.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Field<T> {
    Valid(T),
    Invalid(Value),
}

/// Pixel scale, written either as a number or as a fraction such as `1./255.`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScaleValue {
    Number(f32),
    Expression(String),
}

impl ScaleValue {
    fn resolve(&self) -> Option<f32> {
        match self {
            ScaleValue::Number(v) => Some(*v),
            ScaleValue::Expression(expr) => match expr.split_once('/') {
                Some((num, den)) => {
                    let num: f32 = num.trim().parse().ok()?;
                    let den: f32 = den.trim().parse().ok()?;
                    (den != 0.0).then_some(num / den)
                }
                None => expr.trim().parse().ok(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResizeImageOp {
    /// Target size as `[width, height]`.
    pub size: Option<Field<Vec<u32>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormalizeImageOp {
    pub scale: Option<Field<ScaleValue>>,
    /// Channel means in RGB order.
    pub mean: Option<Field<Vec<f32>>>,
    /// Channel standard deviations in RGB order.
    pub std: Option<Field<Vec<f32>>>,
    pub channel_num: Option<Field<usize>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecResizeImgOp {
    /// Input shape as `[channels, height, width]`.
    pub image_shape: Option<Field<Vec<usize>>>,
}

/// One entry of `PreProcess.transform_ops`. Unrecognized operations leave
/// every field empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransformOp {
    #[serde(rename = "ResizeImage")]
    pub resize_image: Option<ResizeImageOp>,
    #[serde(rename = "NormalizeImage")]
    pub normalize_image: Option<NormalizeImageOp>,
    #[serde(rename = "RecResizeImg")]
    pub rec_resize_img: Option<RecResizeImgOp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreProcessSection {
    pub transform_ops: Option<Vec<TransformOp>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostProcessSection {
    pub thresh: Option<Field<f32>>,
    pub box_thresh: Option<Field<f32>>,
    pub max_candidates: Option<Field<usize>>,
    pub unclip_ratio: Option<Field<f32>>,
    pub character_dict: Option<Field<Vec<Value>>>,
}

/// The parsed model YAML document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelYaml {
    #[serde(rename = "PreProcess")]
    pub pre_process: Option<PreProcessSection>,
    #[serde(rename = "PostProcess")]
    pub post_process: Option<PostProcessSection>,
}

impl ModelYaml {
    /// Reads and parses a model YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::PathNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parses a model YAML document from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: Default::default(),
            message: e.to_string(),
        })
    }

    fn transform_ops(&self) -> &[TransformOp] {
        self.pre_process
            .as_ref()
            .and_then(|p| p.transform_ops.as_deref())
            .unwrap_or(&[])
    }

    fn find_op<'a, T>(&'a self, pick: impl Fn(&'a TransformOp) -> Option<&'a T>) -> Option<&'a T> {
        self.transform_ops().iter().find_map(pick)
    }
}

/// Every missing, malformed or required-but-absent field found while deriving
/// a stage's constants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDiagnostics {
    pub stage: String,
    /// Fields that were absent and replaced by their default.
    pub defaulted: Vec<String>,
    /// Fields that were present but malformed, replaced by their default.
    pub invalid: Vec<String>,
    /// Required fields that were absent.
    pub missing_required: Vec<String>,
}

impl ConfigDiagnostics {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Default::default()
        }
    }

    /// True when no field needed attention.
    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty() && self.invalid.is_empty() && self.missing_required.is_empty()
    }

    /// Resolves an optional field, recording what happened to it.
    fn resolve<T, U>(
        &mut self,
        name: &str,
        field: Option<&Field<T>>,
        default: U,
        convert: impl FnOnce(&T) -> Option<U>,
    ) -> U {
        match field {
            Some(Field::Valid(value)) => match convert(value) {
                Some(v) => v,
                None => {
                    self.invalid.push(name.to_string());
                    default
                }
            },
            Some(Field::Invalid(_)) => {
                self.invalid.push(name.to_string());
                default
            }
            None => {
                self.defaulted.push(name.to_string());
                default
            }
        }
    }

    /// Logs one warning covering every defaulted or malformed field.
    pub fn emit(&self) {
        if self.defaulted.is_empty() && self.invalid.is_empty() {
            return;
        }
        warn!(
            stage = %self.stage,
            defaulted = ?self.defaulted,
            invalid = ?self.invalid,
            "model configuration incomplete, using defaults"
        );
    }

    /// Fails when a required field was absent.
    pub fn into_result(self) -> Result<Self, ConfigError> {
        if self.missing_required.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::MissingFields {
                stage: self.stage,
                fields: self.missing_required,
            })
        }
    }
}

fn three_floats(values: &Vec<f32>) -> Option<[f32; 3]> {
    (values.len() >= 3).then(|| [values[0], values[1], values[2]])
}

fn positive_floats(values: [f32; 3]) -> Option<[f32; 3]> {
    values.iter().all(|v| *v > 0.0).then_some(values)
}

fn normalize_fields(
    diag: &mut ConfigDiagnostics,
    norm: Option<&NormalizeImageOp>,
) -> ([f32; 3], [f32; 3]) {
    let empty = NormalizeImageOp::default();
    let norm = match norm {
        Some(n) => n,
        None => {
            diag.defaulted.push("NormalizeImage".to_string());
            &empty
        }
    };
    let mean = diag.resolve("NormalizeImage.mean", norm.mean.as_ref(), DEFAULT_MEAN, three_floats);
    let std = diag.resolve("NormalizeImage.std", norm.std.as_ref(), DEFAULT_STD, |v| {
        three_floats(v).and_then(positive_floats)
    });
    (mean, std)
}

/// Constants of the detection stage.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorParams {
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub thresh: f32,
    pub box_thresh: f32,
    pub max_candidates: usize,
    pub unclip_ratio: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
            thresh: DEFAULT_DET_THRESH,
            box_thresh: DEFAULT_DET_BOX_THRESH,
            max_candidates: DEFAULT_DET_MAX_CANDIDATES,
            unclip_ratio: DEFAULT_DET_UNCLIP_RATIO,
        }
    }
}

impl DetectorParams {
    /// Derives detector constants. Nothing is required; every gap is defaulted.
    pub fn from_yaml(yaml: &ModelYaml) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let mut diag = ConfigDiagnostics::new("detector");
        let (mean, std) = normalize_fields(&mut diag, yaml.find_op(|op| op.normalize_image.as_ref()));

        let empty = PostProcessSection::default();
        let post = match yaml.post_process.as_ref() {
            Some(p) => p,
            None => {
                diag.defaulted.push("PostProcess".to_string());
                &empty
            }
        };
        let unit = |v: &f32| (0.0..=1.0).contains(v).then_some(*v);
        let thresh = diag.resolve("PostProcess.thresh", post.thresh.as_ref(), DEFAULT_DET_THRESH, unit);
        let box_thresh = diag.resolve(
            "PostProcess.box_thresh",
            post.box_thresh.as_ref(),
            DEFAULT_DET_BOX_THRESH,
            unit,
        );
        let max_candidates = diag.resolve(
            "PostProcess.max_candidates",
            post.max_candidates.as_ref(),
            DEFAULT_DET_MAX_CANDIDATES,
            |v| (*v > 0).then_some(*v),
        );
        let unclip_ratio = diag.resolve(
            "PostProcess.unclip_ratio",
            post.unclip_ratio.as_ref(),
            DEFAULT_DET_UNCLIP_RATIO,
            |v| (*v >= 0.0).then_some(*v),
        );

        let params = Self {
            mean,
            std,
            thresh,
            box_thresh,
            max_candidates,
            unclip_ratio,
        };
        Ok((params, diag.into_result()?))
    }
}

/// Constants of the orientation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationParams {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub channels: usize,
}

impl Default for OrientationParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_CLS_IMAGE_SIZE[0],
            height: DEFAULT_CLS_IMAGE_SIZE[1],
            scale: DEFAULT_SCALE,
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
            channels: 3,
        }
    }
}

impl OrientationParams {
    pub fn from_yaml(yaml: &ModelYaml) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let mut diag = ConfigDiagnostics::new("orientation");
        if yaml.pre_process.is_none() {
            diag.defaulted.push("PreProcess".to_string());
        }

        let resize = yaml.find_op(|op| op.resize_image.as_ref());
        if resize.is_none() {
            diag.defaulted.push("ResizeImage".to_string());
        }
        let [width, height] = diag.resolve(
            "ResizeImage.size",
            resize.and_then(|r| r.size.as_ref()),
            DEFAULT_CLS_IMAGE_SIZE,
            |v| (v.len() >= 2 && v[0] > 0 && v[1] > 0).then(|| [v[0], v[1]]),
        );

        let norm = yaml.find_op(|op| op.normalize_image.as_ref());
        let (mean, std) = normalize_fields(&mut diag, norm);
        let scale = diag.resolve(
            "NormalizeImage.scale",
            norm.and_then(|n| n.scale.as_ref()),
            DEFAULT_SCALE,
            |v| v.resolve().filter(|s| *s > 0.0),
        );
        let channels = diag.resolve(
            "NormalizeImage.channel_num",
            norm.and_then(|n| n.channel_num.as_ref()),
            3,
            |v| (*v == 3).then_some(*v),
        );

        let params = Self {
            width,
            height,
            scale,
            mean,
            std,
            channels,
        };
        Ok((params, diag.into_result()?))
    }
}

/// Constants of the recognition stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerParams {
    pub channels: usize,
    pub height: u32,
    pub width: u32,
    /// Characters in model order, without the blank and trailing space entries.
    pub character_dict: Vec<String>,
}

impl RecognizerParams {
    /// Derives recognizer constants. `PreProcess` and `PostProcess.character_dict`
    /// are required.
    pub fn from_yaml(yaml: &ModelYaml) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let mut diag = ConfigDiagnostics::new("recognizer");

        match yaml.pre_process.as_ref() {
            None => diag.missing_required.push("PreProcess".to_string()),
            Some(pre) if pre.transform_ops.is_none() => diag
                .missing_required
                .push("PreProcess.transform_ops".to_string()),
            Some(_) => {}
        }

        let rec_resize = yaml.find_op(|op| op.rec_resize_img.as_ref());
        if rec_resize.is_none() && yaml.pre_process.is_some() {
            diag.defaulted.push("RecResizeImg".to_string());
        }
        let [channels, height, width] = diag.resolve(
            "RecResizeImg.image_shape",
            rec_resize.and_then(|r| r.image_shape.as_ref()),
            DEFAULT_REC_IMAGE_SHAPE,
            |v| (v.len() >= 3 && v[0] == 3 && v[1] > 0 && v[2] > 0).then(|| [v[0], v[1], v[2]]),
        );

        let character_dict = match yaml
            .post_process
            .as_ref()
            .and_then(|p| p.character_dict.as_ref())
        {
            Some(Field::Valid(items)) => {
                let mut chars = Vec::with_capacity(items.len());
                for item in items {
                    match scalar_to_string(item) {
                        Some(s) => chars.push(s),
                        None => diag.invalid.push("PostProcess.character_dict[]".to_string()),
                    }
                }
                chars
            }
            Some(Field::Invalid(_)) | None => {
                diag.missing_required
                    .push("PostProcess.character_dict".to_string());
                Vec::new()
            }
        };

        let params = Self {
            channels,
            height: height as u32,
            width: width as u32,
            character_dict,
        };
        Ok((params, diag.into_result()?))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
