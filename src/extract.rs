//! # Feature Extraction
//!
//! Sends one poster plus the extraction instruction to the model and turns the
//! reply into a [`FeatureRecord`].
//!
//! The reply is free text. Models routinely wrap JSON in a Markdown code fence,
//! so fences are stripped before parsing. The record's `filename` is always the
//! caller's: a filename written by the model is discarded.

use std::collections::BTreeMap;
use std::fmt;

use poster_scale::presets::ScaleTarget;
use serde_json::Value;
use tracing::{debug, warn};

use crate::batch::BatchObserver;
use crate::error::{InsightError, InsightResult};
use crate::model::{Part, VisionModel};
use crate::poster::Poster;

/// Instruction sent with every poster. Names twelve keys and asks the model to
/// skip the fixed footer bar.
pub const EXTRACTION_PROMPT: &str = r#"
你是一位资深的视觉设计师和数据分析师。请分析这张转介绍/裂变海报。

⚠️ **重要指令**：
1. **排除干扰**：完全忽略底部的固定信息栏（二维码、个人头像、昵称、固定Logo等）。只分析海报的**主视觉区域**。
2. **专业提取**：请严格按照以下维度进行特征提取。

请提取以下维度，并返回**纯 JSON 格式**数据：
{
    "filename": "文件名",
    "main_color": "主色调 (如: 红色系, 暖黄系, 冷白系)",
    "subject_type": "主体类型 (如: 单人全身, 半身特写, 人物+场景)",
    "model_gender": "模特性别 (男/女/多人)",
    "model_expression": "模特表情 (如: 大笑, 专注, 搞怪, 惊讶)",
    "shot_scale": "景别 (如: 远景, 中景, 近景特写)",
    "key_visual_elements": "关键前景元素 (如: 手绘线条, 3D图标, 涂鸦, 气泡)",
    "scene_atmosphere": "场景氛围 (如: 春节喜庆, 冬日户外, 书房学习)",
    "copy_type": "文案类型 (如: 学习干货, 节日祝福, 名人名言)",
    "copy_layout": "文案排版 (如: 上下结构, 标题居中, 杂志风)",
    "font_style": "字体风格 (如: 手写感, 宋体, 圆体)",
    "emotion_vibe": "情感氛围 (如: 喜庆, 温馨, 焦虑, 活泼)"
}
"#;

/// Name of the join-key field on every record.
pub const FILENAME_KEY: &str = "filename";

/// The visual attributes the extraction prompt asks for, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureAttribute {
    MainColor,
    SubjectType,
    ModelGender,
    ModelExpression,
    ShotScale,
    KeyVisualElements,
    SceneAtmosphere,
    CopyType,
    CopyLayout,
    FontStyle,
    EmotionVibe,
}

impl FeatureAttribute {
    pub const ALL: [FeatureAttribute; 11] = [
        FeatureAttribute::MainColor,
        FeatureAttribute::SubjectType,
        FeatureAttribute::ModelGender,
        FeatureAttribute::ModelExpression,
        FeatureAttribute::ShotScale,
        FeatureAttribute::KeyVisualElements,
        FeatureAttribute::SceneAtmosphere,
        FeatureAttribute::CopyType,
        FeatureAttribute::CopyLayout,
        FeatureAttribute::FontStyle,
        FeatureAttribute::EmotionVibe,
    ];

    /// JSON key used in the prompt and as the table column name.
    pub fn key(self) -> &'static str {
        match self {
            FeatureAttribute::MainColor => "main_color",
            FeatureAttribute::SubjectType => "subject_type",
            FeatureAttribute::ModelGender => "model_gender",
            FeatureAttribute::ModelExpression => "model_expression",
            FeatureAttribute::ShotScale => "shot_scale",
            FeatureAttribute::KeyVisualElements => "key_visual_elements",
            FeatureAttribute::SceneAtmosphere => "scene_atmosphere",
            FeatureAttribute::CopyType => "copy_type",
            FeatureAttribute::CopyLayout => "copy_layout",
            FeatureAttribute::FontStyle => "font_style",
            FeatureAttribute::EmotionVibe => "emotion_vibe",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }
}

impl fmt::Display for FeatureAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Visual features of one poster.
///
/// Recognized attributes are optional: a model that omits one is not an error.
/// Keys outside the recognized set are kept as `extras`, sorted by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord {
    filename: String,
    attributes: BTreeMap<FeatureAttribute, String>,
    extras: BTreeMap<String, String>,
}

impl FeatureRecord {
    /// Create an empty record. Fails on an empty filename.
    pub fn new(filename: impl Into<String>) -> InsightResult<Self> {
        let filename = filename.into();
        if filename.trim().is_empty() {
            return Err(InsightError::MissingFilename);
        }
        Ok(Self {
            filename,
            attributes: BTreeMap::new(),
            extras: BTreeMap::new(),
        })
    }

    pub fn with(mut self, attribute: FeatureAttribute, value: impl Into<String>) -> Self {
        self.attributes.insert(attribute, value.into());
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn get(&self, attribute: FeatureAttribute) -> Option<&str> {
        self.attributes.get(&attribute).map(String::as_str)
    }

    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }

    /// Look up any column by name: `filename`, a recognized attribute, or an extra.
    pub fn field(&self, key: &str) -> Option<&str> {
        if key == FILENAME_KEY {
            return Some(&self.filename);
        }
        match FeatureAttribute::from_key(key) {
            Some(attribute) => self.get(attribute),
            None => self.extras.get(key).map(String::as_str),
        }
    }
}

/// Remove Markdown code fences and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse a model reply into a record stamped with `filename`.
pub fn parse_record(reply: &str, filename: &str) -> InsightResult<FeatureRecord> {
    let mut record = FeatureRecord::new(filename)?;

    let clean = strip_code_fences(reply);
    let value: Value = serde_json::from_str(&clean).map_err(|source| {
        InsightError::MalformedResponse {
            raw: reply.to_string(),
            source,
        }
    })?;
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(InsightError::NotAnObject {
                kind: json_kind(&other),
            });
        }
    };

    for (key, value) in map {
        if key == FILENAME_KEY {
            continue;
        }
        let Some(text) = render_value(value) else {
            continue;
        };
        match FeatureAttribute::from_key(&key) {
            Some(attribute) => {
                record.attributes.insert(attribute, text);
            }
            None => {
                record.extras.insert(key, text);
            }
        }
    }
    Ok(record)
}

/// Flatten a JSON value to cell text. `null` means the attribute is absent.
fn render_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(items) if items.iter().all(Value::is_string) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Runs the extraction call for one poster at a time.
pub struct FeatureExtractor<M> {
    model: M,
    model_id: String,
    instruction: String,
    scale: Option<ScaleTarget>,
}

impl<M: VisionModel> FeatureExtractor<M> {
    /// Extractor using [`EXTRACTION_PROMPT`] and no downscaling.
    pub fn new(model: M, model_id: impl Into<String>) -> Self {
        Self {
            model,
            model_id: model_id.into(),
            instruction: EXTRACTION_PROMPT.to_string(),
            scale: None,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_scale(mut self, scale: Option<ScaleTarget>) -> Self {
        self.scale = scale;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Extract features, returning the failure to the caller.
    pub fn try_extract(&self, poster: &Poster) -> InsightResult<FeatureRecord> {
        if poster.filename().trim().is_empty() {
            return Err(InsightError::MissingFilename);
        }
        let image = poster.to_part(self.scale)?;
        let parts = [Part::text(self.instruction.as_str()), image];
        let reply = self.model.generate(&self.model_id, &parts)?;
        debug!(filename = poster.filename(), reply_len = reply.len(), "extraction reply");
        parse_record(&reply, poster.filename())
    }

    /// Extract features; a failure is reported to `observer` and yields `None`.
    pub fn extract(
        &self,
        poster: &Poster,
        observer: &mut dyn BatchObserver,
    ) -> Option<FeatureRecord> {
        match self.try_extract(poster) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(
                    filename = poster.filename(),
                    category = err.category(),
                    model_output = err.is_model_output(),
                    "extraction failed: {}",
                    err
                );
                observer.failed(poster.filename(), &err);
                None
            }
        }
    }
}
