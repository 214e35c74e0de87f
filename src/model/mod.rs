//! # Inference API Boundary
//!
//! The rest of the crate sees the hosted model as one blocking call: a model
//! identifier plus an ordered list of prompt [`Part`]s in, reply text out.
//! [`GeminiClient`] is the production implementation; tests script replies
//! through their own [`VisionModel`] impls.

pub mod gemini;

pub use gemini::GeminiClient;

use crate::error::InsightResult;

/// One element of a multimodal prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Plain instruction text.
    Text(String),
    /// Encoded image bytes with their MIME type (`image/png`, `image/jpeg`).
    Image { mime_type: String, data: Vec<u8> },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn image(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Part::Image {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// A hosted multimodal model.
///
/// Calls block until the endpoint answers. Implementations must not retry.
pub trait VisionModel {
    /// Send `parts` to `model` and return the reply text.
    fn generate(&self, model: &str, parts: &[Part]) -> InsightResult<String>;
}

impl<M: VisionModel + ?Sized> VisionModel for &M {
    fn generate(&self, model: &str, parts: &[Part]) -> InsightResult<String> {
        (**self).generate(model, parts)
    }
}
