//! Common test utilities shared by the poster-insight integration tests
//!
//! Provides a scripted model so no test touches the network, fixture posters
//! encoded in memory, and an observer and pacer that record what the batch
//! runner did.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Cursor;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use poster_insight::batch::BatchObserver;
use poster_insight::model::{Part, VisionModel};
use poster_insight::pacing::Pacer;
use poster_insight::poster::PosterUpload;
use poster_insight::{InsightError, InsightResult};

/// Model that answers from a queue of canned replies, in call order.
pub struct ScriptedModel {
    replies: RefCell<VecDeque<InsightResult<String>>>,
    calls: RefCell<Vec<(String, Vec<Part>)>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<InsightResult<String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Every call succeeds with `reply`.
    pub fn repeating(reply: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(reply.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls(&self) -> Vec<(String, Vec<Part>)> {
        self.calls.borrow().clone()
    }
}

impl VisionModel for ScriptedModel {
    fn generate(&self, model: &str, parts: &[Part]) -> InsightResult<String> {
        self.calls
            .borrow_mut()
            .push((model.to_string(), parts.to_vec()));
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(InsightError::UnexpectedReply("script exhausted".into())))
    }
}

/// A typical fenced extraction reply. The model's own filename is bogus on purpose.
pub fn feature_reply(color: &str) -> String {
    format!(
        "```json\n{{\"filename\": \"model-guess.png\", \"main_color\": \"{}\", \"subject_type\": \"单人全身\", \"emotion_vibe\": \"活泼\"}}\n```",
        color
    )
}

/// Encode a solid-colour poster.
pub fn poster_bytes(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([240, 200, 40, 255])));
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("encode fixture poster");
    buf.into_inner()
}

pub fn png_upload(name: &str) -> PosterUpload {
    PosterUpload::new(name, poster_bytes(6, 10, ImageFormat::Png))
}

/// Every batch signal, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Begin(usize),
    Started(usize, usize, String),
    Failed {
        filename: String,
        category: String,
        message: String,
    },
    Advanced(usize, usize),
    Finished(usize, usize),
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<Event>,
}

impl RecordingObserver {
    pub fn failures(&self) -> Vec<(String, String, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Failed {
                    filename,
                    category,
                    message,
                } => Some((filename.clone(), category.clone(), message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Option<(usize, usize)> {
        self.events.iter().find_map(|e| match e {
            Event::Finished(s, t) => Some((*s, *t)),
            _ => None,
        })
    }
}

impl BatchObserver for RecordingObserver {
    fn begin(&mut self, total: usize) {
        self.events.push(Event::Begin(total));
    }

    fn started(&mut self, position: usize, total: usize, filename: &str) {
        self.events
            .push(Event::Started(position, total, filename.to_string()));
    }

    fn failed(&mut self, filename: &str, error: &InsightError) {
        self.events.push(Event::Failed {
            filename: filename.to_string(),
            category: error.category().to_string(),
            message: format!("Failed to analyze {}: {}", filename, error),
        });
    }

    fn advanced(&mut self, position: usize, total: usize) {
        self.events.push(Event::Advanced(position, total));
    }

    fn finished(&mut self, succeeded: usize, total: usize) {
        self.events.push(Event::Finished(succeeded, total));
    }
}

/// Pacer that counts pauses instead of sleeping.
#[derive(Debug, Default)]
pub struct CountingPacer {
    pub paces: usize,
}

impl Pacer for CountingPacer {
    fn next_delay(&mut self, _now: Instant) -> Duration {
        Duration::from_secs(2)
    }

    fn pace(&mut self) {
        self.paces += 1;
    }
}
