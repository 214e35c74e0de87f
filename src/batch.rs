//! # Batch Runner
//!
//! Walks the uploaded posters in order, extracts each one, paces after every
//! poster and reports progress to a [`BatchObserver`].
//!
//! A failing poster never stops the batch: it is reported through
//! [`BatchObserver::failed`] and left out of the result. The returned list is
//! therefore the successes only, in upload order. Zero successes is a normal
//! completion.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::error::InsightError;
use crate::extract::{FeatureExtractor, FeatureRecord};
use crate::model::VisionModel;
use crate::pacing::Pacer;
use crate::poster::PosterUpload;

/// Progress signals emitted by [`run_batch`].
///
/// All methods default to no-ops.
pub trait BatchObserver {
    /// The batch is about to start with `total` posters.
    fn begin(&mut self, _total: usize) {}

    /// Poster `position` (1-based) of `total` is about to be analyzed.
    fn started(&mut self, _position: usize, _total: usize, _filename: &str) {}

    /// A poster could not be analyzed and will be skipped.
    fn failed(&mut self, _filename: &str, _error: &InsightError) {}

    /// Poster `position` is done (successfully or not) and pacing has elapsed.
    fn advanced(&mut self, _position: usize, _total: usize) {}

    /// Every poster has been visited.
    fn finished(&mut self, _succeeded: usize, _total: usize) {}
}

/// Discards every signal.
#[derive(Debug, Default)]
pub struct NullObserver;

impl BatchObserver for NullObserver {}

/// Terminal observer: an indicatif progress bar with a status line, failures
/// printed above the bar.
pub struct ConsoleObserver {
    bar: ProgressBar,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchObserver for ConsoleObserver {
    fn begin(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg}\n[{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        self.bar = bar;
    }

    fn started(&mut self, position: usize, total: usize, filename: &str) {
        self.bar
            .set_message(format!("Analyzing ({}/{}): {} ...", position, total, filename));
    }

    fn failed(&mut self, filename: &str, error: &InsightError) {
        self.bar
            .println(format!("❌ Failed to analyze {}: {}", filename, error));
    }

    fn advanced(&mut self, position: usize, _total: usize) {
        self.bar.set_position(position as u64);
    }

    fn finished(&mut self, succeeded: usize, total: usize) {
        self.bar.finish_and_clear();
        println!(
            "✅ All posters analyzed ({} of {} succeeded)",
            succeeded, total
        );
    }
}

/// Analyze `uploads` in order and return the successful records.
///
/// The caller owns what happens to the result; nothing here touches session
/// state. An empty `uploads` yields an empty list and still signals `finished`.
pub fn run_batch<M: VisionModel>(
    uploads: &[PosterUpload],
    extractor: &FeatureExtractor<M>,
    pacer: &mut dyn Pacer,
    observer: &mut dyn BatchObserver,
) -> Vec<FeatureRecord> {
    let total = uploads.len();
    info!(total, model = extractor.model_id(), "starting batch");
    observer.begin(total);

    let mut records = Vec::with_capacity(total);
    for (idx, upload) in uploads.iter().enumerate() {
        let position = idx + 1;
        observer.started(position, total, &upload.filename);

        let record = match upload.decode() {
            Ok(poster) => extractor.extract(&poster, observer),
            Err(err) => {
                observer.failed(&upload.filename, &err);
                None
            }
        };
        if let Some(record) = record {
            records.push(record);
        }

        pacer.pace();
        observer.advanced(position, total);
    }

    info!(succeeded = records.len(), total, "batch finished");
    observer.finished(records.len(), total);
    records
}
