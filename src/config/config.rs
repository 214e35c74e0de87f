//! # Session Configuration
//!
//! [`SessionConfig`] collects what the operator enters for one run. It is the
//! common interface between the CLI and the library: the CLI fills it from
//! flags and prompts, the library asks it for a pacer, a key detector and a
//! scaling target.
//!
//! ## Parameters
//!
//! | Parameter | Type | Default | Description |
//! |-----------|------|---------|-------------|
//! | `api_key` | `String` | (prompted) | Gemini API credential |
//! | `model` | `String` | `models/gemini-1.5-flash` | Model used for both calls |
//! | `endpoint` | `String` | public Gemini API | API base URL |
//! | `pacing` | `PacingConfig` | fixed 2s | Pause policy between posters |
//! | `scale_preset` | `Option<TokenPreset>` | none | Downscale posters before upload |
//! | `join_column` | `Option<String>` | none | Exact metrics key column |
//! | `timeout` | `Option<Duration>` | none | Per-request HTTP timeout |
//!
//! ## Duration Formats
//!
//! [`parse_duration`] accepts:
//! - Raw seconds: `2` or `2s` (fractions allowed: `0.5`)
//! - Milliseconds: `1500ms`
//! - Minutes: `1m`
//!
//! ## Examples
//!
//! ```rust
//! use poster_insight::config::SessionConfig;
//!
//! let mut config = SessionConfig::default();
//! assert!(config.validate().is_err()); // no credential yet
//!
//! config.api_key = "AIza-example".to_string();
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;
use std::time::Duration;

use poster_scale::presets::{ScaleTarget, TokenPreset};

use crate::error::{InsightError, InsightResult};
use crate::join::{ExactColumn, KeyDetector, TokenKeyDetector};
use crate::model::gemini::DEFAULT_ENDPOINT;
use crate::pacing::{DEFAULT_INTERVAL, FixedInterval, Pacer, TokenBucket, Unpaced};

/// Model used when the operator does not pick one.
pub const DEFAULT_MODEL: &str = "models/gemini-1.5-flash";

/// How to pace model calls across a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingConfig {
    /// Sleep this long after every poster.
    Fixed(Duration),
    /// Token bucket: `per_minute` sustained, `burst` back-to-back.
    PerMinute { per_minute: u32, burst: u32 },
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig::Fixed(DEFAULT_INTERVAL)
    }
}

#[derive(Clone)]
pub struct SessionConfig {
    /// Gemini API credential. Never logged.
    pub api_key: String,

    /// Model identifier, with or without the `models/` prefix.
    pub model: String,

    /// API base URL.
    pub endpoint: String,

    /// Pause policy between posters.
    pub pacing: PacingConfig,

    /// Optional downscaling before upload.
    pub scale_preset: Option<TokenPreset>,

    /// Join on this exact metrics column instead of guessing.
    pub join_column: Option<String>,

    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            pacing: PacingConfig::default(),
            scale_preset: None,
            join_column: None,
            timeout: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("pacing", &self.pacing)
            .field("scale_preset", &self.scale_preset)
            .field("join_column", &self.join_column)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SessionConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Validates the configuration. Any error here blocks the analysis.
    pub fn validate(&self) -> InsightResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(InsightError::Credential(
                "enter a Gemini API key to start the analysis".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(InsightError::config("model", "model identifier is empty"));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(InsightError::config(
                "endpoint",
                format!("'{}' is not an http(s) URL", self.endpoint),
            ));
        }
        if let PacingConfig::PerMinute { per_minute: 0, .. } = self.pacing {
            return Err(InsightError::config("rpm", "requests per minute must be greater than 0"));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(InsightError::config("timeout", "timeout must be greater than 0"));
        }
        if self.join_column.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(InsightError::config("join_column", "join column name is empty"));
        }
        Ok(())
    }

    pub fn build_pacer(&self) -> Box<dyn Pacer> {
        match self.pacing {
            PacingConfig::Fixed(interval) if interval.is_zero() => Box::new(Unpaced),
            PacingConfig::Fixed(interval) => Box::new(FixedInterval::new(interval)),
            PacingConfig::PerMinute { per_minute, burst } => {
                Box::new(TokenBucket::per_minute(per_minute, burst))
            }
        }
    }

    pub fn key_detector(&self) -> Box<dyn KeyDetector> {
        match &self.join_column {
            Some(column) => Box::new(ExactColumn(column.clone())),
            None => Box::new(TokenKeyDetector::default()),
        }
    }

    pub fn scale_target(&self) -> Option<ScaleTarget> {
        self.scale_preset.map(TokenPreset::to_target)
    }
}

/// Parse a duration like "2s", "1500ms", "1m" or a bare number of seconds.
pub fn parse_duration(input: &str) -> InsightResult<Duration> {
    let input = input.trim();
    let invalid = |reason: &str| InsightError::config("duration", format!("{} ('{}')", reason, input));

    let (num_str, to_secs): (&str, fn(f64) -> f64) = if let Some(n) = input.strip_suffix("ms") {
        (n, |v| v / 1000.0)
    } else if let Some(n) = input.strip_suffix('s') {
        (n, |v| v)
    } else if let Some(n) = input.strip_suffix('m') {
        (n, |v| v * 60.0)
    } else {
        (input, |v| v)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| invalid("invalid number in duration"))?;
    if !num.is_finite() || num < 0.0 {
        return Err(invalid("duration must be a non-negative number"));
    }
    Ok(Duration::from_secs_f64(to_secs(num)))
}
