//! # Poster Insight
//!
//! Visual-feature extraction for marketing posters with a hosted multimodal
//! model, joined against business metrics and turned into a creative strategy
//! report.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `model`: The inference API boundary and the Gemini client
//! - `extract`: One poster in, one feature record out
//! - `batch`: Sequential, paced extraction over an upload batch
//! - `pacing`: Rate-limit pacing policies
//! - `table`: Feature matrix, metrics table, CSV and terminal rendering
//! - `join`: Key detection and the left join of features with metrics
//! - `report`: The strategy report call
//! - `session`: Per-session results snapshot
//! - `config`: Session configuration and validation
//!
//! ## Data Flow
//!
//! ```text
//! posters ─▶ extract (per poster) ─▶ batch ─▶ records ─▶ join(metrics) ─▶ merged table ─▶ report
//! ```
//!
//! Everything runs on the calling thread. Each model call blocks.
//!
//! ## Example
//!
//! ```rust,no_run
//! use poster_insight::batch::{ConsoleObserver, run_batch};
//! use poster_insight::config::SessionConfig;
//! use poster_insight::extract::FeatureExtractor;
//! use poster_insight::model::GeminiClient;
//! use poster_insight::poster::PosterUpload;
//! use poster_insight::table::Table;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new("AIza-example", "models/gemini-1.5-flash");
//! config.validate()?;
//!
//! let client = GeminiClient::new(&config.endpoint, &config.api_key, config.timeout)?;
//! let extractor = FeatureExtractor::new(client, &config.model);
//! let uploads = vec![PosterUpload::from_path("spring.png".as_ref())?];
//!
//! let records = run_batch(
//!     &uploads,
//!     &extractor,
//!     config.build_pacer().as_mut(),
//!     &mut ConsoleObserver::new(),
//! );
//! println!("{}", Table::from_records(&records).render());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod join;
pub mod model;
pub mod pacing;
pub mod poster;
pub mod report;
pub mod session;
pub mod table;

/// Re-export error types for convenience
pub use error::{InsightError, InsightResult};

pub use extract::{FeatureAttribute, FeatureRecord};
pub use session::AnalysisSession;
pub use table::{MetricsTable, Table};
