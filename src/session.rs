//! # Analysis Session
//!
//! In-memory state for one operator session: the records of the latest batch
//! and the currently loaded metrics table.
//!
//! The batch runner does not write here. Each run produces a fresh list and
//! the caller swaps it in with [`AnalysisSession::replace_records`], which
//! discards the previous run. The merged view is recomputed on demand.

use crate::extract::FeatureRecord;
use crate::join::{JoinOutcome, KeyDetector, join};
use crate::table::{MetricsTable, Table};

#[derive(Debug, Default)]
pub struct AnalysisSession {
    records: Vec<FeatureRecord>,
    metrics: Option<MetricsTable>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the records of a new run, returning the previous run's.
    pub fn replace_records(&mut self, records: Vec<FeatureRecord>) -> Vec<FeatureRecord> {
        std::mem::replace(&mut self.records, records)
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn has_results(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn set_metrics(&mut self, metrics: Option<MetricsTable>) {
        self.metrics = metrics;
    }

    pub fn metrics(&self) -> Option<&MetricsTable> {
        self.metrics.as_ref()
    }

    pub fn records_table(&self) -> Table {
        Table::from_records(&self.records)
    }

    /// Join the current records with the current metrics.
    pub fn merged(&self, detector: &dyn KeyDetector) -> JoinOutcome {
        join(&self.records_table(), self.metrics.as_ref(), detector)
    }
}
