//! # Metrics Join
//!
//! Left-joins the feature matrix against the metrics table on a key column
//! picked by a [`KeyDetector`].
//!
//! Detection is best-effort. The default [`TokenKeyDetector`] takes the first
//! column (in the table's own order) whose name contains a "name"/"filename"
//! token, so a table with both `Name` and `File Name` joins on whichever comes
//! first. Use [`ExactColumn`] when that guess is wrong.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::extract::FILENAME_KEY;
use crate::table::{Cell, MetricsTable, Table};

/// Tokens the default detector looks for, case-sensitive.
pub const DEFAULT_KEY_TOKENS: [&str; 4] = ["名", "name", "Name", "文件"];

/// Picks the join-key column of a metrics table.
pub trait KeyDetector {
    /// Index of the key column in `columns`, or `None` if nothing qualifies.
    fn detect(&self, columns: &[String]) -> Option<usize>;
}

/// First column whose name contains any of an ordered list of tokens.
#[derive(Debug, Clone)]
pub struct TokenKeyDetector {
    tokens: Vec<String>,
}

impl TokenKeyDetector {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for TokenKeyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_TOKENS)
    }
}

impl KeyDetector for TokenKeyDetector {
    fn detect(&self, columns: &[String]) -> Option<usize> {
        columns
            .iter()
            .position(|c| self.tokens.iter().any(|t| c.contains(t.as_str())))
    }
}

/// The column with exactly this name.
#[derive(Debug, Clone)]
pub struct ExactColumn(pub String);

impl KeyDetector for ExactColumn {
    fn detect(&self, columns: &[String]) -> Option<usize> {
        columns.iter().position(|c| *c == self.0)
    }
}

/// How the metrics were (or were not) attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinKey {
    /// No metrics table was supplied.
    NoMetrics,
    /// Joined on this metrics column.
    Detected(String),
    /// A metrics table was supplied but no key column qualified.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub table: Table,
    pub key: JoinKey,
}

/// Attach `metrics` to the records table.
///
/// Without metrics, or without a detectable key, the records table comes back
/// unchanged.
pub fn join(
    records: &Table,
    metrics: Option<&MetricsTable>,
    detector: &dyn KeyDetector,
) -> JoinOutcome {
    let Some(metrics) = metrics else {
        return JoinOutcome {
            table: records.clone(),
            key: JoinKey::NoMetrics,
        };
    };

    match detector.detect(metrics.columns()) {
        Some(idx) => {
            let key = metrics.columns()[idx].clone();
            info!(column = %key, "joining metrics");
            JoinOutcome {
                table: left_join(records, FILENAME_KEY, metrics.table(), idx),
                key: JoinKey::Detected(key),
            }
        }
        None => {
            debug!(columns = ?metrics.columns(), "no join key among metrics columns");
            JoinOutcome {
                table: records.clone(),
                key: JoinKey::NotFound,
            }
        }
    }
}

/// Left outer join of `left.left_key == right[right_key]`, compared as text.
///
/// One output row per match; an unmatched left row gets one row with empty
/// right cells. Both key columns are kept unless they share a name, in which
/// case the left one stands for both. Other shared names get `_x`/`_y` suffixes.
pub fn left_join(left: &Table, left_key: &str, right: &Table, right_key: usize) -> Table {
    let right_key_name = &right.columns()[right_key];
    let merged_key = right_key_name == left_key;

    let right_cols: Vec<usize> = (0..right.columns().len())
        .filter(|&i| !(merged_key && i == right_key))
        .collect();

    let overlaps = |name: &String| {
        left.columns().contains(name)
            && right_cols.iter().any(|&i| right.columns()[i] == *name)
    };
    let mut columns: Vec<String> = left
        .columns()
        .iter()
        .map(|c| if overlaps(c) { format!("{}_x", c) } else { c.clone() })
        .collect();
    columns.extend(right_cols.iter().map(|&i| {
        let c = &right.columns()[i];
        if overlaps(c) { format!("{}_y", c) } else { c.clone() }
    }));

    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row_idx, row) in right.rows().iter().enumerate() {
        if let Some(value) = row[right_key].as_deref() {
            index.entry(value).or_default().push(row_idx);
        }
    }

    let left_key_idx = left.column_index(left_key);
    let mut out = Table::new(columns);
    for row in left.rows() {
        let key = left_key_idx.and_then(|i| row[i].as_deref());
        let matches = key.and_then(|k| index.get(k));
        match matches {
            Some(hits) => {
                for &hit in hits {
                    let mut merged: Vec<Cell> = row.clone();
                    merged.extend(right_cols.iter().map(|&i| right.rows()[hit][i].clone()));
                    out.push_row(merged);
                }
            }
            None => out.push_row(row.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{FeatureAttribute, FeatureRecord};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn records_table(filenames: &[&str]) -> Table {
        let records: Vec<FeatureRecord> = filenames
            .iter()
            .map(|f| {
                FeatureRecord::new(*f)
                    .unwrap()
                    .with(FeatureAttribute::MainColor, "红色系")
            })
            .collect();
        Table::from_records(&records)
    }

    fn metrics(csv: &str) -> MetricsTable {
        MetricsTable::from_reader(csv.as_bytes(), b',').unwrap()
    }

    #[test]
    fn test_default_tokens_pick_first_qualifying_column() {
        let detector = TokenKeyDetector::default();
        assert_eq!(detector.detect(&cols(&["ID", "File Name", "Clicks"])), Some(1));
        assert_eq!(detector.detect(&cols(&["Name", "filename"])), Some(0));
        assert_eq!(detector.detect(&cols(&["编号", "海报名称"])), Some(1));
        assert_eq!(detector.detect(&cols(&["id", "文件"])), Some(1));
        assert_eq!(detector.detect(&cols(&["ID", "NAME", "Clicks"])), None);
    }

    #[test]
    fn test_exact_column_detector() {
        let detector = ExactColumn("poster".into());
        assert_eq!(detector.detect(&cols(&["Name", "poster"])), Some(1));
        assert_eq!(detector.detect(&cols(&["Name", "poster_id"])), None);
    }

    #[test]
    fn test_no_metrics_is_identity() {
        let records = records_table(&["a.png", "b.png"]);
        let outcome = join(&records, None, &TokenKeyDetector::default());
        assert_eq!(outcome.key, JoinKey::NoMetrics);
        assert_eq!(outcome.table, records);
    }

    #[test]
    fn test_left_join_on_detected_column() {
        let records = records_table(&["a.png", "b.png"]);
        let m = metrics("ID,File Name,Clicks\n1,a.png,10\n");
        let outcome = join(&records, Some(&m), &TokenKeyDetector::default());

        assert_eq!(outcome.key, JoinKey::Detected("File Name".into()));
        let t = &outcome.table;
        assert_eq!(t.columns(), ["filename", "main_color", "ID", "File Name", "Clicks"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.cell(0, "filename"), Some("a.png"));
        assert_eq!(t.cell(0, "Clicks"), Some("10"));
        assert_eq!(t.cell(1, "filename"), Some("b.png"));
        assert_eq!(t.cell(1, "Clicks"), None);
        assert_eq!(t.cell(1, "File Name"), None);
    }

    #[test]
    fn test_missing_key_column_leaves_records_unmerged() {
        let records = records_table(&["a.png"]);
        let m = metrics("ID,Clicks\n1,10\n");
        let outcome = join(&records, Some(&m), &TokenKeyDetector::default());
        assert_eq!(outcome.key, JoinKey::NotFound);
        assert_eq!(outcome.table, records);
    }

    #[test]
    fn test_duplicate_metric_rows_fan_out() {
        let records = records_table(&["a.png", "b.png"]);
        let m = metrics("name,day,clicks\na.png,mon,3\nc.png,mon,9\na.png,tue,5\n");
        let outcome = join(&records, Some(&m), &TokenKeyDetector::default());
        let t = &outcome.table;
        assert_eq!(t.len(), 3);
        assert_eq!(t.cell(0, "day"), Some("mon"));
        assert_eq!(t.cell(1, "day"), Some("tue"));
        assert_eq!(t.cell(1, "filename"), Some("a.png"));
        assert_eq!(t.cell(2, "filename"), Some("b.png"));
        assert_eq!(t.cell(2, "clicks"), None);
    }

    #[test]
    fn test_same_named_key_is_merged() {
        let records = records_table(&["a.png"]);
        let m = metrics("filename,clicks\na.png,7\n");
        let outcome = join(&records, Some(&m), &TokenKeyDetector::default());
        assert_eq!(outcome.table.columns(), ["filename", "main_color", "clicks"]);
        assert_eq!(outcome.table.cell(0, "clicks"), Some("7"));
    }

    #[test]
    fn test_overlapping_columns_get_suffixes() {
        let records = records_table(&["a.png"]);
        let m = metrics("海报名,main_color\na.png,blue\n");
        let outcome = join(&records, Some(&m), &TokenKeyDetector::default());
        assert_eq!(
            outcome.table.columns(),
            ["filename", "main_color_x", "海报名", "main_color_y"]
        );
        assert_eq!(outcome.table.cell(0, "main_color_x"), Some("红色系"));
        assert_eq!(outcome.table.cell(0, "main_color_y"), Some("blue"));
    }

    #[test]
    fn test_key_values_compare_as_text() {
        let mut left = Table::new(cols(&["filename"]));
        left.push_row(vec![Some("001".into())]);
        left.push_row(vec![Some("1".into())]);
        let m = metrics("name,clicks\n1,4\n");
        let t = left_join(&left, "filename", m.table(), 0);
        assert_eq!(t.cell(0, "clicks"), None);
        assert_eq!(t.cell(1, "clicks"), Some("4"));
    }
}
