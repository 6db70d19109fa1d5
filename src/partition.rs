//! Segment Partitioner.
//!
//! Splits the fused record set into disjoint per-crop subsets and applies the
//! minimum-sample-count admission rule. Skipping an under-populated segment
//! is policy, not failure: it is logged and produces no artifact.

use crate::error::Result;
use crate::frame::Table;
use log::{info, warn};
use std::collections::BTreeMap;

/// A disjoint subset of fused records identified by one segmentation key
/// value (a crop name). Owns its rows; admitted segments always satisfy the
/// sample threshold they were admitted under.
#[derive(Debug, Clone)]
pub struct Segment {
    /// The segmentation key value (crop name).
    pub key: String,
    /// The rows of the fused set whose key column equals `key`.
    pub rows: Table,
}

impl Segment {
    /// Returns the number of records in this segment.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.rows.n_rows()
    }
}

/// Groups fused records by `key_column` and admits every group with at least
/// `min_samples` rows.
///
/// Grouping uses a `BTreeMap`, so the admitted key set and the returned order
/// are deterministic for a given input. Rows whose key value is null cannot
/// be segmented and are dropped with a warning.
///
/// # Errors
///
/// Returns an error if `key_column` is missing or not a text column.
pub fn partition(fused: &Table, key_column: &str, min_samples: usize) -> Result<Vec<Segment>> {
    let keys = fused.text(key_column)?;

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut n_null_keys = 0usize;
    for (row, key) in keys.iter().enumerate() {
        match key {
            Some(k) => groups.entry(k.as_str()).or_default().push(row),
            None => n_null_keys += 1,
        }
    }
    if n_null_keys > 0 {
        warn!("{n_null_keys} rows dropped: null '{key_column}' value cannot be segmented");
    }

    let mut segments = Vec::new();
    for (key, indices) in groups {
        if indices.len() < min_samples {
            info!(
                "segment '{key}' skipped: {} samples below threshold {min_samples}",
                indices.len()
            );
            continue;
        }
        segments.push(Segment {
            key: key.to_string(),
            rows: fused.take_rows(&indices),
        });
    }

    info!("admitted {} segments from '{key_column}'", segments.len());
    Ok(segments)
}
