//! Dataset Fusion Engine.
//!
//! Merges the five independently sourced tables (max temperature, min
//! temperature, precipitation, soil, yield) into one wide record set keyed by
//! (district, year), with soil keyed by district alone, and drops rows
//! without a yield label. The yield table is the spine: it carries the label,
//! the segmentation key (crop), and the seasonal categorical feature.

use crate::error::{CosechaError, Result};
use crate::frame::Table;
use log::info;

/// Canonical location-identifier column name used by every join.
pub const DISTRICT: &str = "Dist Name";
/// Year key column name.
pub const YEAR: &str = "Year";
/// Label column name.
pub const LABEL: &str = "Yield";
/// Segmentation key column name.
pub const CROP: &str = "Crop";
/// Seasonal categorical feature column name.
pub const SEASON: &str = "Season";

/// The five externally supplied source tables.
///
/// Tables are immutable once loaded; `fuse` does not mutate its input.
/// Source tables may still carry the raw `District` header; it is renamed
/// to [`DISTRICT`] before joining.
#[derive(Debug, Clone)]
pub struct SourceTables {
    /// Seasonal maximum temperatures, keyed by (district, year).
    pub max_temp: Table,
    /// Seasonal minimum temperatures, keyed by (district, year).
    pub min_temp: Table,
    /// Seasonal precipitation totals, keyed by (district, year).
    pub precipitation: Table,
    /// Soil chemistry, keyed by district only (no year axis).
    pub soil: Table,
    /// Historical yields, keyed by (district, year) and carrying crop/season.
    pub yields: Table,
}

fn canonicalize_district(table: &Table, label: &str) -> Result<Table> {
    let mut table = table.clone();
    if !table.has_column(DISTRICT) {
        if table.has_column("District") {
            table.rename_column("District", DISTRICT)?;
        } else {
            return Err(CosechaError::fusion(format!(
                "{label} table has no '{DISTRICT}' or 'District' column"
            )));
        }
    }
    Ok(table)
}

fn require_columns(table: &Table, label: &str, required: &[&str]) -> Result<()> {
    for column in required {
        if !table.has_column(column) {
            return Err(CosechaError::fusion(format!(
                "{label} table is missing required column '{column}'"
            )));
        }
    }
    Ok(())
}

/// Joins all five source tables into the fused record set.
///
/// Climate tables are merged on (district, year) with `_max`/`_min` suffixes
/// disambiguating colliding seasonal column names; soil is merged on district
/// only, so every year of a district receives the same soil values. All
/// non-spine joins are left joins: dropping unmatched rows here would
/// silently shrink the feature space available to training. Rows whose yield
/// label is null are discarded last; they can neither train nor count toward
/// a segment's sample threshold.
///
/// # Errors
///
/// Returns [`CosechaError::Fusion`] when a required key or label column is
/// missing; this aborts the whole training run.
pub fn fuse(tables: &SourceTables) -> Result<Table> {
    let max_temp = canonicalize_district(&tables.max_temp, "max temperature")?;
    let min_temp = canonicalize_district(&tables.min_temp, "min temperature")?;
    let precipitation = canonicalize_district(&tables.precipitation, "precipitation")?;
    let soil = canonicalize_district(&tables.soil, "soil")?;
    let yields = canonicalize_district(&tables.yields, "yield")?;

    require_columns(&max_temp, "max temperature", &[YEAR])?;
    require_columns(&min_temp, "min temperature", &[YEAR])?;
    require_columns(&precipitation, "precipitation", &[YEAR])?;
    require_columns(&yields, "yield", &[YEAR, LABEL, CROP])?;

    // Identical seasonal column names across the two temperature tables must
    // be disambiguated at merge time; a plain merge would overwrite one side.
    let climate = max_temp
        .left_join(&min_temp, &[DISTRICT, YEAR], Some(("_max", "_min")))
        .map_err(|e| CosechaError::fusion(e.to_string()))?;
    let climate = climate
        .left_join(&precipitation, &[DISTRICT, YEAR], None)
        .map_err(|e| CosechaError::fusion(e.to_string()))?;

    let fused = yields
        .left_join(&climate, &[DISTRICT, YEAR], None)
        .map_err(|e| CosechaError::fusion(e.to_string()))?;
    let fused = fused
        .left_join(&soil, &[DISTRICT], None)
        .map_err(|e| CosechaError::fusion(e.to_string()))?;

    let labels = fused.numeric(LABEL)?;
    let keep: Vec<bool> = labels.iter().map(|v| !v.is_nan()).collect();
    let n_dropped = keep.iter().filter(|k| !**k).count();
    let fused = fused.filter_rows(&keep)?;

    info!(
        "fused {} rows across {} columns ({} unlabeled rows dropped)",
        fused.n_rows(),
        fused.n_cols(),
        n_dropped
    );
    Ok(fused)
}
