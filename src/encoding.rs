//! Feature encoding with a frozen per-segment column schema.
//!
//! At training time the [`IndicatorEncoder`] turns a segment's table into a
//! numeric feature matrix: numeric columns pass through, each declared
//! categorical column expands into one 0/1 indicator column per observed
//! category. The resulting [`ColumnSchema`] (exact names, kinds, and order)
//! is frozen into the artifact and is the single source of truth the serving
//! path replays. Categorical columns are declared explicitly rather than
//! discovered by type sniffing, so schema layout cannot drift when source
//! column types do.

use crate::error::Result;
use crate::frame::{Column, Table};
use crate::primitives::{Matrix, Vector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The kind of one encoded feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Passthrough numeric feature.
    Numeric,
    /// 0/1 indicator for one category of a categorical source column.
    Indicator {
        /// The categorical source column this indicator was derived from.
        source: String,
        /// The category value this indicator fires on.
        category: String,
    },
}

/// A single field value supplied at serving time.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A numeric feature value.
    Number(f32),
    /// A categorical feature value.
    Text(String),
}

/// Named field values for one serving-time record.
pub type RowValues = BTreeMap<String, FieldValue>;

/// The ordered feature-column layout a model was trained against.
///
/// Owned exclusively by one model artifact; never shared or mutated after
/// training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    columns: Vec<(String, ColumnKind)>,
}

impl ColumnSchema {
    /// Returns the number of encoded feature columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the encoded column names in training order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Returns the ordered (name, kind) pairs.
    #[must_use]
    pub fn columns(&self) -> &[(String, ColumnKind)] {
        &self.columns
    }

    /// Assembles a single-row feature matrix from raw field values, in exact
    /// schema order.
    ///
    /// A schema column absent from `fields` contributes 0.0; a categorical
    /// value never seen at training time matches no indicator and therefore
    /// encodes as all zeros. Both are recoveries, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error only if the schema is empty.
    pub fn encode_row(&self, fields: &RowValues) -> Result<Matrix> {
        if self.columns.is_empty() {
            return Err("Cannot encode against an empty schema".into());
        }

        let mut row = Vec::with_capacity(self.columns.len());
        for (name, kind) in &self.columns {
            let value = match kind {
                ColumnKind::Numeric => match fields.get(name) {
                    Some(FieldValue::Number(v)) if !v.is_nan() => *v,
                    _ => 0.0,
                },
                ColumnKind::Indicator { source, category } => match fields.get(source) {
                    Some(FieldValue::Text(v)) if v == category => 1.0,
                    _ => 0.0,
                },
            };
            row.push(value);
        }

        Matrix::from_vec(1, row.len(), row).map_err(Into::into)
    }
}

/// Fits per-segment indicator encodings and emits the frozen schema.
///
/// # Examples
///
/// ```
/// use cosecha::encoding::IndicatorEncoder;
/// use cosecha::frame::{Column, Table};
///
/// let segment = Table::new(vec![
///     (
///         "Season".to_string(),
///         Column::Text(vec![Some("Kharif".to_string()), Some("Rabi".to_string())]),
///     ),
///     ("Annual".to_string(), Column::Numeric(vec![1700.0, 900.0])),
///     ("Yield".to_string(), Column::Numeric(vec![10.0, 7.0])),
/// ])
/// .expect("valid table");
///
/// let mut encoder = IndicatorEncoder::new("Yield").with_categorical(&["Season"]);
/// let (x, y) = encoder.fit_transform(&segment).expect("encode");
/// assert_eq!(x.shape(), (2, 3)); // Season_Kharif, Season_Rabi, Annual
/// assert_eq!(y.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct IndicatorEncoder {
    label: String,
    categorical: Vec<String>,
    dropped: Vec<String>,
    schema: Option<ColumnSchema>,
}

impl IndicatorEncoder {
    /// Creates an encoder for a table whose label column is `label`.
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            categorical: Vec::new(),
            dropped: Vec::new(),
            schema: None,
        }
    }

    /// Declares which columns are categorical and expand into indicators.
    #[must_use]
    pub fn with_categorical(mut self, columns: &[&str]) -> Self {
        self.categorical = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Declares columns excluded from the feature set entirely (e.g. the
    /// segmentation key, constant within a segment, and the location
    /// identifier, which does not generalize).
    #[must_use]
    pub fn with_dropped(mut self, columns: &[&str]) -> Self {
        self.dropped = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Returns the fitted schema, if `fit_transform` has run.
    #[must_use]
    pub fn schema(&self) -> Option<&ColumnSchema> {
        self.schema.as_ref()
    }

    /// Fits the category vocabularies on a segment's rows and returns the
    /// encoded feature matrix and label vector.
    ///
    /// Rows carrying a null in the label or any feature column are removed
    /// first; vocabularies and the schema are built from the clean rows only.
    /// Column order follows the table, with each categorical column expanded
    /// in place over its sorted category vocabulary, so encoding the same
    /// segment twice yields an identical schema and identical values.
    ///
    /// # Errors
    ///
    /// Returns an error if the label column is missing or non-numeric, if a
    /// text column is neither declared categorical nor dropped, or if no
    /// usable rows remain after null removal.
    pub fn fit_transform(&mut self, table: &Table) -> Result<(Matrix, Vector)> {
        let labels = table.numeric(&self.label)?;

        let features: Vec<(&str, &Column)> = table
            .iter_columns()
            .filter(|(name, _)| *name != self.label && !self.dropped.iter().any(|d| d == name))
            .collect();

        for (name, column) in &features {
            if matches!(column, Column::Text(_)) && !self.categorical.iter().any(|c| c == name) {
                return Err(format!(
                    "Text column '{name}' is neither declared categorical nor dropped"
                )
                .into());
            }
        }

        let keep: Vec<usize> = (0..table.n_rows())
            .filter(|&row| {
                !labels[row].is_nan() && features.iter().all(|(_, col)| !col.is_null(row))
            })
            .collect();
        if keep.is_empty() {
            return Err("No usable rows after removing nulls".into());
        }

        // Sorted vocabulary per categorical column, from clean rows only.
        let mut vocabularies: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (name, column) in &features {
            if let Column::Text(values) = column {
                let vocab: BTreeSet<String> = keep
                    .iter()
                    .filter_map(|&row| values[row].clone())
                    .collect();
                vocabularies.insert(*name, vocab.into_iter().collect());
            }
        }

        // Schema columns and, in lockstep, direct readers over the source data.
        enum Reader<'a> {
            Numeric(&'a [f32]),
            Indicator(&'a [Option<String>], &'a str),
        }

        let mut columns: Vec<(String, ColumnKind)> = Vec::new();
        let mut readers: Vec<Reader<'_>> = Vec::new();
        for (name, column) in &features {
            match column {
                Column::Numeric(values) => {
                    columns.push(((*name).to_string(), ColumnKind::Numeric));
                    readers.push(Reader::Numeric(values));
                }
                Column::Text(values) => {
                    for category in &vocabularies[name] {
                        columns.push((
                            format!("{name}_{category}"),
                            ColumnKind::Indicator {
                                source: (*name).to_string(),
                                category: category.clone(),
                            },
                        ));
                        readers.push(Reader::Indicator(values, category));
                    }
                }
            }
        }
        let schema = ColumnSchema { columns };

        let mut data = Vec::with_capacity(keep.len() * schema.len());
        for &row in &keep {
            for reader in &readers {
                data.push(match reader {
                    Reader::Numeric(values) => values[row],
                    Reader::Indicator(values, category) => {
                        f32::from(values[row].as_deref() == Some(*category))
                    }
                });
            }
        }

        let x = Matrix::from_vec(keep.len(), schema.len(), data)?;
        let y = Vector::from_vec(keep.iter().map(|&row| labels[row]).collect());
        self.schema = Some(schema);
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment() -> Table {
        Table::new(vec![
            (
                "Season".to_string(),
                Column::Text(vec![
                    Some("Kharif".to_string()),
                    Some("Rabi".to_string()),
                    Some("Kharif".to_string()),
                    Some("Whole Year".to_string()),
                ]),
            ),
            (
                "Annual".to_string(),
                Column::Numeric(vec![1700.0, 900.0, 1650.0, 1200.0]),
            ),
            (
                "Yield".to_string(),
                Column::Numeric(vec![10.0, 7.0, 9.5, 8.0]),
            ),
        ])
        .expect("valid table")
    }

    #[test]
    fn schema_order_follows_table_with_sorted_categories() {
        let mut encoder = IndicatorEncoder::new("Yield").with_categorical(&["Season"]);
        encoder.fit_transform(&segment()).expect("encode");
        let schema = encoder.schema().expect("fitted");
        assert_eq!(
            schema.names(),
            vec!["Season_Kharif", "Season_Rabi", "Season_Whole Year", "Annual"]
        );
    }

    #[test]
    fn fit_transform_is_deterministic() {
        let table = segment();
        let mut a = IndicatorEncoder::new("Yield").with_categorical(&["Season"]);
        let mut b = IndicatorEncoder::new("Yield").with_categorical(&["Season"]);
        let (xa, ya) = a.fit_transform(&table).expect("encode");
        let (xb, yb) = b.fit_transform(&table).expect("encode");
        assert_eq!(xa.as_slice(), xb.as_slice());
        assert_eq!(ya.as_slice(), yb.as_slice());
        assert_eq!(a.schema(), b.schema());
    }

    #[test]
    fn indicators_encode_exactly_one_hot() {
        let mut encoder = IndicatorEncoder::new("Yield").with_categorical(&["Season"]);
        let (x, y) = encoder.fit_transform(&segment()).expect("encode");
        assert_eq!(x.shape(), (4, 4));
        // Row 1 is Rabi: only the Rabi indicator fires.
        assert_eq!(x.row(1).as_slice(), &[0.0, 1.0, 0.0, 900.0]);
        assert_eq!(y.as_slice(), &[10.0, 7.0, 9.5, 8.0]);
    }

    #[test]
    fn null_rows_are_removed_before_fitting() {
        let table = Table::new(vec![
            (
                "Season".to_string(),
                Column::Text(vec![Some("Kharif".to_string()), None, Some("Rabi".to_string())]),
            ),
            (
                "Annual".to_string(),
                Column::Numeric(vec![1700.0, 900.0, f32::NAN]),
            ),
            ("Yield".to_string(), Column::Numeric(vec![10.0, 7.0, 8.0])),
        ])
        .expect("valid table");

        let mut encoder = IndicatorEncoder::new("Yield").with_categorical(&["Season"]);
        let (x, y) = encoder.fit_transform(&table).expect("encode");
        // Only row 0 survives; Rabi never enters the vocabulary.
        assert_eq!(x.shape(), (1, 2));
        assert_eq!(y.as_slice(), &[10.0]);
        assert_eq!(encoder.schema().expect("fitted").names(), vec!["Season_Kharif", "Annual"]);
    }

    #[test]
    fn dropped_columns_never_reach_the_schema() {
        let table = Table::new(vec![
            (
                "Dist Name".to_string(),
                Column::Text(vec![Some("Pune".to_string()), Some("Nashik".to_string())]),
            ),
            ("Annual".to_string(), Column::Numeric(vec![1700.0, 900.0])),
            ("Yield".to_string(), Column::Numeric(vec![10.0, 7.0])),
        ])
        .expect("valid table");

        let mut encoder = IndicatorEncoder::new("Yield").with_dropped(&["Dist Name"]);
        encoder.fit_transform(&table).expect("encode");
        assert_eq!(encoder.schema().expect("fitted").names(), vec!["Annual"]);
    }

    #[test]
    fn undeclared_text_column_is_an_error() {
        let mut encoder = IndicatorEncoder::new("Yield");
        let err = encoder.fit_transform(&segment()).unwrap_err();
        assert!(err.to_string().contains("Season"));
    }

    #[test]
    fn all_null_rows_is_an_error() {
        let table = Table::new(vec![
            ("Annual".to_string(), Column::Numeric(vec![f32::NAN])),
            ("Yield".to_string(), Column::Numeric(vec![10.0])),
        ])
        .expect("valid table");
        let mut encoder = IndicatorEncoder::new("Yield");
        assert!(encoder.fit_transform(&table).is_err());
    }

    #[test]
    fn encode_row_replays_the_schema() {
        let mut encoder = IndicatorEncoder::new("Yield").with_categorical(&["Season"]);
        encoder.fit_transform(&segment()).expect("encode");
        let schema = encoder.schema().expect("fitted");

        let mut fields = RowValues::new();
        fields.insert("Season".to_string(), FieldValue::Text("Rabi".to_string()));
        fields.insert("Annual".to_string(), FieldValue::Number(1100.0));
        let row = schema.encode_row(&fields).expect("encode row");
        assert_eq!(row.shape(), (1, 4));
        assert_eq!(row.as_slice(), &[0.0, 1.0, 0.0, 1100.0]);
    }

    #[test]
    fn unseen_category_encodes_as_all_zero_indicators() {
        let mut encoder = IndicatorEncoder::new("Yield").with_categorical(&["Season"]);
        encoder.fit_transform(&segment()).expect("encode");
        let schema = encoder.schema().expect("fitted");

        let mut fields = RowValues::new();
        fields.insert("Season".to_string(), FieldValue::Text("Summer".to_string()));
        fields.insert("Annual".to_string(), FieldValue::Number(1100.0));
        let row = schema.encode_row(&fields).expect("encode row");
        assert_eq!(row.as_slice(), &[0.0, 0.0, 0.0, 1100.0]);
    }

    #[test]
    fn absent_fields_default_to_zero() {
        let mut encoder = IndicatorEncoder::new("Yield").with_categorical(&["Season"]);
        encoder.fit_transform(&segment()).expect("encode");
        let schema = encoder.schema().expect("fitted");

        let row = schema.encode_row(&RowValues::new()).expect("encode row");
        assert_eq!(row.as_slice(), &[0.0, 0.0, 0.0, 0.0]);
    }
}
