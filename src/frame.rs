//! Named-column tables for the fusion pipeline.
//!
//! A [`Table`] holds ordered, named columns that are either numeric (NaN
//! encodes a missing value) or text (`None` encodes a missing value). Tables
//! support the small set of relational operations the fusion engine needs:
//! rename, select/drop, row filtering, and hash joins on one or two key
//! columns with explicit suffix disambiguation for colliding names.

use crate::error::Result;
use std::collections::HashMap;

/// A single named column's data.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric values; NaN encodes null.
    Numeric(Vec<f32>),
    /// Text values; None encodes null.
    Text(Vec<Option<String>>),
}

impl Column {
    /// Returns the number of values in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    /// Returns true if the column has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the value at `idx` is null.
    #[must_use]
    pub fn is_null(&self, idx: usize) -> bool {
        match self {
            Column::Numeric(v) => v[idx].is_nan(),
            Column::Text(v) => v[idx].is_none(),
        }
    }

    fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(indices.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(indices.iter().map(|&i| v[i].clone()).collect()),
        }
    }
}

/// Hashable join-key part; f32 keys are compared by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Num(u32),
    Text(String),
}

/// A table of ordered named columns with uniform row count.
///
/// # Examples
///
/// ```
/// use cosecha::frame::{Column, Table};
///
/// let t = Table::new(vec![
///     ("Year".to_string(), Column::Numeric(vec![2019.0, 2020.0])),
///     (
///         "Crop".to_string(),
///         Column::Text(vec![Some("Rice".to_string()), Some("Wheat".to_string())]),
///     ),
/// ])
/// .expect("columns have equal lengths");
/// assert_eq!(t.n_rows(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<(String, Column)>,
    n_rows: usize,
}

impl Table {
    /// Creates a new table from named columns.
    ///
    /// # Errors
    ///
    /// Returns an error if columns are empty, have different lengths, carry
    /// empty names, or duplicate names.
    pub fn new(columns: Vec<(String, Column)>) -> Result<Self> {
        if columns.is_empty() {
            return Err("Table must have at least one column".into());
        }

        let n_rows = columns[0].1.len();
        for (name, col) in &columns {
            if col.len() != n_rows {
                return Err("All columns must have the same length".into());
            }
            if name.is_empty() {
                return Err("Column names cannot be empty".into());
            }
        }

        let mut names: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        for i in 1..names.len() {
            if names[i] == names[i - 1] {
                return Err("Duplicate column names not allowed".into());
            }
        }

        Ok(Self { columns, n_rows })
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Returns true if a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Returns a reference to a column by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column doesn't exist.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| format!("Column '{name}' not found").into())
    }

    /// Returns a numeric column's values by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column doesn't exist or is not numeric.
    pub fn numeric(&self, name: &str) -> Result<&[f32]> {
        match self.column(name)? {
            Column::Numeric(v) => Ok(v),
            Column::Text(_) => Err(format!("Column '{name}' is not numeric").into()),
        }
    }

    /// Returns a text column's values by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column doesn't exist or is not text.
    pub fn text(&self, name: &str) -> Result<&[Option<String>]> {
        match self.column(name)? {
            Column::Text(v) => Ok(v),
            Column::Numeric(_) => Err(format!("Column '{name}' is not text").into()),
        }
    }

    /// Returns an iterator over columns as (name, column) pairs.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Renames a column in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the source column doesn't exist or the target name
    /// is already taken.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if self.has_column(to) {
            return Err(format!("Column '{to}' already exists").into());
        }
        let entry = self
            .columns
            .iter_mut()
            .find(|(n, _)| n == from)
            .ok_or_else(|| format!("Column '{from}' not found"))?;
        entry.0 = to.to_string();
        Ok(())
    }

    /// Drops a column by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column doesn't exist or is the last column.
    pub fn drop_column(&mut self, name: &str) -> Result<()> {
        if self.columns.len() == 1 {
            return Err("Cannot drop the last column".into());
        }
        let idx = self
            .columns
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| format!("Column '{name}' not found"))?;
        self.columns.remove(idx);
        Ok(())
    }

    /// Returns rows selected by index as a new table.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.take(indices)))
                .collect(),
            n_rows: indices.len(),
        }
    }

    /// Keeps only rows whose mask entry is true.
    ///
    /// # Errors
    ///
    /// Returns an error if the mask length doesn't match the row count.
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Table> {
        if keep.len() != self.n_rows {
            return Err("Filter mask length must match row count".into());
        }
        let indices: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        Ok(self.take_rows(&indices))
    }

    /// Left join: every row of `self` appears once; unmatched right columns
    /// are null.
    ///
    /// Colliding non-key column names take the given suffixes (left, right);
    /// without suffixes a collision is an error rather than a silent
    /// overwrite.
    ///
    /// # Errors
    ///
    /// Returns an error if a key column is missing on either side or a name
    /// collision has no suffixes to resolve it.
    pub fn left_join(
        &self,
        other: &Table,
        keys: &[&str],
        suffixes: Option<(&str, &str)>,
    ) -> Result<Table> {
        self.join(other, keys, suffixes, true)
    }

    /// Inner join: only rows whose keys match on both sides are kept.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Table::left_join`].
    pub fn inner_join(
        &self,
        other: &Table,
        keys: &[&str],
        suffixes: Option<(&str, &str)>,
    ) -> Result<Table> {
        self.join(other, keys, suffixes, false)
    }

    fn key_for_row(cols: &[&Column], row: usize) -> Option<Vec<KeyPart>> {
        let mut parts = Vec::with_capacity(cols.len());
        for col in cols {
            if col.is_null(row) {
                return None;
            }
            let part = match col {
                Column::Numeric(v) => KeyPart::Num(v[row].to_bits()),
                Column::Text(v) => match &v[row] {
                    Some(s) => KeyPart::Text(s.clone()),
                    None => return None,
                },
            };
            parts.push(part);
        }
        Some(parts)
    }

    fn join(
        &self,
        other: &Table,
        keys: &[&str],
        suffixes: Option<(&str, &str)>,
        keep_unmatched: bool,
    ) -> Result<Table> {
        if keys.is_empty() {
            return Err("Join requires at least one key column".into());
        }

        let left_keys: Vec<&Column> = keys
            .iter()
            .map(|k| self.column(k))
            .collect::<Result<_>>()?;
        let right_keys: Vec<&Column> = keys
            .iter()
            .map(|k| other.column(k))
            .collect::<Result<_>>()?;

        // Index right side by key tuple; first occurrence wins on duplicates.
        let mut index: HashMap<Vec<KeyPart>, usize> = HashMap::with_capacity(other.n_rows);
        for row in 0..other.n_rows {
            if let Some(key) = Self::key_for_row(&right_keys, row) {
                index.entry(key).or_insert(row);
            }
        }

        // Row pairing: (left row, matched right row if any).
        let mut pairs: Vec<(usize, Option<usize>)> = Vec::with_capacity(self.n_rows);
        for row in 0..self.n_rows {
            let matched = Self::key_for_row(&left_keys, row).and_then(|k| index.get(&k).copied());
            if matched.is_some() || keep_unmatched {
                pairs.push((row, matched));
            }
        }

        let right_carried: Vec<&(String, Column)> = other
            .columns
            .iter()
            .filter(|(n, _)| !keys.contains(&n.as_str()))
            .collect();

        let mut out: Vec<(String, Column)> = Vec::new();

        for (name, col) in &self.columns {
            let out_name = if !keys.contains(&name.as_str())
                && right_carried.iter().any(|(rn, _)| rn == name)
            {
                let (left_suffix, _) = suffixes.ok_or_else(|| {
                    format!("Column '{name}' exists on both sides of the join and no suffixes were given")
                })?;
                format!("{name}{left_suffix}")
            } else {
                name.clone()
            };
            let indices: Vec<usize> = pairs.iter().map(|&(l, _)| l).collect();
            out.push((out_name, col.take(&indices)));
        }

        for (name, col) in right_carried {
            let out_name = if self.columns.iter().any(|(ln, _)| ln == name) {
                let (_, right_suffix) = suffixes.ok_or_else(|| {
                    format!("Column '{name}' exists on both sides of the join and no suffixes were given")
                })?;
                format!("{name}{right_suffix}")
            } else {
                name.clone()
            };
            let joined = match col {
                Column::Numeric(v) => Column::Numeric(
                    pairs
                        .iter()
                        .map(|&(_, r)| r.map_or(f32::NAN, |idx| v[idx]))
                        .collect(),
                ),
                Column::Text(v) => Column::Text(
                    pairs
                        .iter()
                        .map(|&(_, r)| r.and_then(|idx| v[idx].clone()))
                        .collect(),
                ),
            };
            out.push((out_name, joined));
        }

        Table::new(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[&str]) -> Column {
        Column::Text(values.iter().map(|s| Some((*s).to_string())).collect())
    }

    fn table(cols: Vec<(&str, Column)>) -> Table {
        Table::new(cols.into_iter().map(|(n, c)| (n.to_string(), c)).collect())
            .expect("valid test table")
    }

    #[test]
    fn test_new_rejects_mismatched_lengths() {
        let result = Table::new(vec![
            ("a".to_string(), Column::Numeric(vec![1.0])),
            ("b".to_string(), Column::Numeric(vec![1.0, 2.0])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let result = Table::new(vec![
            ("a".to_string(), Column::Numeric(vec![1.0])),
            ("a".to_string(), Column::Numeric(vec![2.0])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rename_column() {
        let mut t = table(vec![("District", text(&["Cuttack"]))]);
        t.rename_column("District", "Dist Name").expect("rename");
        assert!(t.has_column("Dist Name"));
        assert!(!t.has_column("District"));
    }

    #[test]
    fn test_rename_to_existing_name_fails() {
        let mut t = table(vec![
            ("a", Column::Numeric(vec![1.0])),
            ("b", Column::Numeric(vec![2.0])),
        ]);
        assert!(t.rename_column("a", "b").is_err());
    }

    #[test]
    fn test_left_join_two_keys() {
        let left = table(vec![
            ("Dist Name", text(&["Cuttack", "Puri", "Cuttack"])),
            ("Year", Column::Numeric(vec![2019.0, 2019.0, 2020.0])),
            ("Yield", Column::Numeric(vec![10.0, 12.0, 11.0])),
        ]);
        let right = table(vec![
            ("Dist Name", text(&["Cuttack", "Puri"])),
            ("Year", Column::Numeric(vec![2019.0, 2019.0])),
            ("Annual", Column::Numeric(vec![1700.0, 1500.0])),
        ]);

        let joined = left
            .left_join(&right, &["Dist Name", "Year"], None)
            .expect("join");
        assert_eq!(joined.n_rows(), 3);
        let annual = joined.numeric("Annual").expect("Annual column");
        assert_eq!(annual[0], 1700.0);
        assert_eq!(annual[1], 1500.0);
        assert!(annual[2].is_nan(), "unmatched row should be null");
    }

    #[test]
    fn test_left_join_is_idempotent_on_unique_keys() {
        let left = table(vec![
            ("Dist Name", text(&["Cuttack", "Puri"])),
            ("Year", Column::Numeric(vec![2019.0, 2019.0])),
        ]);
        let right = table(vec![
            ("Dist Name", text(&["Cuttack", "Puri"])),
            ("Year", Column::Numeric(vec![2019.0, 2019.0])),
            ("Annual", Column::Numeric(vec![1.0, 2.0])),
        ]);
        let once = left
            .left_join(&right, &["Dist Name", "Year"], None)
            .expect("join");
        assert_eq!(once.n_rows(), left.n_rows());
        // Joining the annotated result back produces no extra rows.
        let mut right2 = right.clone();
        right2.rename_column("Annual", "Annual2").expect("rename");
        let twice = once
            .left_join(&right2, &["Dist Name", "Year"], None)
            .expect("second join");
        assert_eq!(twice.n_rows(), left.n_rows());
    }

    #[test]
    fn test_collision_without_suffixes_errors() {
        let left = table(vec![
            ("Dist Name", text(&["Cuttack"])),
            ("Annual", Column::Numeric(vec![30.0])),
        ]);
        let right = table(vec![
            ("Dist Name", text(&["Cuttack"])),
            ("Annual", Column::Numeric(vec![20.0])),
        ]);
        assert!(left.left_join(&right, &["Dist Name"], None).is_err());
    }

    #[test]
    fn test_collision_with_suffixes() {
        let left = table(vec![
            ("Dist Name", text(&["Cuttack"])),
            ("Monsoon_JJAS", Column::Numeric(vec![32.0])),
        ]);
        let right = table(vec![
            ("Dist Name", text(&["Cuttack"])),
            ("Monsoon_JJAS", Column::Numeric(vec![25.0])),
        ]);
        let joined = left
            .left_join(&right, &["Dist Name"], Some(("_max", "_min")))
            .expect("join");
        assert_eq!(joined.numeric("Monsoon_JJAS_max").expect("max")[0], 32.0);
        assert_eq!(joined.numeric("Monsoon_JJAS_min").expect("min")[0], 25.0);
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let left = table(vec![
            ("Dist Name", text(&["Cuttack", "Nowhere"])),
            ("Yield", Column::Numeric(vec![10.0, 11.0])),
        ]);
        let right = table(vec![
            ("Dist Name", text(&["Cuttack"])),
            ("Soil_OC", Column::Numeric(vec![0.7])),
        ]);
        let joined = left.inner_join(&right, &["Dist Name"], None).expect("join");
        assert_eq!(joined.n_rows(), 1);
    }

    #[test]
    fn test_filter_rows() {
        let t = table(vec![("Yield", Column::Numeric(vec![1.0, f32::NAN, 3.0]))]);
        let yields = t.numeric("Yield").expect("col").to_vec();
        let mask: Vec<bool> = yields.iter().map(|v| !v.is_nan()).collect();
        let kept = t.filter_rows(&mask).expect("filter");
        assert_eq!(kept.n_rows(), 2);
    }

    #[test]
    fn test_null_key_rows_stay_unmatched() {
        let left = table(vec![
            ("Dist Name", Column::Text(vec![None, Some("Puri".to_string())])),
            ("Yield", Column::Numeric(vec![5.0, 6.0])),
        ]);
        let right = table(vec![
            ("Dist Name", text(&["Puri"])),
            ("Soil_K", Column::Numeric(vec![300.0])),
        ]);
        let joined = left.left_join(&right, &["Dist Name"], None).expect("join");
        let k = joined.numeric("Soil_K").expect("col");
        assert!(k[0].is_nan());
        assert_eq!(k[1], 300.0);
    }
}
