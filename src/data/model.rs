use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};

// ---------------------------------------------------------------------------
// CellValue – a single cell of the table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common dataframe dtypes.
/// Used as a key in `BTreeMap` / `BTreeSet` downstream so it must be `Ord`.
#[derive(Debug, Clone)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

/// Folds `-0.0` onto `0.0` so equal zeros compare, order and hash alike.
fn float_key(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use CellValue::*;
        // Integer and Float share a rank so numeric columns sort by value.
        fn rank(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) | Float(_) => 2,
                DateTime(_) => 3,
                Text(_) => 4,
            }
        }
        let ra = rank(self);
        let rb = rank(other);
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => float_key(*a).total_cmp(&float_key(*b)),
            // Equal magnitudes tie-break on variant to stay consistent with Hash.
            (Integer(a), Float(b)) => (*a as f64).total_cmp(&float_key(*b)).then(Ordering::Less),
            (Float(a), Integer(b)) => {
                float_key(*a).total_cmp(&(*b as f64)).then(Ordering::Greater)
            }
            (DateTime(a), DateTime(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => float_key(*f).to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::DateTime(d) => d.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(d) if d.time() == NaiveTime::MIN => {
                write!(f, "{}", d.format("%Y-%m-%d"))
            }
            CellValue::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64` for numeric statistics.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Which column type this single value would imply (`None` for nulls).
    fn implied_type(&self) -> Option<ColumnType> {
        match self {
            CellValue::Null => None,
            CellValue::Integer(_) | CellValue::Float(_) => Some(ColumnType::Numeric),
            CellValue::Bool(_) => Some(ColumnType::Boolean),
            CellValue::DateTime(_) => Some(ColumnType::DateTime),
            CellValue::Text(_) => Some(ColumnType::Text),
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnType – inferred per column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnType {
    Numeric,
    Text,
    DateTime,
    Boolean,
}

impl ColumnType {
    /// Infer a column type from its cells.
    ///
    /// A single kind of non-null value decides the type; a mix of kinds, or
    /// no values at all, falls back to `Text`.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a CellValue>) -> ColumnType {
        let mut seen: Option<ColumnType> = None;
        for cell in cells {
            let Some(t) = cell.implied_type() else {
                continue;
            };
            match seen {
                None => seen = Some(t),
                Some(prev) if prev == t => {}
                Some(_) => return ColumnType::Text,
            }
        }
        seen.unwrap_or(ColumnType::Text)
    }

    pub fn is_numeric(self) -> bool {
        self == ColumnType::Numeric
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Numeric => "Numeric",
            ColumnType::Text => "Text",
            ColumnType::DateTime => "DateTime",
            ColumnType::Boolean => "Boolean",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// A loaded table: named, typed columns over an ordered list of rows.
///
/// Every row holds exactly one cell per column. Once built, a dataset is
/// never changed in place; filters, sorts and groupings produce new values.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Column names in source order.
    pub column_names: Vec<String>,
    /// Inferred type of each column, parallel to `column_names`.
    pub column_types: Vec<ColumnType>,
    /// Row-major cells.
    pub rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Build a dataset, inferring column types.
    ///
    /// Short rows are padded with nulls and long rows truncated. Columns
    /// that mix kinds of values are coerced to text so that every non-null
    /// cell of a column has the same kind. Numeric columns holding any
    /// float store all their integers as floats.
    pub fn from_rows(column_names: Vec<String>, mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = column_names.len();
        for row in &mut rows {
            row.resize(width, CellValue::Null);
        }

        let column_types: Vec<ColumnType> = (0..width)
            .map(|c| ColumnType::infer(rows.iter().map(|r| &r[c])))
            .collect();

        for (c, ty) in column_types.iter().enumerate() {
            match ty {
                ColumnType::Text => {
                    for row in &mut rows {
                        let cell = &mut row[c];
                        if !matches!(cell, CellValue::Text(_) | CellValue::Null) {
                            *cell = CellValue::Text(cell.to_string());
                        }
                    }
                }
                ColumnType::Numeric => {
                    if !rows.iter().any(|r| matches!(r[c], CellValue::Float(_))) {
                        continue;
                    }
                    for row in &mut rows {
                        if let CellValue::Integer(i) = row[c] {
                            row[c] = CellValue::Float(i as f64);
                        }
                    }
                }
                _ => {}
            }
        }

        Dataset {
            column_names,
            column_types,
            rows,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.n_columns())
    }

    /// Position of the first column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_index(name).map(|i| self.column_types[i])
    }

    /// Iterate over the cells of one column.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().map(move |r| &r[idx])
    }

    /// Numeric view of a column: `None` for nulls and non-numeric cells.
    pub fn numeric_column(&self, idx: usize) -> Vec<Option<f64>> {
        self.column(idx).map(CellValue::as_f64).collect()
    }

    /// Names of all numeric columns in source order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns_of_type(ColumnType::Numeric)
    }

    pub fn columns_of_type(&self, ty: ColumnType) -> Vec<String> {
        self.column_names
            .iter()
            .zip(&self.column_types)
            .filter(|(_, t)| **t == ty)
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Sorted set of distinct values in a column.
    pub fn unique_values(&self, idx: usize) -> BTreeSet<CellValue> {
        self.column(idx).cloned().collect()
    }

    /// A new dataset holding the given rows (by index) in the given order.
    /// Column names and types are kept as-is.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            column_names: self.column_names.clone(),
            column_types: self.column_types.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// The first `n` rows as a new dataset.
    pub fn head(&self, n: usize) -> Dataset {
        let n = n.min(self.len());
        let indices: Vec<usize> = (0..n).collect();
        self.select_rows(&indices)
    }
}
