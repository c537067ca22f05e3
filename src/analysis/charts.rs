//! Data preparation for the plot panel
//!
//! Pure functions turning dataset columns into what `egui_plot` draws.
//! Nothing here renders.

use std::collections::BTreeMap;
use std::fmt;

use crate::data::error::FrameError;
use crate::data::model::{CellValue, Dataset};

use super::overview::percentile;

/// Every plot the visualisation panel offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    Bar,
    Line,
    Scatter,
    Histogram,
    Box,
    Pie,
    Area,
    Heatmap,
    ScatterMatrix,
    WordCloud,
}

impl PlotKind {
    pub const ALL: [PlotKind; 10] = [
        PlotKind::Bar,
        PlotKind::Line,
        PlotKind::Scatter,
        PlotKind::Histogram,
        PlotKind::Box,
        PlotKind::Pie,
        PlotKind::Area,
        PlotKind::Heatmap,
        PlotKind::ScatterMatrix,
        PlotKind::WordCloud,
    ];

    /// Whether the plot uses the X-axis column selector.
    pub fn needs_x(self) -> bool {
        !matches!(self, PlotKind::Heatmap | PlotKind::ScatterMatrix)
    }

    /// Whether the plot uses the Y-axis column selector.
    pub fn needs_y(self) -> bool {
        matches!(
            self,
            PlotKind::Bar | PlotKind::Line | PlotKind::Scatter | PlotKind::Box | PlotKind::Area
        )
    }
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlotKind::Bar => "Bar Chart",
            PlotKind::Line => "Line Chart",
            PlotKind::Scatter => "Scatter Plot",
            PlotKind::Histogram => "Histogram",
            PlotKind::Box => "Box Plot",
            PlotKind::Pie => "Pie Chart",
            PlotKind::Area => "Area Chart",
            PlotKind::Heatmap => "Correlation Heatmap",
            PlotKind::ScatterMatrix => "Scatter Matrix",
            PlotKind::WordCloud => "Word Cloud",
        };
        f.write_str(name)
    }
}

fn column_index(dataset: &Dataset, column: &str) -> Result<usize, FrameError> {
    dataset
        .column_index(column)
        .ok_or_else(|| FrameError::ColumnNotFound(column.to_string()))
}

/// Position of a cell on a plot axis. Dates map to seconds since the epoch
/// and booleans to 0 / 1.
pub fn plot_value(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Integer(_) | CellValue::Float(_) => cell.as_f64(),
        CellValue::Bool(b) => Some(f64::from(u8::from(*b))),
        CellValue::DateTime(d) => Some(d.and_utc().timestamp() as f64),
        CellValue::Text(_) | CellValue::Null => None,
    }
}

/// Plottable values of one column, nulls and text skipped.
pub fn column_values(dataset: &Dataset, column: &str) -> Result<Vec<f64>, FrameError> {
    let idx = column_index(dataset, column)?;
    Ok(dataset.column(idx).filter_map(plot_value).collect())
}

/// `[x, y]` pairs in row order; rows where either side is not plottable
/// are dropped.
pub fn xy_points(dataset: &Dataset, x: &str, y: &str) -> Result<Vec<[f64; 2]>, FrameError> {
    let xi = column_index(dataset, x)?;
    let yi = column_index(dataset, y)?;
    Ok(dataset
        .rows
        .iter()
        .filter_map(|row| Some([plot_value(&row[xi])?, plot_value(&row[yi])?]))
        .collect())
}

/// Totals per category of `x`, in category order.
///
/// With `y` the numeric values are summed; without it rows are counted.
/// Null categories are skipped.
pub fn category_totals(
    dataset: &Dataset,
    x: &str,
    y: Option<&str>,
) -> Result<Vec<(String, f64)>, FrameError> {
    let xi = column_index(dataset, x)?;
    let yi = match y {
        Some(name) => {
            let idx = column_index(dataset, name)?;
            if !dataset.column_types[idx].is_numeric() {
                return Err(FrameError::NotNumeric(name.to_string()));
            }
            Some(idx)
        }
        None => None,
    };

    let mut totals: BTreeMap<&CellValue, f64> = BTreeMap::new();
    for row in &dataset.rows {
        let key = &row[xi];
        if key.is_null() {
            continue;
        }
        let add = match yi {
            Some(i) => row[i].as_f64().unwrap_or(0.0),
            None => 1.0,
        };
        *totals.entry(key).or_default() += add;
    }
    Ok(totals.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// Each total as a fraction of the sum of all positive totals.
pub fn pie_shares(totals: &[(String, f64)]) -> Vec<(String, f64)> {
    let sum: f64 = totals.iter().map(|(_, v)| v.max(0.0)).sum();
    if sum <= 0.0 {
        return Vec::new();
    }
    totals
        .iter()
        .filter(|(_, v)| *v > 0.0)
        .map(|(k, v)| (k.clone(), v / sum))
        .collect()
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        match self.edges.as_slice() {
            [first, second, ..] => second - first,
            _ => 0.0,
        }
    }
}

/// Equal-width bins from min to max; the last bin is closed on the right.
/// A constant column gets a single unit-wide bin.
pub fn histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return None;
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == min {
        return Some(Histogram {
            edges: vec![min - 0.5, min + 0.5],
            counts: vec![finite.len()],
        });
    }

    let width = (max - min) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| min + width * i as f64).collect();
    let mut counts = vec![0usize; bins];
    for v in finite {
        let bin = (((v - min) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    Some(Histogram { edges, counts })
}

// ---------------------------------------------------------------------------
// Box plot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest value within 1.5 IQR below `q1`.
    pub lower_whisker: f64,
    /// Largest value within 1.5 IQR above `q3`.
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let q1 = percentile(&sorted, 0.25);
    let median = percentile(&sorted, 0.5);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lo_fence = q1 - 1.5 * iqr;
    let hi_fence = q3 + 1.5 * iqr;

    let inside = sorted.iter().copied().filter(|v| *v >= lo_fence && *v <= hi_fence);
    let lower_whisker = inside.clone().fold(f64::INFINITY, f64::min);
    let upper_whisker = inside.fold(f64::NEG_INFINITY, f64::max);
    let outliers = sorted
        .iter()
        .copied()
        .filter(|v| *v < lo_fence || *v > hi_fence)
        .collect();

    Some(BoxStats {
        q1,
        median,
        q3,
        lower_whisker,
        upper_whisker,
        outliers,
    })
}

/// Box statistics of `y` for each category of `x`.
pub fn grouped_box_stats(
    dataset: &Dataset,
    x: &str,
    y: &str,
) -> Result<Vec<(String, BoxStats)>, FrameError> {
    let xi = column_index(dataset, x)?;
    let yi = column_index(dataset, y)?;
    if !dataset.column_types[yi].is_numeric() {
        return Err(FrameError::NotNumeric(y.to_string()));
    }

    let mut groups: BTreeMap<&CellValue, Vec<f64>> = BTreeMap::new();
    for row in &dataset.rows {
        if let Some(v) = row[yi].as_f64() {
            groups.entry(&row[xi]).or_default().push(v);
        }
    }
    Ok(groups
        .into_iter()
        .filter_map(|(k, values)| Some((k.to_string(), box_stats(&values)?)))
        .collect())
}

// ---------------------------------------------------------------------------
// Correlation heatmap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `values[i][j]` is the Pearson correlation of columns i and j, NaN
    /// when undefined.
    pub values: Vec<Vec<f64>>,
}

/// Pearson correlation between every pair of numeric columns, using the
/// rows where both cells are present.
pub fn correlation_matrix(dataset: &Dataset) -> CorrelationMatrix {
    let columns = dataset.numeric_columns();
    let data: Vec<Vec<Option<f64>>> = columns
        .iter()
        .filter_map(|name| dataset.column_index(name))
        .map(|i| dataset.numeric_column(i))
        .collect();

    let n = data.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&data[i], &data[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix { columns, values }
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

// ---------------------------------------------------------------------------
// Word cloud
// ---------------------------------------------------------------------------

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "i",
    "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "with",
];

/// Most frequent words of a column's text, lower-cased, stopwords and
/// single letters removed. Ordered by count, then alphabetically.
pub fn word_frequencies(
    dataset: &Dataset,
    column: &str,
    limit: usize,
) -> Result<Vec<(String, usize)>, FrameError> {
    let idx = column_index(dataset, column)?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for cell in dataset.column(idx).filter(|c| !c.is_null()) {
        let text = cell.to_string().to_lowercase();
        for word in text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .map(|w| w.trim_matches('\''))
            .filter(|w| w.chars().count() > 1 && !STOPWORDS.contains(w))
        {
            *counts.entry(word.to_string()).or_default() += 1;
        }
    }
    let mut words: Vec<(String, usize)> = counts.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1));
    words.truncate(limit);
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_csv;

    fn sample() -> Dataset {
        read_csv(
            b"shop,sales,cost,note\n\
              a,10,5,the quick fox\n\
              b,20,10,quick quick dog\n\
              a,30,15,\n\
              c,,8,Fox and dog\n",
        )
        .unwrap()
    }

    #[test]
    fn test_xy_points_drop_nulls() {
        let pts = xy_points(&sample(), "sales", "cost").unwrap();
        assert_eq!(pts, vec![[10.0, 5.0], [20.0, 10.0], [30.0, 15.0]]);
        assert!(xy_points(&sample(), "nope", "cost").is_err());
    }

    #[test]
    fn test_category_totals() {
        let ds = sample();
        let sums = category_totals(&ds, "shop", Some("sales")).unwrap();
        assert_eq!(
            sums,
            vec![("a".into(), 40.0), ("b".into(), 20.0), ("c".into(), 0.0)]
        );
        let counts = category_totals(&ds, "shop", None).unwrap();
        assert_eq!(counts[0], ("a".into(), 2.0));
        assert_eq!(
            category_totals(&ds, "shop", Some("note")).unwrap_err(),
            FrameError::NotNumeric("note".into())
        );
    }

    #[test]
    fn test_pie_shares_skip_non_positive() {
        let shares = pie_shares(&[("a".into(), 3.0), ("b".into(), 1.0), ("c".into(), 0.0)]);
        assert_eq!(shares, vec![("a".into(), 0.75), ("b".into(), 0.25)]);
        assert!(pie_shares(&[("z".into(), 0.0)]).is_empty());
    }

    #[test]
    fn test_histogram_bins() {
        let h = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert_eq!(h.edges, vec![0.0, 2.0, 4.0]);
        assert_eq!(h.counts, vec![2, 3]);
        assert_eq!(h.bin_width(), 2.0);

        let constant = histogram(&[5.0, 5.0], 10).unwrap();
        assert_eq!(constant.counts, vec![2]);
        assert!(histogram(&[], 10).is_none());
    }

    #[test]
    fn test_box_stats_outliers() {
        let stats = box_stats(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
        assert!((stats.median - 3.5).abs() < 1e-12);
        assert_eq!(stats.outliers, vec![100.0]);
        assert_eq!(stats.lower_whisker, 1.0);
        assert_eq!(stats.upper_whisker, 5.0);
    }

    #[test]
    fn test_grouped_box_stats() {
        let groups = grouped_box_stats(&sample(), "shop", "sales").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "a");
        assert_eq!(groups[0].1.median, 20.0);
    }

    #[test]
    fn test_correlation_matrix() {
        let m = correlation_matrix(&sample());
        assert_eq!(m.columns, vec!["sales", "cost"]);
        assert!((m.values[0][1] - 1.0).abs() < 1e-12);
        assert!((m.values[1][0] - 1.0).abs() < 1e-12);
        assert!((m.values[1][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_word_frequencies() {
        let words = word_frequencies(&sample(), "note", 2).unwrap();
        assert_eq!(words, vec![("quick".into(), 3), ("dog".into(), 2)]);
    }
}
