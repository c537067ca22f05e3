use std::f64::consts::TAU;
use std::ops::RangeInclusive;

use eframe::egui::{self, Align2, Color32, FontId, RichText, Sense, Ui, Vec2};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, GridMark, Legend, Line, Plot, PlotPoint,
    PlotPoints, Points, Polygon, Text,
};

use crate::analysis::charts::{self, PlotKind};
use crate::color::{self, ColorMap};
use crate::data::error::FrameError;
use crate::data::model::{ColumnType, Dataset};
use crate::state::AppState;
use crate::ui::panels::column_combo;

const PLOT_HEIGHT: f32 = 420.0;

// ---------------------------------------------------------------------------
// Visual insights (central panel)
// ---------------------------------------------------------------------------

/// Column pickers for the selected plot kind, followed by the plot.
pub fn visual_insights(ui: &mut Ui, state: &mut AppState) {
    let Some(dataset) = state.dataset.clone() else {
        return;
    };
    let kind = state.plot.kind;

    ui.horizontal(|ui: &mut Ui| {
        if kind.needs_x() {
            let label = if kind == PlotKind::WordCloud { "Text column" } else { "X-axis" };
            column_combo(ui, "plot_x", label, &dataset.column_names, &mut state.plot.x);
        }
        if kind.needs_y() {
            let numeric = dataset.numeric_columns();
            column_combo(ui, "plot_y", "Y-axis", &numeric, &mut state.plot.y);
        }
    });
    ui.add_space(4.0);

    let x = state.plot.x.as_deref();
    let y = state.plot.y.as_deref();
    let settings = &state.settings;

    let drawn = match (kind, x, y) {
        (PlotKind::Heatmap, _, _) => heatmap(ui, &dataset),
        (PlotKind::ScatterMatrix, _, _) => scatter_matrix(
            ui,
            &dataset,
            settings.scatter_matrix_max_columns,
            settings.histogram_bins,
        ),
        (PlotKind::Histogram, Some(x), _) => histogram(ui, &dataset, x, settings.histogram_bins),
        (PlotKind::Pie, Some(x), _) => pie_chart(ui, &dataset, x),
        (PlotKind::WordCloud, Some(x), _) => word_cloud(ui, &dataset, x, settings.word_cloud_words),
        (PlotKind::Bar, Some(x), y) => bar_chart(ui, &dataset, x, y),
        (PlotKind::Box, Some(x), Some(y)) => box_plot(ui, &dataset, x, y),
        (PlotKind::Line | PlotKind::Area, Some(x), Some(y)) => {
            line_chart(ui, &dataset, x, y, kind == PlotKind::Area)
        }
        (PlotKind::Scatter, Some(x), Some(y)) => scatter(ui, &dataset, x, y),
        _ => {
            ui.label("Select the columns to plot.");
            Ok(())
        }
    };

    let failure = drawn.err().map(|e| format!("Cannot draw {kind}: {e}"));
    if state.plot.note_failure(failure.as_deref()) {
        log::warn!("{}", failure.as_deref().unwrap_or_default());
    }
    if let Some(msg) = failure {
        ui.colored_label(Color32::RED, msg);
    }
}

/// Axis labels for category positions `0, 1, 2, …`.
fn category_axis(labels: Vec<String>) -> impl Fn(GridMark, &RangeInclusive<f64>) -> String {
    move |mark, _range| {
        let v = mark.value;
        if v < 0.0 || v.fract() != 0.0 {
            return String::new();
        }
        labels.get(v as usize).cloned().unwrap_or_default()
    }
}

fn nothing_to_plot(ui: &mut Ui) -> Result<(), FrameError> {
    ui.label("No plottable values in the selected columns.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Category plots
// ---------------------------------------------------------------------------

fn bar_chart(ui: &mut Ui, ds: &Dataset, x: &str, y: Option<&str>) -> Result<(), FrameError> {
    let totals = charts::category_totals(ds, x, y)?;
    if totals.is_empty() {
        return nothing_to_plot(ui);
    }
    let colors = ColorMap::new(totals.iter().map(|(k, _)| k.as_str()));
    let bars: Vec<Bar> = totals
        .iter()
        .enumerate()
        .map(|(i, (k, v))| Bar::new(i as f64, *v).width(0.7).name(k).fill(colors.color_for(k)))
        .collect();
    let labels = totals.into_iter().map(|(k, _)| k).collect();

    Plot::new("bar_chart")
        .height(PLOT_HEIGHT)
        .x_axis_label(x)
        .y_axis_label(y.unwrap_or("Count"))
        .x_axis_formatter(category_axis(labels))
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars));
        });
    Ok(())
}

fn box_plot(ui: &mut Ui, ds: &Dataset, x: &str, y: &str) -> Result<(), FrameError> {
    let groups = charts::grouped_box_stats(ds, x, y)?;
    if groups.is_empty() {
        return nothing_to_plot(ui);
    }
    let colors = ColorMap::new(groups.iter().map(|(k, _)| k.as_str()));

    let boxes: Vec<BoxElem> = groups
        .iter()
        .enumerate()
        .map(|(i, (k, s))| {
            let spread =
                BoxSpread::new(s.lower_whisker, s.q1, s.median, s.q3, s.upper_whisker);
            BoxElem::new(i as f64, spread)
                .name(k)
                .box_width(0.6)
                .fill(colors.color_for(k).gamma_multiply(0.4))
                .stroke(egui::Stroke::new(1.5, colors.color_for(k)))
        })
        .collect();
    let outliers: Vec<[f64; 2]> = groups
        .iter()
        .enumerate()
        .flat_map(|(i, (_, s))| s.outliers.iter().map(move |v| [i as f64, *v]))
        .collect();
    let labels = groups.into_iter().map(|(k, _)| k).collect();

    Plot::new("box_plot")
        .height(PLOT_HEIGHT)
        .x_axis_label(x)
        .y_axis_label(y)
        .x_axis_formatter(category_axis(labels))
        .show(ui, |plot_ui| {
            plot_ui.box_plot(BoxPlot::new(boxes));
            plot_ui.points(Points::new(outliers).radius(2.5).color(Color32::GRAY));
        });
    Ok(())
}

fn pie_chart(ui: &mut Ui, ds: &Dataset, x: &str) -> Result<(), FrameError> {
    let shares = charts::pie_shares(&charts::category_totals(ds, x, None)?);
    if shares.is_empty() {
        return nothing_to_plot(ui);
    }
    let colors = ColorMap::new(shares.iter().map(|(k, _)| k.as_str()));

    Plot::new("pie_chart")
        .height(PLOT_HEIGHT)
        .data_aspect(1.0)
        .show_axes(false)
        .show_grid(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            let mut start = 0.0_f64;
            for (label, share) in &shares {
                let sweep = share * TAU;
                let steps = ((sweep / TAU) * 90.0).ceil().max(2.0) as usize;
                let mut points = vec![[0.0, 0.0]];
                points.extend((0..=steps).map(|s| {
                    let a = start + sweep * s as f64 / steps as f64;
                    [a.cos(), a.sin()]
                }));
                plot_ui.polygon(
                    Polygon::new(PlotPoints::from(points))
                        .name(label)
                        .fill_color(colors.color_for(label))
                        .stroke(egui::Stroke::new(1.0, Color32::WHITE)),
                );

                let mid = start + sweep / 2.0;
                plot_ui.text(Text::new(
                    PlotPoint::new(0.65 * mid.cos(), 0.65 * mid.sin()),
                    RichText::new(format!("{:.1}%", share * 100.0)).color(Color32::BLACK),
                ));
                start += sweep;
            }
        });
    Ok(())
}

// ---------------------------------------------------------------------------
// Numeric plots
// ---------------------------------------------------------------------------

fn line_chart(ui: &mut Ui, ds: &Dataset, x: &str, y: &str, filled: bool) -> Result<(), FrameError> {
    let x_is_category = ds
        .column_type(x)
        .ok_or_else(|| FrameError::ColumnNotFound(x.to_string()))?
        == ColumnType::Text;

    let (points, labels) = if x_is_category {
        let totals = charts::category_totals(ds, x, Some(y))?;
        let points: Vec<[f64; 2]> =
            totals.iter().enumerate().map(|(i, (_, v))| [i as f64, *v]).collect();
        (points, Some(totals.into_iter().map(|(k, _)| k).collect::<Vec<_>>()))
    } else {
        let mut points = charts::xy_points(ds, x, y)?;
        points.sort_by(|a, b| a[0].total_cmp(&b[0]));
        (points, None)
    };
    if points.is_empty() {
        return nothing_to_plot(ui);
    }

    let mut plot = Plot::new(if filled { "area_chart" } else { "line_chart" })
        .height(PLOT_HEIGHT)
        .x_axis_label(x)
        .y_axis_label(y);
    if let Some(labels) = labels {
        plot = plot.x_axis_formatter(category_axis(labels));
    }
    plot.show(ui, |plot_ui| {
        let mut line = Line::new(PlotPoints::from(points)).name(y).width(1.5);
        if filled {
            line = line.fill(0.0_f32);
        }
        plot_ui.line(line);
    });
    Ok(())
}

fn scatter(ui: &mut Ui, ds: &Dataset, x: &str, y: &str) -> Result<(), FrameError> {
    let points = charts::xy_points(ds, x, y)?;
    if points.is_empty() {
        return nothing_to_plot(ui);
    }
    Plot::new("scatter_plot")
        .height(PLOT_HEIGHT)
        .x_axis_label(x)
        .y_axis_label(y)
        .show(ui, |plot_ui| {
            plot_ui.points(Points::new(points).radius(3.0).name(y));
        });
    Ok(())
}

fn histogram_bars(hist: &charts::Histogram, color: Color32) -> BarChart {
    let width = hist.bin_width();
    let bars = hist
        .counts
        .iter()
        .zip(&hist.edges)
        .map(|(count, left)| Bar::new(left + width / 2.0, *count as f64).width(width))
        .collect();
    BarChart::new(bars).color(color)
}

fn histogram(ui: &mut Ui, ds: &Dataset, x: &str, bins: usize) -> Result<(), FrameError> {
    let values = charts::column_values(ds, x)?;
    let Some(hist) = charts::histogram(&values, bins) else {
        return nothing_to_plot(ui);
    };
    Plot::new("histogram")
        .height(PLOT_HEIGHT)
        .x_axis_label(x)
        .y_axis_label("Count")
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(histogram_bars(&hist, Color32::LIGHT_BLUE).name(x));
        });
    Ok(())
}

/// Pairwise scatter plots of the first numeric columns, histograms on the
/// diagonal.
fn scatter_matrix(
    ui: &mut Ui,
    ds: &Dataset,
    max_columns: usize,
    bins: usize,
) -> Result<(), FrameError> {
    let columns: Vec<String> = ds.numeric_columns().into_iter().take(max_columns).collect();
    if columns.is_empty() {
        ui.label("The dataset has no numeric columns.");
        return Ok(());
    }
    let side = ((ui.available_width() - 20.0) / columns.len() as f32).clamp(120.0, 260.0);

    egui::ScrollArea::both()
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("scatter_matrix")
                .spacing([4.0, 4.0])
                .show(ui, |ui: &mut Ui| -> Result<(), FrameError> {
                    for (i, row_col) in columns.iter().enumerate() {
                        for (j, col_col) in columns.iter().enumerate() {
                            matrix_cell(ui, ds, (i, row_col), (j, col_col), side, bins)?;
                        }
                        ui.end_row();
                    }
                    Ok(())
                })
                .inner
        })
        .inner
}

/// One cell of the scatter matrix: `row` against `col`, or the histogram of
/// `row` on the diagonal.
fn matrix_cell(
    ui: &mut Ui,
    ds: &Dataset,
    (i, row): (usize, &String),
    (j, col): (usize, &String),
    side: f32,
    bins: usize,
) -> Result<(), FrameError> {
    let plot = Plot::new(("scatter_matrix", i, j))
        .width(side)
        .height(side)
        .show_axes(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false);

    if i != j {
        let points = charts::xy_points(ds, col, row)?;
        plot.show(ui, |plot_ui| {
            plot_ui.points(Points::new(points).radius(1.5));
        });
        return Ok(());
    }

    let values = charts::column_values(ds, row)?;
    let hist = charts::histogram(&values, bins);
    plot.show(ui, |plot_ui| {
        let Some(hist) = &hist else {
            return;
        };
        plot_ui.bar_chart(histogram_bars(hist, Color32::LIGHT_BLUE));
        let (Some(lo), Some(hi)) = (hist.edges.first(), hist.edges.last()) else {
            return;
        };
        let top = hist.counts.iter().copied().max().unwrap_or(0) as f64;
        plot_ui.text(Text::new(PlotPoint::new((lo + hi) / 2.0, top * 1.1), row.as_str()));
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Painted plots
// ---------------------------------------------------------------------------

fn short(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        label.to_string()
    } else {
        let head: String = label.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

/// Correlation matrix of the numeric columns drawn as coloured cells.
fn heatmap(ui: &mut Ui, ds: &Dataset) -> Result<(), FrameError> {
    let matrix = charts::correlation_matrix(ds);
    let n = matrix.columns.len();
    if n < 2 {
        ui.label("At least two numeric columns are needed for a correlation heatmap.");
        return Ok(());
    }

    let margin = Vec2::new(120.0, 24.0);
    let cell = ((ui.available_width() - margin.x) / n as f32).clamp(28.0, 90.0);
    let size = margin + Vec2::splat(cell * n as f32);
    let (rect, response) = ui.allocate_exact_size(size, Sense::hover());
    let painter = ui.painter_at(rect);
    let font = FontId::proportional(12.0);
    let text_color = ui.visuals().text_color();
    let origin = rect.min + margin;

    for (i, name) in matrix.columns.iter().enumerate() {
        let offset = cell * (i as f32 + 0.5);
        painter.text(
            origin + Vec2::new(-6.0, offset),
            Align2::RIGHT_CENTER,
            short(name, 16),
            font.clone(),
            text_color,
        );
        painter.text(
            origin + Vec2::new(offset, -4.0),
            Align2::CENTER_BOTTOM,
            short(name, (cell / 7.0) as usize),
            font.clone(),
            text_color,
        );
    }

    for (i, row) in matrix.values.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            let min = origin + Vec2::new(cell * j as f32, cell * i as f32);
            let cell_rect = egui::Rect::from_min_size(min, Vec2::splat(cell)).shrink(1.0);
            painter.rect_filled(cell_rect, 2.0, color::diverging(*value));
            if cell >= 36.0 && value.is_finite() {
                painter.text(
                    cell_rect.center(),
                    Align2::CENTER_CENTER,
                    format!("{value:.2}"),
                    font.clone(),
                    Color32::BLACK,
                );
            }
        }
    }

    if let Some(pos) = response.hover_pos() {
        let rel = pos - origin;
        if rel.x >= 0.0 && rel.y >= 0.0 {
            let (i, j) = ((rel.y / cell) as usize, (rel.x / cell) as usize);
            if i < n && j < n {
                let text = format!(
                    "{} / {}: {:.3}",
                    matrix.columns[i], matrix.columns[j], matrix.values[i][j]
                );
                response.on_hover_text(text);
            }
        }
    }
    Ok(())
}

/// Frequent words of a text column, sized by count.
fn word_cloud(ui: &mut Ui, ds: &Dataset, column: &str, limit: usize) -> Result<(), FrameError> {
    let words = charts::word_frequencies(ds, column, limit)?;
    let Some(max) = words.first().map(|(_, n)| *n as f32) else {
        return nothing_to_plot(ui);
    };
    let palette = color::generate_palette(8);

    egui::Frame::group(ui.style()).show(ui, |ui: &mut Ui| {
        ui.set_min_height(PLOT_HEIGHT / 2.0);
        ui.horizontal_wrapped(|ui: &mut Ui| {
            for (i, (word, count)) in words.iter().enumerate() {
                let size = 12.0 + 36.0 * (*count as f32 / max).sqrt();
                ui.label(RichText::new(word).size(size).color(palette[i % palette.len()]))
                    .on_hover_text(format!("{count}"));
            }
        });
    });
    Ok(())
}
