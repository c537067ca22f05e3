use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::analysis::hypothesis::ChiSquareResult;
use crate::analysis::overview;
use crate::data::filter::Aggregation;
use crate::data::model::{CellValue, Dataset};
use crate::state::{AppState, DerivedOp, OverviewSection, TestKind, TestOutcome};
use crate::ui::panels::column_combo;
use crate::ui::plot;
use crate::ui::table::{counts_table, dataset_table};

const PREVIEW_HEIGHT: f32 = 300.0;
const RESULT_HEIGHT: f32 = 240.0;

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    let Some(dataset) = state.dataset.clone() else {
        ui.centered_and_justified(|ui: &mut Ui| match &state.status_message {
            Some(msg) => {
                ui.label(RichText::new(msg).color(Color32::RED).heading());
            }
            None => {
                ui.heading("Upload a csv or Excel file to get started  (File → Open…)");
            }
        });
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Dataset preview");
            if dataset.is_empty() {
                ui.label("The selected data has a header but no rows.");
            }
            dataset_table(ui, "preview", &dataset, PREVIEW_HEIGHT);
            ui.separator();

            ui.heading("High-level overview");
            overview_output(ui, state, &dataset);
            ui.separator();

            exploration_output(ui, state, &dataset);

            egui::CollapsingHeader::new(RichText::new("Filter, sort and group").heading())
                .default_open(false)
                .show(ui, |ui: &mut Ui| derived_panel(ui, state, &dataset));
            ui.separator();

            if state.visualise {
                ui.heading(format!("Visual insights: {}", state.plot.kind));
                plot::visual_insights(ui, state);
                ui.separator();
            }

            ui.heading(format!("Statistical test: {}", state.test.kind));
            test_panel(ui, state, &dataset);
        });
}

fn error_label(ui: &mut Ui, err: &impl std::fmt::Display) {
    ui.colored_label(Color32::RED, err.to_string());
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

fn field_table(dataset: &Dataset) -> Dataset {
    let rows = overview::field_descriptions(dataset)
        .into_iter()
        .map(|f| {
            vec![
                CellValue::Text(f.name),
                CellValue::Text(f.column_type.to_string()),
            ]
        })
        .collect();
    Dataset::from_rows(vec!["Field Name".into(), "Field Type".into()], rows)
}

fn overview_output(ui: &mut Ui, state: &AppState, dataset: &Dataset) {
    match state.overview {
        OverviewSection::Dimensions => {
            let (rows, cols) = dataset.shape();
            ui.label(format!("The dataset has {rows} rows and {cols} columns."));
        }
        OverviewSection::FieldDescriptions => {
            dataset_table(ui, "field_descriptions", &field_table(dataset), RESULT_HEIGHT);
        }
        OverviewSection::SummaryStatistics => {
            let summary = overview::summary_table(dataset);
            dataset_table(ui, "summary_statistics", &summary, RESULT_HEIGHT);
        }
        OverviewSection::ValueCounts => match state.value_counts_column.as_deref() {
            Some(column) => match overview::value_counts_table(dataset, column) {
                Ok(table) => dataset_table(ui, "value_counts", &table, RESULT_HEIGHT),
                Err(e) => error_label(ui, &e),
            },
            None => {
                ui.label("The dataset has no text columns.");
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Data exploration
// ---------------------------------------------------------------------------

fn exploration_output(ui: &mut Ui, state: &AppState, dataset: &Dataset) {
    let t = &state.exploration;
    let mut shown = false;

    if t.head {
        ui.strong("Data head");
        dataset_table(ui, "head", &dataset.head(state.settings.preview_rows), RESULT_HEIGHT);
        shown = true;
    }
    if t.description {
        ui.strong("Description");
        dataset_table(ui, "describe", &overview::summary_table(dataset), RESULT_HEIGHT);
        shown = true;
    }
    if t.types {
        ui.strong("Column types");
        dataset_table(ui, "types", &field_table(dataset), RESULT_HEIGHT);
        shown = true;
    }
    if t.missing {
        ui.strong("Missing values");
        counts_table(ui, "missing", ["Column", "Missing"], &overview::missing_counts(dataset));
        shown = true;
    }
    if t.duplicates {
        ui.label(format!("Duplicate rows: {}", overview::duplicate_rows(dataset)));
        shown = true;
    }
    if t.shape {
        let (rows, cols) = dataset.shape();
        ui.label(format!("Shape: ({rows}, {cols})"));
        shown = true;
    }
    if t.info {
        ui.strong("Data info");
        let info = overview::info(dataset);
        let rows = info
            .columns
            .into_iter()
            .map(|c| {
                vec![
                    CellValue::Text(c.name),
                    CellValue::Integer(c.non_null as i64),
                    CellValue::Text(c.column_type.to_string()),
                ]
            })
            .collect();
        let table = Dataset::from_rows(
            vec!["Column".into(), "Non-Null Count".into(), "Type".into()],
            rows,
        );
        ui.label(format!("{} entries", info.rows));
        dataset_table(ui, "info", &table, RESULT_HEIGHT);
        ui.label(format!("memory usage: {:.1} KB", info.memory_bytes as f64 / 1024.0));
        shown = true;
    }
    if t.columns {
        ui.strong("Column names");
        ui.label(dataset.column_names.join(", "));
        shown = true;
    }
    if t.unique {
        ui.strong("Unique values");
        counts_table(ui, "unique", ["Column", "Unique"], &overview::unique_counts(dataset));
        shown = true;
    }

    if shown {
        ui.separator();
    }
}

// ---------------------------------------------------------------------------
// Filter / sort / group
// ---------------------------------------------------------------------------

fn derived_panel(ui: &mut Ui, state: &mut AppState, dataset: &Dataset) {
    ui.horizontal(|ui: &mut Ui| {
        for op in DerivedOp::ALL {
            ui.radio_value(&mut state.derived.op, op, op.to_string());
        }
    });

    let form = &mut state.derived;
    ui.horizontal(|ui: &mut Ui| {
        let label = if form.op == DerivedOp::Group { "Group by" } else { "Column" };
        if column_combo(ui, "derived_column", label, &dataset.column_names, &mut form.column) {
            form.selected.clear();
        }

        match form.op {
            DerivedOp::Filter => {
                ui.label("equals");
                ui.text_edit_singleline(&mut form.value);
            }
            DerivedOp::Select => {}
            DerivedOp::Sort => {
                ui.checkbox(&mut form.ascending, "Ascending");
            }
            DerivedOp::Group => {
                column_combo(
                    ui,
                    "group_value",
                    "Value",
                    &dataset.column_names,
                    &mut form.group_value,
                );
                egui::ComboBox::from_id_salt("aggregation")
                    .selected_text(form.aggregation.to_string())
                    .show_ui(ui, |ui: &mut Ui| {
                        for agg in Aggregation::ALL {
                            ui.selectable_value(&mut form.aggregation, agg, agg.to_string());
                        }
                    });
            }
        }
    });

    if form.op == DerivedOp::Select {
        if let Some(idx) = form.column.as_deref().and_then(|c| dataset.column_index(c)) {
            let values = dataset.unique_values(idx);
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("All").clicked() {
                    form.selected = values.clone();
                }
                if ui.small_button("None").clicked() {
                    form.selected.clear();
                }
                ui.label(format!("{}/{} selected", form.selected.len(), values.len()));
            });
            ScrollArea::vertical()
                .id_salt("pick_values")
                .max_height(160.0)
                .show(ui, |ui: &mut Ui| {
                    for value in &values {
                        let mut checked = form.selected.contains(value);
                        if ui.checkbox(&mut checked, value.to_string()).changed() {
                            if checked {
                                form.selected.insert(value.clone());
                            } else {
                                form.selected.remove(value);
                            }
                        }
                    }
                });
        }
    }

    if ui.button("Apply").clicked() {
        state.apply_derived();
    }

    match &state.derived.result {
        Some(Ok(table)) => {
            ui.label(format!("{} rows", table.len()));
            dataset_table(ui, "derived_result", table, RESULT_HEIGHT);
        }
        Some(Err(e)) => error_label(ui, e),
        None => {}
    }
}

// ---------------------------------------------------------------------------
// Statistical tests
// ---------------------------------------------------------------------------

fn test_panel(ui: &mut Ui, state: &mut AppState, dataset: &Dataset) {
    let kind = state.test.kind;
    let numeric = dataset.numeric_columns();

    ui.horizontal(|ui: &mut Ui| {
        let (first_label, first_options, second_label) = match kind {
            TestKind::Anova => ("Value", &numeric, "Group"),
            TestKind::TTest => ("First", &numeric, "Second"),
            TestKind::ZScore => ("Column", &numeric, ""),
            TestKind::ChiSquare => ("First", &dataset.column_names, "Second"),
        };
        let form = &mut state.test;
        let mut changed =
            column_combo(ui, "test_first", first_label, first_options, &mut form.first);
        if kind.needs_second() {
            let second_options = if kind == TestKind::TTest {
                &numeric
            } else {
                &dataset.column_names
            };
            changed |=
                column_combo(ui, "test_second", second_label, second_options, &mut form.second);
        }
        if changed {
            form.outcome = None;
        }
    });

    if ui.button("Run test").clicked() {
        state.run_test();
    }

    match &state.test.outcome {
        Some(Ok(outcome)) => test_outcome(ui, state, dataset, outcome),
        Some(Err(e)) => error_label(ui, e),
        None => {}
    }
}

fn significance(p: f64) -> RichText {
    if p < 0.05 {
        RichText::new(format!("p = {p:.4} (significant at 5%)")).strong()
    } else {
        RichText::new(format!("p = {p:.4}"))
    }
}

fn test_outcome(ui: &mut Ui, state: &AppState, dataset: &Dataset, outcome: &TestOutcome) {
    match outcome {
        TestOutcome::Anova(r) => {
            ui.label(format!(
                "F({}, {}) = {:.4} across {} groups",
                r.df_between, r.df_within, r.f_statistic, r.groups
            ));
            ui.label(significance(r.p_value));
        }
        TestOutcome::TTest(r) => {
            ui.label(format!("t({}) = {:.4}", r.df, r.statistic));
            ui.label(significance(r.p_value));
        }
        TestOutcome::ZScores(scores) => {
            let column = state.test.first.clone().unwrap_or_default();
            let Some(idx) = dataset.column_index(&column) else {
                return;
            };
            let rows = dataset
                .column(idx)
                .zip(scores)
                .map(|(value, z)| {
                    vec![value.clone(), z.map_or(CellValue::Null, CellValue::Float)]
                })
                .collect();
            let table = Dataset::from_rows(vec![column, "Z-Score".into()], rows);
            dataset_table(ui, "z_scores", &table, RESULT_HEIGHT);
        }
        TestOutcome::ChiSquare(r) => chi_square_outcome(ui, r),
    }
}

fn chi_square_outcome(ui: &mut Ui, r: &ChiSquareResult) {
    ui.label(format!("χ²({}) = {:.4}", r.dof, r.statistic));
    ui.label(significance(r.p_value));
    if r.corrected {
        ui.label(RichText::new("Yates' continuity correction applied.").weak());
    }

    let mut names = vec![String::new()];
    names.extend(r.col_labels.iter().cloned());
    let rows = r
        .row_labels
        .iter()
        .zip(&r.observed)
        .map(|(label, counts)| {
            let mut row = vec![CellValue::Text(label.clone())];
            row.extend(counts.iter().map(|c| CellValue::Integer(*c as i64)));
            row
        })
        .collect();
    ui.strong("Observed frequencies");
    dataset_table(ui, "chi_square_observed", &Dataset::from_rows(names, rows), RESULT_HEIGHT);
}
