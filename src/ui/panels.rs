use std::path::Path;

use anyhow::Context;
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::analysis::charts::PlotKind;
use crate::data::model::ColumnType;
use crate::data::source::{FileContent, FileKind};
use crate::state::{AppState, OverviewSection, TestKind};

/// Extensions offered by the open dialog for workbooks.
const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

// ---------------------------------------------------------------------------
// Shared widgets
// ---------------------------------------------------------------------------

/// Labelled column picker. Returns true when the selection changed.
pub fn column_combo(
    ui: &mut Ui,
    id: &str,
    label: &str,
    columns: &[String],
    selected: &mut Option<String>,
) -> bool {
    let mut changed = false;
    ui.label(label);
    egui::ComboBox::from_id_salt(id)
        .selected_text(selected.as_deref().unwrap_or("(none)"))
        .show_ui(ui, |ui: &mut Ui| {
            for col in columns {
                let is_selected = selected.as_deref() == Some(col.as_str());
                if ui.selectable_label(is_selected, col).clicked() && !is_selected {
                    *selected = Some(col.clone());
                    changed = true;
                }
            }
        });
    changed
}

// ---------------------------------------------------------------------------
// Left side panel – source and analysis selections
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            source_section(ui, state);

            if state.dataset.is_none() {
                return;
            }
            ui.separator();
            overview_section(ui, state);
            ui.separator();
            exploration_section(ui, state);
            ui.separator();
            visualisation_section(ui, state);
            ui.separator();
            test_section(ui, state);
        });
}

fn source_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Data source");

    if ui.button("Upload a file…").clicked() {
        open_file_dialog(state);
    }
    match &state.upload {
        Some(file) => ui.label(RichText::new(file.name()).monospace()),
        None => ui.label(RichText::new("No file uploaded.").weak()),
    };
    ui.add_space(4.0);

    ui.strong("File type");
    let current = state.file_kind.label();
    let mut chosen = None;
    egui::ComboBox::from_id_salt("file_type")
        .selected_text(current)
        .show_ui(ui, |ui: &mut Ui| {
            for kind in FileKind::ALL {
                if ui.selectable_label(current == kind.label(), kind.label()).clicked() {
                    chosen = Some(kind.label());
                }
            }
        });
    if let Some(declared) = chosen {
        state.set_declared_type(declared);
    }

    if state.file_kind != FileKind::Excel || state.sheet_names.is_empty() {
        return;
    }

    ui.strong("Sheet");
    let current = state.sheet.clone().unwrap_or_default();
    let mut chosen = None;
    egui::ComboBox::from_id_salt("sheet")
        .selected_text(&current)
        .show_ui(ui, |ui: &mut Ui| {
            for name in &state.sheet_names {
                if ui.selectable_label(current == *name, name).clicked() && current != *name {
                    chosen = Some(name.clone());
                }
            }
        });
    if let Some(sheet) = chosen {
        state.set_sheet(sheet);
    }

    ui.strong("Header row");
    let mut row = state.header_row;
    let max = state.settings.max_header_row;
    let response = ui
        .add(egui::DragValue::new(&mut row).range(0..=max))
        .on_hover_text("Zero-based index of the row holding the column names");
    if response.changed() && row != state.header_row {
        state.set_header_row(row);
    }
}

fn overview_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Overview");
    ui.label("What would you like to know about the data?");
    for section in OverviewSection::ALL {
        ui.radio_value(&mut state.overview, section, section.to_string());
    }

    if state.overview == OverviewSection::ValueCounts {
        if let Some(ds) = &state.dataset {
            let text_columns = ds.columns_of_type(ColumnType::Text);
            column_combo(
                ui,
                "value_counts_column",
                "Column",
                &text_columns,
                &mut state.value_counts_column,
            );
        }
    }
}

fn exploration_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Data exploration");
    let t = &mut state.exploration;
    ui.checkbox(&mut t.head, "View data head");
    ui.checkbox(&mut t.description, "Describe data");
    ui.checkbox(&mut t.types, "Column types");
    ui.checkbox(&mut t.missing, "Missing values");
    ui.checkbox(&mut t.duplicates, "Duplicate rows");
    ui.checkbox(&mut t.shape, "Data shape");
    ui.checkbox(&mut t.info, "Data info");
    ui.checkbox(&mut t.columns, "Column names");
    ui.checkbox(&mut t.unique, "Unique values");
}

fn visualisation_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Visual insights");
    ui.checkbox(&mut state.visualise, "Show plots");
    if !state.visualise {
        return;
    }
    egui::ComboBox::from_id_salt("plot_kind")
        .selected_text(state.plot.kind.to_string())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in PlotKind::ALL {
                ui.selectable_value(&mut state.plot.kind, kind, kind.to_string());
            }
        });
}

fn test_section(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Statistical tests");
    let before = state.test.kind;
    egui::ComboBox::from_id_salt("test_kind")
        .selected_text(state.test.kind.to_string())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in TestKind::ALL {
                ui.selectable_value(&mut state.test.kind, kind, kind.to_string());
            }
        });
    if state.test.kind != before {
        state.test.outcome = None;
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Clear cache").clicked() {
                state.clear_cache();
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            let (rows, cols) = ds.shape();
            ui.label(format!("{rows} rows × {cols} columns"));
            ui.separator();
            ui.label(
                RichText::new(format!("{} cached", state.cached_datasets())).weak(),
            );
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let supported: Vec<&str> = WORKBOOK_EXTENSIONS.iter().copied().chain(["csv"]).collect();
    let file = rfd::FileDialog::new()
        .set_title("Upload a dataset")
        .add_filter("Supported files", supported.as_slice())
        .add_filter("Excel", &WORKBOOK_EXTENSIONS)
        .add_filter("CSV", &["csv"])
        .pick_file();

    let Some(path) = file else {
        return;
    };
    match read_upload(&path) {
        Ok(content) => state.set_upload(content),
        Err(e) => {
            log::error!("Failed to open file: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}

fn read_upload(path: &Path) -> anyhow::Result<FileContent> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(FileContent::new(name, bytes))
}
