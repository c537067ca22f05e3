use eframe::egui::{self, Align, Layout, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::model::{CellValue, Dataset};

const ROW_HEIGHT: f32 = 18.0;

// ---------------------------------------------------------------------------
// Dataset table
// ---------------------------------------------------------------------------

/// Render a dataset as a scrollable grid. Only visible rows are laid out,
/// so large datasets stay cheap to draw.
pub fn dataset_table(ui: &mut Ui, id: &str, dataset: &Dataset, max_height: f32) {
    if dataset.n_columns() == 0 {
        ui.label("(no columns)");
        return;
    }

    ui.push_id(id, |ui: &mut Ui| {
        egui::ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .cell_layout(Layout::left_to_right(Align::Center))
                .columns(Column::auto().at_least(60.0).clip(true), dataset.n_columns())
                .max_scroll_height(max_height)
                .header(20.0, |mut header| {
                    for name in &dataset.column_names {
                        header.col(|ui: &mut Ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|body| {
                    body.rows(ROW_HEIGHT, dataset.len(), |mut row| {
                        let cells = &dataset.rows[row.index()];
                        for cell in cells {
                            row.col(|ui: &mut Ui| {
                                cell_label(ui, cell);
                            });
                        }
                    });
                });
        });
    });
}

fn cell_label(ui: &mut Ui, cell: &CellValue) {
    match cell {
        CellValue::Null => {
            ui.label(RichText::new("<null>").weak().italics());
        }
        CellValue::Integer(_) | CellValue::Float(_) => {
            ui.with_layout(Layout::right_to_left(Align::Center), |ui: &mut Ui| {
                ui.monospace(cell.to_string());
            });
        }
        _ => {
            ui.label(cell.to_string());
        }
    }
}

/// Two-column table of `(name, count)` pairs such as missing-value or
/// unique counts.
pub fn counts_table(ui: &mut Ui, id: &str, headers: [&str; 2], pairs: &[(String, usize)]) {
    let rows = pairs
        .iter()
        .map(|(name, n)| vec![CellValue::Text(name.clone()), CellValue::Integer(*n as i64)])
        .collect();
    let table = Dataset::from_rows(headers.iter().map(|h| h.to_string()).collect(), rows);
    dataset_table(ui, id, &table, 240.0);
}
