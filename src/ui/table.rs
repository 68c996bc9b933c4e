use eframe::egui::{self, ScrollArea, Ui};
use egui_extras::{Column as TableColumn, TableBuilder};

use crate::data::model::ProviderTable;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Detail table (below the map)
// ---------------------------------------------------------------------------

pub fn detail_panel(ui: &mut Ui, state: &AppState) {
    let Some(snapshot) = &state.snapshot else {
        return;
    };
    ScrollArea::horizontal()
        .id_salt("detail_table_scroll")
        .show(ui, |ui: &mut Ui| detail_table(ui, &snapshot.detail));
}

/// Render the projected table verbatim, one row per record.
fn detail_table(ui: &mut Ui, table: &ProviderTable) {
    let columns = table.columns();
    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .max_scroll_height(400.0)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .columns(TableColumn::auto().at_least(60.0), columns.len())
        .header(20.0, |mut header| {
            for col in columns {
                header.col(|ui| {
                    ui.strong(col.name.as_str());
                });
            }
        })
        .body(|body| {
            body.rows(18.0, table.len(), |mut row| {
                let i = row.index();
                for col in columns {
                    row.col(|ui| {
                        ui.label(col.values[i].to_string());
                    });
                }
            });
        });
}
