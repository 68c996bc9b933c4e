use std::collections::BTreeSet;

use chrono::NaiveDate;
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::data::filter::{ColumnControl, FilterControl, Selection};
use crate::data::model::CellValue;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    if state.source.is_none() {
        ui.label("No dataset loaded.");
        return;
    }

    let mut enabled = state.filters.enabled;
    if ui.checkbox(&mut enabled, "Add filters").changed() {
        state.set_filters_enabled(enabled);
    }
    if !state.filters.enabled {
        return;
    }

    // Clone what we need so we can mutate state after the widgets.
    let controls: Vec<ColumnControl> = state
        .snapshot
        .as_ref()
        .map(|s| s.controls.clone())
        .unwrap_or_default();
    let picked = state.filters.columns.clone();
    // Offered columns come from the last pass; after a failed pass fall back
    // to the loaded table's columns so the picker stays usable.
    let columns: Vec<String> = match (&state.snapshot, &state.source) {
        (Some(snapshot), _) => snapshot.filter_columns.clone(),
        (None, Some(source)) => source.column_names(),
        (None, None) => Vec::new(),
    };

    let mut toggled: Option<String> = None;
    let mut changed: Vec<(String, Selection)> = Vec::new();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            let header = format!("Filter dataframe on  ({}/{})", picked.len(), columns.len());
            egui::CollapsingHeader::new(RichText::new(header).strong())
                .id_salt("filter_columns")
                .default_open(false)
                .show(ui, |ui: &mut Ui| {
                    for col in &columns {
                        let mut checked = state.filters.is_column_selected(col);
                        if ui.checkbox(&mut checked, col).changed() {
                            toggled = Some(col.clone());
                        }
                    }
                });
            ui.separator();

            for ColumnControl {
                column,
                control,
                selection,
            } in &controls
            {
                if let Some(updated) = control_widget(ui, column, control, selection) {
                    changed.push((column.clone(), updated));
                }
                ui.add_space(4.0);
            }

            if controls.len() < picked.len() {
                ui.label(
                    RichText::new("Filters are paused until the error above is resolved.")
                        .color(Color32::RED),
                );
                for col in &picked {
                    ui.horizontal(|ui: &mut Ui| {
                        ui.label(col);
                        if ui.small_button("Remove").clicked() {
                            toggled = Some(col.clone());
                        }
                    });
                }
            }
        });

    if let Some(col) = toggled {
        state.toggle_filter_column(&col);
    }
    for (col, selection) in changed {
        state.set_selection(&col, selection);
    }
}

/// Draw one column's control; returns the new selection if it changed.
fn control_widget(
    ui: &mut Ui,
    column: &str,
    control: &FilterControl,
    selection: &Selection,
) -> Option<Selection> {
    match (control, selection) {
        (FilterControl::Categorical { options }, Selection::Values(selected)) => {
            categorical_widget(ui, column, options, selected)
        }
        (FilterControl::Numeric { min, max, step }, Selection::Range(lo, hi)) => {
            numeric_widget(ui, column, (*min, *max, *step), (*lo, *hi))
        }
        (FilterControl::Date { min, max }, Selection::Dates(dates)) => {
            date_widget(ui, column, (*min, *max), dates)
        }
        (FilterControl::Text, Selection::Pattern(pattern)) => text_widget(ui, column, pattern),
        // The pass rejects mismatches before a control is handed out.
        _ => None,
    }
}

fn categorical_widget(
    ui: &mut Ui,
    column: &str,
    options: &[CellValue],
    selected: &BTreeSet<CellValue>,
) -> Option<Selection> {
    let mut updated: Option<BTreeSet<CellValue>> = None;
    let header = format!("Values for {column}  ({}/{})", selected.len(), options.len());

    egui::CollapsingHeader::new(RichText::new(header).strong())
        .id_salt(("values", column))
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("All").clicked() {
                    updated = Some(options.iter().cloned().collect());
                }
                if ui.small_button("None").clicked() {
                    updated = Some(BTreeSet::new());
                }
            });

            for val in options {
                let mut checked = selected.contains(val);
                let label = match val {
                    CellValue::Null => "<missing>".to_string(),
                    other => other.to_string(),
                };
                if ui.checkbox(&mut checked, label).changed() {
                    let next = updated.get_or_insert_with(|| selected.clone());
                    if checked {
                        next.insert(val.clone());
                    } else {
                        next.remove(val);
                    }
                }
            }
        });

    updated.map(Selection::Values)
}

fn numeric_widget(
    ui: &mut Ui,
    column: &str,
    (min, max, step): (f64, f64, f64),
    (mut lo, mut hi): (f64, f64),
) -> Option<Selection> {
    ui.strong(format!("Values for {column}"));
    let mut changed = false;
    changed |= ui
        .add(egui::Slider::new(&mut lo, min..=max).step_by(step).text("from"))
        .changed();
    changed |= ui
        .add(egui::Slider::new(&mut hi, min..=max).step_by(step).text("to"))
        .changed();
    changed.then_some(Selection::Range(lo, hi))
}

fn date_widget(
    ui: &mut Ui,
    column: &str,
    (min, max): (NaiveDate, NaiveDate),
    dates: &[NaiveDate],
) -> Option<Selection> {
    ui.strong(format!("Values for {column}"));
    let mut start = dates.first().copied().unwrap_or(min);
    let mut end = dates.get(1).copied().unwrap_or(max);
    let mut has_end = dates.len() == 2;
    let mut changed = false;

    ui.horizontal(|ui: &mut Ui| {
        changed |= ui
            .add(DatePickerButton::new(&mut start).id_salt(&format!("{column}_start")))
            .changed();
        changed |= ui.checkbox(&mut has_end, "to").changed();
        if has_end {
            changed |= ui
                .add(DatePickerButton::new(&mut end).id_salt(&format!("{column}_end")))
                .changed();
        }
    });

    changed.then(|| {
        if has_end {
            Selection::Dates(vec![start, end])
        } else {
            Selection::Dates(vec![start])
        }
    })
}

fn text_widget(ui: &mut Ui, column: &str, pattern: &str) -> Option<Selection> {
    ui.strong(format!("Substring or regex in {column}"));
    let mut text = pattern.to_string();
    ui.text_edit_singleline(&mut text)
        .changed()
        .then_some(Selection::Pattern(text))
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open data…").clicked() {
                open_data_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open boundaries…").clicked() {
                open_boundaries_dialog(state);
                ui.close_menu();
            }
            if ui.button("Reload").clicked() {
                state.reload();
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(source) = &state.source {
            let shown = state.snapshot.as_ref().map_or(0, |s| s.record_count);
            ui.label(format!("{} records loaded, {shown} shown", source.len()));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Headline metrics
// ---------------------------------------------------------------------------

/// "#Claims" and "#Facilties" side by side.
pub fn metrics_row(ui: &mut Ui, state: &AppState) {
    let Some(snapshot) = &state.snapshot else {
        return;
    };
    ui.heading("#Claims and Facilities");
    ui.columns(2, |cols| {
        metric(&mut cols[0], "#Claims", &snapshot.metrics.claims_label());
        metric(&mut cols[1], "#Facilties", &snapshot.metrics.facilities_label());
    });
}

fn metric(ui: &mut Ui, label: &str, value: &str) {
    ui.label(label);
    ui.label(RichText::new(value).size(28.0).strong());
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_data_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open provider claims")
        .add_filter("Supported files", &["csv", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.load_data(path);
    }
}

pub fn open_boundaries_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open state boundaries")
        .add_filter("GeoJSON", &["geojson", "json"])
        .pick_file();

    if let Some(path) = file {
        state.load_boundaries(path);
        state.refresh();
    }
}
