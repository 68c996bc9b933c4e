use eframe::egui::{self, ScrollArea, Ui};

use crate::state::AppState;
use crate::ui::{map, panels, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct PatientDensityApp {
    pub state: AppState,
}

impl PatientDensityApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for PatientDensityApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: metrics, map, table ----
        egui::CentralPanel::default().show(ctx, |ui| {
            ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui: &mut Ui| {
                    ui.heading(egui::RichText::new(self.state.config.title.as_str()).size(30.0));
                    ui.weak(self.state.config.subtitle.as_str());
                    ui.add_space(8.0);

                    if self.state.source.is_none() {
                        ui.label("Open a provider claims file  (File → Open data…)");
                        return;
                    }

                    panels::metrics_row(ui, &self.state);
                    ui.separator();
                    map::map_panel(ui, &mut self.state);
                    ui.separator();
                    table::detail_panel(ui, &self.state);
                });
        });
    }
}
