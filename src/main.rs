mod app;
mod color;
mod config;
mod data;
mod error;
mod geo;
mod report;
mod state;
mod ui;

use std::path::PathBuf;

use app::PatientDensityApp;
use config::DashboardConfig;
use eframe::egui;
use state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    // Optional JSON config file as the only argument.
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match DashboardConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e:#}; falling back to defaults");
            DashboardConfig::default()
        }
    };
    let title = config.title.clone();

    let mut state = AppState::new(config);
    state.load_configured();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(|_cc| Ok(Box::new(PatientDensityApp::new(state)))),
    )
}
