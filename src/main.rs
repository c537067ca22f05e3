mod analysis;
mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use app::EdaPandaApp;
use config::Settings;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let settings = Settings::load();
    log::debug!("Starting with {settings:?}");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "EDA Panda – Exploratory Data Analysis",
        options,
        Box::new(|_cc| Ok(Box::new(EdaPandaApp::new(settings)))),
    )
}
