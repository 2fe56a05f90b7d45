//! Parley Desktop — application entry.

mod app;
mod worker;

use eframe::egui;

fn main() -> eframe::Result<()> {
    app::install_logger();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([560.0, 720.0])
            .with_min_inner_size([360.0, 420.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Parley",
        options,
        Box::new(|cc| Box::new(app::ParleyApp::new(cc))),
    )
}
