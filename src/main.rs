#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod error;
mod pipeline;
mod protocol;
mod reconcile;
mod state;
mod types;
mod ui;

use anyhow::Result;
use clap::Parser;
use gpui::Application;

use config::Config;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::parse();
    log::info!(
        "streaming {}x{} frames every {:?} to {}",
        config.width,
        config.height,
        config.capture_interval(),
        config.server
    );

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, config.clone()) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
