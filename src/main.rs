mod api;
mod config;
mod error;
mod export;
mod model;
mod poller;
mod ui;

use api::thingspeak::{ThingSpeakClient, THINGSPEAK_BASE_URL};
use clap::Parser;
use config::{Cli, Settings};
use env_logger::Builder;
use log::{info, LevelFilter};
use std::error::Error;
use std::io::Write;
use ui::dashboard::Dashboard;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Configure logger
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sensorwatch", LevelFilter::Debug)
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr) // Keep logs separate from TUI
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_cli(&cli);

    info!(
        "Starting sensorwatch for channel {} field {}",
        cli.channel, cli.field
    );

    let client = ThingSpeakClient::new(THINGSPEAK_BASE_URL, &cli.channel, &cli.api_key, cli.field)?;

    // Create channels
    let (settings_tx, settings_rx) = tokio::sync::watch::channel(settings);
    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::channel(8);
    let (update_tx, update_rx) = tokio::sync::mpsc::channel(8);

    let source_label = format!("Channel {} / field {}", cli.channel, cli.field);
    let dashboard = Dashboard::new(settings_tx, cmd_tx, source_label);

    // Start the refresh loop
    let poller_handle = tokio::spawn(poller::run(client, settings_rx, cmd_rx, update_tx));

    // Run dashboard with poll updates
    let dashboard_handle = tokio::spawn(async move {
        if let Err(e) = dashboard.run(update_rx).await {
            log::error!("Dashboard error: {}", e);
        }
    });

    tokio::select! {
        _ = poller_handle => {},
        _ = dashboard_handle => {},
    };

    info!("Shutdown complete");
    Ok(())
}
