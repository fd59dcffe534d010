// src/main.rs
mod alarm;
mod config;
mod drivers;
mod engine;
mod export;
mod gui;
mod history;
mod types;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::Result;
use clap::Parser;
use eframe::egui;
use crate::config::MonitorConfig;
use crate::engine::{MonitorSession, SourceMode};

/// Real-time ECG / respiration / heart-rate monitor for a serial device.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Serial port name (defaults to the first port found).
    #[arg(short, long)]
    port: Option<String>,
    /// Baud rate override.
    #[arg(long)]
    baud: Option<u32>,
    /// Use the built-in signal simulator instead of a device.
    #[arg(long, conflicts_with = "replay")]
    simulate: bool,
    /// Play back a file of recorded `ecg,respiration,bpm` lines.
    #[arg(long)]
    replay: Option<PathBuf>,
    /// Run without a window, logging status to the console.
    #[arg(long)]
    headless: bool,
    /// Stop the headless monitor after this many seconds.
    #[arg(long)]
    duration_secs: Option<u64>,
    /// Print available serial ports and exit.
    #[arg(long)]
    list_ports: bool,
}

fn load_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(port) = &cli.port {
        config.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    config.validate()?;
    Ok(config)
}

// 入口函数
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if cli.list_ports {
        let ports = drivers::serial::list_ports();
        if ports.is_empty() {
            println!("No serial ports found.");
        }
        for port in ports {
            println!("{port}");
        }
        return Ok(());
    }
    let config = load_config(&cli)?;
    let mode = match (&cli.replay, cli.simulate) {
        (Some(path), _) => SourceMode::Replay(path.clone()),
        (None, true) => SourceMode::Simulate,
        (None, false) => SourceMode::Serial,
    };
    let (reader, device_error) = engine::connect(&config, &mode);
    let sink = alarm::default_sink(config.tone());
    let mut session = MonitorSession::new(reader, &config, sink);

    if cli.headless {
        let duration = cli.duration_secs.map(Duration::from_secs);
        engine::run_headless(&mut session, config.tick_interval(), duration);
        return Ok(());
    }

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 860.0])
        .with_min_inner_size([900.0, 600.0])
        .with_title("ECG Monitor");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let app = gui::MonitorApp::new(
        session,
        config.tick_interval(),
        config.export_dir.clone(),
        device_error,
    );
    eframe::run_native("ECG Monitor", options, Box::new(move |_cc| Box::new(app)))
        .map_err(|e| anyhow::anyhow!("GUI failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_flags_parse() {
        let cli = Cli::parse_from(["ecg-monitor", "--list-ports"]);
        assert!(cli.list_ports);
        let cli = Cli::parse_from(["ecg-monitor", "--headless", "--duration-secs", "5", "--simulate"]);
        assert!(cli.headless && cli.simulate);
        assert_eq!(cli.duration_secs, Some(5));
    }

    #[test]
    fn simulate_and_replay_are_exclusive() {
        let parsed = Cli::try_parse_from(["ecg-monitor", "--simulate", "--replay", "x.txt"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn cli_overrides_config_values() {
        let cli = Cli::parse_from(["ecg-monitor", "--port", "COM3", "--baud", "9600"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.port.as_deref(), Some("COM3"));
        assert_eq!(config.baud_rate, 9600);
    }
}
