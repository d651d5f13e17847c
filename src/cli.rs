//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, validation helpers, and the
//! subcommand handlers that don't need the async runtime.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::camera;
use crate::config::default_path as get_config_path;

/// Parse and validate a resolution (WIDTHxHEIGHT format)
pub fn parse_resolution(s: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid resolution format '{}'. Use WIDTHxHEIGHT (e.g., 640x480)",
            s
        ));
    }
    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width '{}' in resolution", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height '{}' in resolution", parts[1]))?;
    if width == 0 || height == 0 {
        return Err("Resolution width and height must be greater than 0".to_string());
    }
    Ok((width, height))
}

/// Parse and validate a settle delay (10-10000 ms)
pub fn parse_settle_ms(s: &str) -> Result<u64, String> {
    let ms: u64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid delay in milliseconds", s))?;
    if !(10..=10_000).contains(&ms) {
        return Err(format!(
            "Settle delay must be between 10 and 10000 ms, got {}",
            ms
        ));
    }
    Ok(ms)
}

/// Camera-based 2D layout mapping for addressable LED strips
#[derive(Parser, Debug)]
#[command(name = "led-mapper")]
#[command(version, about = "Map the physical layout of an LED strip with a camera")]
#[command(after_help = "EXAMPLES:
    # Full run against the controller at 192.168.1.50
    led-mapper --address 192.168.1.50

    # Use the second camera and keep every capture frame
    led-mapper --address wled.local --camera 1 --save-frames

    # Sanity-check the wiring without a camera
    led-mapper flash --address wled.local

    # List available cameras
    led-mapper list-cameras")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Controller host or host:port
    #[arg(long, short = 'a', global = true)]
    pub address: Option<String>,

    /// Camera device index (from list-cameras)
    #[arg(long, global = true)]
    pub camera: Option<u32>,

    /// LED count override (default: ask the controller)
    #[arg(long, global = true)]
    pub count: Option<usize>,

    /// Master brightness during mapping (0-255)
    #[arg(long, short = 'b', global = true)]
    pub brightness: Option<u8>,

    /// Settle delay between light command and capture, in milliseconds
    #[arg(long, value_parser = parse_settle_ms, global = true)]
    pub settle_ms: Option<u64>,

    /// Capture resolution (WIDTHxHEIGHT)
    #[arg(long, short = 'r', value_parser = parse_resolution, global = true)]
    pub resolution: Option<(u32, u32)>,

    /// Save every capture frame for offline inspection
    #[arg(long, global = true)]
    pub save_frames: bool,

    /// Output directory for the ledmap and diagnostic image
    #[arg(long, short = 'o', global = true)]
    pub out_dir: Option<PathBuf>,

    /// Ledmap name (the "n" field of the JSON document)
    #[arg(long, short = 'n', global = true)]
    pub name: Option<String>,

    /// Upload the finished ledmap to the controller
    #[arg(long, global = true)]
    pub upload: bool,

    /// Config file path
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available cameras
    ListCameras,
    /// Query the controller and print device information
    Info,
    /// Light each LED in order, without capturing (wiring check)
    Flash,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show the config file location and whether it exists
    Show,
    /// Create default config file
    Init,
}

// ==================== Subcommand Handlers ====================

/// List available cameras and print them to stdout.
pub fn list_cameras() {
    match camera::list_devices() {
        Ok(devices) => {
            if devices.is_empty() {
                println!("No cameras found.");
                println!();
                println!("Make sure your camera is connected and permissions are granted.");
            } else {
                println!("Available cameras:");
                for device in devices {
                    println!("  {}", device);
                }
                println!();
                println!("Use --camera <index> to select a camera.");
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction) {
    match action {
        ConfigAction::Show => {
            let config_path = get_config_path();
            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
                println!("Run 'led-mapper config init' to create it.");
            }
        }
        ConfigAction::Init => {
            let config_path = get_config_path();

            if config_path.exists() {
                eprintln!("Config file already exists: {}", config_path.display());
                std::process::exit(1);
            }

            // Create parent directories if needed
            if let Some(parent) = config_path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    eprintln!("Error creating config directory: {}", e);
                    std::process::exit(1);
                }
            }

            // Write default config
            let default_config = r#"# led-mapper configuration

[controller]
# Controller host or host:port
# address = "192.168.1.50"
# Override the LED count instead of asking the controller
# count = 50

[camera]
# Camera device index
device = 0
# Capture resolution (lower = faster)
# resolution = "640x480"

[mapping]
# Settle delay between light command and capture, in milliseconds
settle_ms = 200
# Master brightness during mapping
brightness = 128
# Save every capture frame for offline inspection
save_frames = false

[output]
# Directory artifacts are written into
dir = "out"
# Ledmap name (the "n" field of the JSON document)
name = "cvMap"
"#;

            if let Err(e) = std::fs::write(&config_path, default_config) {
                eprintln!("Error writing config file: {}", e);
                std::process::exit(1);
            }

            println!("Created config file: {}", config_path.display());
        }
    }
}
