use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use led_mapper::calibration::CalibrationSession;
use led_mapper::camera::{CameraSettings, CameraWorker, Resolution};
use led_mapper::cli::{self, Args, Command};
use led_mapper::config::Config;
use led_mapper::grid;
use led_mapper::mapping::{self, BlinkTask, MappingOptions};
use led_mapper::output;
use led_mapper::vision::CalibrationParams;
use led_mapper::wled::WledClient;

/// Everything a run needs, after merging CLI, config file, and defaults.
struct Settings {
    address: String,
    camera: CameraSettings,
    count_override: Option<usize>,
    brightness: u8,
    settle: Duration,
    save_frames: bool,
    out_dir: PathBuf,
    name: String,
    upload: bool,
}

/// Merge settings: CLI args > config file > built-in defaults.
fn merge_settings(args: &Args, cfg: &Config) -> Result<Settings, String> {
    // Address: CLI > config; there is no sensible default.
    let address = args
        .address
        .clone()
        .or_else(|| cfg.controller.address.clone())
        .ok_or_else(|| {
            "No controller address. Pass --address or set [controller] address in the config file."
                .to_string()
        })?;

    // Resolution: CLI > config > default
    let resolution = match (args.resolution, cfg.camera.resolution.as_deref()) {
        (Some((width, height)), _) => Resolution { width, height },
        (None, Some(s)) => {
            let (width, height) = cli::parse_resolution(s)?;
            Resolution { width, height }
        }
        (None, None) => Resolution::default(),
    };

    let camera = CameraSettings {
        device_index: args.camera.unwrap_or(cfg.camera.device),
        resolution,
        ..CameraSettings::default()
    };

    let settle_ms = args
        .settle_ms
        .or(cfg.mapping.settle_ms)
        .unwrap_or(mapping::DEFAULT_SETTLE_DELAY.as_millis() as u64);

    Ok(Settings {
        address,
        camera,
        count_override: args.count.or(cfg.controller.count),
        brightness: args
            .brightness
            .or(cfg.mapping.brightness)
            .unwrap_or(mapping::DEFAULT_BRIGHTNESS),
        settle: Duration::from_millis(settle_ms),
        save_frames: args.save_frames || cfg.mapping.save_frames,
        out_dir: args
            .out_dir
            .clone()
            .or_else(|| cfg.output.dir.clone())
            .unwrap_or_else(|| PathBuf::from("out")),
        name: args
            .name
            .clone()
            .or_else(|| cfg.output.name.clone())
            .unwrap_or_else(|| "cvMap".to_string()),
        upload: args.upload,
    })
}

/// LED count: explicit override, or ask the controller.
async fn resolve_led_count(
    client: &WledClient,
    settings: &Settings,
) -> Result<usize, Box<dyn std::error::Error>> {
    let led_count = match settings.count_override {
        Some(n) => n,
        None => client.led_count().await?,
    };
    if led_count == 0 {
        return Err("Controller reports 0 LEDs".into());
    }
    Ok(led_count)
}

/// Query the controller and print device information.
async fn run_info(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let client = WledClient::new(&settings.address)?;
    let info = client.info().await?;
    println!(
        "Controller: {}",
        info.name.as_deref().unwrap_or("(unnamed)")
    );
    println!("Firmware:   {}", info.ver.as_deref().unwrap_or("(unknown)"));
    println!("LED count:  {}", info.leds.count);
    Ok(())
}

/// Light each LED in order at the configured cadence, without capturing.
async fn run_flash(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let client = WledClient::new(&settings.address)?;
    let led_count = resolve_led_count(&client, &settings).await?;

    println!("Flashing {} LEDs in order. Ctrl+C to stop.", led_count);
    for index in 0..led_count {
        if mapping::interrupted() {
            break;
        }
        client
            .set_one(index, led_count, settings.brightness)
            .await?;
        tokio::time::sleep(settings.settle).await;
    }
    client.all_off(led_count).await?;
    Ok(())
}

/// The full calibrate → map → compact → emit flow.
async fn run_mapping(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let client = WledClient::new(&settings.address)?;
    let led_count = resolve_led_count(&client, &settings).await?;
    log::info!("Mapping {} LEDs on {}", led_count, client.base_url());

    // Blink one LED so the operator has something to aim at.
    let blink = BlinkTask::spawn(client.clone(), led_count, settings.brightness);

    // The preview is blocking; keep it off the async runtime.
    println!("Starting calibration. Tune until exactly one blob tracks the blinking LED.");
    let camera_settings = settings.camera;
    let params = tokio::task::spawn_blocking(move || {
        let mut session = CalibrationSession::new(camera_settings, CalibrationParams::default());
        session.start()?;
        session.result()
    })
    .await??;
    log::info!(
        "Calibration done: contrast {}, threshold {}",
        params.contrast,
        params.threshold
    );

    // All background LED traffic must stop before the per-LED loop.
    blink.cancel().await;
    client.all_off(led_count).await?;

    let mut camera =
        tokio::task::spawn_blocking(move || CameraWorker::open(camera_settings)).await??;

    let save_frames = settings.save_frames.then(|| settings.out_dir.join("frames"));
    if let Some(dir) = &save_frames {
        std::fs::create_dir_all(dir)?;
    }

    let options = MappingOptions {
        led_count,
        brightness: settings.brightness,
        settle: settings.settle,
        save_frames,
    };
    let observations = mapping::run(&client, &camera, params, &options).await?;

    // One clean frame with the strip dark, as the diagnostic background.
    client.all_off(led_count).await?;
    tokio::time::sleep(options.settle).await;
    let background = camera.capture().await?;
    camera.release();

    let (grid, collisions) = grid::compact(&observations)?;
    for collision in &collisions {
        log::warn!("{}", collision);
    }
    let found = observations
        .iter()
        .filter(|o| o.coordinate.is_some())
        .count();
    println!(
        "Located {} of {} LEDs; grid is {}x{}",
        found,
        led_count,
        grid.width(),
        grid.height()
    );

    let ledmap_path = output::write_ledmap(&settings.out_dir, &settings.name, &grid)?;
    let image_path =
        output::write_diagnostic_image(&settings.out_dir, &settings.name, &background, &observations)?;

    if settings.upload {
        let json = output::ledmap_json(&settings.name, &grid)?;
        client.upload_ledmap(json).await?;
        println!("Uploaded ledmap to the controller; reboot or select it to activate.");
    }

    println!("Wrote {}", ledmap_path.display());
    println!("Wrote {}", image_path.display());
    Ok(())
}

/// Run a future to completion on a fresh runtime, exiting on error.
fn block_on(future: impl std::future::Future<Output = Result<(), Box<dyn std::error::Error>>>) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(future) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    // Subcommands that need neither config nor the runtime.
    match args.command {
        Some(Command::ListCameras) => {
            cli::list_cameras();
            return;
        }
        Some(Command::Config { ref action }) => {
            cli::handle_config_action(action.clone());
            return;
        }
        _ => {}
    }

    let cfg = match Config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let settings = match merge_settings(&args, &cfg) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = mapping::setup_interrupt_handler() {
        eprintln!("Warning: could not install Ctrl+C handler: {}", e);
    }

    match args.command {
        Some(Command::Info) => block_on(run_info(settings)),
        Some(Command::Flash) => block_on(run_flash(settings)),
        None => block_on(run_mapping(settings)),
        Some(Command::ListCameras) | Some(Command::Config { .. }) => unreachable!(),
    }
}
