//! Per-LED mapping loop and its supervised background tasks.
//!
//! The loop lights one LED at a time, waits for the strip to settle, grabs a
//! single frame, and records where the LED showed up. Observation order is
//! never permuted: the position in the result vector IS the LED index.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::camera::{CameraError, CameraWorker};
use crate::vision::{self, CalibrationParams};
use crate::wled::{self, WledClient, WledError};

/// Wait after a brightness command before capturing, letting the
/// controller and LED respond.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Default master brightness during mapping.
pub const DEFAULT_BRIGHTNESS: u8 = 128;

/// One LED's mapping result.
///
/// Created exactly once during the loop and immutable afterwards. A `None`
/// coordinate means the vision primitive saw nothing for this LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Position within the linear addressable chain
    pub index: usize,
    /// Pixel location in the captured frame, when the LED was found
    pub coordinate: Option<(u32, u32)>,
}

/// Options controlling one mapping run.
#[derive(Debug, Clone)]
pub struct MappingOptions {
    /// Number of addressable elements to strobe
    pub led_count: usize,
    /// Master brightness during the run
    pub brightness: u8,
    /// Settle delay between the light command and the capture
    pub settle: Duration,
    /// Directory to save numbered overlay frames into, if any
    pub save_frames: Option<PathBuf>,
}

/// Errors that abort a mapping run.
///
/// All variants are fatal: the partial observation set is discarded and the
/// failing LED index is carried for the operator.
#[derive(Debug)]
pub enum MappingError {
    /// The controller rejected or never received a light command
    Controller { index: usize, source: WledError },
    /// The camera produced no frame
    Camera { index: usize, source: CameraError },
    /// The operator interrupted the run
    Interrupted { index: usize },
}

impl std::fmt::Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingError::Controller { index, source } => {
                write!(f, "Controller command for LED {} failed: {}", index, source)
            }
            MappingError::Camera { index, source } => {
                write!(f, "Frame capture for LED {} failed: {}", index, source)
            }
            MappingError::Interrupted { index } => {
                write!(f, "Mapping interrupted at LED {}", index)
            }
        }
    }
}

impl std::error::Error for MappingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MappingError::Controller { source, .. } => Some(source),
            MappingError::Camera { source, .. } => Some(source),
            MappingError::Interrupted { .. } => None,
        }
    }
}

/// Strobe every LED in order and record where each one appears.
///
/// For each index: light it (all others dark), sleep the settle delay,
/// capture exactly one frame, and run the vision primitive with the
/// calibration parameters. A vision miss records a missing observation and
/// continues; controller and camera failures abort the whole run.
///
/// When `save_frames` is set, every debug overlay is written as
/// `led<index>.png`. Persistence is best-effort and never affects the run.
pub async fn run(
    client: &WledClient,
    camera: &CameraWorker,
    params: CalibrationParams,
    options: &MappingOptions,
) -> Result<Vec<Observation>, MappingError> {
    log::info!(
        "Starting LED location capture for {} LEDs",
        options.led_count
    );
    let mut observations = Vec::with_capacity(options.led_count);

    for index in 0..options.led_count {
        if interrupted() {
            return Err(MappingError::Interrupted { index });
        }

        client
            .set_one(index, options.led_count, options.brightness)
            .await
            .map_err(|source| MappingError::Controller { index, source })?;

        tokio::time::sleep(options.settle).await;

        let frame = camera
            .capture()
            .await
            .map_err(|source| MappingError::Camera { index, source })?;

        let (coordinate, overlay) = vision::locate(&frame, params);
        match coordinate {
            Some((x, y)) => log::info!("LED {} located at ({}, {})", index, x, y),
            None => log::info!("LED {} not found", index),
        }

        if let Some(dir) = &options.save_frames {
            let path = dir.join(format!("led{:04}.png", index));
            if let Err(e) = overlay.save(&path) {
                // Inspection frames are best-effort; the run continues.
                log::warn!("Could not save frame {}: {}", path.display(), e);
            }
        }

        observations.push(Observation { index, coordinate });
    }

    log::info!("Finished LED location capture");
    Ok(observations)
}

/// Supervised handle for the calibration blink running in the background.
pub struct BlinkTask {
    handle: JoinHandle<()>,
}

impl BlinkTask {
    /// Start blinking element 0 on the async runtime.
    pub fn spawn(client: WledClient, count: usize, brightness: u8) -> Self {
        let handle = tokio::spawn(wled::blink_loop(client, count, brightness));
        Self { handle }
    }

    /// Cancel the blink and wait for it to wind down.
    ///
    /// Cancelling a task that already finished (or was already cancelled) is
    /// a no-op; nothing surfaces to the caller either way.
    pub async fn cancel(self) {
        self.handle.abort();
        match self.handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => log::warn!("Blink task ended abnormally: {}", e),
        }
    }
}

/// Flag set by the Ctrl+C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if Ctrl+C has been received.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Set up the Ctrl+C handler.
///
/// This should be called once at program startup.
pub fn setup_interrupt_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        INTERRUPTED.store(true, Ordering::SeqCst);
        eprintln!("\nReceived Ctrl+C, aborting run...");
    })
}
