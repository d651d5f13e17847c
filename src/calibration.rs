//! Interactive calibration session.
//!
//! The operator aims the camera at the blinking strip and tunes contrast and
//! threshold until exactly one blob tracks the lit LED. Capture and terminal
//! drawing are blocking, so the whole preview runs on a dedicated thread,
//! isolated from the async runtime. The only thing that crosses back is the
//! stream of parameter values, over an unbounded channel the reader drains
//! down to the most recent entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::camera::{self, CameraError, CameraSettings};
use crate::preview::{PreviewAction, PreviewTerminal};
use crate::vision::{self, CalibrationParams};

/// Errors that can occur during a calibration session.
#[derive(Debug)]
pub enum CalibrationError {
    /// The preview camera could not be opened
    Camera(CameraError),
    /// The preview stopped before any parameters were published
    Aborted,
    /// The session thread was started twice
    AlreadyRunning,
}

impl std::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationError::Camera(e) => write!(f, "Calibration preview camera failed: {}", e),
            CalibrationError::Aborted => {
                write!(
                    f,
                    "Calibration ended before any frame was processed; no parameters were chosen"
                )
            }
            CalibrationError::AlreadyRunning => write!(f, "Calibration is already running"),
        }
    }
}

impl std::error::Error for CalibrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CalibrationError::Camera(e) => Some(e),
            _ => None,
        }
    }
}

/// Lifecycle of a calibration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// Drain a channel, returning the most recently sent value, if any.
///
/// Everything older is discarded: the preview publishes once per frame and
/// only the operator's final choice matters.
pub fn drain_latest<T>(rx: &Receiver<T>) -> Option<T> {
    let mut latest = None;
    loop {
        match rx.try_recv() {
            Ok(value) => latest = Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    latest
}

/// Handle to the calibration preview thread.
///
/// `start()` spawns the preview and blocks until its camera is confirmed
/// open, so device failures surface immediately. `result()` waits for the
/// operator to exit (or for `stop()`), then returns the last published
/// parameters.
pub struct CalibrationSession {
    settings: CameraSettings,
    initial: CalibrationParams,
    thread: Option<JoinHandle<()>>,
    params_rx: Option<Receiver<CalibrationParams>>,
    stop: Arc<AtomicBool>,
    last_params: Option<CalibrationParams>,
    state: SessionState,
}

impl CalibrationSession {
    /// Create an idle session; nothing happens until `start()`.
    pub fn new(settings: CameraSettings, initial: CalibrationParams) -> Self {
        Self {
            settings,
            initial,
            thread: None,
            params_rx: None,
            stop: Arc::new(AtomicBool::new(false)),
            last_params: None,
            state: SessionState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Spawn the preview thread and wait for its camera to open.
    ///
    /// # Errors
    /// * `CalibrationError::Camera` - the preview camera could not be opened
    /// * `CalibrationError::AlreadyRunning` - `start()` was called twice
    pub fn start(&mut self) -> Result<(), CalibrationError> {
        if self.state == SessionState::Running {
            return Err(CalibrationError::AlreadyRunning);
        }

        let (params_tx, params_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CameraError>>();
        let settings = self.settings;
        let initial = self.initial;
        let stop = Arc::clone(&self.stop);

        // The camera handle isn't Send, so it is opened and dropped inside
        // the preview thread.
        let handle = std::thread::spawn(move || {
            let mut cam = match camera::open_stream(&settings) {
                Ok(cam) => cam,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            let mut terminal = match PreviewTerminal::enter() {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("Could not enter preview terminal: {}", e);
                    return;
                }
            };

            let mut params = initial;
            while !stop.load(Ordering::Relaxed) {
                let frame = match camera::read_frame(&mut cam) {
                    Ok(frame) => frame,
                    Err(_) => {
                        log::warn!("Preview frame read failed, leaving calibration");
                        break;
                    }
                };

                let (position, overlay) = vision::locate(&frame, params);

                // Publish every frame; the consumer keeps only the newest.
                if params_tx.send(params).is_err() {
                    break;
                }

                if terminal.draw(&overlay, params, position).is_err() {
                    break;
                }

                match terminal.poll_action() {
                    Ok(Some(PreviewAction::Exit)) => break,
                    Ok(Some(action)) => params = action.apply(params),
                    Ok(None) => {}
                    Err(_) => break,
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.thread = Some(handle);
                self.params_rx = Some(params_rx);
                self.state = SessionState::Running;
                log::info!("Calibration preview running");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(CalibrationError::Camera(e))
            }
            Err(_) => {
                let _ = handle.join();
                Err(CalibrationError::Aborted)
            }
        }
    }

    /// Ask the preview to stop after its current frame.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Wait for the preview to end and return the final parameters.
    ///
    /// Joins the thread (blocking), then drains the channel down to the most
    /// recently published value. Queued older values are discarded.
    ///
    /// # Errors
    /// `CalibrationError::Aborted` when the preview stopped before publishing
    /// anything; without operator-confirmed parameters a mapping run would be
    /// garbage, so callers must treat this as fatal.
    pub fn result(&mut self) -> Result<CalibrationParams, CalibrationError> {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.state = SessionState::Stopped;

        if let Some(rx) = &self.params_rx {
            if let Some(params) = drain_latest(rx) {
                self.last_params = Some(params);
            }
        }

        self.last_params.ok_or(CalibrationError::Aborted)
    }
}

impl Drop for CalibrationSession {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_latest_keeps_only_newest() {
        let (tx, rx) = mpsc::channel();
        tx.send(CalibrationParams {
            contrast: 1,
            threshold: 10,
        })
        .unwrap();
        tx.send(CalibrationParams {
            contrast: 2,
            threshold: 20,
        })
        .unwrap();
        tx.send(CalibrationParams {
            contrast: 3,
            threshold: 30,
        })
        .unwrap();

        let latest = drain_latest(&rx).unwrap();
        assert_eq!(latest.contrast, 3);
        assert_eq!(latest.threshold, 30);
        // The queue is now empty; a second read yields nothing.
        assert!(drain_latest(&rx).is_none());
    }

    #[test]
    fn test_drain_latest_empty_channel() {
        let (_tx, rx) = mpsc::channel::<CalibrationParams>();
        assert!(drain_latest(&rx).is_none());
    }

    #[test]
    fn test_drain_latest_after_sender_dropped() {
        let (tx, rx) = mpsc::channel();
        tx.send(CalibrationParams {
            contrast: 2,
            threshold: 128,
        })
        .unwrap();
        drop(tx);
        // Queued values survive the sender; the last one is still returned.
        let latest = drain_latest(&rx).unwrap();
        assert_eq!(latest.threshold, 128);
    }

    #[test]
    fn test_new_session_is_idle() {
        let session =
            CalibrationSession::new(CameraSettings::default(), CalibrationParams::default());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_result_without_start_is_aborted() {
        let mut session =
            CalibrationSession::new(CameraSettings::default(), CalibrationParams::default());
        assert!(matches!(
            session.result(),
            Err(CalibrationError::Aborted)
        ));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_calibration_error_display() {
        let msg = format!("{}", CalibrationError::Aborted);
        assert!(msg.contains("before any frame"));
    }
}
