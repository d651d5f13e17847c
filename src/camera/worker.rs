//! Single-shot capture worker owning the camera handle.
//!
//! The underlying camera handle is not `Send`, so it lives on a dedicated
//! thread for its entire lifetime. The mapping loop requests exactly one
//! frame at a time over a command channel and awaits the reply without
//! blocking the async runtime.

use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use tokio::sync::oneshot;

use super::device::{open_stream, read_frame};
use super::types::{CameraError, CameraSettings, Frame, Resolution};

/// Commands sent to the capture thread.
enum WorkerCommand {
    /// Capture one frame and reply with the result
    Capture(oneshot::Sender<Result<Frame, CameraError>>),
    /// Shut down the thread
    Stop,
}

/// Handle to the camera capture thread.
///
/// `open()` spawns the thread and fails fast if the device cannot be opened.
/// Each `capture()` call reads exactly one fresh frame. `release()` (or drop)
/// stops the stream and joins the thread.
pub struct CameraWorker {
    command_tx: Option<Sender<WorkerCommand>>,
    thread: Option<JoinHandle<()>>,
    resolution: Resolution,
}

impl std::fmt::Debug for CameraWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraWorker")
            .field("resolution", &self.resolution)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl CameraWorker {
    /// Open the camera on its own thread.
    ///
    /// Blocks until the thread reports that the stream is up, so device
    /// failures surface here rather than on the first capture.
    ///
    /// # Errors
    /// * `CameraError::DeviceUnavailable` - the device cannot be opened
    /// * `CameraError::StreamFailed` - the stream did not start
    pub fn open(settings: CameraSettings) -> Result<Self, CameraError> {
        let (command_tx, command_rx) = mpsc::channel::<WorkerCommand>();
        let (info_tx, info_rx) = mpsc::channel::<Result<Resolution, CameraError>>();

        // The camera is created inside the thread since the handle isn't Send.
        let handle = std::thread::spawn(move || {
            let mut camera = match open_stream(&settings) {
                Ok(cam) => cam,
                Err(e) => {
                    let _ = info_tx.send(Err(e));
                    return;
                }
            };

            let res = camera.resolution();
            let _ = info_tx.send(Ok(Resolution {
                width: res.width(),
                height: res.height(),
            }));

            while let Ok(command) = command_rx.recv() {
                match command {
                    WorkerCommand::Capture(reply) => {
                        let _ = reply.send(read_frame(&mut camera));
                    }
                    WorkerCommand::Stop => break,
                }
            }

            let _ = camera.stop_stream();
        });

        match info_rx.recv() {
            Ok(Ok(resolution)) => Ok(Self {
                command_tx: Some(command_tx),
                thread: Some(handle),
                resolution,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CameraError::Disconnected)
            }
        }
    }

    /// The resolution the camera actually opened with.
    ///
    /// May differ from the requested resolution if the camera doesn't
    /// support it exactly; located coordinates are bounded by this.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Capture exactly one frame.
    ///
    /// # Errors
    /// * `CameraError::FrameReadFailure` - the camera read yielded nothing
    /// * `CameraError::Disconnected` - the capture thread is gone
    pub async fn capture(&self) -> Result<Frame, CameraError> {
        let tx = self.command_tx.as_ref().ok_or(CameraError::Disconnected)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(WorkerCommand::Capture(reply_tx))
            .map_err(|_| CameraError::Disconnected)?;
        reply_rx.await.map_err(|_| CameraError::Disconnected)?
    }

    /// Check if the capture thread is currently running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the capture thread and release the device.
    pub fn release(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(WorkerCommand::Stop);
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraWorker {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_invalid_device_fails_fast() {
        // A device index this high is very unlikely to exist; open() must
        // report the failure instead of deferring it to the first capture.
        let settings = CameraSettings {
            device_index: 999,
            ..CameraSettings::default()
        };
        let result = CameraWorker::open(settings);
        assert!(result.is_err());
    }
}
