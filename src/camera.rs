//! Camera access: device enumeration, frame types, and the capture worker.
//!
//! The capture backend is blocking and its handle is not `Send`, so every
//! consumer owns its camera on a dedicated thread: the calibration preview
//! holds one directly for its whole loop, and the mapping loop talks to a
//! [`CameraWorker`] over channels.

mod device;
mod types;
mod worker;

pub use device::list_devices;
pub use types::{CameraError, CameraInfo, CameraSettings, Frame, Resolution};
pub use worker::CameraWorker;

pub(crate) use device::{open_stream, read_frame};
