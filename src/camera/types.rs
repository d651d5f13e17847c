//! Shared camera types: frames, resolutions, settings, and errors.

use std::fmt;

/// Information about an available camera device.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Device index for selection
    pub index: u32,
    /// Human-readable device name
    pub name: String,
    /// Device description
    pub description: String,
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.description)
    }
}

/// Camera resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Low resolution (320x240), fast but coarse LED positions
    pub const LOW: Resolution = Resolution {
        width: 320,
        height: 240,
    };

    /// Medium resolution (640x480), recommended
    pub const MEDIUM: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// High resolution (1280x720), for large or dense installations
    pub const HIGH: Resolution = Resolution {
        width: 1280,
        height: 720,
    };
}

impl Default for Resolution {
    fn default() -> Self {
        Self::MEDIUM
    }
}

/// Settings for opening a camera.
#[derive(Debug, Clone, Copy)]
pub struct CameraSettings {
    /// Camera device index
    pub device_index: u32,
    /// Capture resolution
    pub resolution: Resolution,
    /// Target FPS (actual may vary)
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            resolution: Resolution::default(),
            fps: 30,
        }
    }
}

/// A captured camera frame in RGB format (3 bytes per pixel).
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data, row-major RGB
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Perceptual luma of the pixel at `(x, y)`.
    ///
    /// # Panics
    /// Panics if the coordinate lies outside the frame.
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        assert!(x < self.width && y < self.height);
        let i = ((y * self.width + x) * 3) as usize;
        let r = self.data[i] as u32;
        let g = self.data[i + 1] as u32;
        let b = self.data[i + 2] as u32;
        // ITU-R BT.601 integer approximation
        ((r * 299 + g * 587 + b * 114) / 1000) as u8
    }

    /// View the frame as an `image` crate RGB buffer.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("frame data length matches dimensions")
    }
}

/// Errors that can occur during camera operations.
#[derive(Debug)]
pub enum CameraError {
    /// Failed to query camera devices
    QueryFailed(String),
    /// Camera device cannot be opened
    DeviceUnavailable { index: u32, reason: String },
    /// Failed to start the video stream
    StreamFailed(String),
    /// A frame read yielded nothing
    FrameReadFailure,
    /// The capture thread is gone
    Disconnected,
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::QueryFailed(msg) => write!(f, "Failed to query cameras: {}", msg),
            CameraError::DeviceUnavailable { index, reason } => {
                write!(
                    f,
                    "Camera device {} unavailable: {}. Run 'led-mapper list-cameras' to see available devices",
                    index, reason
                )
            }
            CameraError::StreamFailed(msg) => write!(f, "Failed to start camera stream: {}", msg),
            CameraError::FrameReadFailure => write!(f, "Camera read returned no frame"),
            CameraError::Disconnected => write!(f, "Camera capture thread is gone"),
        }
    }
}

impl std::error::Error for CameraError {}
