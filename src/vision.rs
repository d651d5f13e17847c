//! Single-LED blob localization.
//!
//! Converts a frame to grayscale, applies contrast scaling and a binary
//! threshold, then groups bright pixels into 4-connected blobs. The centre of
//! the largest blob's bounding box is taken as the LED position. The
//! threshold mask, with the winning box outlined, is returned as a debug
//! overlay for the calibration preview and offline inspection.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::camera::Frame;

/// Operator-tuned vision parameters, published by the calibration preview.
///
/// `contrast` multiplies pixel luma (saturating) before thresholding;
/// `threshold` is the luma cutoff above which a pixel counts as lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationParams {
    pub contrast: u8,
    pub threshold: u8,
}

impl CalibrationParams {
    /// Highest useful contrast multiplier; beyond this everything saturates.
    pub const MAX_CONTRAST: u8 = 5;
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            contrast: 1,
            threshold: 230,
        }
    }
}

/// Blobs narrower or shorter than this are treated as sensor noise.
pub const MIN_BLOB_DIMENSION: u32 = 3;

/// Color of the bounding box drawn on the debug overlay.
const OVERLAY_BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Axis-aligned bounding box of a blob, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlobBox {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    area: u32,
}

impl BlobBox {
    fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    fn center(&self) -> (u32, u32) {
        (
            self.min_x + self.width() / 2,
            self.min_y + self.height() / 2,
        )
    }
}

/// Locate the single lit LED in a frame.
///
/// Returns the pixel position of the LED, or `None` when no blob passes the
/// minimum-dimension filter, together with the debug overlay. Pure aside from
/// the returned image; the coordinate, when present, lies within the frame.
pub fn locate(frame: &Frame, params: CalibrationParams) -> (Option<(u32, u32)>, RgbImage) {
    let mask = threshold_mask(frame, params);
    let blob = largest_blob(&mask, frame.width, frame.height);

    let mut overlay = mask_to_image(&mask, frame.width, frame.height);

    let position = blob.and_then(|b| {
        if b.width() >= MIN_BLOB_DIMENSION && b.height() >= MIN_BLOB_DIMENSION {
            draw_hollow_rect_mut(
                &mut overlay,
                Rect::at(b.min_x as i32, b.min_y as i32).of_size(b.width(), b.height()),
                OVERLAY_BOX_COLOR,
            );
            Some(b.center())
        } else {
            None
        }
    });

    (position, overlay)
}

/// Binary foreground mask after contrast scaling and thresholding.
fn threshold_mask(frame: &Frame, params: CalibrationParams) -> Vec<bool> {
    let contrast = params.contrast.min(CalibrationParams::MAX_CONTRAST) as u16;
    let threshold = params.threshold as u16;

    let mut mask = Vec::with_capacity((frame.width * frame.height) as usize);
    for y in 0..frame.height {
        for x in 0..frame.width {
            let scaled = (frame.luma_at(x, y) as u16 * contrast).min(255);
            mask.push(scaled > threshold);
        }
    }
    mask
}

/// Flood-fill the mask into 4-connected components and return the largest.
fn largest_blob(mask: &[bool], width: u32, height: u32) -> Option<BlobBox> {
    let mut visited = vec![false; mask.len()];
    let mut best: Option<BlobBox> = None;
    let mut stack = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }

        let mut blob = BlobBox {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            area: 0,
        };

        visited[start] = true;
        stack.push(start);
        while let Some(i) = stack.pop() {
            let x = (i as u32) % width;
            let y = (i as u32) / width;
            blob.min_x = blob.min_x.min(x);
            blob.min_y = blob.min_y.min(y);
            blob.max_x = blob.max_x.max(x);
            blob.max_y = blob.max_y.max(y);
            blob.area += 1;

            let mut visit = |nx: u32, ny: u32| {
                let ni = (ny * width + nx) as usize;
                if mask[ni] && !visited[ni] {
                    visited[ni] = true;
                    stack.push(ni);
                }
            };
            if x > 0 {
                visit(x - 1, y);
            }
            if x + 1 < width {
                visit(x + 1, y);
            }
            if y > 0 {
                visit(x, y - 1);
            }
            if y + 1 < height {
                visit(x, y + 1);
            }
        }

        if best.map_or(true, |b| blob.area > b.area) {
            best = Some(blob);
        }
    }

    best
}

/// Render the mask as a black-and-white RGB image.
fn mask_to_image(mask: &[bool], width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    for (i, &lit) in mask.iter().enumerate() {
        if lit {
            let x = (i as u32) % width;
            let y = (i as u32) / width;
            image.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
    image
}
