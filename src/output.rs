//! Emission of the ledmap artifact and the diagnostic image.
//!
//! The ledmap JSON is the consumer-facing contract: `map` is the row-major
//! flattening of the compacted grid, matching how the controller fills its
//! 2-D layout row by row. The diagnostic image is for humans: the final
//! camera view with every located LED marked.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut};
use serde::Serialize;

use crate::camera::Frame;
use crate::grid::CompactGrid;
use crate::mapping::Observation;

/// Radius of the circle drawn around each located LED.
const MARKER_RADIUS: i32 = 5;

/// Marker color on the diagnostic image.
const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// WLED ledmap document shape.
#[derive(Debug, Serialize)]
struct LedmapDocument<'a> {
    n: &'a str,
    width: usize,
    height: usize,
    map: &'a [i32],
}

/// Errors that can occur while writing artifacts.
#[derive(Debug)]
pub enum OutputError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    Serialize(serde_json::Error),
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputError::Io { path, source } => {
                write!(f, "Failed to write '{}': {}", path.display(), source)
            }
            OutputError::Image { path, source } => {
                write!(f, "Failed to save image '{}': {}", path.display(), source)
            }
            OutputError::Serialize(e) => write!(f, "Failed to serialize ledmap: {}", e),
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutputError::Io { source, .. } => Some(source),
            OutputError::Image { source, .. } => Some(source),
            OutputError::Serialize(source) => Some(source),
        }
    }
}

/// Serialize the compacted grid as a WLED ledmap JSON document.
pub fn ledmap_json(name: &str, grid: &CompactGrid) -> Result<String, OutputError> {
    serde_json::to_string(&LedmapDocument {
        n: name,
        width: grid.width(),
        height: grid.height(),
        map: grid.cells(),
    })
    .map_err(OutputError::Serialize)
}

/// Write `<name>.json` under `dir`, creating the directory if needed.
///
/// Returns the path of the written file.
pub fn write_ledmap(dir: &Path, name: &str, grid: &CompactGrid) -> Result<PathBuf, OutputError> {
    let json = ledmap_json(name, grid)?;
    fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(format!("{}.json", name));
    fs::write(&path, json).map_err(|source| OutputError::Io {
        path: path.clone(),
        source,
    })?;

    log::info!("Wrote ledmap {}", path.display());
    Ok(path)
}

/// Draw a marker at every located LED on a desaturated copy of the frame.
///
/// Desaturating first makes the markers stand out regardless of scene color.
pub fn annotate_frame(frame: &Frame, observations: &[Observation]) -> RgbImage {
    let mut image = RgbImage::new(frame.width, frame.height);
    for y in 0..frame.height {
        for x in 0..frame.width {
            let luma = frame.luma_at(x, y);
            image.put_pixel(x, y, Rgb([luma, luma, luma]));
        }
    }

    for (x, y) in observations.iter().filter_map(|o| o.coordinate) {
        draw_hollow_circle_mut(&mut image, (x as i32, y as i32), MARKER_RADIUS, MARKER_COLOR);
        draw_cross_mut(&mut image, MARKER_COLOR, x as i32, y as i32);
    }

    image
}

/// Write `<name>.png` under `dir`: the frame annotated with every located LED.
///
/// Returns the path of the written file.
pub fn write_diagnostic_image(
    dir: &Path,
    name: &str,
    frame: &Frame,
    observations: &[Observation],
) -> Result<PathBuf, OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(format!("{}.png", name));
    let image = annotate_frame(frame, observations);
    image.save(&path).map_err(|source| OutputError::Image {
        path: path.clone(),
        source,
    })?;

    log::info!("Wrote diagnostic image {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid;

    fn sample_grid() -> CompactGrid {
        let observations = vec![
            Observation {
                index: 0,
                coordinate: Some((2, 2)),
            },
            Observation {
                index: 1,
                coordinate: Some((2, 3)),
            },
            Observation {
                index: 2,
                coordinate: Some((3, 2)),
            },
        ];
        grid::compact(&observations).unwrap().0
    }

    #[test]
    fn test_ledmap_json_shape() {
        let json = ledmap_json("cvMap", &sample_grid()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["n"], "cvMap");
        assert_eq!(value["width"], 2);
        assert_eq!(value["height"], 2);
        let map = value["map"].as_array().unwrap();
        assert_eq!(map.len(), 4);
        // Row-major: row y=0 is [0, 2], row y=1 is [1, -1].
        assert_eq!(map[0], 0);
        assert_eq!(map[1], 2);
        assert_eq!(map[2], 1);
        assert_eq!(map[3], -1);
    }

    #[test]
    fn test_write_ledmap_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_ledmap(dir.path(), "cvMap", &sample_grid()).unwrap();
        assert!(path.exists());
        assert!(path.ends_with("cvMap.json"));
        let content = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["width"], 2);
    }

    #[test]
    fn test_annotate_frame_marks_positions() {
        let frame = Frame {
            data: vec![0; 64 * 48 * 3],
            width: 64,
            height: 48,
        };
        let observations = vec![
            Observation {
                index: 0,
                coordinate: Some((20, 20)),
            },
            Observation {
                index: 1,
                coordinate: None,
            },
        ];
        let image = annotate_frame(&frame, &observations);
        // The cross passes through the LED position itself.
        assert_eq!(image.get_pixel(20, 20).0, [255, 0, 0]);
        // Far corner stays untouched black.
        assert_eq!(image.get_pixel(60, 44).0, [0, 0, 0]);
    }

    #[test]
    fn test_write_diagnostic_image_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame {
            data: vec![0; 16 * 16 * 3],
            width: 16,
            height: 16,
        };
        let path = write_diagnostic_image(dir.path(), "cvMap", &frame, &[]).unwrap();
        assert!(path.exists());
        assert!(path.ends_with("cvMap.png"));
    }
}
