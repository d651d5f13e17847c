//! Integration tests for the locate → compact → emit pipeline.
//!
//! Drives the vision primitive with synthetic frames, feeds the resulting
//! observations through the compactor, and checks the emitted ledmap against
//! the wire contract, without touching a camera or a controller.

use led_mapper::camera::Frame;
use led_mapper::grid::{self, EMPTY_CELL};
use led_mapper::mapping::Observation;
use led_mapper::output;
use led_mapper::vision::{self, CalibrationParams};

const FRAME_WIDTH: u32 = 160;
const FRAME_HEIGHT: u32 = 120;

/// Black frame with one white 5x5 LED blob centered at `(cx, cy)`.
fn frame_with_led(cx: u32, cy: u32) -> Frame {
    let mut frame = Frame {
        data: vec![0; (FRAME_WIDTH * FRAME_HEIGHT * 3) as usize],
        width: FRAME_WIDTH,
        height: FRAME_HEIGHT,
    };
    for y in cy - 2..=cy + 2 {
        for x in cx - 2..=cx + 2 {
            let i = ((y * FRAME_WIDTH + x) * 3) as usize;
            frame.data[i] = 255;
            frame.data[i + 1] = 255;
            frame.data[i + 2] = 255;
        }
    }
    frame
}

/// Run the vision primitive over one synthetic frame per LED.
fn observe(centers: &[Option<(u32, u32)>]) -> Vec<Observation> {
    let params = CalibrationParams::default();
    centers
        .iter()
        .enumerate()
        .map(|(index, center)| {
            let frame = match center {
                Some((cx, cy)) => frame_with_led(*cx, *cy),
                None => Frame {
                    data: vec![0; (FRAME_WIDTH * FRAME_HEIGHT * 3) as usize],
                    width: FRAME_WIDTH,
                    height: FRAME_HEIGHT,
                },
            };
            let (coordinate, _) = vision::locate(&frame, params);
            Observation { index, coordinate }
        })
        .collect()
}

#[test]
fn test_strip_along_a_shelf_compacts_to_one_row() {
    // Five LEDs in a horizontal line, 10px apart.
    let centers: Vec<_> = (0..5).map(|i| Some((20 + i * 10, 60))).collect();
    let observations = observe(&centers);

    // Every LED was located at its blob center.
    for (i, obs) in observations.iter().enumerate() {
        assert_eq!(obs.coordinate, Some((20 + i as u32 * 10, 60)));
    }

    let (grid, collisions) = grid::compact(&observations).unwrap();
    assert!(collisions.is_empty());
    assert_eq!(grid.height(), 1);
    assert_eq!(grid.width(), 41); // 40px span, inclusive
    assert_eq!(grid.get(0, 0), 0);
    assert_eq!(grid.get(40, 0), 4);
    assert_eq!(grid.width() * grid.height(), grid.cells().len());
}

#[test]
fn test_dead_led_yields_missing_observation_not_abort() {
    let centers = vec![
        Some((30, 30)),
        None, // dead or occluded LED
        Some((50, 30)),
    ];
    let observations = observe(&centers);
    assert_eq!(observations.len(), 3);
    assert_eq!(observations[1].coordinate, None);

    let (grid, _) = grid::compact(&observations).unwrap();
    // Both located LEDs appear exactly once; the dead one appears nowhere.
    assert_eq!(grid.cells().iter().filter(|&&c| c == 0).count(), 1);
    assert_eq!(grid.cells().iter().filter(|&&c| c == 1).count(), 0);
    assert_eq!(grid.cells().iter().filter(|&&c| c == 2).count(), 1);
}

#[test]
fn test_all_dark_frames_is_empty_result_set() {
    let observations = observe(&[None, None, None]);
    assert!(matches!(
        grid::compact(&observations),
        Err(grid::GridError::EmptyResultSet)
    ));
}

#[test]
fn test_every_nonsentinel_cell_is_a_unique_index() {
    let centers = vec![
        Some((20, 20)),
        Some((40, 20)),
        Some((20, 50)),
        Some((40, 50)),
        Some((30, 35)),
    ];
    let observations = observe(&centers);
    let (grid, _) = grid::compact(&observations).unwrap();

    let mut seen = std::collections::HashSet::new();
    for &cell in grid.cells() {
        if cell != EMPTY_CELL {
            assert!(seen.insert(cell), "index {} appeared twice", cell);
        }
    }
    assert_eq!(seen.len(), 5);
}

#[test]
fn test_emitted_json_matches_grid_row_major() {
    let centers = vec![Some((20, 20)), Some((20, 30)), Some((30, 20))];
    let observations = observe(&centers);
    let (grid, _) = grid::compact(&observations).unwrap();

    let json = output::ledmap_json("cvMap", &grid).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["n"], "cvMap");
    assert_eq!(value["width"].as_u64().unwrap() as usize, grid.width());
    assert_eq!(value["height"].as_u64().unwrap() as usize, grid.height());

    let map = value["map"].as_array().unwrap();
    assert_eq!(map.len(), grid.width() * grid.height());
    // The JSON array is exactly the grid's row-major cell sequence.
    for (i, cell) in map.iter().enumerate() {
        assert_eq!(cell.as_i64().unwrap() as i32, grid.cells()[i]);
    }
}

#[test]
fn test_artifacts_written_to_output_dir() {
    let centers = vec![Some((20, 20)), Some((40, 40))];
    let observations = observe(&centers);
    let (grid, _) = grid::compact(&observations).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let json_path = output::write_ledmap(dir.path(), "testmap", &grid).unwrap();
    assert!(json_path.exists());

    let frame = frame_with_led(20, 20);
    let image_path =
        output::write_diagnostic_image(dir.path(), "testmap", &frame, &observations).unwrap();
    assert!(image_path.exists());
}
