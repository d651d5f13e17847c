//! Terminal rendering for the calibration preview.
//!
//! The preview shows the live threshold mask as ASCII so the operator can see
//! exactly what the blob detector sees while tuning contrast and threshold.
//! Everything here is blocking and runs on the calibration thread.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode};
use crossterm::style::Print;
use crossterm::{cursor, execute, queue, terminal};
use image::RgbImage;

use crate::vision::CalibrationParams;

/// ASCII density ramp (10 levels), darkest to brightest.
const ASCII_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// How long `poll_action` waits for a key press between frames.
pub const KEY_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Operator action decoded from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewAction {
    ThresholdUp,
    ThresholdDown,
    ContrastUp,
    ContrastDown,
    Exit,
}

impl PreviewAction {
    /// Apply the action to the current parameters.
    pub fn apply(self, params: CalibrationParams) -> CalibrationParams {
        match self {
            PreviewAction::ThresholdUp => CalibrationParams {
                threshold: params.threshold.saturating_add(5),
                ..params
            },
            PreviewAction::ThresholdDown => CalibrationParams {
                threshold: params.threshold.saturating_sub(5),
                ..params
            },
            PreviewAction::ContrastUp => CalibrationParams {
                contrast: params
                    .contrast
                    .saturating_add(1)
                    .min(CalibrationParams::MAX_CONTRAST),
                ..params
            },
            PreviewAction::ContrastDown => CalibrationParams {
                contrast: params.contrast.saturating_sub(1).max(1),
                ..params
            },
            PreviewAction::Exit => params,
        }
    }
}

/// Raw-mode terminal session for the preview.
///
/// Raw mode and the hidden cursor are restored on drop, so an error path
/// can't leave the operator's terminal broken.
pub struct PreviewTerminal {
    char_buffer: Vec<char>,
}

impl PreviewTerminal {
    /// Enter raw mode and clear the screen.
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(
            io::stdout(),
            terminal::Clear(terminal::ClearType::All),
            cursor::Hide
        )?;
        Ok(Self {
            char_buffer: Vec::new(),
        })
    }

    /// Draw one preview frame: the mask as ASCII plus a status line.
    pub fn draw(
        &mut self,
        overlay: &RgbImage,
        params: CalibrationParams,
        position: Option<(u32, u32)>,
    ) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        let cols = cols.max(20) as u32;
        // Reserve the last row for status.
        let view_rows = rows.saturating_sub(1).max(1) as u32;

        render_ascii_into(overlay, cols, view_rows, &mut self.char_buffer);

        let mut stdout = io::stdout();
        for y in 0..view_rows {
            let start = (y * cols) as usize;
            let line: String = self.char_buffer[start..start + cols as usize]
                .iter()
                .collect();
            queue!(stdout, cursor::MoveTo(0, y as u16), Print(line))?;
        }

        let located = match position {
            Some((x, y)) => format!("LED at ({}, {})", x, y),
            None => "no LED found".to_string(),
        };
        let status = format!(
            " contrast {}  threshold {}  |  {}  |  [a/d] contrast  [w/s] threshold  [esc] done",
            params.contrast, params.threshold, located
        );
        let mut status: String = status.chars().take(cols as usize).collect();
        while (status.chars().count() as u32) < cols {
            status.push(' ');
        }
        queue!(stdout, cursor::MoveTo(0, view_rows as u16), Print(status))?;
        stdout.flush()
    }

    /// Wait up to [`KEY_POLL_INTERVAL`] for a key press and decode it.
    pub fn poll_action(&self) -> io::Result<Option<PreviewAction>> {
        if !event::poll(KEY_POLL_INTERVAL)? {
            return Ok(None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(None);
        };
        Ok(decode_key(key.code))
    }
}

impl Drop for PreviewTerminal {
    fn drop(&mut self) {
        let _ = execute!(
            io::stdout(),
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0),
            cursor::Show
        );
        let _ = terminal::disable_raw_mode();
    }
}

/// Map a key code to a preview action.
fn decode_key(code: KeyCode) -> Option<PreviewAction> {
    match code {
        KeyCode::Char('w') | KeyCode::Char('W') | KeyCode::Up => {
            Some(PreviewAction::ThresholdUp)
        }
        KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Down => {
            Some(PreviewAction::ThresholdDown)
        }
        KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Right => {
            Some(PreviewAction::ContrastUp)
        }
        KeyCode::Char('a') | KeyCode::Char('A') | KeyCode::Left => {
            Some(PreviewAction::ContrastDown)
        }
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Some(PreviewAction::Exit),
        _ => None,
    }
}

/// Downsample an image to `cols` x `rows` characters from the density ramp.
///
/// Nearest-neighbor sampling is plenty for a binary mask, and keeps the
/// per-frame cost trivial. The buffer is reused across frames.
fn render_ascii_into(image: &RgbImage, cols: u32, rows: u32, out: &mut Vec<char>) {
    out.clear();
    out.reserve((cols * rows) as usize);
    let (width, height) = image.dimensions();

    for y in 0..rows {
        for x in 0..cols {
            let sx = (x * width / cols).min(width.saturating_sub(1));
            let sy = (y * height / rows).min(height.saturating_sub(1));
            let p = image.get_pixel(sx, sy).0;
            let luma = (p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000;
            let level = (luma as usize * (ASCII_RAMP.len() - 1)) / 255;
            out.push(ASCII_RAMP[level]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_apply_threshold_saturates() {
        let params = CalibrationParams {
            contrast: 1,
            threshold: 253,
        };
        let up = PreviewAction::ThresholdUp.apply(params);
        assert_eq!(up.threshold, 255);

        let params = CalibrationParams {
            contrast: 1,
            threshold: 3,
        };
        let down = PreviewAction::ThresholdDown.apply(params);
        assert_eq!(down.threshold, 0);
    }

    #[test]
    fn test_apply_contrast_clamps() {
        let params = CalibrationParams {
            contrast: CalibrationParams::MAX_CONTRAST,
            threshold: 230,
        };
        assert_eq!(
            PreviewAction::ContrastUp.apply(params).contrast,
            CalibrationParams::MAX_CONTRAST
        );

        let params = CalibrationParams {
            contrast: 1,
            threshold: 230,
        };
        // Contrast 0 would blank the mask entirely; the floor is 1.
        assert_eq!(PreviewAction::ContrastDown.apply(params).contrast, 1);
    }

    #[test]
    fn test_decode_key_bindings() {
        assert_eq!(decode_key(KeyCode::Esc), Some(PreviewAction::Exit));
        assert_eq!(decode_key(KeyCode::Char('q')), Some(PreviewAction::Exit));
        assert_eq!(decode_key(KeyCode::Up), Some(PreviewAction::ThresholdUp));
        assert_eq!(
            decode_key(KeyCode::Char('a')),
            Some(PreviewAction::ContrastDown)
        );
        assert_eq!(decode_key(KeyCode::Tab), None);
    }

    #[test]
    fn test_render_ascii_dimensions() {
        let mut image = RgbImage::new(8, 8);
        for p in image.pixels_mut() {
            *p = Rgb([255, 255, 255]);
        }
        let mut buffer = Vec::new();
        render_ascii_into(&image, 4, 2, &mut buffer);
        assert_eq!(buffer.len(), 8);
        // Fully white image maps to the brightest ramp character.
        assert!(buffer.iter().all(|&c| c == '@'));
    }

    #[test]
    fn test_render_ascii_black_is_blank() {
        let image = RgbImage::new(8, 8);
        let mut buffer = Vec::new();
        render_ascii_into(&image, 4, 4, &mut buffer);
        assert!(buffer.iter().all(|&c| c == ' '));
    }
}
