//! Diagnostics drawn straight onto the display, bypassing the framebuffer.

use crate::{
    display::Display,
    framebuffer::font::{FIRST_GLYPH, FONT, GLYPH_SIZE},
    palette::OutputColor,
    wasm4::SCREEN_SIZE,
};

use super::Fault;

const BANNER: &str = "ERROR!";
const BANNER_SCALE: u32 = 2;
const MARGIN: i64 = 5;
const LINE_PITCH: i64 = 10;
const HEADING_Y: i64 = 63;

/// Widest message line in pixels.
const WRAP_WIDTH: u32 = SCREEN_SIZE - 10;

/// Output colors used for the fault overlay and the frame-time label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayStyle {
    pub panel: OutputColor,
    pub banner: OutputColor,
    pub shadow: OutputColor,
    pub text: OutputColor,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            panel: OutputColor(12),
            banner: OutputColor(8),
            shadow: OutputColor(0),
            text: OutputColor(7),
        }
    }
}

/// Split a fault message into lines that fit the overlay, breaking at `\n`
/// and wherever the next character would overflow.
pub fn wrap_message(message: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for c in message.chars() {
        let width = (line.chars().count() as u32 + 1) * GLYPH_SIZE;
        if c == '\n' || width > WRAP_WIDTH {
            lines.push(std::mem::take(&mut line));
        }
        if c != '\n' {
            line.push(c);
        }
    }
    lines.push(line);

    lines
}

/// Writes screen-relative pixels to the display at `origin`.
struct Painter<'a, D: Display + ?Sized> {
    display: &'a mut D,
    origin: (i64, i64),
    /// Screen-relative `(x1, y1, x2, y2)`, end exclusive.
    clip: Option<(i64, i64, i64, i64)>,
}

impl<'a, D: Display + ?Sized> Painter<'a, D> {
    fn set(&mut self, x: i64, y: i64, color: OutputColor) {
        if let Some((x1, y1, x2, y2)) = self.clip {
            if x < x1 || x >= x2 || y < y1 || y >= y2 {
                return;
            }
        }
        let (Ok(px), Ok(py)) = (
            u32::try_from(self.origin.0 + x),
            u32::try_from(self.origin.1 + y),
        ) else {
            return;
        };
        self.display.set_pixel(px, py, color);
    }

    fn fill(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color: OutputColor) {
        for y in y1..y2 {
            for x in x1..x2 {
                self.set(x, y, color);
            }
        }
    }

    /// Draw the set bits of each glyph, leaving the background alone.
    fn text(&mut self, text: &str, x: i64, y: i64, scale: u32, color: OutputColor) {
        let scale = scale as i64;
        let advance = GLYPH_SIZE as i64 * scale;

        for (n, c) in text.chars().enumerate() {
            let glyph = glyph_index(c);
            let left = x + n as i64 * advance;

            for row in 0..GLYPH_SIZE as usize {
                let bits = FONT
                    .get(glyph * GLYPH_SIZE as usize + row)
                    .copied()
                    .unwrap_or(0);
                for col in 0..GLYPH_SIZE as usize {
                    if bits & (0x80 >> col) == 0 {
                        continue;
                    }
                    let gx = left + col as i64 * scale;
                    let gy = y + row as i64 * scale;
                    self.fill(gx, gy, gx + scale, gy + scale, color);
                }
            }
        }
    }
}

fn glyph_index(c: char) -> usize {
    let c = match u8::try_from(c) {
        Ok(c) if c >= FIRST_GLYPH && (c as usize) < FIRST_GLYPH as usize + FONT.len() / 8 => c,
        _ => b'?',
    };
    (c - FIRST_GLYPH) as usize
}

fn text_width(text: &str, scale: u32) -> i64 {
    (text.chars().count() as u32 * GLYPH_SIZE * scale) as i64
}

/// Draw the fault banner, heading and wrapped message over the screen area.
pub(crate) fn draw_fault<D: Display + ?Sized>(
    display: &mut D,
    origin: (u32, u32),
    fault: &Fault,
    style: &OverlayStyle,
) {
    let screen = SCREEN_SIZE as i64;
    let mut painter = Painter {
        display,
        origin: (origin.0 as i64, origin.1 as i64),
        clip: Some((0, 0, screen, screen)),
    };

    let banner_width = text_width(BANNER, BANNER_SCALE);
    let banner_x = (screen - banner_width) / 2;
    let banner_height = (GLYPH_SIZE * BANNER_SCALE) as i64;
    painter.fill(
        banner_x - MARGIN,
        11,
        banner_x + banner_width + MARGIN,
        banner_height * 2 + MARGIN,
        style.panel,
    );
    painter.text(BANNER, banner_x + 1, 17, BANNER_SCALE, style.shadow);
    painter.text(BANNER, banner_x, 16, BANNER_SCALE, style.banner);

    painter.fill(0, HEADING_Y, screen, HEADING_Y + LINE_PITCH, style.panel);
    painter.text(fault.heading(), MARGIN, HEADING_Y + 1, 1, style.text);

    let lines = wrap_message(&fault.message());
    let body_y = HEADING_Y + LINE_PITCH;
    painter.fill(
        0,
        body_y,
        screen,
        body_y + 2 + lines.len() as i64 * LINE_PITCH,
        style.panel,
    );
    for (n, line) in lines.iter().enumerate() {
        painter.text(line, MARGIN, body_y + 1 + n as i64 * LINE_PITCH, 1, style.text);
    }
}

/// Draw "TIME: <ms>" in a strip just above the screen area.
pub(crate) fn draw_frame_time<D: Display + ?Sized>(
    display: &mut D,
    origin: (u32, u32),
    elapsed_ms: u64,
    style: &OverlayStyle,
) {
    let mut painter = Painter {
        display,
        origin: (origin.0 as i64, origin.1 as i64),
        clip: None,
    };
    painter.fill(0, -18, 80, -8, style.shadow);
    painter.text(&format!("TIME: {elapsed_ms}"), 2, -17, 1, style.text);
}
