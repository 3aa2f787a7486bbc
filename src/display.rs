//! The surface the framebuffer is shown on.

use crate::palette::OutputColor;

/// A pixel surface that receives the rendered screen.
///
/// Writes may be buffered by the implementation; [`Display::flush`] is
/// called exactly once per tick, after every write of that tick.
pub trait Display {
    fn set_pixel(&mut self, x: u32, y: u32, color: OutputColor);

    fn flush(&mut self);
}

/// An in-memory display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<OutputColor>,
    flushes: usize,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![OutputColor::default(); width as usize * height as usize],
            flushes: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<OutputColor> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn pixels(&self) -> &[OutputColor] {
        &self.pixels
    }

    /// How many times the canvas was flushed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Display for Canvas {
    fn set_pixel(&mut self, x: u32, y: u32, color: OutputColor) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y as usize * self.width as usize + x as usize;
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

impl<D: Display + ?Sized> Display for &mut D {
    fn set_pixel(&mut self, x: u32, y: u32, color: OutputColor) {
        (**self).set_pixel(x, y, color)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}
