//! Drawing primitives for the packed 2bpp framebuffer.
//!
//! Pixels are stored row-major, four per byte, with the leftmost pixel in the
//! two most significant bits.

use crate::{wasm4::SCREEN_SIZE, Sink, Source};


mod blit;
pub mod font;
mod line;
mod oval;
mod rect;
mod text;

pub use blit::{blit_sub, sprite_bytes_needed, PixelFormat};
pub use line::{hline, line, vline};
pub use oval::oval;
pub use rect::rect;
pub use text::text;

pub(crate) use line::hline_unclipped_impl;

const DRAW_COLOR_1: u8 = 0;
const DRAW_COLOR_2: u8 = 1;

/// A common trait for index-based framebuffers.
pub(crate) trait Screen {
    type Framebuffer: Source<u8> + Sink<u8> + ?Sized;
    const WIDTH: u32;
    const HEIGHT: u32;
    fn fb(&self) -> &Self::Framebuffer;
    fn fb_mut(&mut self) -> &mut Self::Framebuffer;
}

/// The console's 160x160 [`Screen`].
pub(crate) struct Wasm4Screen<'a, B: Sink<u8> + Source<u8> + ?Sized> {
    pub(crate) fb: &'a mut B,
}

impl<'a, B: Sink<u8> + Source<u8> + ?Sized> Screen for Wasm4Screen<'a, B> {
    type Framebuffer = B;
    const WIDTH: u32 = SCREEN_SIZE;
    const HEIGHT: u32 = SCREEN_SIZE;

    fn fb(&self) -> &Self::Framebuffer {
        self.fb
    }

    fn fb_mut(&mut self) -> &mut Self::Framebuffer {
        self.fb
    }
}

/// Byte offset and bit shift of the pixel with the given linear index.
fn pixel_location(index: i64) -> Option<(usize, u8)> {
    let offset = usize::try_from(index >> 2).ok()?;
    let shift = 6 - ((index & 0x3) << 1) as u8;
    Some((offset, shift))
}

/// Set a pixel to a palette index. Out-of-bounds coordinates are ignored.
pub fn set_pixel<T: Source<u8> + Sink<u8> + ?Sized>(fb: &mut T, x: i32, y: i32, color: u8) {
    set_pixel_unclipped_impl(&mut Wasm4Screen { fb }, x as i64, y as i64, color)
}

/// Palette index of a pixel, or 0 outside the screen.
pub fn get_pixel<T: Source<u8> + ?Sized>(fb: &T, x: i32, y: i32) -> u8 {
    read_pixel(fb, SCREEN_SIZE, SCREEN_SIZE, x as i64, y as i64)
}

/// Callers guarantee `(x, y)` lies on the screen.
pub(crate) fn set_pixel_impl<S: Screen>(s: &mut S, x: i64, y: i64, color: u8) {
    let Some((offset, shift)) = pixel_location(S::WIDTH as i64 * y + x) else {
        return;
    };
    let mask = 0x3 << shift;

    if let Some(fb_byte) = s.fb().item_at(offset) {
        s.fb_mut()
            .set_item_at(offset, ((color & 0x3) << shift) | (fb_byte & !mask));
    }
}

/// Set a pixel, clipping if out of bounds.
pub(crate) fn set_pixel_unclipped_impl<S: Screen>(s: &mut S, x: i64, y: i64, color: u8) {
    if on_screen::<S>(x, y) {
        set_pixel_impl(s, x, y, color);
    }
}

fn read_pixel<T: Source<u8> + ?Sized>(fb: &T, width: u32, height: u32, x: i64, y: i64) -> u8 {
    if !(0..width as i64).contains(&x) || !(0..height as i64).contains(&y) {
        return 0;
    }
    pixel_location(width as i64 * y + x)
        .and_then(|(offset, shift)| fb.item_at(offset).map(|b| (b >> shift) & 0x3))
        .unwrap_or(0)
}

fn on_screen<S: Screen>(x: i64, y: i64) -> bool {
    (0..S::WIDTH as i64).contains(&x) && (0..S::HEIGHT as i64).contains(&y)
}

/// Clears an entire framebuffer.
pub fn clear<T: Sink<u8> + ?Sized>(fb: &mut T) {
    fb.fill(0u8);
}

/// Returns a Some<u8> palette index if the draw color at the index is opaque,
/// and None if transparent.
fn remap_draw_color(draw_color_idx: u8, draw_colors: u16) -> Option<u8> {
    let draw_color = (draw_colors as u32 >> (draw_color_idx as u32 * 4)) & 0xf;
    if draw_color == 0 {
        None
    } else {
        Some(((draw_color - 1) & 0x3) as u8)
    }
}
