use core::mem;

use crate::{Sink, Source};

use super::{
    remap_draw_color, set_pixel_impl, set_pixel_unclipped_impl, Screen, Wasm4Screen, DRAW_COLOR_1,
};

/// Draw a line between two points.
///
/// See <https://github.com/aduros/wasm4/blob/main/runtimes/native/src/framebuffer.c>,
/// who in turn took it from <https://github.com/nesbox/TIC-80/blob/master/src/core/draw.c>
pub fn line<T: Source<u8> + Sink<u8> + ?Sized>(
    fb: &mut T,
    draw_colors: u16,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
) {
    if let Some(stroke) = remap_draw_color(DRAW_COLOR_1, draw_colors) {
        line_impl(
            &mut Wasm4Screen { fb },
            stroke,
            x1 as i64,
            y1 as i64,
            x2 as i64,
            y2 as i64,
        );
    }
}

pub(crate) fn line_impl<T: Screen>(
    screen: &mut T,
    stroke: u8,
    mut x1: i64,
    mut y1: i64,
    mut x2: i64,
    mut y2: i64,
) {
    if y1 > y2 {
        mem::swap(&mut x1, &mut x2);
        mem::swap(&mut y1, &mut y2);
    }

    let dx = (x2 - x1).abs();
    let sx = if x1 < x2 { 1 } else { -1 };
    let dy = y2 - y1;

    let mut err = (if dx > dy { dx } else { -dy }) / 2;

    loop {
        set_pixel_unclipped_impl(screen, x1, y1, stroke);

        if x1 == x2 && y1 == y2 {
            break;
        }

        let err2 = err;

        if err2 > -dx {
            err -= dy;
            x1 += sx;
        }

        if err2 < dy {
            err += dx;
            y1 += 1;
        }
    }
}

/// Draw a horizontal line.
///
/// Specifically, between `(x, y)` and `(x + len - 1, y)`. A negative `len`
/// draws nothing.
pub fn hline<T: Source<u8> + Sink<u8> + ?Sized>(
    fb: &mut T,
    draw_colors: u16,
    x: i32,
    y: i32,
    len: i32,
) {
    if let Some(stroke) = remap_draw_color(DRAW_COLOR_1, draw_colors) {
        hline_impl(&mut Wasm4Screen { fb }, stroke, x as i64, y as i64, len);
    }
}

pub(crate) fn hline_impl<T: Screen>(screen: &mut T, stroke: u8, x: i64, y: i64, len: i32) {
    hline_unclipped_impl(screen, stroke, x, y, x + len as i64);
}

/// Fill `start_x..end_x` on row `y`, clipping both to the screen.
pub(crate) fn hline_unclipped_impl<T: Screen>(
    screen: &mut T,
    stroke: u8,
    start_x: i64,
    y: i64,
    end_x: i64,
) {
    if y < 0 || y >= T::HEIGHT as i64 {
        return;
    }

    let start_x = start_x.max(0);
    let end_x = end_x.min(T::WIDTH as i64);

    if start_x < end_x {
        hline_fast_impl(screen, stroke, start_x, y, end_x);
    }
}

/// Fill `start_x..end_x` on row `y`, writing whole bytes where four aligned
/// pixels are covered. Both ends must already be clipped.
pub(crate) fn hline_fast_impl<T: Screen>(
    screen: &mut T,
    stroke: u8,
    mut start_x: i64,
    y: i64,
    end_x: i64,
) {
    let fill_end = end_x - (end_x & 3);
    let fill_start = fill_end.min((start_x + 3) & !3);

    if fill_end - fill_start > 3 {
        for x in start_x..fill_start {
            set_pixel_impl(screen, x, y, stroke);
        }

        let from = ((T::WIDTH as i64 * y + fill_start) >> 2) as usize;
        let to = ((T::WIDTH as i64 * y + fill_end) >> 2) as usize;
        let byte_stroke = (stroke & 0x3) * 0x55;

        for idx in from..to {
            screen.fb_mut().set_item_at(idx, byte_stroke);
        }
        start_x = fill_end;
    }

    for x in start_x..end_x {
        set_pixel_impl(screen, x, y, stroke);
    }
}

/// Draw a vertical line. A negative `len` draws nothing.
pub fn vline<T: Source<u8> + Sink<u8> + ?Sized>(
    fb: &mut T,
    draw_colors: u16,
    x: i32,
    y: i32,
    len: i32,
) {
    if let Some(stroke) = remap_draw_color(DRAW_COLOR_1, draw_colors) {
        vline_impl(&mut Wasm4Screen { fb }, stroke, x as i64, y as i64, len);
    }
}

pub(crate) fn vline_impl<T: Screen>(screen: &mut T, stroke: u8, x: i64, y: i64, len: i32) {
    let end_y = y + len as i64;
    if end_y <= 0 || x < 0 || x >= T::WIDTH as i64 {
        return;
    }

    for y in y.max(0)..end_y.min(T::HEIGHT as i64) {
        set_pixel_impl(screen, x, y, stroke);
    }
}
