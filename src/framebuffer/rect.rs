use crate::{Sink, Source};

use super::{
    line::hline_fast_impl, remap_draw_color, set_pixel_impl, Screen, Wasm4Screen, DRAW_COLOR_1,
    DRAW_COLOR_2,
};

/// Draw a rectangle.
///
/// The first draw color fills it, the second strokes a 1px border along the
/// inside of its unclipped bounds. A negative `width` or `height` leaves an
/// empty span: nothing is filled and only the left or top edge can remain.
pub fn rect<T: Source<u8> + Sink<u8> + ?Sized>(
    fb: &mut T,
    draw_colors: u16,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) {
    rect_impl(&mut Wasm4Screen { fb }, draw_colors, x, y, width, height)
}

pub(crate) fn rect_impl<S: Screen>(
    screen: &mut S,
    draw_colors: u16,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) {
    let (x, y) = (x as i64, y as i64);
    let (screen_width, screen_height) = (S::WIDTH as i64, S::HEIGHT as i64);

    let start_x = x.max(0);
    let start_y = y.max(0);
    let end_x_unclamped = x + width as i64;
    let end_y_unclamped = y + height as i64;
    let end_x = end_x_unclamped.min(screen_width);
    let end_y = end_y_unclamped.min(screen_height);

    if let Some(fill) = remap_draw_color(DRAW_COLOR_1, draw_colors) {
        for fy in start_y..end_y {
            hline_fast_impl(screen, fill, start_x, fy, end_x);
        }
    }

    if let Some(stroke) = remap_draw_color(DRAW_COLOR_2, draw_colors) {
        // left
        if (0..screen_width).contains(&x) {
            for sy in start_y..end_y {
                set_pixel_impl(screen, x, sy, stroke);
            }
        }

        // right
        if end_x_unclamped > 0 && end_x_unclamped <= screen_width {
            for sy in start_y..end_y {
                set_pixel_impl(screen, end_x_unclamped - 1, sy, stroke);
            }
        }

        // top
        if (0..screen_height).contains(&y) {
            hline_fast_impl(screen, stroke, start_x, y, end_x);
        }

        // bottom
        if end_y_unclamped > 0 && end_y_unclamped <= screen_height {
            hline_fast_impl(screen, stroke, start_x, end_y_unclamped - 1, end_x);
        }
    }
}
