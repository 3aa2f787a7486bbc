use crate::{Sink, Source};

use super::{hline_unclipped_impl, set_pixel_unclipped_impl, Screen, Wasm4Screen};

/// Second draw color value that turns the whole oval off.
const NO_STROKE: i32 = 0xf;

/// Draw an oval (circle).
///
/// An axis parallel ellipse inside the box at `x`, `y` with the given `width`
/// and `height`. The first draw color fills it (0 for no fill). The second
/// draw color strokes it; unlike every other primitive a value of 0 still
/// strokes (with palette index 3), and 0xf draws nothing at all.
///
/// The algorithm aligns with what is implemented in W4's framebuffer.c, including
/// its 32-bit wrapping arithmetic.
pub fn oval<T: Sink<u8> + Source<u8> + ?Sized>(
    fb: &mut T,
    draw_colors: u16,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) {
    oval_impl(&mut Wasm4Screen { fb }, draw_colors, x, y, width, height)
}

pub(crate) fn oval_impl<T: Screen>(
    screen: &mut T,
    draw_colors: u16,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) {
    let dc0 = (draw_colors & 0xf) as i32;
    let dc1 = ((draw_colors >> 4) & 0xf) as i32;

    if dc1 == NO_STROKE {
        return;
    }

    let stroke = ((dc1 - 1) & 0x3) as u8;
    let fill = (dc0 != 0).then_some(((dc0 - 1) & 0x3) as u8);

    let plot = |screen: &mut T, x: i32, y: i32| {
        set_pixel_unclipped_impl(screen, x as i64, y as i64, stroke);
    };

    let mut a = width.wrapping_sub(1);
    let b = height.wrapping_sub(1);
    // odd heights get a single middle row, even heights two
    let mut b1 = b % 2;

    let mut north = y.wrapping_add(height / 2);
    let mut west = x;
    let mut east = x.wrapping_add(width).wrapping_sub(1);
    let mut south = north.wrapping_sub(b1);

    let mut dx = 4i32
        .wrapping_mul(1i32.wrapping_sub(a))
        .wrapping_mul(b)
        .wrapping_mul(b);
    let mut dy = 4i32.wrapping_mul(b1 + 1).wrapping_mul(a).wrapping_mul(a);
    let mut err = dx
        .wrapping_add(dy)
        .wrapping_add(b1.wrapping_mul(a).wrapping_mul(a));

    a = a.wrapping_mul(8i32.wrapping_mul(a));
    b1 = 8i32.wrapping_mul(b).wrapping_mul(b);

    loop {
        plot(screen, east, north);
        plot(screen, west, north);
        plot(screen, west, south);
        plot(screen, east, south);

        let start = west.wrapping_add(1);

        if let Some(fill) = fill {
            if east.wrapping_sub(start) > 0 {
                hline_unclipped_impl(screen, fill, start as i64, north as i64, east as i64);
                hline_unclipped_impl(screen, fill, start as i64, south as i64, east as i64);
            }
        }

        let err2 = err.wrapping_mul(2);

        if err2 <= dy {
            north = north.wrapping_add(1);
            south = south.wrapping_sub(1);
            dy = dy.wrapping_add(a);
            err = err.wrapping_add(dy);
        }

        if err2 >= dx || err.wrapping_mul(2) > dy {
            west = west.wrapping_add(1);
            east = east.wrapping_sub(1);
            dx = dx.wrapping_add(b1);
            err = err.wrapping_add(dx);
        }

        if west > east {
            break;
        }
    }

    // finish the flat top and bottom of very wide ovals
    while north.wrapping_sub(south) < height {
        plot(screen, west.wrapping_sub(1), north);
        plot(screen, east.wrapping_add(1), north);
        north = north.wrapping_add(1);

        plot(screen, west.wrapping_sub(1), south);
        plot(screen, east.wrapping_add(1), south);
        south = south.wrapping_sub(1);
    }
}
