use core::ops::Range;

use crate::{
    wasm4::{BLIT_2BPP, BLIT_FLIP_X, BLIT_FLIP_Y, BLIT_ROTATE},
    Sink, Source,
};

use super::{remap_draw_color, set_pixel_impl, Screen, Wasm4Screen};

/// Bit depth of sprite data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Blit1BPP,
    Blit2BPP,
}

impl PixelFormat {
    pub fn from_blit_flags(flags: u32) -> Self {
        if flags & BLIT_2BPP != 0 {
            Self::Blit2BPP
        } else {
            Self::Blit1BPP
        }
    }

    pub fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Blit1BPP => 1,
            Self::Blit2BPP => 2,
        }
    }
}

/// Copy a subregion within a larger sprite atlas to the framebuffer.
///
/// Each sprite pixel value selects one of the four draw colors; pixels whose
/// draw color is 0 are left untouched. With [`BLIT_ROTATE`] the sprite is
/// turned 90 degrees counter-clockwise, so the clip window is computed with
/// width and height swapped. A negative `width` or `height` draws nothing.
#[allow(clippy::too_many_arguments)]
pub fn blit_sub<S, T>(
    target: &mut T,
    sprite: &S,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    src_x: u32,
    src_y: u32,
    stride: u32,
    flags: u32,
    draw_colors: u16,
) where
    S: Source<u8> + ?Sized,
    T: Source<u8> + Sink<u8> + ?Sized,
{
    blit_sub_impl(
        &mut Wasm4Screen { fb: target },
        sprite,
        Placement {
            x: x as i64,
            y: y as i64,
            width: width as i64,
            height: height as i64,
        },
        SpriteRegion {
            src_x: src_x as i64,
            src_y: src_y as i64,
            stride: stride as i64,
        },
        flags,
        draw_colors,
    )
}

/// Where a sprite lands on screen.
#[derive(Clone, Copy)]
pub(crate) struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Which part of the sprite data is read.
#[derive(Clone, Copy)]
pub(crate) struct SpriteRegion {
    pub src_x: i64,
    pub src_y: i64,
    pub stride: i64,
}

pub(crate) fn blit_sub_impl<Scr, S>(
    screen: &mut Scr,
    sprite: &S,
    at: Placement,
    region: SpriteRegion,
    flags: u32,
    draw_colors: u16,
) where
    Scr: Screen,
    S: Source<u8> + ?Sized,
{
    let Placement {
        x,
        y,
        width,
        height,
    } = at;

    let mut flip_x = flags & BLIT_FLIP_X != 0;
    let flip_y = flags & BLIT_FLIP_Y != 0;
    let rotate = flags & BLIT_ROTATE != 0;

    let screen_width = Scr::WIDTH as i64;
    let screen_height = Scr::HEIGHT as i64;

    // ranges local to the sprite, already clipped to the screen
    let w_range_x;
    let w_range_y;
    if rotate {
        flip_x = !flip_x;
        w_range_x = clip_range(y, width, screen_height);
        w_range_y = clip_range(x, height, screen_width);
    } else {
        w_range_x = clip_range(x, width, screen_width);
        w_range_y = clip_range(y, height, screen_height);
    }

    let fmt = PixelFormat::from_blit_flags(flags);

    for wy in w_range_y {
        for wx in w_range_x.clone() {
            let (tx, ty) = if rotate {
                (x + wy, y + wx)
            } else {
                (x + wx, y + wy)
            };

            let sx = region.src_x + if flip_x { width - wx - 1 } else { wx };
            let sy = region.src_y + if flip_y { height - wy - 1 } else { wy };

            let draw_color_idx = sprite_pixel(sprite, fmt, sx, sy, region.stride);
            if let Some(color) = remap_draw_color(draw_color_idx, draw_colors) {
                set_pixel_impl(screen, tx, ty, color);
            }
        }
    }
}

/// Sprite-local coordinates along one axis that land inside `0..limit`.
fn clip_range(start: i64, len: i64, limit: i64) -> Range<i64> {
    (start.max(0) - start)..len.min(limit - start)
}

/// Reads the pixel value at `(x, y)`; anything outside `sprite` reads as 0.
fn sprite_pixel<T: Source<u8> + ?Sized>(
    sprite: &T,
    fmt: PixelFormat,
    x: i64,
    y: i64,
    stride: i64,
) -> u8 {
    let Some(pixel_index) = y.checked_mul(stride).and_then(|p| p.checked_add(x)) else {
        return 0;
    };
    if pixel_index < 0 {
        return 0;
    }

    let byte_at = |offset: i64| {
        usize::try_from(offset)
            .ok()
            .and_then(|offset| sprite.item_at(offset))
            .unwrap_or(0)
    };

    match fmt {
        PixelFormat::Blit1BPP => {
            let byte = byte_at(pixel_index >> 3);
            (byte >> (7 - (pixel_index & 0x07))) & 0x01
        }
        PixelFormat::Blit2BPP => {
            let byte = byte_at(pixel_index >> 2);
            (byte >> (6 - ((pixel_index & 0x03) << 1))) & 0x03
        }
    }
}

/// Number of sprite bytes a blit of this region can touch.
pub fn sprite_bytes_needed(
    width: i32,
    height: i32,
    src_x: u32,
    src_y: u32,
    stride: u32,
    flags: u32,
) -> usize {
    if width <= 0 || height <= 0 {
        return 0;
    }
    let last_pixel = (src_y as u128 + height as u128 - 1) * stride as u128
        + src_x as u128
        + width as u128
        - 1;
    let bits = last_pixel * PixelFormat::from_blit_flags(flags).bits_per_pixel() as u128;
    usize::try_from(bits / 8 + 1).unwrap_or(usize::MAX)
}
