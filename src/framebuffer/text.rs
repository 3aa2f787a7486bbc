use crate::{Sink, Source};

use super::{
    blit::{blit_sub_impl, Placement, SpriteRegion},
    font::{FIRST_GLYPH, FONT, GLYPH_SIZE},
    Screen, Wasm4Screen,
};

/// Draw text using the built-in font.
///
/// The first draw color paints the glyph background, the second the glyph
/// itself. `\n` starts a new line below `x`; a NUL byte ends the text.
pub fn text<T: Source<u8> + Sink<u8> + ?Sized>(
    fb: &mut T,
    draw_colors: u16,
    text: &[u8],
    x: i32,
    y: i32,
) {
    text_impl(&mut Wasm4Screen { fb }, draw_colors, text, x as i64, y as i64)
}

pub(crate) fn text_impl<S: Screen>(
    screen: &mut S,
    draw_colors: u16,
    text: &[u8],
    x: i64,
    mut y: i64,
) {
    let glyph_size = GLYPH_SIZE as i64;
    let mut cursor = x;

    for &c in text {
        match c {
            0 => return,
            b'\n' => {
                y += glyph_size;
                cursor = x;
            }
            c => {
                blit_sub_impl(
                    screen,
                    &FONT,
                    Placement {
                        x: cursor,
                        y,
                        width: glyph_size,
                        height: glyph_size,
                    },
                    SpriteRegion {
                        src_x: 0,
                        src_y: (c as i64 - FIRST_GLYPH as i64) * glyph_size,
                        stride: glyph_size,
                    },
                    0,
                    draw_colors,
                );
                cursor += glyph_size;
            }
        }
    }
}
