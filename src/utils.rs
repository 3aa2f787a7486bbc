//! Power-on values of the hardware registers.

use byteorder::{ByteOrder, LittleEndian};

/// The four colors every cart starts with, as raw `0xRRGGBB` values.
pub const DEFAULT_PALETTE: [u32; 4] = [0xe0f8cf, 0x86c06c, 0x306850, 0x071821];

/// Draw colors every cart starts with.
pub const DEFAULT_DRAW_COLORS: u16 = 0x0312;

/// Returns the default palette as it is laid out in memory.
pub fn default_palette() -> [u8; 16] {
    let mut buf = [0u8; 16];
    LittleEndian::write_u32_into(&DEFAULT_PALETTE, &mut buf);
    buf
}

/// Returns the default draw colors as they are laid out in memory.
pub fn default_draw_colors() -> [u8; 2] {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, DEFAULT_DRAW_COLORS);
    buf
}

/// Returns an empty framebuffer.
#[cfg(test)]
pub(crate) fn empty_framebuffer() -> [u8; crate::wasm4::FRAMEBUFFER_SIZE] {
    [0; crate::wasm4::FRAMEBUFFER_SIZE]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_palette_layout() {
        let palette = default_palette();
        assert_eq!(&palette[0..4], &[0xcf, 0xf8, 0xe0, 0x00]);
        assert_eq!(&palette[12..16], &[0x21, 0x18, 0x07, 0x00]);
    }

    #[test]
    fn default_draw_colors_layout() {
        assert_eq!(default_draw_colors(), [0x12, 0x03]);
    }
}
