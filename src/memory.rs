//! The cart's linear memory page and its fixed-offset hardware registers.
//!
//! Every accessor here is total: reads outside the page yield zero and writes
//! outside the page are dropped, so guest-supplied addresses can be passed in
//! unchecked.

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    utils,
    wasm4::{
        DRAW_COLORS_ADDR, FRAMEBUFFER_ADDR, FRAMEBUFFER_SIZE, GAMEPAD1_ADDR, GAMEPAD_COUNT,
        MOUSE_BUTTONS_ADDR, MOUSE_X_ADDR, MOUSE_Y_ADDR, PAGE_SIZE, PALETTE_ADDR,
        SYSTEM_FLAGS_ADDR, SYSTEM_PRESERVE_FRAMEBUFFER,
    },
};

/// A view over (or owner of) the cart's memory page.
///
/// `B` is `Vec<u8>` for a standalone page and `&[u8]`/`&mut [u8]` when
/// wrapping memory owned by a WebAssembly engine.
#[derive(Clone)]
pub struct VirtualMemory<B> {
    page: B,
}

impl VirtualMemory<Vec<u8>> {
    /// Allocate `pages` zeroed pages and write the power-on register values.
    pub fn new(pages: u32) -> Self {
        let mut memory = Self {
            page: vec![0; pages as usize * PAGE_SIZE],
        };
        memory.initialize();
        memory
    }
}

impl<B: AsRef<[u8]>> VirtualMemory<B> {
    /// Wrap an existing page without touching its contents.
    pub fn wrap(page: B) -> Self {
        Self { page }
    }

    pub fn len(&self) -> usize {
        self.page.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.page.as_ref()
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.as_bytes().get(offset).copied().unwrap_or(0)
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        LittleEndian::read_u16(&self.read_array::<2>(offset))
    }

    pub fn read_i16(&self, offset: usize) -> i16 {
        LittleEndian::read_i16(&self.read_array::<2>(offset))
    }

    pub fn read_u24(&self, offset: usize) -> u32 {
        LittleEndian::read_u24(&self.read_array::<3>(offset))
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.read_array::<4>(offset))
    }

    /// Bytes straddling the end of the page read as zero.
    fn read_array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut buf = [0u8; N];
        for (n, byte) in buf.iter_mut().enumerate() {
            if let Some(addr) = offset.checked_add(n) {
                *byte = self.read_u8(addr);
            }
        }
        buf
    }

    /// The part of `offset..offset + length` that lies inside the page.
    pub fn slice(&self, offset: usize, length: usize) -> &[u8] {
        let bytes = self.as_bytes();
        let start = offset.min(bytes.len());
        let end = offset.saturating_add(length).min(bytes.len());
        &bytes[start..end]
    }

    /// Copy `length` bytes starting at `offset`, zero-filling whatever lies
    /// outside the page.
    pub fn read_bytes(&self, offset: usize, length: usize) -> Vec<u8> {
        let length = length.min(self.len());
        let mut buf = self.slice(offset, length).to_vec();
        buf.resize(length, 0);
        buf
    }

    /// The bytes from `offset` up to (not including) the next NUL byte.
    ///
    /// Returns an empty slice if the page ends before a terminator is found.
    pub fn read_cstring(&self, offset: usize) -> &[u8] {
        let tail = self.slice(offset, self.len());
        match tail.iter().position(|b| *b == 0) {
            Some(end) => &tail[..end],
            None => &[],
        }
    }

    pub fn framebuffer(&self) -> &[u8] {
        self.slice(FRAMEBUFFER_ADDR, FRAMEBUFFER_SIZE)
    }

    pub fn draw_colors(&self) -> u16 {
        self.read_u16(DRAW_COLORS_ADDR)
    }

    /// Raw `0xRRGGBB` value of a palette entry.
    pub fn palette_color(&self, index: usize) -> u32 {
        self.read_u24(PALETTE_ADDR + (index & 0x3) * 4)
    }

    pub fn system_flags(&self) -> u8 {
        self.read_u8(SYSTEM_FLAGS_ADDR)
    }

    pub fn preserve_framebuffer(&self) -> bool {
        self.system_flags() & SYSTEM_PRESERVE_FRAMEBUFFER != 0
    }

    pub fn gamepad(&self, slot: usize) -> u8 {
        if slot < GAMEPAD_COUNT {
            self.read_u8(GAMEPAD1_ADDR + slot)
        } else {
            0
        }
    }

    pub fn mouse_position(&self) -> (i16, i16) {
        (self.read_i16(MOUSE_X_ADDR), self.read_i16(MOUSE_Y_ADDR))
    }

    pub fn mouse_buttons(&self) -> u8 {
        self.read_u8(MOUSE_BUTTONS_ADDR)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> VirtualMemory<B> {
    /// Write the power-on palette and draw colors.
    pub fn initialize(&mut self) {
        self.write_bytes(PALETTE_ADDR, &utils::default_palette());
        self.write_bytes(DRAW_COLORS_ADDR, &utils::default_draw_colors());
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.page.as_mut()
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) {
        if let Some(byte) = self.as_bytes_mut().get_mut(offset) {
            *byte = value;
        }
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.write_bytes(offset, &buf);
    }

    pub fn write_i16(&mut self, offset: usize, value: i16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_i16(&mut buf, value);
        self.write_bytes(offset, &buf);
    }

    /// Write as much of `bytes` as fits, returning the number written.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> usize {
        let target = self.slice_mut(offset, bytes.len());
        let written = target.len();
        target.copy_from_slice(&bytes[..written]);
        written
    }

    pub fn slice_mut(&mut self, offset: usize, length: usize) -> &mut [u8] {
        let bytes = self.as_bytes_mut();
        let start = offset.min(bytes.len());
        let end = offset.saturating_add(length).min(bytes.len());
        &mut bytes[start..end]
    }

    pub fn framebuffer_mut(&mut self) -> &mut [u8] {
        self.slice_mut(FRAMEBUFFER_ADDR, FRAMEBUFFER_SIZE)
    }

    pub fn set_gamepad(&mut self, slot: usize, buttons: u8) {
        if slot < GAMEPAD_COUNT {
            self.write_u8(GAMEPAD1_ADDR + slot, buttons);
        }
    }

    pub fn set_mouse_position(&mut self, x: i16, y: i16) {
        self.write_i16(MOUSE_X_ADDR, x);
        self.write_i16(MOUSE_Y_ADDR, y);
    }

    pub fn set_mouse_buttons(&mut self, buttons: u8) {
        self.write_u8(MOUSE_BUTTONS_ADDR, buttons);
    }
}

impl<B: AsRef<[u8]>> std::fmt::Debug for VirtualMemory<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualMemory")
            .field("len", &self.len())
            .field("draw_colors", &format_args!("{:#06x}", self.draw_colors()))
            .field("system_flags", &self.system_flags())
            .finish()
    }
}
