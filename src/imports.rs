//! Bodies of the functions a cart imports from `env`.
//!
//! These work on a [`VirtualMemory`] view of the cart's page so any engine
//! binding can forward to them. Guest pointers and sizes are used unchecked;
//! the memory accessors clamp them to the page.

use log::{debug, trace, warn};

use crate::{
    audio::Tone,
    framebuffer,
    memory::VirtualMemory,
    trace::{decode_utf16, tracef as format_tracef},
    wasm4::SAVE_CHUNK_SIZE,
    Peripherals,
};

/// Log target of everything a cart traces.
pub const CARTRIDGE_TARGET: &str = "consolebox::cartridge";

/// Names of every import, in the order engines define them.
pub const IMPORT_NAMES: [&str; 17] = [
    "blit",
    "blitSub",
    "line",
    "hline",
    "vline",
    "oval",
    "rect",
    "text",
    "textUtf8",
    "textUtf16",
    "tone",
    "diskr",
    "diskw",
    "trace",
    "traceUtf8",
    "traceUtf16",
    "tracef",
];

pub fn blit<B: AsRef<[u8]> + AsMut<[u8]>>(
    mem: &mut VirtualMemory<B>,
    sprite: u32,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    flags: u32,
) {
    blit_sub(mem, sprite, x, y, width, height, 0, 0, width as u32, flags)
}

#[allow(clippy::too_many_arguments)]
pub fn blit_sub<B: AsRef<[u8]> + AsMut<[u8]>>(
    mem: &mut VirtualMemory<B>,
    sprite: u32,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    src_x: u32,
    src_y: u32,
    stride: u32,
    flags: u32,
) {
    let needed = framebuffer::sprite_bytes_needed(width, height, src_x, src_y, stride, flags);
    // the sprite may overlap the framebuffer
    let sprite = mem.slice(sprite as usize, needed).to_vec();
    let draw_colors = mem.draw_colors();

    framebuffer::blit_sub(
        mem.framebuffer_mut(),
        &sprite,
        x,
        y,
        width,
        height,
        src_x,
        src_y,
        stride,
        flags,
        draw_colors,
    );
}

pub fn line<B: AsRef<[u8]> + AsMut<[u8]>>(
    mem: &mut VirtualMemory<B>,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
) {
    let draw_colors = mem.draw_colors();
    framebuffer::line(mem.framebuffer_mut(), draw_colors, x1, y1, x2, y2);
}

pub fn hline<B: AsRef<[u8]> + AsMut<[u8]>>(mem: &mut VirtualMemory<B>, x: i32, y: i32, len: i32) {
    let draw_colors = mem.draw_colors();
    framebuffer::hline(mem.framebuffer_mut(), draw_colors, x, y, len);
}

pub fn vline<B: AsRef<[u8]> + AsMut<[u8]>>(mem: &mut VirtualMemory<B>, x: i32, y: i32, len: i32) {
    let draw_colors = mem.draw_colors();
    framebuffer::vline(mem.framebuffer_mut(), draw_colors, x, y, len);
}

pub fn oval<B: AsRef<[u8]> + AsMut<[u8]>>(
    mem: &mut VirtualMemory<B>,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) {
    let draw_colors = mem.draw_colors();
    framebuffer::oval(mem.framebuffer_mut(), draw_colors, x, y, width, height);
}

pub fn rect<B: AsRef<[u8]> + AsMut<[u8]>>(
    mem: &mut VirtualMemory<B>,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) {
    let draw_colors = mem.draw_colors();
    framebuffer::rect(mem.framebuffer_mut(), draw_colors, x, y, width, height);
}

/// `text`: a NUL-terminated byte string.
pub fn text<B: AsRef<[u8]> + AsMut<[u8]>>(mem: &mut VirtualMemory<B>, ptr: u32, x: i32, y: i32) {
    let bytes = mem.read_cstring(ptr as usize).to_vec();
    draw_text(mem, &bytes, x, y);
}

/// `textUtf8`: `len` raw bytes, drawn byte by byte.
pub fn text_utf8<B: AsRef<[u8]> + AsMut<[u8]>>(
    mem: &mut VirtualMemory<B>,
    ptr: u32,
    len: u32,
    x: i32,
    y: i32,
) {
    let bytes = mem.read_bytes(ptr as usize, len as usize);
    draw_text(mem, &bytes, x, y);
}

/// `textUtf16`: `len` bytes of UTF-16LE code units. Units outside the font's
/// byte range are drawn as `?`.
pub fn text_utf16<B: AsRef<[u8]> + AsMut<[u8]>>(
    mem: &mut VirtualMemory<B>,
    ptr: u32,
    len: u32,
    x: i32,
    y: i32,
) {
    let bytes: Vec<u8> = mem
        .read_bytes(ptr as usize, len as usize)
        .chunks_exact(2)
        .map(|unit| match u16::from_le_bytes([unit[0], unit[1]]) {
            unit @ 0..=0xff => unit as u8,
            _ => b'?',
        })
        .collect();
    draw_text(mem, &bytes, x, y);
}

fn draw_text<B: AsRef<[u8]> + AsMut<[u8]>>(mem: &mut VirtualMemory<B>, text: &[u8], x: i32, y: i32) {
    let draw_colors = mem.draw_colors();
    framebuffer::text(mem.framebuffer_mut(), draw_colors, text, x, y);
}

pub fn tone(peripherals: &mut Peripherals, frequency: u32, duration: u32, volume: u32, flags: u32) {
    peripherals
        .audio
        .play(Tone::decode(frequency, duration, volume, flags));
}

/// `diskr`: copy saved data into the page. Returns the number of bytes read.
pub fn diskr<B: AsRef<[u8]> + AsMut<[u8]>>(
    mem: &mut VirtualMemory<B>,
    peripherals: &mut Peripherals,
    dest: u32,
    size: u32,
) -> u32 {
    if !peripherals.save.can_use() {
        debug!("diskr: save channel unavailable");
        return 0;
    }
    let Some(data) = peripherals.save.data() else {
        return 0;
    };

    let len = data.len().min(size as usize);
    mem.write_bytes(dest as usize, &data[..len]) as u32
}

/// `diskw`: save up to [`SAVE_CHUNK_SIZE`] bytes from the page. Returns the
/// number of bytes written.
pub fn diskw<B: AsRef<[u8]> + AsMut<[u8]>>(
    mem: &mut VirtualMemory<B>,
    peripherals: &mut Peripherals,
    src: u32,
    size: u32,
) -> u32 {
    if !peripherals.save.can_use() {
        debug!("diskw: save channel unavailable");
        return 0;
    }

    let data = mem.read_bytes(src as usize, (size as usize).min(SAVE_CHUNK_SIZE));
    let len = data.len() as u32;
    if peripherals.save.set_data(Some(data)) {
        len
    } else {
        warn!("diskw: save channel rejected {len} bytes");
        0
    }
}

pub fn trace<B: AsRef<[u8]>>(mem: &VirtualMemory<B>, ptr: u32) {
    let bytes = mem.read_cstring(ptr as usize);
    trace!(target: CARTRIDGE_TARGET, "{}", String::from_utf8_lossy(bytes));
}

pub fn trace_utf8<B: AsRef<[u8]>>(mem: &VirtualMemory<B>, ptr: u32, len: u32) {
    let bytes = mem.read_bytes(ptr as usize, len as usize);
    trace!(target: CARTRIDGE_TARGET, "{}", String::from_utf8_lossy(&bytes));
}

pub fn trace_utf16<B: AsRef<[u8]>>(mem: &VirtualMemory<B>, ptr: u32, len: u32) {
    let bytes = mem.read_bytes(ptr as usize, len as usize);
    trace!(target: CARTRIDGE_TARGET, "{}", decode_utf16(&bytes));
}

pub fn tracef<B: AsRef<[u8]>>(mem: &VirtualMemory<B>, fmt: u32, args: u32) {
    let page = mem.as_bytes();
    let fmt = mem.read_cstring(fmt as usize);
    let args = mem.slice(args as usize, page.len());
    trace!(target: CARTRIDGE_TARGET, "{}", format_tracef(fmt, args, page));
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        framebuffer::get_pixel,
        save::{MemorySave, SaveChannel},
        wasm4::{BLIT_2BPP, DRAW_COLORS_ADDR, PAGE_SIZE, TONE_TRIANGLE},
    };

    fn recording_peripherals() -> (Peripherals, Arc<Mutex<MemorySave>>) {
        let save = Arc::new(Mutex::new(MemorySave::new()));
        let peripherals = Peripherals {
            audio: Box::new(Vec::<Tone>::new()),
            save: Box::new(Arc::clone(&save)),
        };
        (peripherals, save)
    }

    #[test]
    fn draw_calls_read_draw_colors() {
        let mut mem = VirtualMemory::new(1);

        mem.write_u16(DRAW_COLORS_ADDR, 0x4);
        hline(&mut mem, 0, 0, 4);
        assert_eq!(mem.framebuffer()[0], 0b1111_1111);

        mem.write_u16(DRAW_COLORS_ADDR, 0x2);
        vline(&mut mem, 0, 0, 2);
        assert_eq!(get_pixel(mem.framebuffer(), 0, 0), 1);
        assert_eq!(get_pixel(mem.framebuffer(), 0, 1), 1);
        assert_eq!(get_pixel(mem.framebuffer(), 1, 0), 3);

        mem.write_u16(DRAW_COLORS_ADDR, 0);
        rect(&mut mem, 0, 0, 160, 160);
        line(&mut mem, 0, 0, 159, 159);
        assert_eq!(get_pixel(mem.framebuffer(), 5, 5), 0);
    }

    #[test]
    fn negative_sizes_draw_nothing() {
        let mut mem = VirtualMemory::new(1);
        mem.write_bytes(0x2000, &[0xff; 8]);

        mem.write_u16(DRAW_COLORS_ADDR, 0x2);
        hline(&mut mem, 10, 0, -5);
        vline(&mut mem, 10, 20, -5);
        rect(&mut mem, 10, 10, -10, 5);

        mem.write_u16(DRAW_COLORS_ADDR, 0x20);
        blit(&mut mem, 0x2000, 10, 10, -8, 8, 0);
        blit_sub(&mut mem, 0x2000, 10, 10, 8, -8, 0, 0, 8, 0);

        assert!(mem.framebuffer().iter().all(|b| *b == 0));
    }

    #[test]
    fn rect_scenario() {
        let mut mem = VirtualMemory::new(1);
        rect(&mut mem, 10, 10, 20, 20);
        assert_eq!(get_pixel(mem.framebuffer(), 10, 10), 0);
        assert_eq!(get_pixel(mem.framebuffer(), 15, 15), 1);
    }

    #[test]
    fn blit_from_memory() {
        let mut mem = VirtualMemory::new(1);
        mem.write_u16(DRAW_COLORS_ADDR, 0x4321);
        mem.write_bytes(0x2000, &[0b00_01_10_11]);

        blit(&mut mem, 0x2000, 2, 3, 4, 1, BLIT_2BPP);
        let fb = mem.framebuffer();
        assert_eq!(
            [2, 3, 4, 5].map(|x| get_pixel(fb, x, 3)),
            [0, 1, 2, 3]
        );
    }

    #[test]
    fn blit_past_end_of_page() {
        let mut mem = VirtualMemory::new(1);
        mem.write_u16(DRAW_COLORS_ADDR, 0x20);
        mem.write_u8(PAGE_SIZE - 1, 0xff);

        // the second row starts past the page and reads as 0
        blit(&mut mem, (PAGE_SIZE - 1) as u32, 0, 0, 8, 2, 0);
        assert_eq!(mem.framebuffer()[0..2], [0x55, 0x55]);
        assert_eq!(mem.framebuffer()[40..42], [0, 0]);

        // a sprite far outside the page reads as all zeros
        mem.write_u16(DRAW_COLORS_ADDR, 0x43);
        blit_sub(&mut mem, u32::MAX, 0, 10, 8, 8, 0, 0, u32::MAX, 0);
        assert_eq!(get_pixel(mem.framebuffer(), 0, 10), 2);
    }

    #[test]
    fn text_variants() {
        let mut mem = VirtualMemory::new(1);
        mem.write_bytes(0x2000, b"A\0");
        text(&mut mem, 0x2000, 0, 0);
        let plain = mem.framebuffer().to_vec();

        mem.framebuffer_mut().fill(0);
        mem.write_bytes(0x2100, b"AB");
        text_utf8(&mut mem, 0x2100, 1, 0, 0);
        assert_eq!(mem.framebuffer(), &plain[..]);

        mem.framebuffer_mut().fill(0);
        mem.write_bytes(0x2200, &[b'A', 0]);
        text_utf16(&mut mem, 0x2200, 2, 0, 0);
        assert_eq!(mem.framebuffer(), &plain[..]);

        assert!(plain.iter().any(|b| *b != 0));
    }

    #[test]
    fn text_utf16_replaces_wide_units() {
        let mut mem = VirtualMemory::new(1);
        mem.write_bytes(0x2000, b"?\0");
        text(&mut mem, 0x2000, 0, 0);
        let question = mem.framebuffer().to_vec();

        mem.framebuffer_mut().fill(0);
        mem.write_bytes(0x2200, &0x263au16.to_le_bytes());
        text_utf16(&mut mem, 0x2200, 2, 0, 0);
        assert_eq!(mem.framebuffer(), &question[..]);
    }

    #[test]
    fn tone_reaches_sink() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut peripherals = Peripherals {
            audio: Box::new(tx),
            ..Default::default()
        };

        tone(&mut peripherals, 440, 60, 50, TONE_TRIANGLE);
        let tone = rx.try_recv().unwrap();
        assert_eq!(tone.start_frequency, 440);
        assert_eq!(tone.sustain_frames, 60);
    }

    #[test]
    fn save_round_trip() {
        let mut mem = VirtualMemory::new(1);
        let (mut peripherals, _) = recording_peripherals();

        let data: Vec<u8> = (0..=255).cycle().take(1000).collect();
        mem.write_bytes(0x3000, &data);
        assert_eq!(diskw(&mut mem, &mut peripherals, 0x3000, 1000), 1000);

        assert_eq!(diskr(&mut mem, &mut peripherals, 0x8000, 1000), 1000);
        assert_eq!(mem.slice(0x8000, 1000), &data[..]);

        // short reads
        assert_eq!(diskr(&mut mem, &mut peripherals, 0x9000, 10), 10);
        assert_eq!(diskr(&mut mem, &mut peripherals, 0x9000, 4000), 1000);
    }

    #[test]
    fn save_write_truncates() {
        let mut mem = VirtualMemory::new(1);
        let (mut peripherals, save) = recording_peripherals();

        assert_eq!(diskw(&mut mem, &mut peripherals, 0, 5000), SAVE_CHUNK_SIZE as u32);
        assert_eq!(
            save.lock().unwrap().stored().map(<[u8]>::len),
            Some(SAVE_CHUNK_SIZE)
        );

        // the page end is zero-filled
        assert_eq!(
            diskw(&mut mem, &mut peripherals, (PAGE_SIZE - 2) as u32, 4),
            4
        );
        assert_eq!(save.lock().unwrap().stored(), Some(&[0u8, 0, 0, 0][..]));
    }

    #[test]
    fn save_read_clamps_to_page() {
        let mut mem = VirtualMemory::new(1);
        let (mut peripherals, save) = recording_peripherals();
        save.lock().unwrap().set_data(Some(vec![7; 8]));

        assert_eq!(
            diskr(&mut mem, &mut peripherals, (PAGE_SIZE - 3) as u32, 8),
            3
        );
        assert_eq!(mem.slice(PAGE_SIZE - 3, 3), &[7, 7, 7]);
    }

    #[test]
    fn save_unavailable() {
        let mut mem = VirtualMemory::new(1);
        let (mut peripherals, save) = recording_peripherals();
        save.lock().unwrap().set_available(false);

        mem.write_bytes(0, &[1, 2, 3]);
        assert_eq!(diskw(&mut mem, &mut peripherals, 0, 3), 0);
        assert_eq!(diskr(&mut mem, &mut peripherals, 0x100, 3), 0);
        assert_eq!(mem.slice(0x100, 3), &[0, 0, 0]);

        let mut no_save = Peripherals::default();
        assert_eq!(diskw(&mut mem, &mut no_save, 0, 3), 0);
        assert_eq!(diskr(&mut mem, &mut no_save, 0, 3), 0);
    }

    #[test]
    fn trace_calls_never_fail() {
        let mut mem = VirtualMemory::new(1);
        mem.write_bytes(0x10, b"%d apples\0");
        mem.write_bytes(0x20, &3i32.to_le_bytes());

        trace(&mem, 0x10);
        trace(&mem, u32::MAX);
        trace_utf8(&mem, 0x10, 5);
        trace_utf8(&mem, (PAGE_SIZE - 1) as u32, 100);
        trace_utf16(&mem, 0x10, 7);
        tracef(&mem, 0x10, 0x20);
        tracef(&mem, 0x10, u32::MAX);
        assert!(mem.framebuffer().iter().all(|b| *b == 0));
    }
}
