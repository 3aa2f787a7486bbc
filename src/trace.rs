//! Formatting for the `tracef` import.

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::Source;

/// Format a printf-style string the way the console does.
///
/// Arguments:
/// - `fmt: &[u8]`: the format string, ending at the first NUL if it has one.
/// - `args: &[u8]`: cart memory starting at the argument pointer. Every
///   argument takes 4 bytes, except `%f` which takes 8.
/// - `mem`: the whole cart memory, used to resolve `%s` pointers.
///
/// Supported conversions are `%c`, `%d`, `%x`, `%s` and `%f`; any other
/// character after `%` is copied as is. Formatting stops at the first
/// argument that cannot be read.
pub fn tracef<T: Source<u8> + ?Sized>(fmt: &[u8], args: &[u8], mem: &T) -> String {
    let mut arg_idx = 0;
    let mut fmt = fmt.iter().copied();

    let mut output = String::new();

    while let Some(byte) = fmt.next() {
        if byte == 0 {
            break;
        }

        if byte != b'%' {
            output.push(byte as char);
            continue;
        }

        let Some(conversion) = fmt.next() else {
            break;
        };

        let width = if conversion == b'f' { 8 } else { 4 };
        let arg = match conversion {
            b'c' | b'd' | b'x' | b's' | b'f' => match args.get(arg_idx..arg_idx + width) {
                Some(arg) => arg,
                None => {
                    warn!("tracef: missing argument at {arg_idx}");
                    break;
                }
            },
            0 => break,
            other => {
                output.push(other as char);
                continue;
            }
        };
        arg_idx += width;

        match conversion {
            b'c' => output.push(char::from_u32(LittleEndian::read_u32(arg)).unwrap_or('!')),
            b'd' => output.push_str(&LittleEndian::read_i32(arg).to_string()),
            b'x' => output.push_str(&format!("{:x}", LittleEndian::read_u32(arg))),
            b's' => push_cstring(&mut output, mem, LittleEndian::read_u32(arg) as usize),
            _ => output.push_str(&LittleEndian::read_f64(arg).to_string()),
        }
    }

    output
}

fn push_cstring<T: Source<u8> + ?Sized>(output: &mut String, mem: &T, mut ptr: usize) {
    while let Some(byte) = mem.item_at(ptr) {
        if byte == 0 {
            break;
        }
        output.push(byte as char);
        ptr += 1;
    }
}

/// Decode a text buffer of UTF-16LE code units, replacing invalid ones.
pub fn decode_utf16(bytes: &[u8]) -> String {
    let units = bytes.chunks_exact(2).map(LittleEndian::read_u16);
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
