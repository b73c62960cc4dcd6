//! Classic 16-bytes-per-line hex dump.
//!
//! ```text
//! < 05 01 09 02 a1 01 85 02 09 01 a1 00 95 10 75 01  ..............u.
//! < 09 02 15 00 25 01 81 02                          ....%...
//! ```
//!
//! Every line starts with the direction marker and is 67 columns wide, with
//! the ASCII column starting at 51.

/// Width of one dump line.
pub const LINE_WIDTH: usize = 67;

const BYTES_PER_LINE: usize = 16;
const HEX: &[u8; 16] = b"0123456789abcdef";

/// Formats `data` as dump lines tagged with `dir`.
pub fn hexdump(dir: char, data: &[u8]) -> Vec<String> {
    data.chunks(BYTES_PER_LINE)
        .map(|chunk| {
            let mut line = String::with_capacity(LINE_WIDTH);
            line.push(dir);
            for &byte in chunk {
                line.push(' ');
                line.push(hex_digit(byte >> 4));
                line.push(hex_digit(byte & 0x0f));
            }
            for _ in chunk.len()..BYTES_PER_LINE {
                line.push_str("   ");
            }
            line.push_str("  ");
            for &byte in chunk {
                line.push(if byte.is_ascii_graphic() || byte == b' ' {
                    char::from(byte)
                } else {
                    '.'
                });
            }
            for _ in chunk.len()..BYTES_PER_LINE {
                line.push(' ');
            }
            line
        })
        .collect()
}

/// Dump lines with `prefix` prepended, as emitted in debug mode.
pub fn hexdump_prefixed(prefix: &str, dir: char, data: &[u8]) -> Vec<String> {
    hexdump(dir, data)
        .into_iter()
        .map(|line| format!("{prefix}{line}"))
        .collect()
}

fn hex_digit(nibble: u8) -> char {
    HEX.get(usize::from(nibble))
        .copied()
        .map_or('?', char::from)
}
