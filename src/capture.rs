//! Loading captured datagrams from hexdump text and printing hexdumps.
//!
//! Capture files hold whitespace-separated hex byte pairs, typically 16 per
//! line as copied out of a packet analyzer:
//!
//! ```text
//! 01 01 06 01 fe fe fe fe 00 00 80 00 00 00 00 00
//! 00 00 00 00 00 00 00 00 0a 01 02 00 ca 02 8d bf
//! ```

use std::fmt::Write;
use std::path::Path;

use crate::error::{Error, Result};

const BYTES_PER_LINE: usize = 16;

/// Parses hexdump text into bytes.
///
/// Whitespace within a line is ignored, so both `01 02 03` and `010203`
/// are accepted. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`Error::InvalidCapture`] naming the first line with an odd
/// number of hex digits or a character that is not a hex digit.
pub fn parse_hexdump(text: &str) -> Result<Vec<u8>> {
    let mut data = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let digits: String = line.split_whitespace().collect();

        if digits.len() % 2 != 0 {
            return Err(Error::InvalidCapture(format!(
                "line {}: odd number of hex digits",
                number + 1
            )));
        }

        for pair in digits.as_bytes().chunks(2) {
            let byte = std::str::from_utf8(pair)
                .ok()
                .filter(|pair| pair.bytes().all(|digit| digit.is_ascii_hexdigit()))
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| {
                    Error::InvalidCapture(format!(
                        "line {}: invalid hex byte {:?}",
                        number + 1,
                        String::from_utf8_lossy(pair)
                    ))
                })?;
            data.push(byte);
        }
    }

    Ok(data)
}

/// Reads and parses a hexdump capture file.
pub fn load_capture<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let text = std::fs::read_to_string(path)?;
    parse_hexdump(&text)
}

/// Formats bytes as an offset / hex / ASCII dump, 16 bytes per line.
pub fn hexdump(data: &[u8]) -> String {
    let mut output = String::new();

    for (index, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(output, "{:08x}: ", index * BYTES_PER_LINE);

        for column in 0..BYTES_PER_LINE {
            match chunk.get(column) {
                Some(byte) => {
                    let _ = write!(output, "{:02x} ", byte);
                }
                None => output.push_str("   "),
            }
            if column == 7 {
                output.push(' ');
            }
        }

        output.push(' ');
        output.extend(chunk.iter().map(|&byte| {
            if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '.'
            }
        }));
        output.push('\n');
    }

    output
}
