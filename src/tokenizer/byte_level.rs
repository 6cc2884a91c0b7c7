//! Byte-level alphabet used by GPT-2 style BPE vocabularies.
//!
//! Every byte value maps to one printable Unicode character so that merge
//! rules never have to deal with whitespace or control bytes:
//!
//! - `!`..=`~`, `¡`..=`¬` and `®`..=`ÿ` map to themselves.
//! - The remaining 68 bytes map, in ascending order, to U+0100 onwards.
//!
//! Space (0x20) therefore becomes `Ġ` (U+0120) and newline (0x0A) becomes `Ċ`
//! (U+010A), which is what OPT and RoBERTa vocabularies contain.

use std::collections::HashMap;
use std::sync::LazyLock;

static BYTE_TO_CHAR: LazyLock<[char; 256]> = LazyLock::new(|| {
    let mut table = ['\0'; 256];
    let mut next = 0x100u32;
    for byte in 0..=255u8 {
        table[byte as usize] = if is_printable_byte(byte) {
            byte as char
        } else {
            let ch = char::from_u32(next).unwrap_or(char::REPLACEMENT_CHARACTER);
            next += 1;
            ch
        };
    }
    table
});

static CHAR_TO_BYTE: LazyLock<HashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
});

fn is_printable_byte(byte: u8) -> bool {
    matches!(byte, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF)
}

/// The visible character standing in for `byte`.
#[inline]
pub fn byte_to_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// Inverse of [`byte_to_char`]. `None` for characters outside the alphabet.
#[inline]
pub fn char_to_byte(ch: char) -> Option<u8> {
    CHAR_TO_BYTE.get(&ch).copied()
}

/// Remap the UTF-8 bytes of `text` into the byte-level alphabet.
pub fn encode_bytes(text: &str) -> String {
    text.bytes().map(byte_to_char).collect()
}

/// Append the raw bytes behind a remapped token to `out`.
///
/// Characters outside the alphabet are copied through as their own UTF-8
/// bytes.
pub fn decode_into(token: &str, out: &mut Vec<u8>) {
    for ch in token.chars() {
        match char_to_byte(ch) {
            Some(byte) => out.push(byte),
            None => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}
