//! The two checksums carried by an encoded address.
//!
//! - A **Luhn-style check digit** over the lowercase `prefix + hex` body,
//!   appended as the 66th character. It catches single-character typos and
//!   most adjacent transpositions, including a changed prefix.
//! - **EIP-55 letter casing** of the hex body. Casing is optional on input:
//!   all-lowercase and all-uppercase bodies are accepted as-is, and only a
//!   body that mixes cases is held to the exact pattern.
//!
//! ## Character values
//!
//! Digits map to `0..=9` and ASCII letters (either case) to their base-36
//! value, so hex letters land on `10..=15` and the prefixes on
//! `s = 28`, `l = 21`, `x = 33`, `n = 23`. Anything else contributes zero;
//! callers validate the alphabet before checksumming.

use crate::crypto::keccak256;

/// Numeric value of one body character.
fn char_value(c: u8) -> u32 {
    match c {
        b'0'..=b'9' => u32::from(c - b'0'),
        b'a'..=b'z' => u32::from(c - b'a') + 10,
        b'A'..=b'Z' => u32::from(c - b'A') + 10,
        _ => 0,
    }
}

/// Luhn-style check digit of `input`.
///
/// Walking right to left, every second value (offsets 1, 3, 5, ... from the
/// right end) is doubled and folded by subtracting 9 when above 9. The digit
/// is the total mod 10.
///
/// ```
/// use shadow_protocol::address::checksum::luhn_digit;
///
/// assert_eq!(luhn_digit("12345"), '1');
/// ```
pub fn luhn_digit(input: &str) -> char {
    let sum: u32 = input
        .bytes()
        .rev()
        .enumerate()
        .map(|(offset, c)| {
            let v = char_value(c);
            if offset % 2 == 1 {
                let doubled = v * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                v
            }
        })
        .sum();
    char::from(b'0' + (sum % 10) as u8)
}

/// Nibble `i` of a digest: even positions take the high nibble.
fn nibble(digest: &[u8; 32], i: usize) -> u8 {
    let byte = digest[(i / 2) % digest.len()];
    if i % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0f
    }
}

/// Apply EIP-55 casing to an all-lowercase hex string.
///
/// Letter `i` is uppercased iff nibble `i` of `keccak256(lower_hex)` is at
/// least 8. Digits are unaffected.
pub fn checksum_case(lower_hex: &str) -> String {
    let digest = keccak256(lower_hex.as_bytes());
    lower_hex
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if c.is_ascii_alphabetic() && nibble(&digest, i) >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

/// `true` when `hex` contains both upper- and lowercase letters.
pub fn is_mixed_case(hex: &str) -> bool {
    let has_upper = hex.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = hex.bytes().any(|b| b.is_ascii_lowercase());
    has_upper && has_lower
}
