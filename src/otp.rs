//! HMAC-based one-time passwords (RFC 4226), plus the time-based variant
//! (RFC 6238) built on top of it.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Powers of ten indexed by digit count.
const DIGITS_POWER: [u32; 10] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];

/// Luhn doubling table: `2 * d` folded back to a single digit.
const DOUBLE_DIGITS: [u32; 10] = [0, 2, 4, 6, 8, 1, 3, 5, 7, 9];

/// Largest supported code length.
pub const MAX_DIGITS: u32 = 9;

/// Default TOTP period in seconds.
pub const DEFAULT_PERIOD: u64 = 30;

/// Generates an HOTP code.
///
/// `truncation_offset` overrides dynamic truncation when it lies within
/// `0..hash_len - 4`; anything else falls back to the low nibble of the last
/// hash byte.
///
/// # Panics
///
/// Panics if `digits` is not in `1..=9`.
pub fn generate(
    secret: &[u8],
    moving_factor: u64,
    digits: u32,
    add_checksum: bool,
    truncation_offset: Option<usize>,
) -> String {
    assert!(
        (1..=MAX_DIGITS).contains(&digits),
        "OTP digit count must be between 1 and {MAX_DIGITS}, got {digits}"
    );

    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&moving_factor.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = match truncation_offset {
        Some(o) if o < hash.len() - 4 => o,
        _ => (hash[hash.len() - 1] & 0x0f) as usize,
    };

    let binary = u32::from_be_bytes([
        hash[offset] & 0x7f,
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ]);

    let otp = binary % DIGITS_POWER[digits as usize];
    if add_checksum {
        let code = u64::from(otp) * 10 + u64::from(checksum(otp, digits));
        format!("{:0width$}", code, width = digits as usize + 1)
    } else {
        format!("{:0width$}", otp, width = digits as usize)
    }
}

/// Luhn-style check digit over the lowest `digits` decimal digits of `num`,
/// doubling every other digit starting with the least significant one.
pub fn checksum(mut num: u32, digits: u32) -> u32 {
    let mut double = true;
    let mut total = 0;

    for _ in 0..digits {
        let mut digit = num % 10;
        num /= 10;

        if double {
            digit = DOUBLE_DIGITS[digit as usize];
        }

        total += digit;
        double = !double;
    }

    (10 - total % 10) % 10
}

/// Generates a TOTP code for `unix_time` seconds.
///
/// # Panics
///
/// Panics if `period` is zero or `digits` is not in `1..=9`.
pub fn totp(secret: &[u8], unix_time: u64, period: u64, digits: u32) -> String {
    assert!(period > 0, "TOTP period must be greater than zero");
    generate(secret, unix_time / period, digits, false, None)
}

/// Seconds left before the code for `unix_time` rolls over.
pub fn remaining_seconds(unix_time: u64, period: u64) -> u64 {
    period - unix_time % period
}
