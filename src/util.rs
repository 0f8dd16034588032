/// Shared helpers: duration codes, timestamps, random identifiers.
use crate::error::{Error, Result};
use rand::Rng;

/// Charset for generated identifiers (token secrets, address localparts,
/// passwords). Lowercase so generated addresses are valid as-is.
const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Seconds per duration-code unit.
const UNITS: [(char, i64); 5] = [
    ('s', 1),
    ('m', 60),
    ('h', 3600),
    ('d', 86400),
    ('w', 604800),
];

/// Parse a duration code like "1d" or "3w" into seconds.
///
/// Accepted suffixes: s(econds), m(inutes), h(ours), d(ays), w(eeks).
/// "0s" is valid and means accounts expire immediately.
pub fn parse_duration(code: &str) -> Result<i64> {
    let code = code.trim();
    let unit = match code.chars().last() {
        Some(c) => c,
        None => return Err(Error::InvalidDuration(code.to_string())),
    };
    let scale = match UNITS.iter().find(|(suffix, _)| *suffix == unit) {
        Some((_, scale)) => *scale,
        None => return Err(Error::InvalidDuration(code.to_string())),
    };
    let number = &code[..code.len() - unit.len_utf8()];
    let n: i64 = number
        .parse()
        .map_err(|_| Error::InvalidDuration(code.to_string()))?;
    if n < 0 {
        return Err(Error::InvalidDuration(code.to_string()));
    }
    n.checked_mul(scale)
        .ok_or_else(|| Error::InvalidDuration(code.to_string()))
}

/// Render seconds as the most compact exact duration code ("86400" → "1d").
///
/// Falls back to plain seconds when no larger unit divides evenly, so
/// `parse_duration(&format_duration(n)) == n` always holds.
pub fn format_duration(secs: i64) -> String {
    for (suffix, scale) in UNITS.iter().rev() {
        if secs >= *scale && secs % scale == 0 {
            return format!("{}{}", secs / scale, suffix);
        }
    }
    format!("{}s", secs)
}

/// Current time as unix seconds, the core's timestamp representation.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Generate a random lowercase-alphanumeric identifier of `len` characters.
pub fn random_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..ID_CHARSET.len());
            ID_CHARSET[idx] as char
        })
        .collect()
}
