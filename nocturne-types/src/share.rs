//! Compact, URL-safe encoding of a mix for sharing.
//!
//! Wire form: `id:volume` pairs joined by `_`, then URL-safe base64 without
//! padding. Decoding never fails outward; bad input yields an empty mix.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::mix::{ActiveSound, MAX_VOLUME};
use crate::registry::SoundRegistry;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("malformed base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encode the audible sounds of a mix. Sounds at volume 0 are left out.
pub fn encode_mix(sounds: &[ActiveSound]) -> String {
    let serialized = sounds
        .iter()
        .filter(|s| s.volume > 0)
        .map(|s| format!("{}:{}", s.id, s.volume))
        .collect::<Vec<_>>()
        .join("_");
    URL_SAFE_NO_PAD.encode(serialized)
}

/// Decode against the built-in catalog; ids it does not know are dropped.
pub fn decode_mix(encoded: &str) -> Vec<ActiveSound> {
    let registry = SoundRegistry::new();
    decode_mix_with(encoded, |id| registry.contains(id))
}

/// Decode keeping only ids accepted by `is_known`. Malformed input is empty.
pub fn decode_mix_with(encoded: &str, is_known: impl Fn(&str) -> bool) -> Vec<ActiveSound> {
    try_decode_mix(encoded, is_known).unwrap_or_default()
}

/// Like [`decode_mix_with`], but reports why the payload could not be read.
///
/// Standard-alphabet input and trailing padding are accepted as well.
pub fn try_decode_mix(
    encoded: &str,
    is_known: impl Fn(&str) -> bool,
) -> Result<Vec<ActiveSound>, ShareError> {
    let normalized: String = encoded
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD.decode(normalized.as_bytes())?;
    let serialized = String::from_utf8(bytes)?;

    let mut sounds = Vec::new();
    for pair in serialized.split('_') {
        let mut parts = pair.split(':');
        let (Some(id), Some(volume)) = (parts.next(), parts.next()) else {
            continue;
        };
        if id.is_empty() || volume.is_empty() || !is_known(id) {
            continue;
        }
        let Some(volume) = parse_leading_int(volume) else {
            continue;
        };
        let volume = volume.clamp(0, i64::from(MAX_VOLUME)) as u8;
        sounds.push(ActiveSound::new(id, volume));
    }
    Ok(sounds)
}

/// Leading-integer parse: optional sign then digits, trailing junk ignored.
/// Saturates instead of overflowing.
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut value: i64 = 0;
    let mut seen = false;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        seen = true;
        value = value.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    seen.then_some(if negative { -value } else { value })
}
