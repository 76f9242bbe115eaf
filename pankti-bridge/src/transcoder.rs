//! UTF-8 transcoding between host strings and guest bytes
//!
//! Decoding is lossy: malformed sequences become U+FFFD instead of failing,
//! so a misbehaving guest can never turn an output write into an error.

use std::borrow::Cow;

/// Encode host text into the bytes staged in guest memory.
pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Decode an exact guest span. No terminator is assumed.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
