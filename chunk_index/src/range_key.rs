//! Building, encoding and parsing of index range keys.
//!
//! A range key is a sequence of byte components, each terminated by a
//! single NUL, the last included. Later schema versions append a
//! trailing version component that selects the layout of the preceding
//! components; keys written before versioning have exactly three
//! components and no version.

use base64::prelude::BASE64_STANDARD_NO_PAD;
use base64::Engine;
use snafu::{ensure, ResultExt};

use crate::{
    InvalidBase64ValueSnafu, InvalidRangeKeySnafu, InvalidTimeEncodingSnafu, InvalidUtf8Snafu,
    Result, UnknownRangeKeyVersionSnafu,
};

/// Version components appended to range keys, one per layout.
pub(crate) const RANGE_KEY_V1: &[u8] = b"1";
pub(crate) const RANGE_KEY_V2: &[u8] = b"2";
pub(crate) const RANGE_KEY_V3: &[u8] = b"3";
pub(crate) const RANGE_KEY_V4: &[u8] = b"4";
pub(crate) const RANGE_KEY_V5: &[u8] = b"5";
pub(crate) const RANGE_KEY_V6: &[u8] = b"6";

/// Encode a bucket-relative timestamp for use inside a range key.
///
/// The millisecond offset is written big-endian and then hex encoded:
/// the result never contains a NUL byte yet still sorts bytewise in
/// timestamp order.
pub fn encode_time(t: u32) -> [u8; 8] {
    let mut encoded = [0; 8];
    hex::encode_to_slice(t.to_be_bytes(), &mut encoded)
        .expect("destination is exactly twice the source length");
    encoded
}

/// Invert [`encode_time`].
pub fn decode_time(bs: &[u8; 8]) -> Result<u32> {
    let mut decoded = [0; 4];
    hex::decode_to_slice(bs, &mut decoded).context(InvalidTimeEncodingSnafu { bytes: bs.to_vec() })?;
    Ok(u32::from_be_bytes(decoded))
}

/// Encode a label value for storage inside a range key.
///
/// Raw (unpadded) standard base-64, so the result never contains NUL.
pub fn encode_base64_value(value: &str) -> Vec<u8> {
    BASE64_STANDARD_NO_PAD.encode(value).into_bytes()
}

/// Invert [`encode_base64_value`].
pub fn decode_base64_value(bs: &[u8]) -> Result<String> {
    let decoded = BASE64_STANDARD_NO_PAD
        .decode(bs)
        .context(InvalidBase64ValueSnafu)?;
    String::from_utf8(decoded).context(InvalidUtf8Snafu)
}

/// Concatenate components into a range key, appending a NUL after each
/// one, the last included.
pub fn build_range_key(components: &[&[u8]]) -> Vec<u8> {
    let length = components.iter().map(|component| component.len() + 1).sum();
    let mut output = Vec::with_capacity(length);
    for component in components {
        output.extend_from_slice(component);
        output.push(0);
    }
    output
}

/// A range key, plus its optional value cell, decoded back into logical
/// parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeValue {
    /// The chunk the entry points at.
    pub chunk_id: String,

    /// The label value the entry carries; empty for layouts that store
    /// none.
    pub label_value: String,

    /// True for pre-versioned keys, whose label value was stored raw
    /// rather than base-64 encoded.
    pub legacy: bool,
}

/// Decode any historical range-key layout.
///
/// `value` is the entry's extra cell; only version-5 keys consult it.
pub fn parse_range_value(range_key: &[u8], value: &[u8]) -> Result<RangeValue> {
    // One component per NUL encountered: a well-formed key's trailing NUL
    // closes the last component rather than opening an empty one, and
    // bytes after a missing trailing NUL are dropped.
    let mut components = Vec::with_capacity(5);
    let mut start = 0;
    for (i, b) in range_key.iter().enumerate() {
        if *b == 0 {
            components.push(&range_key[start..i]);
            start = i + 1;
        }
    }

    ensure!(components.len() >= 3, InvalidRangeKeySnafu { range_key });

    // Pre-versioned keys: label name, raw label value, chunk ID.
    if components.len() == 3 {
        return Ok(RangeValue {
            chunk_id: utf8(components[2])?,
            label_value: utf8(components[1])?,
            legacy: true,
        });
    }

    match components[3] {
        // Version 1: the label value is base-64 encoded in the second
        // component. The first holds the label name (empty once the label
        // name moved into the hash key).
        RANGE_KEY_V1 => Ok(RangeValue {
            chunk_id: utf8(components[2])?,
            label_value: decode_base64_value(components[1])?,
            legacy: false,
        }),

        // Version 2 carries neither label name nor value; version 3 is
        // the same with the chunk end time in the first component.
        RANGE_KEY_V2 | RANGE_KEY_V3 => Ok(RangeValue {
            chunk_id: utf8(components[2])?,
            label_value: String::new(),
            legacy: false,
        }),

        // Version 4: chunk end time first, base-64 label value second.
        RANGE_KEY_V4 => Ok(RangeValue {
            chunk_id: utf8(components[2])?,
            label_value: decode_base64_value(components[1])?,
            legacy: false,
        }),

        // Version 5: the label value lives in the value cell, raw.
        RANGE_KEY_V5 => Ok(RangeValue {
            chunk_id: utf8(components[2])?,
            label_value: utf8(value)?,
            legacy: false,
        }),

        version => UnknownRangeKeyVersionSnafu {
            version: String::from_utf8_lossy(version).into_owned(),
        }
        .fail(),
    }
}

fn utf8(bs: &[u8]) -> Result<String> {
    String::from_utf8(bs.to_vec()).context(InvalidUtf8Snafu)
}
