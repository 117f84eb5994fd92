//! Google encoded polyline codec.
//!
//! Each coordinate axis is stored as a zig-zag encoded delta from the previous
//! point, split into 5-bit groups written as ASCII characters offset by 63.
//! A group with bit `0x20` set is followed by another group of the same value.
//! Precision is fixed at 1e-5 degrees.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Degrees are stored as integers scaled by this factor.
const PRECISION: f64 = 100_000.0;

const CHAR_OFFSET: u8 = 63;
const CONTINUATION: u32 = 0x20;
const CHUNK_MASK: u32 = 0x1f;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Errors produced while decoding an encoded polyline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("polyline ends in the middle of a value at byte {offset}")]
    Truncated { offset: usize },
    #[error("invalid polyline character {found:?} at byte {offset}")]
    InvalidCharacter { offset: usize, found: char },
    #[error("polyline value starting at byte {offset} does not fit in 32 bits")]
    Overflow { offset: usize },
}

/// Iterator over the points of an encoded polyline.
///
/// A clone continues from the same position as the original, so cloning
/// before iterating gives a replayable sequence. Once an error is yielded the
/// iterator is exhausted.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    index: usize,
    lat: i64,
    lng: i64,
    failed: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(encoded: &'a str) -> Self {
        Self {
            bytes: encoded.as_bytes(),
            index: 0,
            lat: 0,
            lng: 0,
            failed: false,
        }
    }

    /// Reads one zig-zag encoded value and returns the signed delta.
    fn next_delta(&mut self) -> Result<i64, DecodeError> {
        let start = self.index;
        let mut result: u32 = 0;
        let mut shift: u32 = 0;

        loop {
            let Some(&byte) = self.bytes.get(self.index) else {
                return Err(DecodeError::Truncated { offset: self.index });
            };
            if !(CHAR_OFFSET..=126).contains(&byte) {
                // Recover the full char for the message when the input is non-ASCII.
                let found = std::str::from_utf8(&self.bytes[self.index..])
                    .ok()
                    .and_then(|s| s.chars().next())
                    .unwrap_or(byte as char);
                return Err(DecodeError::InvalidCharacter {
                    offset: self.index,
                    found,
                });
            }
            self.index += 1;

            let chunk = u32::from(byte - CHAR_OFFSET);
            if shift >= 32 || (shift > 0 && (chunk & CHUNK_MASK) >> (32 - shift) != 0) {
                return Err(DecodeError::Overflow { offset: start });
            }
            result |= (chunk & CHUNK_MASK) << shift;
            shift += 5;

            if chunk & CONTINUATION == 0 {
                break;
            }
        }

        let value = if result & 1 == 1 {
            !(result >> 1) as i32
        } else {
            (result >> 1) as i32
        };
        Ok(i64::from(value))
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<GeoPoint, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.bytes.len() {
            return None;
        }

        let point = self.next_delta().and_then(|dlat| {
            let dlng = self.next_delta()?;
            self.lat += dlat;
            self.lng += dlng;
            Ok(GeoPoint::new(
                self.lat as f64 / PRECISION,
                self.lng as f64 / PRECISION,
            ))
        });

        if point.is_err() {
            self.failed = true;
        }
        Some(point)
    }
}

impl std::iter::FusedIterator for Decoder<'_> {}

/// Decodes an encoded polyline into its ordered points.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the string ends mid-value, contains a
/// character outside the encoding alphabet, or encodes an out-of-range value.
pub fn decode(encoded: &str) -> Result<Vec<GeoPoint>, DecodeError> {
    Decoder::new(encoded).collect()
}

/// Encodes points into a polyline string at 1e-5 precision.
pub fn encode(points: &[GeoPoint]) -> String {
    let mut out = String::new();
    let mut prev_lat = 0i64;
    let mut prev_lng = 0i64;

    for point in points {
        let lat = (point.latitude * PRECISION).round() as i64;
        let lng = (point.longitude * PRECISION).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn encode_value(delta: i64, out: &mut String) {
    let mut value = if delta < 0 {
        !((delta as u64) << 1)
    } else {
        (delta as u64) << 1
    };

    while value >= u64::from(CONTINUATION) {
        let chunk = (u64::from(CONTINUATION) | (value & u64::from(CHUNK_MASK))) as u8;
        out.push((chunk + CHAR_OFFSET) as char);
        value >>= 5;
    }
    out.push((value as u8 + CHAR_OFFSET) as char);
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    fn assert_close(actual: &GeoPoint, lat: f64, lng: f64) {
        assert!(
            (actual.latitude - lat).abs() < 1e-5,
            "latitude {} != {}",
            actual.latitude,
            lat
        );
        assert!(
            (actual.longitude - lng).abs() < 1e-5,
            "longitude {} != {}",
            actual.longitude,
            lng
        );
    }

    #[test]
    fn test_decode_empty_string() {
        assert_eq!(decode("").unwrap(), Vec::new());
    }

    #[test]
    fn test_decode_reference_polyline() {
        let points = decode(REFERENCE).unwrap();
        assert_eq!(points.len(), 3);
        assert_close(&points[0], 38.5, -120.2);
        assert_close(&points[1], 40.7, -120.95);
        assert_close(&points[2], 43.252, -126.453);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let first = decode(REFERENCE).unwrap();
        let second = decode(REFERENCE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decoder_can_be_replayed() {
        let decoder = Decoder::new(REFERENCE);
        let replay = decoder.clone();
        let a: Vec<_> = decoder.collect();
        let b: Vec<_> = replay.collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_truncated_mid_group() {
        // '_' has the continuation bit set, so the value never finishes.
        let err = decode("_").unwrap_err();
        assert_eq!(err, DecodeError::Truncated { offset: 1 });
    }

    #[test]
    fn test_decode_missing_longitude() {
        // "_p~iF" is a complete latitude with nothing after it.
        let err = decode("_p~iF").unwrap_err();
        assert_eq!(err, DecodeError::Truncated { offset: 5 });
    }

    #[test]
    fn test_decode_truncated_after_valid_points() {
        let input = &REFERENCE[..REFERENCE.len() - 1];
        let mut decoder = Decoder::new(input);
        assert!(decoder.next().unwrap().is_ok());
        assert!(decoder.next().unwrap().is_ok());
        assert!(decoder.next().unwrap().is_err());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_decode_invalid_character() {
        let err = decode("_p~iF ~ps|U").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidCharacter {
                offset: 5,
                found: ' '
            }
        );
    }

    #[test]
    fn test_decode_overflow() {
        // Eight continuation groups carry 40 bits of payload.
        let err = decode("~~~~~~~~?").unwrap_err();
        assert_eq!(err, DecodeError::Overflow { offset: 0 });
    }

    #[test]
    fn test_encode_reference_points() {
        let points = vec![
            GeoPoint::new(38.5, -120.2),
            GeoPoint::new(40.7, -120.95),
            GeoPoint::new(43.252, -126.453),
        ];
        assert_eq!(encode(&points), REFERENCE);
    }

    #[test]
    fn test_decode_campus_loop() {
        let points = vec![
            GeoPoint::new(44.56512, -123.28437),
            GeoPoint::new(44.56701, -123.27912),
            GeoPoint::new(44.56398, -123.27501),
        ];
        let decoded = decode(&encode(&points)).unwrap();
        for (actual, expected) in decoded.iter().zip(&points) {
            assert_close(actual, expected.latitude, expected.longitude);
        }
    }
}
