//! Google's polyline algorithm, generalized to any precision. The first value of each pair is
//! written first, whatever it means: grid `[x, y]`, `[distance_mm, elevation]`, or `[lat, lon]`.
//!
//! See <https://developers.google.com/maps/documentation/utilities/polylinealgorithm>.

use std::str::Bytes;

use thiserror::Error;

/// Grid coordinates and elevation profiles travel as whole meters / millimeters.
pub const GRID_PRECISION: u32 = 0;
/// Shapes returned by the pedestrian routing service.
pub const ROUTING_PRECISION: u32 = 6;

#[derive(Debug, Error, PartialEq)]
pub enum PolylineError {
    #[error("invalid polyline character {0:?} at byte {1}")]
    InvalidCharacter(char, usize),
    #[error("polyline ends in the middle of a value")]
    Truncated,
    #[error("polyline has an odd number of values")]
    UnpairedValue,
}

pub fn encode(pairs: &[[f64; 2]], precision: u32) -> String {
    let factor = 10_f64.powi(precision as i32);
    let mut out = String::new();
    let mut prev = [0_i64; 2];
    for pair in pairs {
        for i in 0..2 {
            let value = (pair[i] * factor).round() as i64;
            write_value(&mut out, value - prev[i]);
            prev[i] = value;
        }
    }
    out
}

pub fn decode(encoded: &str, precision: u32) -> Result<Vec<[f64; 2]>, PolylineError> {
    let factor = 10_f64.powi(precision as i32);
    let mut reader = Reader {
        bytes: encoded.bytes(),
        offset: 0,
    };
    let mut pairs = Vec::new();
    let mut cursor = [0_i64; 2];

    while let Some(first) = reader.read_value()? {
        let second = reader.read_value()?.ok_or(PolylineError::UnpairedValue)?;
        cursor[0] += first;
        cursor[1] += second;
        pairs.push([cursor[0] as f64 / factor, cursor[1] as f64 / factor]);
    }
    Ok(pairs)
}

fn write_value(out: &mut String, value: i64) {
    // Zig-zag, so small negative deltas stay short
    let mut rest = ((value << 1) ^ (value >> 63)) as u64;
    while rest >= 0x20 {
        out.push(char::from((0x20 | (rest & 0x1f)) as u8 + 63));
        rest >>= 5;
    }
    out.push(char::from(rest as u8 + 63));
}

struct Reader<'a> {
    bytes: Bytes<'a>,
    offset: usize,
}

impl Reader<'_> {
    // Ok(None) only at a clean end of input
    fn read_value(&mut self) -> Result<Option<i64>, PolylineError> {
        let mut result: u64 = 0;
        let mut shift = 0;
        let mut started = false;
        loop {
            let Some(byte) = self.bytes.next() else {
                return if started {
                    Err(PolylineError::Truncated)
                } else {
                    Ok(None)
                };
            };
            self.offset += 1;
            started = true;
            if !(63..=126).contains(&byte) || shift > 63 {
                return Err(PolylineError::InvalidCharacter(
                    char::from(byte),
                    self.offset - 1,
                ));
            }
            let chunk = (byte - 63) as u64;
            result |= (chunk & 0x1f) << shift;
            shift += 5;
            if chunk & 0x20 == 0 {
                break;
            }
        }
        let value = if result & 1 == 1 {
            !(result >> 1) as i64
        } else {
            (result >> 1) as i64
        };
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_example() {
        // The worked example from Google's documentation, precision 5
        let pts = [[38.5, -120.2], [40.7, -120.95], [43.252, -126.453]];
        assert_eq!(encode(&pts, 5), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");

        let decoded = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@", 5).unwrap();
        for (a, b) in decoded.iter().zip(pts.iter()) {
            assert!((a[0] - b[0]).abs() < 1e-9);
            assert!((a[1] - b[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn grid_path_round_trips_at_precision_zero() {
        let path = [
            [2_600_123.0, 1_199_875.0],
            [2_600_180.0, 1_199_860.0],
            [2_599_990.0, 1_200_410.0],
        ];
        let encoded = encode(&path, GRID_PRECISION);
        assert_eq!(decode(&encoded, GRID_PRECISION).unwrap(), path.to_vec());
    }

    #[test]
    fn rounds_to_the_precision() {
        let encoded = encode(&[[1_250.4, 612.6]], GRID_PRECISION);
        assert_eq!(decode(&encoded, GRID_PRECISION).unwrap(), vec![[1_250.0, 613.0]]);

        let shape = [[46.948_01, 7.447_44], [46.951_234_5, 7.438_76]];
        let decoded = decode(&encode(&shape, ROUTING_PRECISION), ROUTING_PRECISION).unwrap();
        for (a, b) in decoded.iter().zip(shape.iter()) {
            assert!((a[0] - b[0]).abs() <= 0.5e-6);
            assert!((a[1] - b[1]).abs() <= 0.5e-6);
        }
    }

    #[test]
    fn empty_string_is_empty_line() {
        assert_eq!(decode("", GRID_PRECISION).unwrap(), Vec::<[f64; 2]>::new());
        assert_eq!(encode(&[], GRID_PRECISION), "");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            decode("_p~iF ", 5),
            Err(PolylineError::InvalidCharacter(' ', 5))
        );
        // A continuation chunk with nothing after it
        assert_eq!(decode("_", 5), Err(PolylineError::Truncated));
        // One complete value without its partner
        assert_eq!(decode("_p~iF", 5), Err(PolylineError::UnpairedValue));
    }
}
