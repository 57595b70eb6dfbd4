//! ASCII-hex encoding of telemetry values.
//!
//! The module expects scalar values as fixed-width, big-endian hexadecimal.
//! Going through `to_be_bytes` makes the output independent of the host's
//! byte order.

use crate::error::{AtError, AtResult};

/// Encode a boolean as two hex characters (`"00"` or `"01"`).
pub fn bool_to_hex(value: bool) -> String {
    hex::encode([u8::from(value)])
}

/// Encode an IEEE-754 single as eight big-endian hex characters.
pub fn f32_to_hex(value: f32) -> String {
    hex::encode(value.to_be_bytes())
}

/// Encode an IEEE-754 double as sixteen big-endian hex characters.
pub fn f64_to_hex(value: f64) -> String {
    hex::encode(value.to_be_bytes())
}

/// Decode the output of [`bool_to_hex`].
pub fn bool_from_hex(text: &str) -> AtResult<bool> {
    let bytes: [u8; 1] = decode_exact(text)?;
    match bytes[0] {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(AtError::InvalidArgument(format!(
            "not a boolean: 0x{other:02x}"
        ))),
    }
}

/// Decode the output of [`f32_to_hex`].
pub fn f32_from_hex(text: &str) -> AtResult<f32> {
    decode_exact(text).map(f32::from_be_bytes)
}

/// Decode the output of [`f64_to_hex`].
pub fn f64_from_hex(text: &str) -> AtResult<f64> {
    decode_exact(text).map(f64::from_be_bytes)
}

fn decode_exact<const N: usize>(text: &str) -> AtResult<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(text, &mut out)
        .map_err(|e| AtError::InvalidArgument(format!("bad hex value '{text}': {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_encoding() {
        assert_eq!(bool_to_hex(true), "01");
        assert_eq!(bool_to_hex(false), "00");
        assert!(bool_from_hex("01").unwrap());
        assert!(!bool_from_hex("00").unwrap());
        assert!(bool_from_hex("02").is_err());
    }

    #[test]
    fn test_f64_one_is_big_endian() {
        assert_eq!(f64_to_hex(1.0), "3ff0000000000000");
        assert_eq!(f64_to_hex(-2.5), "c004000000000000");
        assert_eq!(f64_to_hex(1.0).len(), 16);
    }

    #[test]
    fn test_f32_encoding() {
        assert_eq!(f32_to_hex(1.0), "3f800000");
        assert_eq!(f32_from_hex("3f800000").unwrap(), 1.0);
    }

    #[test]
    fn test_f64_inverse() {
        for value in [0.0, -0.0, 1.0, 21.5, -1e-300, f64::MAX, f64::MIN_POSITIVE] {
            let decoded = f64_from_hex(&f64_to_hex(value)).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_decode_rejects_wrong_width() {
        assert!(f64_from_hex("3ff0").is_err());
        assert!(f64_from_hex("zz").is_err());
    }
}
