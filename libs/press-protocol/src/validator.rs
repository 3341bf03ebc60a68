//! Response validation
//!
//! A response is accepted only if it is exactly 7 bytes, echoes the
//! expected header and carries a matching CRC. The checks run in that
//! order and the first failure decides the outcome.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{CRC_LEN, RESPONSE_FRAME_LEN};
use crate::crc::crc16;
use crate::frame::ExpectedHeader;

/// Result of validating one response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Well-formed response carrying the register value
    Valid(u16),
    /// Some bytes arrived, but not exactly 7
    LengthMismatch,
    /// Address, function code or byte count differs from the query
    HeaderMismatch,
    /// Trailing CRC does not match the frame body
    CrcMismatch,
    /// Nothing arrived before the read timeout
    Timeout,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }

    /// Measured value, present only for [`ValidationOutcome::Valid`]
    pub fn value(&self) -> Option<u16> {
        match self {
            ValidationOutcome::Valid(v) => Some(*v),
            _ => None,
        }
    }

    /// Short token persisted in the record store
    pub fn status_token(&self) -> &'static str {
        match self {
            ValidationOutcome::Valid(_) => "valid",
            ValidationOutcome::LengthMismatch => "length_mismatch",
            ValidationOutcome::HeaderMismatch => "header_mismatch",
            ValidationOutcome::CrcMismatch => "crc_mismatch",
            ValidationOutcome::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Valid(v) => write!(f, "valid({v})"),
            other => f.write_str(other.status_token()),
        }
    }
}

/// Validate a received byte sequence against the expected header
pub fn validate(response: &[u8], expected: &ExpectedHeader) -> ValidationOutcome {
    if response.is_empty() {
        return ValidationOutcome::Timeout;
    }

    if response.len() != RESPONSE_FRAME_LEN {
        debug!(
            "RTU response length mismatch: expected {}, got {}",
            RESPONSE_FRAME_LEN,
            response.len()
        );
        return ValidationOutcome::LengthMismatch;
    }

    if response[..3] != expected.as_bytes() {
        debug!(
            "RTU header mismatch: expected {:02X?}, got {:02X?}",
            expected.as_bytes(),
            &response[..3]
        );
        return ValidationOutcome::HeaderMismatch;
    }

    let body_len = RESPONSE_FRAME_LEN - CRC_LEN;
    let received_crc = u16::from_le_bytes([response[body_len], response[body_len + 1]]);
    let calculated_crc = crc16(&response[..body_len]);
    if received_crc != calculated_crc {
        debug!(
            "CRC mismatch: expected 0x{calculated_crc:04X}, got 0x{received_crc:04X}"
        );
        return ValidationOutcome::CrcMismatch;
    }

    ValidationOutcome::Valid(u16::from_be_bytes([response[3], response[4]]))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::frame::{expected_header, QueryTarget};

    const VALUE_100: [u8; 7] = [0x01, 0x03, 0x02, 0x00, 0x64, 0xB9, 0xAF];

    fn header() -> ExpectedHeader {
        expected_header(&QueryTarget::default())
    }

    #[test]
    fn test_valid_response() {
        assert_eq!(validate(&VALUE_100, &header()), ValidationOutcome::Valid(100));
    }

    #[test]
    fn test_value_is_big_endian() {
        // 0x03E8 = 1000
        let response = [0x01, 0x03, 0x02, 0x03, 0xE8, 0xB8, 0xFA];
        assert_eq!(validate(&response, &header()), ValidationOutcome::Valid(1000));

        let response = [0x01, 0x03, 0x02, 0xFF, 0xFF, 0xB9, 0xF4];
        assert_eq!(validate(&response, &header()), ValidationOutcome::Valid(0xFFFF));
    }

    #[test]
    fn test_zeroed_crc_is_rejected() {
        let response = [0x01, 0x03, 0x02, 0x00, 0x64, 0x00, 0x00];
        let outcome = validate(&response, &header());
        assert_eq!(outcome, ValidationOutcome::CrcMismatch);
        assert_eq!(outcome.value(), None);
    }

    #[test]
    fn test_empty_response_is_timeout() {
        assert_eq!(validate(&[], &header()), ValidationOutcome::Timeout);
    }

    #[test]
    fn test_length_boundaries() {
        assert_eq!(
            validate(&VALUE_100[..6], &header()),
            ValidationOutcome::LengthMismatch
        );

        let mut long = VALUE_100.to_vec();
        long.push(0x00);
        assert_eq!(validate(&long, &header()), ValidationOutcome::LengthMismatch);

        assert_eq!(
            validate(&VALUE_100[..1], &header()),
            ValidationOutcome::LengthMismatch
        );
    }

    #[test]
    fn test_header_mismatch() {
        // Wrong slave address (frame otherwise consistent, CRC valid for slave 2)
        let response = [0x02, 0x03, 0x02, 0x00, 0x64, 0xFD, 0xAF];
        assert_eq!(validate(&response, &header()), ValidationOutcome::HeaderMismatch);

        // Wrong function code
        let response = [0x01, 0x04, 0x02, 0x00, 0x64, 0xB8, 0xDB];
        assert_eq!(validate(&response, &header()), ValidationOutcome::HeaderMismatch);

        // Wrong byte count
        let mut response = VALUE_100;
        response[2] = 0x04;
        assert_eq!(validate(&response, &header()), ValidationOutcome::HeaderMismatch);
    }

    #[test]
    fn test_header_checked_before_crc() {
        let response = [0x09, 0x03, 0x02, 0x00, 0x64, 0x00, 0x00];
        assert_eq!(validate(&response, &header()), ValidationOutcome::HeaderMismatch);
    }

    #[test]
    fn test_single_byte_corruption_in_value_is_detected() {
        for idx in 3..5 {
            for flip in [0x01u8, 0x10, 0x80, 0xFF] {
                let mut response = VALUE_100;
                response[idx] ^= flip;
                assert_eq!(
                    validate(&response, &header()),
                    ValidationOutcome::CrcMismatch,
                    "byte {idx} xor {flip:02X}"
                );
            }
        }
    }

    #[test]
    fn test_single_byte_corruption_never_validates() {
        for idx in 0..5 {
            for flip in 1..=255u8 {
                let mut response = VALUE_100;
                response[idx] ^= flip;
                assert!(
                    !validate(&response, &header()).is_valid(),
                    "byte {idx} xor {flip:02X}"
                );
            }
        }
    }

    #[test]
    fn test_validate_is_idempotent() {
        let samples: [&[u8]; 5] = [
            &VALUE_100,
            &[0x01, 0x03, 0x02, 0x00, 0x64, 0x00, 0x00],
            &[0x01, 0x03, 0x02],
            &[],
            &[0x05, 0x03, 0x02, 0x00, 0x64, 0xB9, 0xAF],
        ];
        for sample in samples {
            let first = validate(sample, &header());
            let second = validate(sample, &header());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_status_tokens() {
        assert_eq!(ValidationOutcome::Valid(1).status_token(), "valid");
        assert_eq!(ValidationOutcome::LengthMismatch.status_token(), "length_mismatch");
        assert_eq!(ValidationOutcome::HeaderMismatch.status_token(), "header_mismatch");
        assert_eq!(ValidationOutcome::CrcMismatch.status_token(), "crc_mismatch");
        assert_eq!(ValidationOutcome::Timeout.status_token(), "timeout");
    }

    #[test]
    fn test_outcome_display_and_serde() {
        assert_eq!(ValidationOutcome::Valid(42).to_string(), "valid(42)");
        assert_eq!(ValidationOutcome::CrcMismatch.to_string(), "crc_mismatch");
        assert_eq!(
            serde_json::to_string(&ValidationOutcome::Timeout).unwrap(),
            "\"timeout\""
        );
    }
}
