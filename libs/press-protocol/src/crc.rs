//! Modbus RTU CRC16
//!
//! Reflected polynomial 0xA001, initial register 0xFFFF, no final XOR.
//! The result goes on the wire low byte first.

/// Calculate CRC16 checksum (Modbus RTU standard)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;

    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Compute the CRC over `frame` and append it little-endian
pub fn append_crc16(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_calculation() {
        let data = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
        // CRC calculation result should be 0x0A84 (2692 in decimal)
        assert_eq!(crc16(&data), 0x0A84);
        assert_eq!(crc16(&data).to_le_bytes(), [0x84, 0x0A]);
    }

    #[test]
    fn test_crc16_response_vector() {
        // 01 03 02 00 64 -> value 100, trailer B9 AF
        assert_eq!(crc16(&[0x01, 0x03, 0x02, 0x00, 0x64]), 0xAFB9);
    }

    #[test]
    fn test_crc16_empty_data() {
        assert_eq!(crc16(&[]), 0xFFFF); // Initial CRC value when no data processed
    }

    #[test]
    fn test_crc16_consistency() {
        let data = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01];

        // Same data should produce same CRC
        let crc1 = crc16(&data);
        let crc2 = crc16(&data);
        assert_eq!(crc1, crc2);
    }

    #[test]
    fn test_append_crc16() {
        let mut frame = vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
        append_crc16(&mut frame);
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
    }

    #[test]
    fn test_crc16_over_frame_with_crc_is_zero() {
        // A frame followed by its own little-endian CRC folds to zero
        let mut frame = vec![0x11, 0x03, 0x00, 0x6B, 0x00, 0x03];
        append_crc16(&mut frame);
        assert_eq!(crc16(&frame), 0x0000);
    }
}
