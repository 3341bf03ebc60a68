//! Query frame assembly
//!
//! Builds the fixed 8-byte FC03 request and derives the header a valid
//! response has to echo back.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    DEFAULT_REGISTER_ADDRESS, DEFAULT_SLAVE_ADDRESS, FC_READ_HOLDING_REGISTERS, QUERY_FRAME_LEN,
    REGISTER_COUNT, RESPONSE_BYTE_COUNT,
};
use crate::crc::append_crc16;

/// Device addressing for the single register being polled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTarget {
    /// Modbus slave ID
    pub slave_address: u8,
    /// Holding register address
    pub register_address: u16,
}

impl Default for QueryTarget {
    fn default() -> Self {
        Self {
            slave_address: DEFAULT_SLAVE_ADDRESS,
            register_address: DEFAULT_REGISTER_ADDRESS,
        }
    }
}

/// Complete RTU query: `[slave][0x03][reg hi][reg lo][0x00][0x01][crc lo][crc hi]`
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct QueryFrame([u8; QUERY_FRAME_LEN]);

impl QueryFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn slave_address(&self) -> u8 {
        self.0[0]
    }

    pub fn register_address(&self) -> u16 {
        u16::from_be_bytes([self.0[2], self.0[3]])
    }
}

impl AsRef<[u8]> for QueryFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for QueryFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryFrame(")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02X}")?;
        }
        write!(f, ")")
    }
}

/// Header fields a response to our query must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedHeader {
    pub address: u8,
    pub function: u8,
    pub byte_count: u8,
}

impl ExpectedHeader {
    pub fn as_bytes(&self) -> [u8; 3] {
        [self.address, self.function, self.byte_count]
    }
}

/// Build the FC03 single-register query for `target`
pub fn build_query(target: &QueryTarget) -> QueryFrame {
    let mut frame = Vec::with_capacity(QUERY_FRAME_LEN);

    frame.push(target.slave_address);
    frame.push(FC_READ_HOLDING_REGISTERS);
    frame.extend_from_slice(&target.register_address.to_be_bytes());
    frame.extend_from_slice(&REGISTER_COUNT.to_be_bytes());
    append_crc16(&mut frame);

    let mut bytes = [0u8; QUERY_FRAME_LEN];
    bytes.copy_from_slice(&frame);

    debug!(
        "Building RTU query: unit_id={}, FC={:02X}, reg={:04X}, CRC={:02X}{:02X}",
        target.slave_address, FC_READ_HOLDING_REGISTERS, target.register_address, bytes[7], bytes[6]
    );

    QueryFrame(bytes)
}

/// Header a valid response to [`build_query`] must start with
pub fn expected_header(target: &QueryTarget) -> ExpectedHeader {
    ExpectedHeader {
        address: target.slave_address,
        function: FC_READ_HOLDING_REGISTERS,
        byte_count: RESPONSE_BYTE_COUNT,
    }
}
