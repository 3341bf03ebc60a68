//! Protocol constants for the single-register transducer exchange
//!
//! The transducer answers exactly one request shape: FC03 for one holding
//! register. Everything below is derived from that fixed layout.

// ============================================================================
// Function Codes
// ============================================================================

/// Read Holding Registers
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Query frame length
/// Format: Slave(1) + FC(1) + Start(2) + Count(2) + CRC(2) = 8 bytes
pub const QUERY_FRAME_LEN: usize = 8;

/// Response frame length
/// Format: Slave(1) + FC(1) + ByteCount(1) + Value(2) + CRC(2) = 7 bytes
pub const RESPONSE_FRAME_LEN: usize = 7;

/// Number of trailing CRC bytes on every RTU frame
pub const CRC_LEN: usize = 2;

/// Registers requested per query
pub const REGISTER_COUNT: u16 = 1;

/// Byte count a well-formed response carries (one 16-bit register)
pub const RESPONSE_BYTE_COUNT: u8 = (REGISTER_COUNT * 2) as u8;

// ============================================================================
// Addressing
// ============================================================================

/// Default slave address of the transducer
pub const DEFAULT_SLAVE_ADDRESS: u8 = 0x01;

/// Default holding register carrying the pressure value
pub const DEFAULT_REGISTER_ADDRESS: u16 = 0x0000;

/// Highest valid unicast slave address on an RTU bus
pub const MAX_SLAVE_ADDRESS: u8 = 247;
