//! Frame checksum: CRC-16/ARC.
//!
//! Reflected polynomial 0x8005 (0xA001), initial value 0x0000, no final
//! XOR. The checksum covers every frame byte from the magic up to, but not
//! including, the trailing checksum itself.

use crc::{Crc, CRC_16_ARC};

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Computes the CRC-16/ARC checksum of `data`.
pub fn checksum(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
