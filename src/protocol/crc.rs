//! MAVLink frame checksum
//!
//! MAVLink uses CRC-16/MCRF4XX (the X.25 variant with init 0xFFFF, reflected,
//! no final xor) over every header byte after the start marker, the payload,
//! and finally the per-message CRC extra byte.

use crc::{CRC_16_MCRF4XX, Crc};

const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Checksum of one frame.
///
/// `header` excludes the start-of-frame marker.
pub fn frame_checksum(header: &[u8], payload: &[u8], crc_extra: u8) -> u16 {
    let mut digest = X25.digest();
    digest.update(header);
    digest.update(payload);
    digest.update(&[crc_extra]);
    digest.finalize()
}
