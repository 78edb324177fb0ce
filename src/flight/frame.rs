//! Codec for the 8-byte flight datagram.
//!
//! Layout `66 RR PP TT YY FF CC 99`: magic, roll, pitch, throttle, yaw,
//! flags, crc, magic. Stick bytes encode [-1.0, +1.0] around a 0x80
//! midpoint; the CRC is a bit-serial rotate-and-xor over the whole frame
//! with the crc byte zeroed.

use bitflags::bitflags;

use crate::error::Error;

pub const FRAME_LEN: usize = 8;
pub const MAGIC_START: u8 = 0x66;
pub const MAGIC_END: u8 = 0x99;

/// Stick byte for a centered stick.
pub const NEUTRAL: u8 = 0x80;

// Byte offsets within the datagram.
pub const ROLL: usize = 1;
pub const PITCH: usize = 2;
pub const THROTTLE: usize = 3;
pub const YAW: usize = 4;
pub const FLAGS: usize = 5;
pub const CRC: usize = 6;

bitflags! {
    /// Action bits of the flags byte.
    ///
    /// All but `COMPASS` are momentary: the drone expects them held for
    /// about a second of frames and then released. `COMPASS` (headless
    /// mode) stays set until explicitly cleared.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        const TAKE_OFF = 1 << 0;
        const LAND     = 1 << 1;
        const STOP     = 1 << 2;
        const FLIP     = 1 << 3;
        const COMPASS  = 1 << 4;
        /// Shutter button. Blinks but does nothing on fpv models; the
        /// camera client is the reliable path.
        const PHOTO    = 1 << 5;
        /// Record button, same caveat as `PHOTO`.
        const VIDEO    = 1 << 6;
        const GYRO     = 1 << 7;
    }
}

/// A freshly sealed all-neutral datagram.
pub fn neutral() -> [u8; FRAME_LEN] {
    // The neutral frame's crc happens to be zero, but seal anyway so the
    // constant can't drift from the algorithm.
    let mut frame = [
        MAGIC_START,
        NEUTRAL,
        NEUTRAL,
        NEUTRAL,
        NEUTRAL,
        0x00,
        0x00,
        MAGIC_END,
    ];
    seal(&mut frame);
    frame
}

/// Convert a stick position to its wire byte.
///
/// -1.0 → 0x01, 0.0 → 0x80, +1.0 → 0xff; out-of-range input clamps.
pub fn normalize_stick(val: f64) -> u8 {
    let val = val.clamp(-1.0, 1.0);
    (128.0 + val * 127.0) as u8
}

/// Bit-serial CRC over the full frame, MSB first.
///
/// ```text
///             crc
///     --[1][1][1][1][1][1][1][1] <-- xor <-- data bits
///    |________________________________^
/// ```
///
/// A sealed frame checksums to zero.
pub fn crc(frame: &[u8]) -> u8 {
    let mut crc: u8 = 0xff;
    for &byte in frame {
        for bit in (0..8).rev() {
            crc = (crc.rotate_left(1)) ^ ((byte >> bit) & 1);
        }
    }
    crc
}

/// Recompute and store the crc byte.
pub fn seal(frame: &mut [u8; FRAME_LEN]) {
    frame[CRC] = 0;
    frame[CRC] = crc(frame);
}

/// Check length, both magics, and the checksum.
pub fn validate(frame: &[u8]) -> Result<(), Error> {
    if frame.len() != FRAME_LEN {
        return Err(Error::BadLength(frame.len()));
    }
    if frame[0] != MAGIC_START || frame[FRAME_LEN - 1] != MAGIC_END {
        return Err(Error::BadMagic);
    }
    if crc(frame) != 0 {
        return Err(Error::BadCrc);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoints() {
        assert_eq!(normalize_stick(-1.0), 0x01);
        assert_eq!(normalize_stick(0.0), 0x80);
        assert_eq!(normalize_stick(1.0), 0xff);
    }

    #[test]
    fn test_normalize_clamps() {
        assert_eq!(normalize_stick(2.0), 0xff);
        assert_eq!(normalize_stick(-2.0), 0x01);
        assert_eq!(normalize_stick(f64::INFINITY), 0xff);
        assert_eq!(normalize_stick(f64::NEG_INFINITY), 0x01);
    }

    #[test]
    fn test_normalize_half_deflections() {
        // Fractional results truncate toward zero: 128 + 63.5 → 0xbf.
        assert_eq!(normalize_stick(0.5), 0xbf);
        assert_eq!(normalize_stick(-0.5), 0x40);
        assert_eq!(normalize_stick(0.25), 0x9f);
        assert_eq!(normalize_stick(-0.25), 0x60);
    }

    #[test]
    fn test_normalize_monotone() {
        let mut prev = 0u8;
        let mut v = -1.0;
        while v <= 1.0 {
            let b = normalize_stick(v);
            assert!(b >= prev, "normalize not monotone at {v}");
            prev = b;
            v += 1.0 / 64.0;
        }
    }

    #[test]
    fn test_neutral_frame_bytes() {
        assert_eq!(
            neutral(),
            [0x66, 0x80, 0x80, 0x80, 0x80, 0x00, 0x00, 0x99]
        );
        assert!(validate(&neutral()).is_ok());
    }

    #[test]
    fn test_known_crc_vectors() {
        // Computed with the bit-level procedure by hand.
        let cases: [([u8; 8], u8); 4] = [
            ([0x66, 0x01, 0xff, 0xbf, 0x40, 0x00, 0x00, 0x99], 0x01),
            ([0x66, 0x80, 0x80, 0x80, 0x80, 0x01, 0x00, 0x99], 0x01),
            ([0x66, 0x80, 0x80, 0x80, 0x80, 0x10, 0x00, 0x99], 0x10),
            ([0x66, 0x12, 0x34, 0x56, 0x78, 0x88, 0x00, 0x99], 0x80),
        ];
        for (mut frame, expected) in cases {
            seal(&mut frame);
            assert_eq!(frame[CRC], expected, "crc mismatch for {frame:02x?}");
            assert_eq!(crc(&frame), 0);
            assert!(validate(&frame).is_ok());
        }
    }

    #[test]
    fn test_validate_rejects_corruption() {
        let good = neutral();

        for idx in [0, FLAGS, 7] {
            let mut bad = good;
            bad[idx] ^= 0x01;
            assert!(validate(&bad).is_err(), "flipping byte {idx} not caught");
        }

        assert!(matches!(validate(&good[..7]), Err(Error::BadLength(7))));
        let mut bad = good;
        bad[0] = 0x00;
        assert!(matches!(validate(&bad), Err(Error::BadMagic)));
        bad = good;
        bad[CRC] ^= 0xff;
        assert!(matches!(validate(&bad), Err(Error::BadCrc)));
    }

    #[test]
    fn test_seal_after_any_mutation() {
        let mut frame = neutral();
        frame[ROLL] = normalize_stick(0.3);
        frame[FLAGS] = Flags::FLIP.bits() | Flags::COMPASS.bits();
        seal(&mut frame);
        assert!(validate(&frame).is_ok());
    }
}
