//! Conversion between a linear sector index and the BCD
//! minute/second/frame triple used throughout the CD format (subchannel
//! Q, CUE `INDEX`/`PREGAP` operands, on-disk TOC entries).
//!
//! A CD sector is also called a "frame"; there are 75 of them per
//! second, 60 seconds per minute.

use crate::bcd::Bcd;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sectors per second.
pub const SECTORS_PER_SECOND: u32 = 75;
/// Sectors per minute.
pub const SECTORS_PER_MINUTE: u32 = SECTORS_PER_SECOND * 60;

/// Number of linear sectors representable as a BCD `mm:ss:ff` triple
/// (`mm` 0-99): valid linear indices are `0..MAX_SECTORS`. Backends
/// must reject, at open time, any image whose sector count would
/// exceed this, since [`Position::from_linear`] has no failure mode
/// of its own.
pub const MAX_SECTORS: u32 = 99 * SECTORS_PER_MINUTE + 59 * SECTORS_PER_SECOND + 74 + 1;

/// A disc position expressed as BCD-packed minutes, seconds and
/// frames (sectors).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    mm: Bcd,
    ss: Bcd,
    ff: Bcd,
}

impl Position {
    /// Build a `Position` from the linear index of a sector (sector 0
    /// is the very first sector of the disc, generally somewhere in
    /// the 2-second lead-in pregap).
    ///
    /// This function has no failure mode, provided `linear < MAX_SECTORS`:
    /// every backend validates its total sector count against
    /// `MAX_SECTORS` at open time, so this precondition is guaranteed
    /// to hold for any position this crate ever constructs.
    pub fn from_linear(linear: u32) -> Position {
        let mm = linear / SECTORS_PER_MINUTE;
        let rem = linear % SECTORS_PER_MINUTE;
        let ss = rem / SECTORS_PER_SECOND;
        let ff = rem % SECTORS_PER_SECOND;

        Position {
            mm: Bcd::from_binary(mm as u8).expect("disc position minute overflowed BCD range"),
            ss: Bcd::from_binary(ss as u8).expect("impossible: seconds always < 60"),
            ff: Bcd::from_binary(ff as u8).expect("impossible: frames always < 75"),
        }
    }

    /// Build a `Position` directly from already-validated BCD fields,
    /// as read from a subchannel-Q record or an LSD record.
    pub fn from_bcd(mm: Bcd, ss: Bcd, ff: Bcd) -> Position {
        Position { mm, ss, ff }
    }

    /// The linear sector index this position refers to.
    pub fn to_linear(self) -> u32 {
        let mm = self.mm.binary() as u32;
        let ss = self.ss.binary() as u32;
        let ff = self.ff.binary() as u32;

        mm * SECTORS_PER_MINUTE + ss * SECTORS_PER_SECOND + ff
    }

    /// Minutes, in BCD.
    pub fn mm(self) -> Bcd {
        self.mm
    }

    /// Seconds, in BCD.
    pub fn ss(self) -> Bcd {
        self.ss
    }

    /// Frames (sectors), in BCD.
    pub fn ff(self) -> Bcd {
        self.ff
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.mm.binary(),
            self.ss.binary(),
            self.ff.binary()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        for linear in [0u32, 1, 74, 75, 149, 150, 4499, 4500, 100_000] {
            let pos = Position::from_linear(linear);
            assert_eq!(pos.to_linear(), linear);
        }
    }

    #[test]
    fn max_sectors_is_the_largest_bcd_triple_plus_one() {
        assert_eq!(MAX_SECTORS, 450_000);

        let pos = Position::from_linear(MAX_SECTORS - 1);
        assert_eq!(pos.mm().binary(), 99);
        assert_eq!(pos.ss().binary(), 59);
        assert_eq!(pos.ff().binary(), 74);
        assert_eq!(pos.to_linear(), MAX_SECTORS - 1);
    }

    #[test]
    fn known_values() {
        // 150 sectors = 2 seconds exactly.
        let pos = Position::from_linear(150);
        assert_eq!(pos.mm().binary(), 0);
        assert_eq!(pos.ss().binary(), 2);
        assert_eq!(pos.ff().binary(), 0);
        assert_eq!(format!("{}", pos), "00:02:00");

        // S1's pos_last_sector: linear 299 -> 00:03:74.
        let pos = Position::from_linear(299);
        assert_eq!(pos.mm().binary(), 0);
        assert_eq!(pos.ss().binary(), 3);
        assert_eq!(pos.ff().binary(), 74);
    }
}
