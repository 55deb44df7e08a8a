//! Subchannel-Q synthesis.
//!
//! Both backends build a plausible Q record on the fly rather than
//! reading one from disk: CUE/BIN and ISO images only carry user data,
//! never the side-band channels a physical drive would produce.

use crate::bcd::Bcd;
use crate::crc::crc_subq;
use crate::position::Position;
use crate::sector::TrackType;

/// Size in bytes of a subchannel-Q record: one synchronization
/// placeholder byte followed by the 12 bytes of packed Q data.
pub const SUBQ_SIZE: usize = 13;

/// Track-relative position within the current index, following the
/// pregap countdown convention: while still inside the pregap (before
/// `index_01`), the relative time counts *down* to zero, one sector
/// short of where it would naively land.
///
/// This `-1` is inherited from established emulator practice (see
/// `original_source/src/cue.c`'s `read_q`, which credits mednafen) and
/// is preserved here for bit-compatibility rather than re-derived.
fn track_relative(current_sec: u32, index_01: u32) -> Position {
    let rel = if current_sec >= index_01 {
        current_sec - index_01
    } else {
        index_01 - 1 - current_sec
    };

    Position::from_linear(rel)
}

/// Build a synthesized subchannel-Q record into `buf`.
///
/// `track_bcd` and `index_bcd` are the 1-based track number and the
/// current index id, both already BCD-encoded. `index_01` is the
/// absolute linear sector of the track's `INDEX 01`, used for the
/// track-relative MSF countdown. `current_sec` is the absolute linear
/// sector being read.
pub fn synthesize(
    buf: &mut [u8; SUBQ_SIZE],
    track_type: TrackType,
    track_bcd: Bcd,
    index_bcd: Bcd,
    index_01: u32,
    current_sec: u32,
) {
    let control = if track_type.is_audio() { 0x00 } else { 0x40 };

    buf[0] = 0x00;
    buf[1] = 0x01 | control;
    buf[2] = track_bcd.bcd();
    buf[3] = index_bcd.bcd();

    let rel = track_relative(current_sec, index_01);
    buf[4] = rel.mm().bcd();
    buf[5] = rel.ss().bcd();
    buf[6] = rel.ff().bcd();
    buf[7] = 0x00;

    let abs = Position::from_linear(current_sec);
    buf[8] = abs.mm().bcd();
    buf[9] = abs.ss().bcd();
    buf[10] = abs.ff().bcd();

    let crc = crc_subq(buf);
    buf[11] = (crc >> 8) as u8;
    buf[12] = (crc & 0xff) as u8;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn crc_matches_over_synthesized_record() {
        let mut buf = [0u8; SUBQ_SIZE];
        synthesize(
            &mut buf,
            TrackType::Mode1,
            Bcd::from_binary(1).unwrap(),
            Bcd::from_binary(1).unwrap(),
            150,
            150,
        );

        let crc = crc_subq(&buf);
        assert_eq!(buf[11], (crc >> 8) as u8);
        assert_eq!(buf[12], (crc & 0xff) as u8);
    }

    #[test]
    fn pregap_countdown() {
        let mut buf = [0u8; SUBQ_SIZE];
        // One sector before index 01: countdown should read 1 sector
        // "remaining", not the absolute relative offset.
        synthesize(
            &mut buf,
            TrackType::Audio,
            Bcd::from_binary(1).unwrap(),
            Bcd::zero(),
            150,
            149,
        );

        assert_eq!(buf[1], 0x01);
        assert_eq!(buf[4], 0x00);
        assert_eq!(buf[5], 0x00);
        assert_eq!(buf[6], 0x00);
    }
}
