//! The externally visible table of contents: sessions, tracks and
//! indexes, plus the overall disc type classification.

use crate::bcd::Bcd;
use crate::position::Position;
use crate::sector::TrackType;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One `INDEX` (or the leading pregap, reported as index 0) within a
/// track.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexInfo {
    /// 0 for the pregap, the BCD-encoded index id otherwise.
    pub id: Bcd,
    /// Absolute position of the index's first sector.
    pub position: Position,
}

/// One track's summary, as reported by `get_info`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackInfo {
    /// BCD track number (1-based).
    pub id: Bcd,
    pub is_audio: bool,
    /// Always false: four-channel audio is not produced by either
    /// backend.
    pub four_channel: bool,
    /// Always false: pre-emphasis is not tracked by either backend.
    pub preemphasis: bool,
    /// Always true: both backends treat every track as copiable.
    pub digital_copy_allowed: bool,
    pub indexes: Vec<IndexInfo>,
    /// Position of the track's last sector.
    pub pos_last_sector: Position,
}

/// Overall disc classification, obtained by fusing every track's
/// type (§4.7).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DiscType {
    Audio,
    Mode1,
    Mode1Audio,
    Mode2,
    Mode2Audio,
    Unknown,
}

/// The disc's table of contents. Always describes exactly one
/// session: multi-session CUEs are out of scope (§1).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CdInfo {
    pub disc_type: DiscType,
    pub tracks: Vec<TrackInfo>,
}

impl CdInfo {
    /// Always 1: multi-session images are not supported.
    pub fn num_sessions(&self) -> u32 {
        1
    }
}

/// Fuse a sequence of per-track types into one overall `DiscType`,
/// seeding with the first track and collapsing as later tracks are
/// folded in.
///
/// Panics if `types` is empty; a disc with zero tracks never survives
/// construction.
pub fn fuse_disc_type(types: &[TrackType]) -> DiscType {
    let mut acc = match types[0] {
        TrackType::Audio => DiscType::Audio,
        TrackType::Mode1 => DiscType::Mode1,
        TrackType::Mode2 => DiscType::Mode2,
    };

    for &t in &types[1..] {
        acc = match (acc, t) {
            (DiscType::Audio, TrackType::Audio) => DiscType::Audio,
            (DiscType::Audio, TrackType::Mode1) => DiscType::Mode1Audio,
            (DiscType::Audio, TrackType::Mode2) => DiscType::Mode2Audio,

            (DiscType::Mode1, TrackType::Audio) => DiscType::Mode1Audio,
            (DiscType::Mode1, TrackType::Mode1) => DiscType::Mode1,
            (DiscType::Mode1, TrackType::Mode2) => DiscType::Unknown,

            (DiscType::Mode2, TrackType::Audio) => DiscType::Mode2Audio,
            (DiscType::Mode2, TrackType::Mode2) => DiscType::Mode2,
            (DiscType::Mode2, TrackType::Mode1) => DiscType::Unknown,

            (DiscType::Mode1Audio, TrackType::Audio) | (DiscType::Mode1Audio, TrackType::Mode1) => {
                DiscType::Mode1Audio
            }
            (DiscType::Mode1Audio, TrackType::Mode2) => DiscType::Unknown,

            (DiscType::Mode2Audio, TrackType::Audio) | (DiscType::Mode2Audio, TrackType::Mode2) => {
                DiscType::Mode2Audio
            }
            (DiscType::Mode2Audio, TrackType::Mode1) => DiscType::Unknown,

            (DiscType::Unknown, _) => DiscType::Unknown,
        };
    }

    acc
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_audio() {
        let t = [TrackType::Audio, TrackType::Audio];
        assert_eq!(fuse_disc_type(&t), DiscType::Audio);
    }

    #[test]
    fn mode1_plus_audio() {
        let t = [TrackType::Mode1, TrackType::Audio];
        assert_eq!(fuse_disc_type(&t), DiscType::Mode1Audio);
    }

    #[test]
    fn mode1_and_mode2_is_unknown() {
        let t = [TrackType::Mode1, TrackType::Mode2];
        assert_eq!(fuse_disc_type(&t), DiscType::Unknown);
    }

    #[test]
    fn single_track() {
        assert_eq!(fuse_disc_type(&[TrackType::Mode2]), DiscType::Mode2);
    }
}
