//! ISO backend (§4.8): a raw image of 2048-byte user sectors with a
//! synthesized MODE1 header and an implicit 2-second pregap, much
//! like the CUE backend's single-track degenerate case but without
//! any sheet to parse.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::bcd::Bcd;
use crate::position::Position;
use crate::sector::{write_mode1_header, TrackType, ISO_SECTOR_SIZE, SECTOR_SIZE};
use crate::subq::{self, SUBQ_SIZE};
use crate::toc::{CdInfo, IndexInfo, TrackInfo};
use crate::{CdError, CdResult, Image};

const LEAD_PREGAP_SECTORS: u32 = 150;

/// A disc image backed by a raw ISO file.
pub struct Iso {
    path: PathBuf,
    file: File,
    num_secs: u32,
    cursor: u64,
    current_sec: u32,
}

impl Iso {
    /// Open the ISO image at `path`.
    pub fn open(path: &Path) -> CdResult<Iso> {
        let file = File::open(path).map_err(|source| CdError::OpenFailure {
            path: path.to_path_buf(),
            source,
        })?;

        let size = file
            .metadata()
            .map_err(|source| CdError::OpenFailure {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        if size == 0 || size % (ISO_SECTOR_SIZE as u64) != 0 {
            return Err(CdError::InvalidSize {
                path: path.to_path_buf(),
                size,
                unit: ISO_SECTOR_SIZE as u64,
            });
        }

        let num_secs = (size / ISO_SECTOR_SIZE as u64) as u32;
        let n = num_secs + LEAD_PREGAP_SECTORS;
        if n > crate::position::MAX_SECTORS {
            return Err(CdError::TooManySectors {
                path: path.to_path_buf(),
                sectors: n,
                max: crate::position::MAX_SECTORS,
            });
        }

        Ok(Iso {
            path: path.to_path_buf(),
            file,
            num_secs,
            cursor: 0,
            current_sec: 0,
        })
    }

    fn n(&self) -> u32 {
        self.num_secs + LEAD_PREGAP_SECTORS
    }

    fn past_end(&self) -> bool {
        self.current_sec >= self.n()
    }
}

impl Image for Iso {
    fn image_format(&self) -> &str {
        "ISO"
    }

    fn reset(&mut self) {
        self.current_sec = 0;
    }

    fn move_to_session(&mut self, session: u32) -> CdResult<()> {
        if session == 1 {
            self.current_sec = LEAD_PREGAP_SECTORS;
            Ok(())
        } else {
            Err(CdError::OutOfRange)
        }
    }

    fn move_to_track(&mut self, track: u32) -> CdResult<()> {
        if track == 1 {
            self.current_sec = LEAD_PREGAP_SECTORS;
            Ok(())
        } else {
            Err(CdError::OutOfRange)
        }
    }

    fn seek(&mut self, position: Position) -> CdResult<()> {
        let linear = position.to_linear();
        if linear >= self.n() {
            return Err(CdError::OutOfRange);
        }
        self.current_sec = linear;
        Ok(())
    }

    fn tell(&self) -> Position {
        Position::from_linear(self.current_sec)
    }

    fn get_num_sessions(&self) -> u32 {
        1
    }

    fn get_current_session(&self) -> u32 {
        0
    }

    fn get_current_track(&self) -> u32 {
        1
    }

    fn get_current_index(&self) -> Bcd {
        if self.past_end() {
            Bcd::zero()
        } else if self.current_sec >= LEAD_PREGAP_SECTORS {
            Bcd::one()
        } else {
            Bcd::zero()
        }
    }

    fn move_to_leadin(&mut self) {
        eprintln!(
            "{}: lead-in is not present in ISO images, positioning at sector 0",
            self.path.display()
        );
        self.current_sec = 0;
    }

    fn read(&mut self, buf: &mut [u8; SECTOR_SIZE], advance: bool) -> CdResult<bool> {
        if self.past_end() {
            return Err(CdError::OutOfRange);
        }

        if self.current_sec < LEAD_PREGAP_SECTORS {
            buf.iter_mut().for_each(|b| *b = 0);
        } else {
            let byte_offset = ((self.current_sec - LEAD_PREGAP_SECTORS) as u64)
                * (ISO_SECTOR_SIZE as u64);

            if self.cursor != byte_offset {
                self.file.seek(SeekFrom::Start(byte_offset))?;
            }
            self.file.read_exact(&mut buf[16..(16 + ISO_SECTOR_SIZE)])?;
            self.cursor = byte_offset + ISO_SECTOR_SIZE as u64;

            write_mode1_header(buf, Position::from_linear(self.current_sec));
        }

        if advance {
            self.current_sec += 1;
        }

        Ok(false)
    }

    fn read_q(&mut self, buf: &mut [u8; SUBQ_SIZE], advance: bool) -> CdResult<bool> {
        if self.past_end() {
            return Err(CdError::OutOfRange);
        }

        let index_bcd = if self.current_sec >= LEAD_PREGAP_SECTORS {
            Bcd::one()
        } else {
            Bcd::zero()
        };

        subq::synthesize(
            buf,
            TrackType::Mode1,
            Bcd::one(),
            index_bcd,
            LEAD_PREGAP_SECTORS,
            self.current_sec,
        );

        if advance {
            self.current_sec += 1;
        }

        Ok(true)
    }

    fn get_info(&self) -> CdInfo {
        let indexes = vec![
            IndexInfo {
                id: Bcd::zero(),
                position: Position::from_linear(0),
            },
            IndexInfo {
                id: Bcd::one(),
                position: Position::from_linear(LEAD_PREGAP_SECTORS),
            },
        ];

        let track = TrackInfo {
            id: Bcd::one(),
            is_audio: false,
            four_channel: false,
            preemphasis: false,
            digital_copy_allowed: true,
            indexes,
            pos_last_sector: Position::from_linear(self.n() - 1),
        };

        CdInfo {
            disc_type: crate::toc::DiscType::Mode1,
            tracks: vec![track],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn scratch_iso(sectors: u32, pattern: u8) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("discimage-test-iso-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("disc.iso");

        let mut f = fs::File::create(&path).unwrap();
        let buf = vec![pattern; ISO_SECTOR_SIZE];
        for _ in 0..sectors {
            f.write_all(&buf).unwrap();
        }
        path
    }

    /// S5: ISO of 100 sectors.
    #[test]
    fn s5_iso() {
        let path = scratch_iso(100, 0x5a);
        let mut iso = Iso::open(&path).unwrap();
        assert_eq!(iso.n(), 250);

        iso.seek(Position::from_linear(150)).unwrap();
        let mut buf = [0u8; SECTOR_SIZE];
        let is_audio = iso.read(&mut buf, false).unwrap();
        assert!(!is_audio);

        assert_eq!(buf[0], 0x00);
        assert!(buf[1..11].iter().all(|&b| b == 0xff));
        assert_eq!(buf[11], 0x00);
        assert_eq!(buf[12], 0x00); // mm
        assert_eq!(buf[13], 0x02); // ss
        assert_eq!(buf[14], 0x00); // ff
        assert_eq!(buf[15], 0x01);
        assert!(buf[16..(16 + ISO_SECTOR_SIZE)].iter().all(|&b| b == 0x5a));
        assert!(buf[2064..SECTOR_SIZE].iter().all(|&b| b == 0));
    }

    #[test]
    fn pregap_is_zero_filled() {
        let path = scratch_iso(10, 0xff);
        let mut iso = Iso::open(&path).unwrap();

        let mut buf = [0xaau8; SECTOR_SIZE];
        iso.read(&mut buf, false).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn get_info_reports_two_distinct_indexes() {
        let path = scratch_iso(10, 0);
        let iso = Iso::open(&path).unwrap();
        let info = iso.get_info();

        assert_eq!(info.tracks.len(), 1);
        assert_eq!(info.tracks[0].indexes.len(), 2);
        assert_eq!(info.tracks[0].indexes[0].id, Bcd::zero());
        assert_eq!(info.tracks[0].indexes[0].position, Position::from_linear(0));
        assert_eq!(info.tracks[0].indexes[1].id, Bcd::one());
        assert_eq!(
            info.tracks[0].indexes[1].position,
            Position::from_linear(150)
        );
    }
}
