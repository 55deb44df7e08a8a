//! CUE/BIN image format implementation (§4.4-§4.6).
//!
//! The CUE sheet format was created for the CDRWIN burning software;
//! many extensions and variations exist in the wild. This backend
//! accepts the restricted grammar of §4.4: `FILE`/`TRACK`/`INDEX`/
//! `PREGAP`, one binary companion per `FILE`, and an optional sibling
//! `.lsd` overlay. Multi-session CUEs are not supported; `open`
//! always reports exactly one session.

mod lsd;
mod parser;
mod sector_map;

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::bcd::Bcd;
use crate::position::Position;
use crate::sector::SECTOR_SIZE;
use crate::subq;
use crate::toc::{fuse_disc_type, CdInfo, IndexInfo, TrackInfo};
use crate::{CdError, CdResult, Image};

use parser::{BinaryFile, Entry, Track};
use sector_map::{SectorMapEntry, SectorSource};

/// A disc image backed by a CUE sheet and its binary companions.
pub struct Cue {
    cue_path: PathBuf,
    tracks: Vec<Track>,
    entries: Vec<Entry>,
    files: Vec<BinaryFile>,
    map: Vec<SectorMapEntry>,
    lsd_arena: Vec<[u8; 15]>,
    current_sec: u32,
}

impl Cue {
    /// Parse and load the CUE sheet at `path`, opening every
    /// referenced binary companion and, if present, its `.lsd`
    /// sibling.
    pub fn open(path: &Path) -> CdResult<Cue> {
        let parsed = parser::parse(path)?;
        let mut tracks = parsed.tracks;
        let mut entries = parsed.entries;
        let files = parsed.files;
        let cue_path = path.to_path_buf();

        let error_path = cue_path.clone();
        let mut map = sector_map::build(&mut tracks, &mut entries, &files, move || {
            error_path.clone()
        })?;

        let n = map.len() as u32;
        if n > crate::position::MAX_SECTORS {
            return Err(CdError::TooManySectors {
                path: cue_path,
                sectors: n,
                max: crate::position::MAX_SECTORS,
            });
        }

        let lsd_records = lsd::try_load(path, n)?;
        let mut lsd_arena = Vec::with_capacity(lsd_records.len());
        for record in lsd_records {
            let idx = lsd_arena.len();
            map[record.sector as usize].lsd_pointer = Some(idx);
            lsd_arena.push(record.bytes);
        }

        Ok(Cue {
            cue_path,
            tracks,
            entries,
            files,
            map,
            lsd_arena,
            current_sec: 0,
        })
    }

    fn past_end(&self) -> bool {
        self.current_sec as usize >= self.map.len()
    }

    fn track_first_time(&self, track_idx: usize) -> u32 {
        let first = self.tracks[track_idx].entries.start;
        match &self.entries[first] {
            Entry::Pregap { time, .. } => *time,
            Entry::Index { time, .. } => *time,
        }
    }
}

impl Image for Cue {
    fn image_format(&self) -> &str {
        "CUE"
    }

    fn reset(&mut self) {
        self.current_sec = 0;
    }

    fn move_to_session(&mut self, session: u32) -> CdResult<()> {
        if session == 1 {
            self.current_sec = 150;
            Ok(())
        } else {
            Err(CdError::OutOfRange)
        }
    }

    fn move_to_track(&mut self, track: u32) -> CdResult<()> {
        let idx = track
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or(CdError::OutOfRange)?;
        let track = self.tracks.get(idx).ok_or(CdError::OutOfRange)?;
        self.current_sec = track.index_01;
        Ok(())
    }

    fn seek(&mut self, position: Position) -> CdResult<()> {
        let linear = position.to_linear();
        if linear as usize >= self.map.len() {
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
        if self.past_end() {
            self.tracks.len() as u32
        } else {
            self.map[self.current_sec as usize].track_index as u32 + 1
        }
    }

    fn get_current_index(&self) -> Bcd {
        if self.past_end() {
            Bcd::zero()
        } else {
            self.map[self.current_sec as usize].index_id_bcd
        }
    }

    fn move_to_leadin(&mut self) {
        eprintln!(
            "{}: lead-in is not present in CUE/BIN images, positioning at sector 0",
            self.cue_path.display()
        );
        self.current_sec = 0;
    }

    fn read(&mut self, buf: &mut [u8; SECTOR_SIZE], advance: bool) -> CdResult<bool> {
        if self.past_end() {
            return Err(CdError::OutOfRange);
        }

        let row_track = self.map[self.current_sec as usize].track_index;
        let is_audio = self.tracks[row_track].track_type.is_audio();

        match self.map[self.current_sec as usize].source {
            SectorSource::Gap => buf.iter_mut().for_each(|b| *b = 0),
            SectorSource::File { file, byte_offset } => {
                let bf = &mut self.files[file];
                if bf.cursor != byte_offset {
                    bf.file.seek(SeekFrom::Start(byte_offset))?;
                }
                bf.file.read_exact(buf)?;
                bf.cursor = byte_offset + SECTOR_SIZE as u64;
            }
        }

        if advance {
            self.current_sec += 1;
        }

        Ok(is_audio)
    }

    fn read_q(&mut self, buf: &mut [u8; subq::SUBQ_SIZE], advance: bool) -> CdResult<bool> {
        if self.past_end() {
            return Err(CdError::OutOfRange);
        }

        let row = &self.map[self.current_sec as usize];
        let crc_ok = if let Some(idx) = row.lsd_pointer {
            let record = &self.lsd_arena[idx];
            buf[0] = 0;
            buf[1..13].copy_from_slice(&record[3..15]);
            false
        } else {
            let track = &self.tracks[row.track_index];
            subq::synthesize(
                buf,
                track.track_type,
                Bcd::from_binary(row.track_index as u8 + 1).expect("track count bounded by BCD"),
                row.index_id_bcd,
                track.index_01,
                self.current_sec,
            );
            true
        };

        if advance {
            self.current_sec += 1;
        }

        Ok(crc_ok)
    }

    fn get_info(&self) -> CdInfo {
        let mut tracks_info = Vec::with_capacity(self.tracks.len());

        for (i, track) in self.tracks.iter().enumerate() {
            let mut indexes = Vec::new();
            for ei in track.entries.clone() {
                let (id, time) = match &self.entries[ei] {
                    Entry::Pregap { time, .. } => (Bcd::zero(), *time),
                    Entry::Index { id, time, .. } => (
                        Bcd::from_binary(*id).expect("index id validated during sector-map build"),
                        *time,
                    ),
                };
                indexes.push(IndexInfo {
                    id,
                    position: Position::from_linear(time),
                });
            }

            let pos_last_sector = if i + 1 < self.tracks.len() {
                Position::from_linear(self.track_first_time(i + 1) - 1)
            } else {
                Position::from_linear(self.map.len() as u32 - 1)
            };

            tracks_info.push(TrackInfo {
                id: Bcd::from_binary((i + 1) as u8).expect("track count bounded by BCD"),
                is_audio: track.track_type.is_audio(),
                four_channel: false,
                preemphasis: false,
                digital_copy_allowed: true,
                indexes,
                pos_last_sector,
            });
        }

        let types: Vec<_> = self.tracks.iter().map(|t| t.track_type).collect();

        CdInfo {
            disc_type: fuse_disc_type(&types),
            tracks: tracks_info,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::io::Write;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(name: &str) -> TempDir {
            let mut dir = std::env::temp_dir();
            dir.push(format!("discimage-test-{}-{}", name, std::process::id()));
            let _ = fs::remove_dir_all(&dir);
            fs::create_dir_all(&dir).unwrap();
            TempDir(dir)
        }

        fn path(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn write_bin(path: &Path, sectors: u32, pattern: u8) {
        let mut f = fs::File::create(path).unwrap();
        let buf = vec![pattern; SECTOR_SIZE];
        for _ in 0..sectors {
            f.write_all(&buf).unwrap();
        }
    }

    /// S1: audio single-file CUE.
    #[test]
    fn s1_audio_single_file() {
        let dir = TempDir::new("s1");
        write_bin(&dir.path("a.bin"), 150, 0xab);

        let cue_path = dir.path("disc.cue");
        fs::write(
            &cue_path,
            "FILE \"a.bin\" BINARY\nTRACK 01 AUDIO\nINDEX 01 00:00:00\n",
        )
        .unwrap();

        let mut cue = Cue::open(&cue_path).unwrap();
        assert_eq!(cue.map.len(), 300);

        let mut buf = [0u8; SECTOR_SIZE];
        let is_audio = cue.read(&mut buf, false).unwrap();
        assert!(is_audio);
        assert!(buf.iter().all(|&b| b == 0));

        cue.seek(Position::from_linear(150)).unwrap();
        let is_audio = cue.read(&mut buf, false).unwrap();
        assert!(is_audio);
        assert!(buf.iter().all(|&b| b == 0xab));

        let info = cue.get_info();
        assert_eq!(info.disc_type as u8, crate::toc::DiscType::Audio as u8);
        assert_eq!(info.tracks[0].pos_last_sector, Position::from_linear(299));
    }

    /// S2: two-track MODE1 + audio with an explicit pregap.
    #[test]
    fn s2_mode1_plus_audio_with_pregap() {
        let dir = TempDir::new("s2");
        write_bin(&dir.path("a.bin"), 1100, 0x11);

        let cue_path = dir.path("disc.cue");
        fs::write(
            &cue_path,
            "FILE \"a.bin\" BINARY\n\
             TRACK 01 MODE1/2352\n\
             INDEX 01 00:00:00\n\
             TRACK 02 AUDIO\n\
             PREGAP 00:02:00\n\
             INDEX 01 00:10:00\n",
        )
        .unwrap();

        let cue = Cue::open(&cue_path).unwrap();
        assert_eq!(cue.map.len(), 1400);
        assert_eq!(cue.tracks[1].index_01, 1050);
        assert_eq!(
            cue.map[1050].track_index,
            1,
            "index 01 of track 2 must land on track 2's row"
        );

        let info = cue.get_info();
        assert_eq!(info.disc_type as u8, crate::toc::DiscType::Mode1Audio as u8);
    }

    /// S3: an INDEX 02 without a prior INDEX 01 is a load error.
    #[test]
    fn s3_index_progression_violation() {
        let dir = TempDir::new("s3");
        write_bin(&dir.path("a.bin"), 150, 0);

        let cue_path = dir.path("disc.cue");
        fs::write(
            &cue_path,
            "FILE \"a.bin\" BINARY\nTRACK 01 AUDIO\nINDEX 02 00:00:00\n",
        )
        .unwrap();

        assert!(Cue::open(&cue_path).is_err());
    }

    /// S4: an LSD patch overrides Q at its sector, leaves neighbors alone.
    #[test]
    fn s4_lsd_patch() {
        let dir = TempDir::new("s4");
        write_bin(&dir.path("a.bin"), 150, 0xab);

        let cue_path = dir.path("disc.cue");
        fs::write(
            &cue_path,
            "FILE \"a.bin\" BINARY\nTRACK 01 AUDIO\nINDEX 01 00:00:00\n",
        )
        .unwrap();

        let mut record = [0u8; 15];
        record[0] = 0x00; // mm
        record[1] = 0x02; // ss
        record[2] = 0x00; // ff
        for (i, b) in record[3..15].iter_mut().enumerate() {
            *b = i as u8;
        }
        fs::write(dir.path("disc.lsd"), record).unwrap();

        let mut cue = Cue::open(&cue_path).unwrap();

        cue.seek(Position::from_linear(150)).unwrap();
        let mut buf = [0u8; subq::SUBQ_SIZE];
        let crc_ok = cue.read_q(&mut buf, false).unwrap();
        assert!(!crc_ok);
        assert_eq!(&buf[1..13], &record[3..15]);

        cue.seek(Position::from_linear(149)).unwrap();
        let crc_ok = cue.read_q(&mut buf, false).unwrap();
        assert!(crc_ok);
    }

    /// An INDEX whose file-relative time falls beyond the binary
    /// file's actual length must be rejected at load time, even when
    /// it belongs to the last track and would otherwise only be used
    /// via lookahead to size an earlier track's span.
    #[test]
    fn index_time_out_of_range_is_rejected() {
        let dir = TempDir::new("range");
        write_bin(&dir.path("a.bin"), 10, 0);

        let cue_path = dir.path("disc.cue");
        fs::write(
            &cue_path,
            "FILE \"a.bin\" BINARY\n\
             TRACK 01 AUDIO\n\
             INDEX 01 00:00:00\n\
             TRACK 02 AUDIO\n\
             INDEX 01 05:00:00\n",
        )
        .unwrap();

        assert!(Cue::open(&cue_path).is_err());
    }

    /// S6: path resolution falls back to the CUE-relative BIN file.
    #[test]
    fn s6_path_resolution_fallback() {
        let dir = TempDir::new("s6");
        write_bin(&dir.path("disc.bin"), 150, 0);

        let cue_path = dir.path("disc.cue");
        fs::write(
            &cue_path,
            "FILE \"disc.bin\" BINARY\nTRACK 01 AUDIO\nINDEX 01 00:00:00\n",
        )
        .unwrap();

        let saved_cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(std::env::temp_dir()).unwrap();
        let result = Cue::open(&cue_path);
        std::env::set_current_dir(saved_cwd).unwrap();

        assert!(result.is_ok());
    }
}
