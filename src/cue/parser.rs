//! CUE sheet parser.
//!
//! Consumes the restricted CUE subset of `FILE`/`TRACK`/`INDEX`/`PREGAP`
//! commands, opening binary companions as they're declared and
//! collecting tracks and entries in declaration order. The sector-map
//! builder (`super::sector_map`) does the heavier lifting of turning
//! this into a dense per-sector table; this module only validates
//! what can be checked line-by-line.

use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::sector::{TrackType, SECTOR_SIZE};
use crate::{CdError, CdResult};

/// An open BIN companion file plus its place in the overall binary
/// address space.
pub(crate) struct BinaryFile {
    pub path: PathBuf,
    pub file: File,
    /// File length in whole 2352-byte sectors.
    pub sectors: u32,
    /// Sum of `sectors` of every file declared earlier in the CUE.
    pub accumulated: u32,
    /// Cached byte offset of the file's cursor, to skip a redundant
    /// `seek` syscall on sequential reads (§9, "cached file cursor").
    pub cursor: u64,
}

/// One parsed `TRACK` command and the entries that belong to it.
pub(crate) struct Track {
    pub track_type: TrackType,
    /// Half-open range into the parser's `entries` vector.
    pub entries: Range<usize>,
    /// Absolute linear sector of this track's `INDEX 01`, filled in
    /// by the sector-map builder.
    pub index_01: u32,
}

/// A `PREGAP` or `INDEX` command. `time` starts out as a sector
/// offset relative to its owning file (`Index`) or is unused (`Pregap`);
/// the sector-map builder overwrites it in place with the absolute
/// linear sector index of the entry's first sector, per the source
/// library's memory-frugal convention.
#[derive(Clone, Copy)]
pub(crate) enum Entry {
    Pregap { frames: u32, time: u32 },
    Index { id: u8, file: usize, time: u32 },
}

pub(crate) struct Parsed {
    pub tracks: Vec<Track>,
    pub entries: Vec<Entry>,
    pub files: Vec<BinaryFile>,
}

/// Parse the CUE sheet at `cue_path`.
pub(crate) fn parse(cue_path: &Path) -> CdResult<Parsed> {
    let text = std::fs::read_to_string(cue_path).map_err(|source| CdError::OpenFailure {
        path: cue_path.to_path_buf(),
        source,
    })?;

    let mut state = State {
        cue_path,
        files: Vec::new(),
        tracks: Vec::new(),
        entries: Vec::new(),
        current_file: None,
        current_track: None,
    };

    for (i, raw_line) in text.split('\n').enumerate() {
        let line_no = (i + 1) as u32;
        let line = raw_line.trim_end_matches('\r').trim_start();

        if line.is_empty() {
            continue;
        }

        state.command(line_no, line)?;
    }

    state.finish(text.split('\n').count() as u32)
}

struct State<'a> {
    cue_path: &'a Path,
    files: Vec<BinaryFile>,
    tracks: Vec<Track>,
    entries: Vec<Entry>,
    current_file: Option<usize>,
    current_track: Option<usize>,
}

impl<'a> State<'a> {
    fn err(&self, line: u32, desc: impl Into<String>) -> CdError {
        CdError::Parse {
            path: self.cue_path.to_path_buf(),
            line,
            desc: desc.into(),
        }
    }

    fn command(&mut self, line: u32, text: &str) -> CdResult<()> {
        if let Some(rest) = text.strip_prefix("FILE") {
            self.command_file(line, rest)
        } else if let Some(rest) = text.strip_prefix("TRACK") {
            self.command_track(line, rest)
        } else if let Some(rest) = text.strip_prefix("INDEX") {
            self.command_index(line, rest)
        } else if let Some(rest) = text.strip_prefix("PREGAP") {
            self.command_pregap(line, rest)
        } else {
            Err(self.err(line, "unknown command"))
        }
    }

    fn command_file(&mut self, line: u32, rest: &str) -> CdResult<()> {
        let tokens = tokenize(rest);
        let (name, kind) = match tokens.as_slice() {
            [name, kind] => (name, kind),
            _ => return Err(self.err(line, "malformed FILE command")),
        };

        if kind != "BINARY" {
            return Err(self.err(line, format!("unsupported FILE type `{}`", kind)));
        }

        let direct = PathBuf::from(name);
        let relative = self
            .cue_path
            .parent()
            .map(|dir| dir.join(name))
            .unwrap_or_else(|| direct.clone());

        let (path, file) = File::open(&direct)
            .map(|f| (direct.clone(), f))
            .or_else(|_| File::open(&relative).map(|f| (relative.clone(), f)))
            .map_err(|source| CdError::OpenFailure {
                path: relative,
                source,
            })?;

        let size = file
            .metadata()
            .map_err(|source| CdError::OpenFailure {
                path: path.clone(),
                source,
            })?
            .len();

        if size == 0 || size % (SECTOR_SIZE as u64) != 0 {
            return Err(CdError::InvalidSize {
                path,
                size,
                unit: SECTOR_SIZE as u64,
            });
        }

        let accumulated = self.files.iter().map(|f| f.sectors).sum();

        self.files.push(BinaryFile {
            path,
            file,
            sectors: (size / SECTOR_SIZE as u64) as u32,
            accumulated,
            cursor: 0,
        });
        self.current_file = Some(self.files.len() - 1);

        Ok(())
    }

    fn command_track(&mut self, line: u32, rest: &str) -> CdResult<()> {
        let tokens = tokenize(rest);
        let (number, kind) = match tokens.as_slice() {
            [number, kind] => (number, kind),
            _ => return Err(self.err(line, "malformed TRACK command")),
        };

        let number = parse_two_digit(number).ok_or_else(|| self.err(line, "bad track number"))?;
        if number as usize != self.tracks.len() + 1 {
            return Err(self.err(line, "TRACK numbers must be contiguous starting at 1"));
        }

        let track_type = match kind.as_str() {
            "AUDIO" => TrackType::Audio,
            "MODE1/2352" => TrackType::Mode1,
            "MODE2/2352" => TrackType::Mode2,
            _ => return Err(self.err(line, format!("unsupported track mode `{}`", kind))),
        };

        self.close_current_track();

        self.tracks.push(Track {
            track_type,
            entries: self.entries.len()..self.entries.len(),
            index_01: 0,
        });
        self.current_track = Some(self.tracks.len() - 1);

        Ok(())
    }

    fn command_index(&mut self, line: u32, rest: &str) -> CdResult<()> {
        if self.current_track.is_none() {
            return Err(self.err(line, "INDEX before any TRACK"));
        }
        let file = self
            .current_file
            .ok_or_else(|| self.err(line, "INDEX before any FILE"))?;

        let tokens = tokenize(rest);
        let (id, time) = match tokens.as_slice() {
            [id, time] => (id, time),
            _ => return Err(self.err(line, "malformed INDEX command")),
        };

        let id = parse_two_digit(id).ok_or_else(|| self.err(line, "bad index id"))?;
        let time = parse_time(time).ok_or_else(|| self.err(line, "malformed time"))?;

        self.entries.push(Entry::Index { id, file, time });

        Ok(())
    }

    fn command_pregap(&mut self, line: u32, rest: &str) -> CdResult<()> {
        if self.current_track.is_none() {
            return Err(self.err(line, "PREGAP before any TRACK"));
        }

        let tokens = tokenize(rest);
        let time = match tokens.as_slice() {
            [time] => time,
            _ => return Err(self.err(line, "malformed PREGAP command")),
        };

        let frames = parse_time(time).ok_or_else(|| self.err(line, "malformed time"))?;

        self.entries.push(Entry::Pregap { frames, time: 0 });

        Ok(())
    }

    fn close_current_track(&mut self) {
        if let Some(i) = self.current_track {
            self.tracks[i].entries.end = self.entries.len();
        }
    }

    fn finish(mut self, _line_count: u32) -> CdResult<Parsed> {
        self.close_current_track();

        if self.tracks.is_empty() {
            return Err(CdError::Parse {
                path: self.cue_path.to_path_buf(),
                line: 0,
                desc: "CUE sheet declares no tracks".to_string(),
            });
        }

        Ok(Parsed {
            tracks: self.tracks,
            entries: self.entries,
            files: self.files,
        })
    }
}

fn tokenize(s: &str) -> Vec<String> {
    let s = s.trim();
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut tok = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                tok.push(c);
            }
            tokens.push(tok);
        } else {
            let mut tok = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                tok.push(c);
                chars.next();
            }
            tokens.push(tok);
        }
    }

    tokens
}

fn parse_two_digit(s: &str) -> Option<u8> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse an exact `DD:DD:DD` time literal into a sector count, using
/// plain decimal arithmetic (`mm*60*75 + ss*75 + ff`) — CUE time
/// literals are not BCD, unlike the positions this crate ultimately
/// produces.
fn parse_time(s: &str) -> Option<u32> {
    let parts: Vec<&str> = s.split(':').collect();
    let [mm, ss, ff] = parts.as_slice() else {
        return None;
    };

    let two = |p: &str| -> Option<u32> {
        if p.len() != 2 || !p.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        p.parse().ok()
    };

    let mm = two(mm)?;
    let ss = two(ss)?;
    let ff = two(ff)?;

    Some(mm * 60 * 75 + ss * 75 + ff)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn time_literal() {
        assert_eq!(parse_time("00:02:00"), Some(150));
        assert_eq!(parse_time("01:00:00"), Some(4500));
        assert_eq!(parse_time("00:00:00"), Some(0));
        assert_eq!(parse_time("0:00:00"), None);
        assert_eq!(parse_time("00:00"), None);
        assert_eq!(parse_time("aa:00:00"), None);
    }

    #[test]
    fn quoted_filename_tokenizes_as_one_token() {
        let tokens = tokenize("\"my disc.bin\" BINARY");
        assert_eq!(tokens, vec!["my disc.bin".to_string(), "BINARY".to_string()]);
    }
}
