//! Read-only access to CD-ROM disc images.
//!
//! This crate hides the gaps that on-disk image formats leave in the
//! physical CD layout (no real lead-in/lead-out, no real subchannel
//! P/R-W, no EDC/ECC) behind one [`Image`] trait, so a caller can walk
//! a disc sector by sector, query its table of contents, and read a
//! synthesized subchannel-Q stream as if the source were a physical
//! drive.
//!
//! Two backends are provided: [`cue`] for CUE sheets with their BIN
//! companions (and an optional libcrypt `.lsd` side-file), and
//! [`iso`] for raw ISO 9660-style images. [`open`] picks one based on
//! the file's extension.

#![warn(missing_docs)]

#[macro_use]
extern crate arrayref;
#[cfg(feature = "serde")]
extern crate serde;
extern crate thiserror;

pub mod bcd;
mod crc;
pub mod cue;
pub mod iso;
pub mod position;
pub mod sector;
mod subq;
pub mod toc;

pub use bcd::Bcd;
pub use position::Position;
pub use sector::{TrackType, SECTOR_SIZE};
pub use subq::SUBQ_SIZE;
pub use toc::{CdInfo, DiscType, IndexInfo, TrackInfo};

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Abstract read-only interface to a disc image backend.
///
/// A disc handle owns every file it opened and every table it derived
/// from them; dropping it releases all of that. It is not
/// `Send`/`Sync`-bounded here, but a single handle is meant to be
/// driven from one thread at a time: every `read` mutates the cached
/// file cursor.
pub trait Image {
    /// Human-readable name of the underlying image format.
    fn image_format(&self) -> &str;

    /// Reposition at the very first sector of the disc.
    fn reset(&mut self);

    /// Move to the start of session `session` (1-based). Only
    /// `session == 1` ever succeeds: multi-session images are not
    /// supported.
    fn move_to_session(&mut self, session: u32) -> CdResult<()>;

    /// Move to the first `INDEX 01` sector of track `track` (1-based).
    fn move_to_track(&mut self, track: u32) -> CdResult<()>;

    /// Move to an absolute disc position.
    fn seek(&mut self, position: Position) -> CdResult<()>;

    /// Current absolute position.
    fn tell(&self) -> Position;

    /// Always 1.
    fn get_num_sessions(&self) -> u32;

    /// Always 0.
    fn get_current_session(&self) -> u32;

    /// 1-based current track, or the total track count if positioned
    /// past the end of the disc.
    fn get_current_track(&self) -> u32;

    /// BCD index id of the current sector, or 0 past the end of the
    /// disc.
    fn get_current_index(&self) -> Bcd;

    /// No lead-in exists in either backend; this emits a diagnostic
    /// and repositions at sector 0.
    fn move_to_leadin(&mut self);

    /// Read the raw 2352-byte sector at the current position into
    /// `buf`, returning whether it belongs to an audio track.
    /// Advances the current position iff `advance` is set. The
    /// position is left unchanged on failure.
    fn read(&mut self, buf: &mut [u8; SECTOR_SIZE], advance: bool) -> CdResult<bool>;

    /// Read (synthesize) the 13-byte subchannel-Q record at the
    /// current position into `buf`, returning whether its CRC is
    /// valid (false for sectors patched by an LSD overlay). Advances
    /// the current position iff `advance` is set.
    fn read_q(&mut self, buf: &mut [u8; SUBQ_SIZE], advance: bool) -> CdResult<bool>;

    /// Build the disc's table of contents. Freshly allocated on every
    /// call; does not borrow from `self`.
    fn get_info(&self) -> CdInfo;
}

/// Error type for disc image operations.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum CdError {
    #[error("couldn't open `{path}`: {source}")]
    OpenFailure { path: PathBuf, source: io::Error },

    #[error("`{path}`: size {size} is not a positive multiple of {unit}")]
    InvalidSize { path: PathBuf, size: u64, unit: u64 },

    #[error("`{path}`: disc spans {sectors} sectors, exceeding the {max}-sector BCD-addressable limit")]
    TooManySectors { path: PathBuf, sectors: u32, max: u32 },

    #[error("{path}:{line}: {desc}")]
    Parse {
        path: PathBuf,
        line: u32,
        desc: String,
    },

    #[error("unknown extension for `{}`", path.display())]
    UnknownExtension { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("position is out of range")]
    OutOfRange,
}

/// Convenience type alias for a `Result<R, CdError>`.
pub type CdResult<R> = std::result::Result<R, CdError>;

/// Open a disc image, dispatching on the last three characters of
/// `path`'s filename (uppercased): `"CUE"` opens a CUE sheet,
/// `"ISO"` opens a raw ISO image, anything else is an error.
///
/// Only the last three characters participate in the comparison, so
/// `foo.Cue` and `foo.cUe` are both recognized as CUE sheets.
pub fn open<P: AsRef<Path>>(path: P) -> CdResult<Box<dyn Image>> {
    let path = path.as_ref();

    match last_three_uppercase(path) {
        Some(ref ext) if ext == "CUE" => Ok(Box::new(cue::Cue::open(path)?)),
        Some(ref ext) if ext == "ISO" => Ok(Box::new(iso::Iso::open(path)?)),
        _ => Err(CdError::UnknownExtension {
            path: path.to_path_buf(),
        }),
    }
}

fn last_three_uppercase(path: &Path) -> Option<String> {
    let s = path.to_str()?;
    let bytes = s.as_bytes();
    let len = bytes.len();

    if len <= 4 || bytes[len - 4] != b'.' {
        return None;
    }

    let upper: Vec<u8> = bytes[(len - 3)..]
        .iter()
        .map(|&c| if c.is_ascii_lowercase() { c - 32 } else { c })
        .collect();

    String::from_utf8(upper).ok()
}

#[test]
fn cderror_display() {
    println!("{}", CdError::OutOfRange);
}

#[test]
fn extension_dispatch() {
    assert_eq!(
        last_three_uppercase(Path::new("foo.cue")),
        Some("CUE".to_string())
    );
    assert_eq!(
        last_three_uppercase(Path::new("foo.Cue")),
        Some("CUE".to_string())
    );
    assert_eq!(
        last_three_uppercase(Path::new("foo.cUe")),
        Some("CUE".to_string())
    );
    assert_eq!(last_three_uppercase(Path::new("foo.bin")), Some("BIN".to_string()));
    assert_eq!(last_three_uppercase(Path::new("foo")), None);
}
