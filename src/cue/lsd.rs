//! Optional "libcrypt subchannel" (LSD) side-file overlay (§4.6).
//!
//! When present, a sibling `.lsd` file carries 15-byte records that
//! patch specific sectors' subchannel-Q with intentionally corrupt
//! bytes, emulating the copy-protection scheme some PlayStation discs
//! relied on.

use std::io;
use std::path::Path;

use crate::bcd::Bcd;
use crate::position::Position;
use crate::{CdError, CdResult};

const RECORD_SIZE: usize = 15;

/// One LSD record: the linear sector it patches, and the raw 15
/// bytes (3-byte BCD position prefix + 12 subchannel-Q bytes).
pub(crate) struct LsdRecord {
    pub sector: u32,
    pub bytes: [u8; RECORD_SIZE],
}

/// Load the LSD side-file for `cue_path`, if any. Returns an empty
/// `Vec` if `cue_path` doesn't end in `.cue` or no sibling `.lsd`
/// file exists — absence is never an error.
pub(crate) fn try_load(cue_path: &Path, n: u32) -> CdResult<Vec<LsdRecord>> {
    if !ends_with_dot_cue(cue_path) {
        return Ok(Vec::new());
    }

    let lsd_path = cue_path.with_extension("lsd");
    let bytes = match std::fs::read(&lsd_path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(CdError::OpenFailure {
                path: lsd_path,
                source,
            })
        }
    };

    if bytes.len() % RECORD_SIZE != 0 {
        return Err(CdError::InvalidSize {
            path: lsd_path,
            size: bytes.len() as u64,
            unit: RECORD_SIZE as u64,
        });
    }

    let mut records = Vec::with_capacity(bytes.len() / RECORD_SIZE);

    for chunk in bytes.chunks_exact(RECORD_SIZE) {
        let raw: [u8; RECORD_SIZE] = *array_ref!(chunk, 0, RECORD_SIZE);

        let mm = Bcd::from_bcd(raw[0]).ok_or_else(|| bad_bcd(&lsd_path))?;
        let ss = Bcd::from_bcd(raw[1]).ok_or_else(|| bad_bcd(&lsd_path))?;
        let ff = Bcd::from_bcd(raw[2]).ok_or_else(|| bad_bcd(&lsd_path))?;

        let sector = Position::from_bcd(mm, ss, ff).to_linear();
        if sector >= n {
            return Err(CdError::Parse {
                path: lsd_path.clone(),
                line: 0,
                desc: format!("LSD record position {} is out of range", sector),
            });
        }

        records.push(LsdRecord { sector, bytes: raw });
    }

    Ok(records)
}

fn bad_bcd(path: &Path) -> CdError {
    CdError::Parse {
        path: path.to_path_buf(),
        line: 0,
        desc: "malformed BCD position in LSD record".to_string(),
    }
}

fn ends_with_dot_cue(path: &Path) -> bool {
    path.to_str().map(|s| s.ends_with(".cue")).unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_sibling_is_not_an_error() {
        let records = try_load(Path::new("/nonexistent/disc.cue"), 1000).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn non_cue_path_skips_lookup_entirely() {
        let records = try_load(Path::new("/nonexistent/disc.CUE"), 1000).unwrap();
        assert!(records.is_empty());
    }
}
