//! Sector-map builder (§4.5): turns parsed tracks, entries and binary
//! files into one dense per-sector table covering the whole logical
//! disc, collapsing PREGAPs and INDEXes into a single linear address
//! space.

use crate::bcd::Bcd;
use crate::sector::SECTOR_SIZE;
use crate::{CdError, CdResult};

use super::parser::{BinaryFile, Entry, Track};

/// Where a logical sector's bytes come from.
#[derive(Clone, Copy)]
pub(crate) enum SectorSource {
    /// No binary file backs this sector; reads return zero.
    Gap,
    /// Sector `byte_offset` bytes into `file`.
    File { file: usize, byte_offset: u64 },
}

/// One row of the sector map, describing a single logical sector.
pub(crate) struct SectorMapEntry {
    pub source: SectorSource,
    pub track_index: usize,
    pub index_id_bcd: Bcd,
    pub lsd_pointer: Option<usize>,
}

const LEAD_PREGAP_SECTORS: u32 = 150;

/// Build the sector map. Rewrites `time` in every `Entry` and
/// `index_01` in every `Track` in place with absolute linear sector
/// indices, per the source library's convention of reusing the field
/// instead of carrying a second one.
pub(crate) fn build(
    tracks: &mut [Track],
    entries: &mut [Entry],
    files: &[BinaryFile],
    path_for_errors: impl Fn() -> std::path::PathBuf,
) -> CdResult<Vec<SectorMapEntry>> {
    let total_pregap_frames: u32 = entries
        .iter()
        .map(|e| match e {
            Entry::Pregap { frames, .. } => *frames,
            Entry::Index { .. } => 0,
        })
        .sum();
    let bin_sectors: u32 = files.iter().map(|f| f.sectors).sum();
    let n = LEAD_PREGAP_SECTORS + total_pregap_frames + bin_sectors;

    let mut map = Vec::with_capacity(n as usize);
    for _ in 0..LEAD_PREGAP_SECTORS {
        map.push(SectorMapEntry {
            source: SectorSource::Gap,
            track_index: 0,
            index_id_bcd: Bcd::zero(),
            lsd_pointer: None,
        });
    }

    let semantic_error = |desc: &str| CdError::Parse {
        path: path_for_errors(),
        line: 0,
        desc: format!("invalid PREGAP/INDEX commands: {}", desc),
    };

    // Invariant #2: every INDEX's file-relative time must fall inside its
    // owning file. Checked for all entries up front, not just as each is
    // walked, since a later track's INDEX is read via lookahead while
    // computing an earlier track's span (see the `end` computation below) —
    // an out-of-range value there would silently corrupt that earlier span
    // instead of being rejected at load time.
    for entry in entries.iter() {
        if let Entry::Index { file, time, .. } = entry {
            if *time >= files[*file].sectors {
                return Err(semantic_error("INDEX time_in_file exceeds binary file length"));
            }
        }
    }

    let mut cur = LEAD_PREGAP_SECTORS;
    let mut running_gap = LEAD_PREGAP_SECTORS;
    let mut byte_cursor: u64 = 0;
    let mut prev_file: Option<usize> = None;

    let num_tracks = tracks.len();

    for track_idx in 0..num_tracks {
        let mut prev_index_id: Option<u8> = None;
        let range = tracks[track_idx].entries.clone();

        for ei in range {
            match entries[ei] {
                Entry::Pregap { frames, .. } => {
                    let (next_file, next_time) = match entries.get(ei + 1) {
                        Some(Entry::Index { file, time, .. }) => (*file, *time),
                        _ => return Err(semantic_error("PREGAP must be followed by INDEX")),
                    };

                    if let Entry::Pregap { time, .. } = &mut entries[ei] {
                        *time = cur;
                    }

                    running_gap += frames;
                    let end = files[next_file].accumulated + next_time + running_gap;
                    if end <= cur {
                        return Err(semantic_error("PREGAP resolves to a non-positive span"));
                    }

                    for _ in cur..end {
                        map.push(SectorMapEntry {
                            source: SectorSource::Gap,
                            track_index: track_idx,
                            index_id_bcd: Bcd::zero(),
                            lsd_pointer: None,
                        });
                    }
                    cur = end;
                }
                Entry::Index { id, file, .. } => {
                    match prev_index_id {
                        None if id == 0 || id == 1 => {}
                        None => return Err(semantic_error("first INDEX must be 00 or 01")),
                        Some(p) if id == p + 1 => {}
                        Some(_) => return Err(semantic_error("INDEX ids must ascend by 1")),
                    }
                    prev_index_id = Some(id);

                    if id == 1 {
                        tracks[track_idx].index_01 = cur;
                    }

                    if prev_file != Some(file) {
                        byte_cursor = 0;
                        prev_file = Some(file);
                    }

                    let end = if ei + 1 == entries.len() {
                        n
                    } else {
                        match &entries[ei + 1] {
                            Entry::Index {
                                file: nf, time: nt, ..
                            } => files[*nf].accumulated + nt + running_gap,
                            Entry::Pregap { .. } => match entries.get(ei + 2) {
                                Some(Entry::Index {
                                    file: nf, time: nt, ..
                                }) => files[*nf].accumulated + nt + running_gap,
                                _ => {
                                    return Err(semantic_error("PREGAP must be followed by INDEX"))
                                }
                            },
                        }
                    };

                    if end <= cur {
                        return Err(semantic_error("INDEX resolves to a non-positive span"));
                    }

                    if let Entry::Index { time, .. } = &mut entries[ei] {
                        *time = cur;
                    }

                    let index_id_bcd =
                        Bcd::from_binary(id).ok_or_else(|| semantic_error("index id out of BCD range"))?;

                    for _ in cur..end {
                        map.push(SectorMapEntry {
                            source: SectorSource::File { file, byte_offset: byte_cursor },
                            track_index: track_idx,
                            index_id_bcd,
                            lsd_pointer: None,
                        });
                        byte_cursor += SECTOR_SIZE as u64;
                    }
                    cur = end;
                }
            }
        }
    }

    Ok(map)
}

// `build` takes real open file handles (`BinaryFile` owns a
// `std::fs::File`), so it's exercised end-to-end through `Cue::open`
// against real temporary CUE/BIN pairs in `cue::test` instead of in
// isolation here.
