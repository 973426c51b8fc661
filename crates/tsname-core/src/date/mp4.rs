//! Movie creation time from the ISO base media (MP4/QuickTime) atom tree.

use std::io::{Read, Seek};

use chrono::DateTime;

use super::{CaptureTimestamp, Source};
use crate::{Error, Result};

/// Seconds between 1904-01-01T00:00:00Z and the Unix epoch.
pub const MP4_EPOCH_OFFSET: i64 = 2_082_844_800;

const MOOV: [u8; 4] = *b"moov";
const MVHD: [u8; 4] = *b"mvhd";

/// Parsed atom header. Offsets are absolute file positions.
#[derive(Debug, Clone, Copy)]
struct AtomHeader {
    offset: u64,
    kind: [u8; 4],
    /// Whole atom size, header included.
    size: u64,
    header_len: u64,
}

impl AtomHeader {
    fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

/// Read the header at `offset`. `parent_end` resolves the "extends to the
/// end" size form.
fn read_header<R: Read + Seek>(
    source: &mut Source<'_, R>,
    offset: u64,
    parent_end: u64,
) -> Result<AtomHeader> {
    let raw = source.read_at::<8>(offset)?;
    let kind = [raw[4], raw[5], raw[6], raw[7]];
    let (size, header_len) = match u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) {
        1 => (u64::from_be_bytes(source.read_at::<8>(offset + 8)?), 16),
        0 => (parent_end.saturating_sub(offset), 8),
        n => (u64::from(n), 8),
    };
    if size < header_len {
        return Err(Error::MalformedAtom {
            file: source.name().to_string(),
            offset,
            atom: String::from_utf8_lossy(&kind).into_owned(),
            size,
        });
    }
    Ok(AtomHeader {
        offset,
        kind,
        size,
        header_len,
    })
}

/// Walk the top-level atoms until `moov/mvhd` yields a creation time.
pub(crate) fn creation_time<R: Read + Seek>(source: &mut Source<'_, R>) -> Result<CaptureTimestamp> {
    let total = source.len()?;
    let mut processed = 0u64;

    while processed < total {
        let atom = read_header(source, processed, total)?;
        log::trace!(
            "{}: atom {} at {} ({} bytes)",
            source.name(),
            String::from_utf8_lossy(&atom.kind),
            atom.offset,
            atom.size
        );
        if atom.kind == MOOV {
            if let Some(ts) = find_mvhd(source, &atom)? {
                return Ok(ts);
            }
        }
        processed = atom.end();
    }

    Err(Error::missing(source.name(), "movie header (moov/mvhd)"))
}

fn find_mvhd<R: Read + Seek>(
    source: &mut Source<'_, R>,
    moov: &AtomHeader,
) -> Result<Option<CaptureTimestamp>> {
    let mut consumed = moov.header_len;
    while consumed < moov.size {
        let child = read_header(source, moov.offset + consumed, moov.end())?;
        if child.kind == MVHD {
            return read_mvhd(source, &child).map(Some);
        }
        consumed = consumed.saturating_add(child.size);
    }
    Ok(None)
}

/// mvhd body: version (1), flags (3), then the creation time, 64-bit for
/// version 1 and 32-bit otherwise.
fn read_mvhd<R: Read + Seek>(source: &mut Source<'_, R>, mvhd: &AtomHeader) -> Result<CaptureTimestamp> {
    let file = source.name();
    let undersized = || Error::MalformedAtom {
        file: file.to_string(),
        offset: mvhd.offset,
        atom: String::from_utf8_lossy(&MVHD).into_owned(),
        size: mvhd.size,
    };

    let body = mvhd.offset + mvhd.header_len;
    let body_len = mvhd.size - mvhd.header_len;
    if body_len < 4 {
        return Err(undersized());
    }
    let [version, ..] = source.read_at::<4>(body)?;
    let field_len = if version == 1 { 8 } else { 4 };
    if body_len < 4 + field_len {
        return Err(undersized());
    }

    let seconds = if version == 1 {
        u64::from_be_bytes(source.read_at::<8>(body + 4)?)
    } else {
        u64::from(u32::from_be_bytes(source.read_at::<4>(body + 4)?))
    };
    rebase(file, seconds)
}

/// Convert seconds since 1904 to a UTC calendar timestamp.
pub fn rebase(file: &str, seconds: u64) -> Result<CaptureTimestamp> {
    i64::try_from(seconds)
        .ok()
        .and_then(|s| s.checked_sub(MP4_EPOCH_OFFSET))
        .and_then(|unix| DateTime::from_timestamp(unix, 0))
        .map(|utc| CaptureTimestamp::from_datetime(utc.naive_utc()))
        .ok_or_else(|| Error::TimestampOutOfRange {
            file: file.to_string(),
            seconds,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::video_timestamp;
    use std::io::Cursor;

    fn atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    fn mvhd_v0(creation: u32) -> Vec<u8> {
        let mut body = vec![0u8, 0, 0, 0];
        body.extend_from_slice(&creation.to_be_bytes());
        body.extend_from_slice(&creation.wrapping_add(60).to_be_bytes());
        body.extend_from_slice(&1000u32.to_be_bytes());
        body.extend_from_slice(&[0u8; 84]);
        atom(b"mvhd", &body)
    }

    fn mvhd_v1(creation: u64) -> Vec<u8> {
        let mut body = vec![1u8, 0, 0, 0];
        body.extend_from_slice(&creation.to_be_bytes());
        body.extend_from_slice(&creation.wrapping_add(60).to_be_bytes());
        body.extend_from_slice(&1000u32.to_be_bytes());
        body.extend_from_slice(&[0u8; 96]);
        atom(b"mvhd", &body)
    }

    fn movie(top: &[Vec<u8>]) -> Vec<u8> {
        top.concat()
    }

    fn run(bytes: Vec<u8>) -> Result<CaptureTimestamp> {
        video_timestamp(Cursor::new(bytes), "clip.mp4")
    }

    #[test]
    fn test_version_0_creation_time() {
        let bytes = movie(&[
            atom(b"ftyp", b"isom\0\0\x02\0isomiso2"),
            atom(b"moov", &mvhd_v0(3_000_000_000)),
        ]);
        // 3_000_000_000 - 2_082_844_800 = 917_155_200
        assert_eq!(run(bytes).unwrap().as_str(), "19990124-052000");
    }

    #[test]
    fn test_version_1_creation_time() {
        let seconds = 1_577_872_800u64 + MP4_EPOCH_OFFSET as u64;
        let bytes = movie(&[atom(b"moov", &mvhd_v1(seconds))]);
        assert_eq!(run(bytes).unwrap().as_str(), "20200101-100000");
    }

    #[test]
    fn test_moov_after_mdat_and_mvhd_after_other_children() {
        let mut moov = atom(b"udta", &[0u8; 13]);
        moov.extend_from_slice(&atom(b"free", &[]));
        moov.extend_from_slice(&mvhd_v0(3_786_912_000));
        let bytes = movie(&[
            atom(b"ftyp", b"qt  \0\0\0\0"),
            atom(b"mdat", &[0xAB; 301]),
            atom(b"moov", &moov),
        ]);
        // 3_786_912_000 - 2_082_844_800 = 1_704_067_200 = 2024-01-01T00:00:00Z
        assert_eq!(run(bytes).unwrap().as_str(), "20240101-000000");
    }

    #[test]
    fn test_large_size_atom_is_skipped() {
        let mut mdat = 1u32.to_be_bytes().to_vec();
        mdat.extend_from_slice(b"mdat");
        mdat.extend_from_slice(&(16u64 + 5).to_be_bytes());
        mdat.extend_from_slice(&[0u8; 5]);
        let bytes = movie(&[mdat, atom(b"moov", &mvhd_v0(3_786_912_000))]);
        assert_eq!(run(bytes).unwrap().as_str(), "20240101-000000");
    }

    #[test]
    fn test_moov_without_mvhd() {
        let bytes = movie(&[atom(b"moov", &atom(b"trak", &[0u8; 8])), atom(b"free", &[])]);
        match run(bytes) {
            Err(Error::MissingStructure { file, .. }) => assert_eq!(file, "clip.mp4"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_moov() {
        let bytes = movie(&[atom(b"ftyp", b"isom"), atom(b"mdat", &[1, 2, 3])]);
        assert!(matches!(run(bytes), Err(Error::MissingStructure { .. })));
    }

    #[test]
    fn test_undersized_atom_is_rejected() {
        let mut bytes = atom(b"ftyp", b"isom");
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(b"junk");
        match run(bytes) {
            Err(Error::MalformedAtom { offset, size, atom, .. }) => {
                assert_eq!(offset, 12);
                assert_eq!(size, 4);
                assert_eq!(atom, "junk");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mvhd_too_short_for_creation_time() {
        // Version and flags only; the next sibling must not be read as the time.
        let mut moov = atom(b"mvhd", &[0, 0, 0, 0]);
        moov.extend_from_slice(&atom(b"free", &[]));
        match run(movie(&[atom(b"moov", &moov)])) {
            Err(Error::MalformedAtom { offset, size, atom, .. }) => {
                assert_eq!(offset, 8);
                assert_eq!(size, 12);
                assert_eq!(atom, "mvhd");
            }
            other => panic!("unexpected {:?}", other),
        }

        // Version 1 needs eight bytes of creation time.
        let short_v1 = atom(b"mvhd", &[1, 0, 0, 0, 0, 0, 0, 5]);
        let mut moov = short_v1;
        moov.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            run(movie(&[atom(b"moov", &moov)])),
            Err(Error::MalformedAtom { size: 16, .. })
        ));

        // An empty mvhd body.
        assert!(matches!(
            run(movie(&[atom(b"moov", &atom(b"mvhd", &[]))])),
            Err(Error::MalformedAtom { size: 8, .. })
        ));
    }

    #[test]
    fn test_epoch_rebasing() {
        assert_eq!(rebase("a.mp4", 0).unwrap().as_str(), "19040101-000000");
        assert_eq!(
            rebase("a.mp4", MP4_EPOCH_OFFSET as u64).unwrap().as_str(),
            "19700101-000000"
        );
        assert!(matches!(
            rebase("a.mp4", u64::MAX),
            Err(Error::TimestampOutOfRange { .. })
        ));
    }
}
