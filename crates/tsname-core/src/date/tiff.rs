//! TIFF/EXIF directory walker.
//!
//! Only the three date tags and the EXIF sub-directory pointer are of
//! interest; every other entry is skipped without looking at its value.

use std::io::{Read, Seek};

use chrono::NaiveDateTime;

use super::{CaptureTimestamp, Source};
use crate::{Error, Result};

const TAG_DATE_TIME: u16 = 0x0132;
const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
const TAG_DATE_TIME_DIGITIZED: u16 = 0x9004;
const TAG_EXIF_IFD: u16 = 0x8769;

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;

const TIFF_MAGIC: u16 = 42;

/// A date tag holds 19 characters plus the terminating NUL.
const DATE_COUNT: u32 = 20;
const DATE_LEN: usize = 19;
const MAX_DATES: usize = 3;

const ENTRY_SIZE: usize = 12;

/// Upper bound on directories in the main chain. Longer cycles than an
/// immediate repeat are not detected, so this keeps the walk finite.
const MAX_DIRECTORIES: usize = 1024;

/// Layouts accepted for date values. Some firmware writes dashes in the date.
const DATE_LAYOUTS: &[&str] = &["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn from_marker(marker: [u8; 2]) -> Option<Self> {
        match &marker {
            b"II" => Some(Self::Little),
            b"MM" => Some(Self::Big),
            _ => None,
        }
    }

    fn u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        }
    }

    fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// One 12-byte directory entry.
#[derive(Debug, Clone, Copy)]
struct DirectoryEntry {
    tag: u16,
    kind: u16,
    count: u32,
    value: u32,
}

/// What a pass over the directories has collected so far.
#[derive(Debug, Default)]
struct Collected {
    date_offsets: Vec<u32>,
    exif_dir: Option<u32>,
}

struct TiffReader<'s, 'a, R> {
    source: &'s mut Source<'a, R>,
    base: u64,
    order: ByteOrder,
}

impl<'s, 'a, R: Read + Seek> TiffReader<'s, 'a, R> {
    /// Validate the header at `base`, returning the reader and the offset of
    /// the first directory.
    fn open(source: &'s mut Source<'a, R>, base: u64) -> Result<(Self, u32)> {
        let header = source.read_at::<8>(base)?;
        let marker = [header[0], header[1]];
        let order = ByteOrder::from_marker(marker).ok_or_else(|| Error::BadByteOrder {
            file: source.name().to_string(),
            found: marker,
        })?;

        let magic = order.u16([header[2], header[3]]);
        if magic != TIFF_MAGIC {
            return Err(Error::BadMagic {
                file: source.name().to_string(),
                found: magic,
            });
        }

        let first = order.u32([header[4], header[5], header[6], header[7]]);
        Ok((Self { source, base, order }, first))
    }

    fn absolute(&self, offset: u64) -> u64 {
        self.base + offset
    }

    fn u16_at(&mut self, offset: u64) -> Result<u16> {
        let at = self.absolute(offset);
        Ok(self.order.u16(self.source.read_at(at)?))
    }

    fn entry(&self, raw: &[u8]) -> DirectoryEntry {
        DirectoryEntry {
            tag: self.order.u16([raw[0], raw[1]]),
            kind: self.order.u16([raw[2], raw[3]]),
            count: self.order.u32([raw[4], raw[5], raw[6], raw[7]]),
            value: self.order.u32([raw[8], raw[9], raw[10], raw[11]]),
        }
    }

    fn expect(
        &self,
        entry: &DirectoryEntry,
        offset: u64,
        field: &'static str,
        expected: u32,
        actual: u32,
    ) -> Result<()> {
        if expected == actual {
            return Ok(());
        }
        Err(Error::MalformedEntry {
            file: self.source.name().to_string(),
            offset: self.absolute(offset),
            tag: entry.tag,
            field,
            expected,
            actual,
        })
    }

    /// Parse the directory at `offset` and return its next-directory offset.
    /// The entry table and the trailing pointer are fetched in one read.
    fn walk_directory(&mut self, offset: u32, collected: &mut Collected) -> Result<u32> {
        let start = u64::from(offset);
        let count = usize::from(self.u16_at(start)?);
        let table_at = self.absolute(start + 2);
        let table = self.source.read_vec(table_at, count * ENTRY_SIZE + 4)?;
        let (entries, next) = table.split_at(count * ENTRY_SIZE);

        for (i, raw) in entries.chunks_exact(ENTRY_SIZE).enumerate() {
            let entry_offset = start + 2 + (i * ENTRY_SIZE) as u64;
            let entry = self.entry(raw);
            match entry.tag {
                TAG_DATE_TIME | TAG_DATE_TIME_ORIGINAL | TAG_DATE_TIME_DIGITIZED
                    if collected.date_offsets.len() < MAX_DATES =>
                {
                    self.expect(&entry, entry_offset, "type", TYPE_ASCII.into(), entry.kind.into())?;
                    self.expect(&entry, entry_offset, "count", DATE_COUNT, entry.count)?;
                    collected.date_offsets.push(entry.value);
                }
                TAG_EXIF_IFD => {
                    self.expect(&entry, entry_offset, "type", TYPE_LONG.into(), entry.kind.into())?;
                    self.expect(&entry, entry_offset, "count", 1, entry.count)?;
                    collected.exif_dir = Some(entry.value);
                }
                _ => {}
            }
        }

        Ok(self.order.u32([next[0], next[1], next[2], next[3]]))
    }

    fn cyclic(&self, offset: u32) -> Error {
        Error::CyclicDirectory {
            file: self.source.name().to_string(),
            offset: self.absolute(offset.into()),
        }
    }

    fn collect(&mut self, first: u32) -> Result<Collected> {
        let mut collected = Collected::default();
        let mut offset = first;
        let mut walked = 0usize;

        while offset != 0 {
            walked += 1;
            if walked > MAX_DIRECTORIES {
                return Err(self.cyclic(offset));
            }
            let next = self.walk_directory(offset, &mut collected)?;
            if next == offset {
                return Err(self.cyclic(offset));
            }
            // The chain itself reaches the EXIF directory; don't walk it twice.
            if collected.exif_dir == Some(next) {
                collected.exif_dir = None;
            }
            offset = next;
        }

        if let Some(exif) = collected.exif_dir.take() {
            log::trace!("{}: EXIF directory at {}", self.source.name(), exif);
            let next = self.walk_directory(exif, &mut collected)?;
            if next == exif || collected.exif_dir == Some(exif) {
                return Err(self.cyclic(exif));
            }
        }

        Ok(collected)
    }
}

/// Walk the TIFF structure starting at `base` and return the earliest of the
/// DateTime, DateTimeOriginal and DateTimeDigitized values.
pub(crate) fn earliest_date<R: Read + Seek>(
    source: &mut Source<'_, R>,
    base: u64,
) -> Result<CaptureTimestamp> {
    let (mut tiff, first) = TiffReader::open(source, base)?;
    let mut offsets = tiff.collect(first)?.date_offsets;
    if offsets.is_empty() {
        return Err(Error::missing(tiff.source.name(), "date tag"));
    }

    offsets.sort_unstable();
    let mut earliest: Option<String> = None;
    for offset in offsets {
        let at = tiff.absolute(offset.into());
        let raw: [u8; DATE_LEN] = tiff.source.read_at(at)?;
        let value = String::from_utf8_lossy(&raw).into_owned();
        if earliest.as_ref().map_or(true, |e| value < *e) {
            earliest = Some(value);
        }
    }

    let value = earliest.unwrap_or_default();
    parse_date(&value).ok_or_else(|| Error::BadDate {
        file: tiff.source.name().to_string(),
        value,
    })
}

fn parse_date(value: &str) -> Option<CaptureTimestamp> {
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .map(CaptureTimestamp::from_datetime)
}
