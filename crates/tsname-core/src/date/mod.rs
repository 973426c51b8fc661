pub mod jpeg;
pub mod mp4;
pub mod tiff;

mod source;

use std::fmt;
use std::io::{Read, Seek};
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::Result;

pub(crate) use source::Source;

/// Canonical capture time, `YYYYMMDD-HHMMSS` at second resolution.
///
/// The fixed-width layout makes plain string ordering chronological, which is
/// what the planner relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CaptureTimestamp(String);

impl CaptureTimestamp {
    pub const FORMAT: &'static str = "%Y%m%d-%H%M%S";

    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self(dt.format(Self::FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CaptureTimestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s, Self::FORMAT).map(Self::from_datetime)
    }
}

impl fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Earliest EXIF date of a photo.
///
/// JPEG files carry their TIFF structure inside an APP1 segment; anything
/// else (NEF, DNG, TIFF) is expected to start with the TIFF header itself.
pub fn photo_timestamp<R: Read + Seek>(reader: R, name: &str) -> Result<CaptureTimestamp> {
    let mut source = Source::new(reader, name);
    let base = jpeg::locate_exif(&mut source)?.unwrap_or(0);
    tiff::earliest_date(&mut source, base)
}

/// Creation time from the movie header of an MP4/QuickTime file.
pub fn video_timestamp<R: Read + Seek>(reader: R, name: &str) -> Result<CaptureTimestamp> {
    let mut source = Source::new(reader, name);
    mp4::creation_time(&mut source)
}
