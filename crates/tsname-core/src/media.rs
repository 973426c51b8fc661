use std::io::{Read, Seek};

use serde::Serialize;

use crate::date::{self, CaptureTimestamp};
use crate::Result;

/// Supported container families, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// TIFF-structured photos (raw TIFF, NEF, DNG, or EXIF inside JPEG).
    Photo,
    /// ISO base media files.
    Video,
}

const PHOTO_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".nef", ".dng", ".tif", ".tiff"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov"];

impl MediaKind {
    /// `extension` is lowercased and includes the leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        if PHOTO_EXTENSIONS.contains(&extension) {
            Some(Self::Photo)
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            Some(Self::Video)
        } else {
            None
        }
    }

    /// Run the extractor for this kind over `reader`.
    pub fn extract<R: Read + Seek>(self, reader: R, name: &str) -> Result<CaptureTimestamp> {
        match self {
            Self::Photo => date::photo_timestamp(reader, name),
            Self::Video => date::video_timestamp(reader, name),
        }
    }
}

/// A file whose capture time has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaFile {
    /// File name within the working directory
    pub source_name: String,
    /// Lowercased extension with the leading dot, e.g. `.jpg`
    pub extension: String,
    pub capture_timestamp: CaptureTimestamp,
}

impl MediaFile {
    pub fn new(source_name: String, extension: String, capture_timestamp: CaptureTimestamp) -> Self {
        Self {
            source_name,
            extension,
            capture_timestamp,
        }
    }
}

/// Lowercased extension of `name` including the dot, or an empty string.
pub fn lowercase_extension(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}
