//! Error types for tsname-core.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Result type for tsname-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a run.
///
/// None of these are transient: the caller reports the error and stops.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading, seeking or renaming failed.
    #[error("{file}: I/O error at offset {offset}: {source}")]
    Io {
        file: String,
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// Listing, renaming or changing permissions failed.
    #[error("{path}: {source}")]
    Fs {
        path: String,
        #[source]
        source: io::Error,
    },

    /// TIFF header does not start with `II` or `MM`.
    #[error("{file}: bad byte-order marker {found:02x?}, expected \"II\" or \"MM\"")]
    BadByteOrder { file: String, found: [u8; 2] },

    /// TIFF magic number is not 42.
    #[error("{file}: bad TIFF magic {found}, expected 42")]
    BadMagic { file: String, found: u16 },

    /// A directory entry carries an unexpected type or count.
    #[error("{file}: tag {tag:#06x} at offset {offset} has {field} {actual}, expected {expected}")]
    MalformedEntry {
        file: String,
        offset: u64,
        tag: u16,
        field: &'static str,
        expected: u32,
        actual: u32,
    },

    /// An atom declares a length smaller than its own header.
    #[error("{file}: atom {atom:?} at offset {offset} has invalid size {size}")]
    MalformedAtom {
        file: String,
        offset: u64,
        atom: String,
        size: u64,
    },

    /// A structure the extractor depends on is absent.
    #[error("{file}: {what} not found")]
    MissingStructure { file: String, what: &'static str },

    /// The directory chain does not terminate.
    #[error("{file}: directory at offset {offset} links back to itself")]
    CyclicDirectory { file: String, offset: u64 },

    /// A date value matches neither accepted layout.
    #[error("{file}: cannot parse date {value:?}")]
    BadDate { file: String, value: String },

    /// A movie creation time cannot be represented as a calendar date.
    #[error("{file}: creation time {seconds} is out of range")]
    TimestampOutOfRange { file: String, seconds: u64 },

    /// Two entries share both source name and timestamp.
    #[error("file encountered twice: {name} ({timestamp})")]
    DuplicateInput { name: String, timestamp: String },

    /// More files than a five-digit index can number.
    #[error("too many files: {count} (at most 99999 are supported)")]
    TooManyFiles { count: usize },

    /// Two operations in one batch produce the same target.
    #[error("target {target} would be produced by both {first} and {second}")]
    DuplicateTarget {
        target: String,
        first: String,
        second: String,
    },

    /// A target name is already taken by a file outside the batch.
    #[error("cannot rename {source_name} to {target}: target already exists")]
    TargetExists { source_name: String, target: String },
}

impl Error {
    pub(crate) fn io(file: impl Into<String>, offset: u64, source: io::Error) -> Self {
        Self::Io {
            file: file.into(),
            offset,
            source,
        }
    }

    pub(crate) fn fs(path: &Path, source: io::Error) -> Self {
        Self::Fs {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn missing(file: impl Into<String>, what: &'static str) -> Self {
        Self::MissingStructure {
            file: file.into(),
            what,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_file_and_field() {
        let err = Error::MalformedEntry {
            file: "IMG_0001.jpg".into(),
            offset: 26,
            tag: 0x9003,
            field: "count",
            expected: 20,
            actual: 11,
        };
        assert_eq!(
            err.to_string(),
            "IMG_0001.jpg: tag 0x9003 at offset 26 has count 11, expected 20"
        );

        let err = Error::missing("clip.mp4", "movie header (moov/mvhd)");
        assert_eq!(err.to_string(), "clip.mp4: movie header (moov/mvhd) not found");
    }
}
