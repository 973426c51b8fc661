//! Locates the TIFF header embedded in a JPEG APP1 segment.

use std::io::{Read, Seek};

use super::Source;
use crate::{Error, Result};

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const EXIF_ID: &[u8; 6] = b"Exif\0\0";

/// Offset of the TIFF header inside a JPEG file, or `None` if the file is
/// not a JPEG at all.
pub(crate) fn locate_exif<R: Read + Seek>(source: &mut Source<'_, R>) -> Result<Option<u64>> {
    let len = source.len()?;
    if len < 2 || source.read_at::<2>(0)? != SOI {
        return Ok(None);
    }

    let mut pos = 2u64;
    while pos + 4 <= len {
        let [prefix, marker, hi, lo] = source.read_at::<4>(pos)?;
        if prefix != 0xFF {
            break;
        }
        match marker {
            // Fill byte before the real marker.
            0xFF => {
                pos += 1;
                continue;
            }
            SOS | EOI => break,
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        let segment_len = u64::from(u16::from_be_bytes([hi, lo]));
        if segment_len < 2 {
            break;
        }
        if marker == APP1 && segment_len >= 8 && &source.read_at::<6>(pos + 4)? == EXIF_ID {
            let base = pos + 4 + EXIF_ID.len() as u64;
            log::trace!("{}: EXIF segment at {}", source.name(), base);
            return Ok(Some(base));
        }
        pos += 2 + segment_len;
    }

    Err(Error::missing(source.name(), "EXIF segment"))
}
