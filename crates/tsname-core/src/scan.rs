use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;

use crate::media::{lowercase_extension, MediaFile, MediaKind};
use crate::ThrottledProgress;
use crate::{Error, Result};

/// Result of scanning the working directory
pub struct ScanResult {
    /// Supported files with their resolved capture times
    pub media: Vec<MediaFile>,
    /// Every name present in the directory, files or not
    pub existing: HashSet<String>,
    /// Number of directory entries looked at
    pub scanned: u64,
}

/// List `dir` (not recursively) and extract a capture time from every
/// supported file. The first extraction failure aborts the scan.
pub fn scan_dir(dir: &Path, progress: &ThrottledProgress<'_>) -> Result<ScanResult> {
    let mut entries = Vec::new();
    let mut existing = HashSet::new();

    for entry in fs::read_dir(dir).map_err(|e| Error::fs(dir, e))? {
        let entry = entry.map_err(|e| Error::fs(dir, e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            log::warn!("skipping non UTF-8 name {:?}", entry.file_name());
            continue;
        };
        existing.insert(name.clone());

        let file_type = entry.file_type().map_err(|e| Error::fs(&entry.path(), e))?;
        if file_type.is_dir() {
            continue;
        }
        entries.push(name);
    }
    entries.sort();

    let total = entries.len() as u64;
    let mut media = Vec::new();

    for (i, name) in entries.iter().enumerate() {
        progress.report("scan", i as u64, total, name);

        let extension = lowercase_extension(name);
        let Some(kind) = MediaKind::from_extension(&extension) else {
            log::debug!("skipping unsupported file {}", name);
            continue;
        };

        let path = dir.join(name);
        let file = File::open(&path).map_err(|e| Error::fs(&path, e))?;
        let timestamp = kind.extract(file, name)?;
        log::debug!("{}: {:?} captured at {}", name, kind, timestamp);

        media.push(MediaFile::new(name.clone(), extension, timestamp));
    }
    progress.report("scan", total, total, "done");

    Ok(ScanResult {
        media,
        existing,
        scanned: total,
    })
}
