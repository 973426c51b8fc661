use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::media::MediaFile;
use crate::{Error, Result};

/// Largest batch a five-digit index can number.
pub const MAX_FILES: usize = 99_999;

/// A single planned rename inside the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOperation {
    pub source_name: String,
    pub target_name: String,
}

impl RenameOperation {
    /// The file already carries its target name.
    pub fn is_noop(&self) -> bool {
        self.source_name == self.target_name
    }
}

/// Capture time first, then shorter names, then name order.
///
/// Phones that shoot several frames within one second name the later ones
/// with a suffix such as `(0)`, so the shorter name is the earlier shot.
fn capture_order(a: &MediaFile, b: &MediaFile) -> Ordering {
    a.capture_timestamp
        .cmp(&b.capture_timestamp)
        .then_with(|| a.source_name.len().cmp(&b.source_name.len()))
        .then_with(|| a.source_name.cmp(&b.source_name))
}

/// Sort `entries` into capture order, rejecting any two entries with the same
/// name and timestamp.
pub fn sort_entries(entries: &mut [MediaFile]) -> Result<()> {
    entries.sort_by(capture_order);
    if let Some(pair) = entries.windows(2).find(|w| capture_order(&w[0], &w[1]) == Ordering::Equal) {
        return Err(Error::DuplicateInput {
            name: pair[0].source_name.clone(),
            timestamp: pair[0].capture_timestamp.to_string(),
        });
    }
    Ok(())
}

/// Number of digits needed to write every index from 1 to `count`.
pub fn index_width(count: usize) -> Result<usize> {
    if count > MAX_FILES {
        return Err(Error::TooManyFiles { count });
    }
    let mut width = 1;
    let mut limit = 10;
    while count >= limit {
        width += 1;
        limit *= 10;
    }
    Ok(width)
}

/// Order `entries` and assign each its target name. No collision checks;
/// see [`verify`].
pub fn plan(mut entries: Vec<MediaFile>, no_index: bool) -> Result<Vec<RenameOperation>> {
    sort_entries(&mut entries)?;
    let width = index_width(entries.len())?;

    let operations = entries
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            let target_name = if no_index {
                format!("{}{}", m.capture_timestamp, m.extension)
            } else {
                format!("{:0width$}-{}{}", i + 1, m.capture_timestamp, m.extension, width = width)
            };
            RenameOperation {
                source_name: m.source_name,
                target_name,
            }
        })
        .collect();
    Ok(operations)
}

/// Check the whole batch before anything is renamed.
///
/// Fails on two operations sharing a target, and on a target name that is
/// already taken (per `exists`) by a file that is not itself part of the
/// batch.
pub fn verify<F>(operations: &[RenameOperation], exists: F) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    let sources: HashSet<&str> = operations.iter().map(|o| o.source_name.as_str()).collect();
    let mut targets: HashMap<&str, &str> = HashMap::with_capacity(operations.len());

    for op in operations {
        if let Some(first) = targets.insert(&op.target_name, &op.source_name) {
            return Err(Error::DuplicateTarget {
                target: op.target_name.clone(),
                first: first.to_string(),
                second: op.source_name.clone(),
            });
        }
    }

    for op in operations.iter().filter(|o| !o.is_noop()) {
        if exists(&op.target_name) && !sources.contains(op.target_name.as_str()) {
            return Err(Error::TargetExists {
                source_name: op.source_name.clone(),
                target: op.target_name.clone(),
            });
        }
    }

    Ok(())
}
