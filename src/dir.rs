//! Linear scan over the embedded root directory.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::image::DiskImage;

/// Outcome of one directory scan.
pub(crate) struct Scan {
    /// Slot of the first live entry whose name matches.
    pub found: Option<usize>,
    /// First unused slot, for creation.
    pub empty: Option<usize>,
}

/// Scan every slot of the embedded directory in order. Extension point:
/// a directory spilling past the superblock would continue this scan
/// along the `next_rootdir` chain.
pub(crate) fn scan(img: &DiskImage, name: &[u8]) -> Scan {
    let mut result = Scan { found: None, empty: None };
    for slot in 0..FILE_COUNT_LIMIT {
        let entry = img.dir_entry(slot);
        if entry.is_live() {
            if result.found.is_none() && entry.name_bytes() == name {
                result.found = Some(slot);
            }
        } else if result.empty.is_none() {
            result.empty = Some(slot);
        }
    }
    result
}

/// A name is storable iff it fits the on-disk field together with its
/// NUL terminator and contains at least one byte, none of them NUL.
pub(crate) fn validate_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name.contains(&0) {
        return Err(FsError::InvalidArgument);
    }
    if name.len() + 1 > NAME_SIZE_LIMIT {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}
