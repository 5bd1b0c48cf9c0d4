//! Read-only structural consistency checking.
//!
//! The checker maps an image read-only and walks every block list on it,
//! building a bytemap with one code per block. The bytemap is what
//! catches blocks claimed by two lists, circular lists, and blocks no
//! list reaches. Nothing is ever repaired.
//!
//! Problems found on the image are recorded in the returned
//! [`FsckReport`] (and logged at error level); they never panic. Only a
//! handful of superblock-level problems abort the check early, since
//! nothing else on the image can be trusted after them.

use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

use log::{debug, error, info};
use memmap2::Mmap;

use crate::config::*;
use crate::error::Result;
use crate::image::page_size;
use crate::layout::{self, BlockId};

/// Sentinel one past the end of the disk.
pub const B_END_OF_DISK: u8 = 0x00;
/// Block not yet visited by the checker.
pub const B_UNVISITED: u8 = 0x01;
/// Something is wrong with this block.
pub const B_CORRUPT: u8 = 0x02;
/// The superblock.
pub const B_SUPER: u8 = 0x03;
/// Block on the free list.
pub const B_FREE: u8 = 0x04;
/// Extended root-directory block.
pub const B_ROOTDIR: u8 = 0x05;
/// First live file gets this code; the second gets `B_FILE0 + 1`, and so
/// on. Keeping a code per file lets the bytemap name both lists when two
/// files claim one block.
pub const B_FILE0: u8 = 0x06;

/// Outcome of checking one image.
#[derive(Debug)]
pub struct FsckReport {
    /// One entry per problem, in discovery order.
    pub errors: Vec<String>,
    /// Final per-block classification, indexed by block id, with a
    /// trailing end-of-disk terminator. Empty if the superblock was too
    /// damaged to size the volume.
    pub bytemap: Vec<u8>,
}

impl FsckReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check the SFS image at `path`. I/O failures (missing file,
/// unreadable) are `Err`; problems *with the image* all land in the
/// report.
pub fn check_image(path: &Path) -> Result<FsckReport> {
    let disk = path.display().to_string();
    let file = File::open(path)?;
    let len = file.metadata()?.len();

    let fatal = |message: String| {
        error!("{disk}: error: {message}");
        FsckReport {
            errors: vec![message],
            bytemap: Vec::new(),
        }
    };

    if len == 0 {
        return Ok(fatal("disk image is empty".into()));
    }
    if len > MAX_DISK_SIZE {
        return Ok(fatal(format!(
            "disk image is too large to hold an SFS file system \
             (image size: {len} bytes; max supported size: {MAX_DISK_SIZE} bytes)"
        )));
    }
    let page = page_size() as u64;
    if len % page != 0 {
        return Ok(fatal(format!(
            "image size ({len} bytes) is not a multiple of the system page size ({page} bytes)"
        )));
    }

    info!("{disk}: size {len} bytes ({} blocks)", len / BLOCK_SIZE as u64);

    // SAFETY: mapped read-only; the checker must not run while an engine
    // has the same volume mounted read-write.
    let map = unsafe { Mmap::map(&file)? };
    let mut checker = Checker {
        disk: &disk,
        image: &map,
        n_blocks: 0,
        bytemap: Vec::new(),
        errors: Vec::new(),
    };
    checker.run();
    Ok(checker.into_report())
}

struct Checker<'a> {
    disk: &'a str,
    image: &'a [u8],
    n_blocks: u32,
    bytemap: Vec<u8>,
    errors: Vec<String>,
}

impl Checker<'_> {
    fn into_report(self) -> FsckReport {
        FsckReport {
            errors: self.errors,
            bytemap: self.bytemap,
        }
    }

    fn report(&mut self, message: String) {
        error!("{}: error: {}", self.disk, message);
        self.errors.push(message);
    }

    fn header_at(&self, id: BlockId) -> layout::BlockHeader {
        layout::header_at(self.image, id)
    }

    fn run(&mut self) {
        if self.check_superblock().is_err() {
            return;
        }
        self.check_root_directory();
        self.check_lost_blocks();
    }

    /// Validate the superblock, set up the bytemap, and walk the two
    /// lists it roots. Directory entries are not looked at yet. `Err`
    /// means the rest of the image cannot be checked.
    fn check_superblock(&mut self) -> std::result::Result<(), ()> {
        if self.image[..DISK_MAGIC.len()] != DISK_MAGIC {
            self.report("not an SFS file system".into());
            return Err(());
        }
        let n_blocks = layout::read_u32(self.image, layout::SUPER_NBLOCKS_OFFSET);
        let have = self.image.len() / BLOCK_SIZE;
        if n_blocks as usize != have {
            self.report(format!(
                "wrong size: superblock expects {n_blocks} blocks, have {have} blocks"
            ));
            return Err(());
        }
        self.n_blocks = n_blocks;

        self.bytemap = vec![B_UNVISITED; n_blocks as usize + 1];
        self.bytemap[0] = B_SUPER;
        self.bytemap[n_blocks as usize] = B_END_OF_DISK;

        let freelist = layout::read_u32(self.image, layout::SUPER_FREELIST_OFFSET);
        if self.check_blocklist(freelist, B_FREE).is_none() {
            return Err(());
        }
        let rootdir = layout::read_u32(self.image, layout::SUPER_NEXT_ROOTDIR_OFFSET);
        if self.check_blocklist(rootdir, B_ROOTDIR).is_none() {
            return Err(());
        }
        Ok(())
    }

    /// Walk one `next`-linked list, validating membership, type tags and
    /// back links, and painting the bytemap with `code`. Returns the
    /// number of blocks in the list, or `None` if anything was reported.
    ///
    /// A previously visited block means either this list is circular
    /// (its own code) or two lists share a block; both stop the walk.
    /// A wrong type tag or a bad back link is reported but the walk
    /// continues, assuming only that field was trashed.
    fn check_blocklist(&mut self, first: BlockId, code: u8) -> Option<u32> {
        info!(
            "{}: checking blocklist for {}, first block {first}",
            self.disk,
            label(code)
        );

        let expected = match code {
            B_FREE => TYPE_FREE,
            B_ROOTDIR => TYPE_DIR,
            c if c >= B_FILE0 => TYPE_FILE,
            _ => unreachable!("no block list carries bytemap code {code}"),
        };

        let mut clean = true;
        let mut cur = first;
        let mut prev: BlockId = 0;
        let mut count = 0u32;
        while cur != 0 {
            if cur >= self.n_blocks {
                if prev == 0 {
                    self.report(format!(
                        "first block of {} is out of range (id {cur} >= {})",
                        label(code),
                        self.n_blocks
                    ));
                } else {
                    self.report(format!(
                        "block {prev} of {} points to next block {cur} \
                         which is out of range (>= {})",
                        label(code),
                        self.n_blocks
                    ));
                }
                return None;
            }

            let seen = self.bytemap[cur as usize];
            if seen == code {
                self.report(format!(
                    "circular links for {} detected at block {cur}",
                    label(code)
                ));
                return None;
            } else if seen != B_UNVISITED {
                self.report(format!(
                    "block {cur} of {} is also part of {}",
                    label(code),
                    label(seen)
                ));
                return None;
            }

            let hdr = self.header_at(cur);
            if hdr.block_type != expected {
                self.report(bad_type_message(cur, &hdr.block_type, &expected));
                self.bytemap[cur as usize] = B_CORRUPT;
                clean = false;
            } else {
                self.bytemap[cur as usize] = code;
            }

            if hdr.prev != prev {
                if prev == 0 {
                    self.report(format!(
                        "first block of {} (id {cur}) has prev pointer \
                         referring to block {}",
                        label(code),
                        hdr.prev
                    ));
                } else if hdr.prev == 0 {
                    self.report(format!(
                        "block {cur} of {} has null prev pointer",
                        label(code)
                    ));
                } else {
                    self.report(format!(
                        "block {cur} of {} has prev pointer referring to \
                         block {} (should be {prev})",
                        label(code),
                        hdr.prev
                    ));
                }
                clean = false;
            }

            count += 1;
            prev = cur;
            cur = hdr.next;
        }

        if clean {
            Some(count)
        } else {
            None
        }
    }

    /// Validate the directory entries embedded in the superblock, then
    /// those in every block of the extension chain (already vetted as a
    /// list by [`Self::check_superblock`], so it is safe to walk).
    fn check_root_directory(&mut self) {
        let mut file_tag = B_FILE0;
        info!("{}: checking root directory entries in superblock", self.disk);
        self.check_directory_entries(0, &mut file_tag);

        let mut block = layout::read_u32(self.image, layout::SUPER_NEXT_ROOTDIR_OFFSET);
        while block != 0 {
            info!(
                "{}: checking root directory entries in block {block}",
                self.disk
            );
            self.check_directory_entries(block, &mut file_tag);
            block = self.header_at(block).next;
        }
    }

    /// Validate one block's worth of directory entries: name
    /// well-formedness, the file's block list, and size against chain
    /// length. Unused slots may contain any garbage.
    fn check_directory_entries(&mut self, block: BlockId, file_tag: &mut u8) {
        for slot in 0..DIR_ENTRIES_PER_BLOCK {
            let entry = layout::dir_entry_at(self.image, block, slot);
            if !entry.is_live() {
                debug!("{}: dir entry {slot} not in use", self.disk);
                continue;
            }

            if self.check_name(slot, &entry.name) {
                info!(
                    "{}: dir entry {slot} is file '{}', size {} bytes",
                    self.disk,
                    escape(entry.name_bytes()),
                    entry.size
                );
            }

            if let Some(chain_len) = self.check_blocklist(entry.first_block, *file_tag) {
                let expected = expected_chain_len(entry.size);
                if expected != chain_len {
                    self.report(format!(
                        "dir entry {slot}: size {} requires {expected} blocks, have {chain_len}",
                        entry.size
                    ));
                }
            }

            match file_tag.checked_add(1) {
                Some(tag) => *file_tag = tag,
                None => self.report("internal error: out of file tags".into()),
            }
        }
    }

    /// A live entry's name must be one run of non-NUL bytes followed by
    /// NULs out to the end of the field, with at least one byte in the
    /// run. No other constraint: any non-NUL byte may appear in a name.
    fn check_name(&mut self, slot: usize, name: &[u8; NAME_SIZE_LIMIT]) -> bool {
        let mut saw_nul = false;
        let mut saw_nonnul = false;
        for &byte in name {
            if byte != 0 {
                if saw_nul {
                    self.report(format!(
                        "dir entry {slot}: invalid name '{}' (non-NUL after NUL)",
                        escape(name)
                    ));
                    return false;
                }
                saw_nonnul = true;
            } else {
                saw_nul = true;
            }
        }
        if !saw_nonnul {
            self.report(format!("dir entry {slot}: invalid name (all NULs)"));
            return false;
        }
        if !saw_nul {
            self.report(format!(
                "dir entry {slot}: invalid name '{}' (missing NUL terminator)",
                escape(name)
            ));
            return false;
        }
        true
    }

    /// Anything still unvisited after tracing every list is lost.
    fn check_lost_blocks(&mut self) {
        info!("{}: checking for lost blocks", self.disk);
        for id in 1..self.n_blocks {
            if self.bytemap[id as usize] != B_UNVISITED {
                continue;
            }
            let hdr = self.header_at(id);
            match tag_label(&hdr.block_type) {
                Some(kind) => self.report(format!(
                    "block {id} ({kind}) is not on any block list"
                )),
                None => self.report(format!(
                    "block {id} (tag '{}') is not on any block list",
                    escape(&hdr.block_type)
                )),
            }
        }
    }
}

/// Expected chain length for a file of `size` bytes; even empty files
/// occupy one block.
fn expected_chain_len(size: u32) -> u32 {
    if size == 0 {
        1
    } else {
        ((size as u64 + BLOCK_DATA_SIZE as u64 - 1) / BLOCK_DATA_SIZE as u64) as u32
    }
}

/// Human-readable label for a bytemap code.
fn label(code: u8) -> String {
    match code {
        B_END_OF_DISK => "[past the end of the disk]".into(),
        B_UNVISITED => "[not yet visited]".into(),
        B_CORRUPT => "[corrupt block]".into(),
        B_SUPER => "[super block]".into(),
        B_FREE => "free list".into(),
        B_ROOTDIR => "root directory".into(),
        _ => format!("file {}", code - B_FILE0),
    }
}

/// Label for an on-disk type tag, or `None` if it is not a known tag.
fn tag_label(tag: &[u8; 4]) -> Option<&'static str> {
    if *tag == TYPE_FILE {
        Some("part of a file")
    } else if *tag == TYPE_DIR {
        Some("part of a directory")
    } else if *tag == TYPE_FREE {
        Some("unallocated")
    } else if tag[..] == DISK_MAGIC[..4] {
        Some("the superblock")
    } else {
        None
    }
}

fn bad_type_message(id: BlockId, got: &[u8; 4], expected: &[u8; 4]) -> String {
    let expected = match tag_label(expected) {
        Some(kind) => kind.to_owned(),
        None => format!("tagged '{}'", escape(expected)),
    };
    match tag_label(got) {
        Some(kind) => {
            format!("block {id} was expected to be {expected} but it is instead {kind}")
        }
        None => format!(
            "block {id} was expected to be {expected} but it has invalid type tag '{}'",
            escape(got)
        ),
    }
}

/// Render possibly-binary bytes for a diagnostic: backslash, quotes,
/// newline and tab get escapes, anything else unprintable becomes a hex
/// escape.
fn escape(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b' '..=b'~' => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{byte:02X}");
            }
        }
    }
    out
}
