//! Shared helpers for the integration tests.
#![allow(unused)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use sfs::layout;
use sfs::{page_size, BlockHeader, FileSystem, BLOCK_SIZE};

/// A scratch directory holding one disk-image path. The directory is
/// removed when this is dropped.
pub struct Scratch {
    _dir: TempDir,
    pub image: PathBuf,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("disk.img");
        Scratch { _dir: dir, image }
    }
}

pub fn one_page() -> u64 {
    page_size() as u64
}

/// Smallest page-aligned image size holding at least `min_blocks` blocks.
pub fn image_size_for(min_blocks: u32) -> u64 {
    let page = one_page();
    let bytes = min_blocks as u64 * BLOCK_SIZE as u64;
    (bytes + page - 1) / page * page
}

/// Format a fresh volume of at least `min_blocks` blocks and leave it
/// mounted.
pub fn fresh_volume(min_blocks: u32) -> (Scratch, FileSystem) {
    let scratch = Scratch::new();
    let mut fs = FileSystem::new();
    fs.format(&scratch.image, image_size_for(min_blocks)).unwrap();
    (scratch, fs)
}

pub fn raw(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

/// Overwrite `bytes` at `offset` in the (unmapped) image file.
pub fn patch(path: &Path, offset: usize, bytes: &[u8]) {
    let mut data = std::fs::read(path).unwrap();
    data[offset..offset + bytes.len()].copy_from_slice(bytes);
    std::fs::write(path, data).unwrap();
}

pub fn header(bytes: &[u8], id: u32) -> BlockHeader {
    layout::header_at(bytes, id)
}

/// Superblock fields `(n_blocks, freelist, next_rootdir)` of a raw image.
pub fn super_info(bytes: &[u8]) -> (u32, u32, u32) {
    (
        layout::read_u32(bytes, layout::SUPER_NBLOCKS_OFFSET),
        layout::read_u32(bytes, layout::SUPER_FREELIST_OFFSET),
        layout::read_u32(bytes, layout::SUPER_NEXT_ROOTDIR_OFFSET),
    )
}

/// Block ids on the free list of a raw image, in list order.
pub fn freelist_ids(bytes: &[u8]) -> Vec<u32> {
    let (_, mut id, _) = super_info(bytes);
    let mut ids = Vec::new();
    while id != 0 {
        ids.push(id);
        id = header(bytes, id).next;
    }
    ids
}

/// Run the checker over `image` and panic with the recorded errors if
/// the volume is not clean.
pub fn assert_clean(image: &Path) {
    let report = sfs::fsck::check_image(image).unwrap();
    assert!(report.is_clean(), "fsck found errors: {:#?}", report.errors);
}

/// The checker must find at least one problem whose message contains
/// `needle`.
pub fn assert_fsck_error(image: &Path, needle: &str) {
    let report = sfs::fsck::check_image(image).unwrap();
    assert!(
        report.errors.iter().any(|e| e.contains(needle)),
        "expected an fsck error containing {needle:?}, got: {:#?}",
        report.errors
    );
}
