//! The memory-mapped volume and its typed block views.
//!
//! A [`DiskImage`] owns a read-write shared mapping of the image file.
//! Every accessor resolves to a byte-exact read or write at a fixed
//! offset inside the mapping, so each update lands in the image
//! immediately; durability is the host's concern (writeback, or an
//! explicit [`DiskImage::flush`]).
//!
//! Block ids passed to the view methods must be nonzero and in range.
//! Violations are programming errors in the engine and panic; the
//! checker does its own range validation on raw bytes instead.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::Path;

use memmap2::MmapMut;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::layout::{self, BlockHeader, BlockId, DirEntry};

/// Host page size. Mapped image sizes must be a multiple of this, which
/// is stricter than the format's own block-multiple requirement.
pub fn page_size() -> usize {
    // SAFETY: sysconf reads a constant; no memory is touched.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    assert!(size > 0 && size as usize % BLOCK_SIZE == 0);
    size as usize
}

/// A read-write mapping of one SFS volume.
#[derive(Debug)]
pub struct DiskImage {
    map: MmapMut,
}

impl DiskImage {
    /// Create (or erase) the file at `path`, size it to exactly `size`
    /// bytes, and map it. The caller validates `size` beforehand; the
    /// resulting image is all zero bytes.
    pub fn create(path: &Path, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        Self::map(&file)
    }

    /// Map an existing volume read-write, validating its size and magic.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len > MAX_DISK_SIZE {
            return Err(FsError::TooLarge);
        }
        if len == 0 || len % page_size() as u64 != 0 {
            return Err(FsError::InvalidArgument);
        }
        let mut magic = [0u8; DISK_MAGIC.len()];
        file.read_exact(&mut magic)?;
        if magic != DISK_MAGIC {
            return Err(FsError::InvalidArgument);
        }
        Self::map(&file)
    }

    fn map(file: &File) -> Result<Self> {
        // SAFETY: the engine is the only writer of the image for the
        // lifetime of the mapping (single-mutator contract); nothing
        // else truncates the file underneath it.
        let map = unsafe { MmapMut::map_mut(file)? };
        Ok(Self { map })
    }

    /// Number of blocks in the mapping (not the superblock's claim).
    pub fn block_count(&self) -> u32 {
        (self.map.len() / BLOCK_SIZE) as u32
    }

    /// Flush dirty pages of the mapping back to the file.
    pub fn flush(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }

    fn block_at(&self, id: BlockId) -> usize {
        assert!(id != 0, "block id 0 is the null id");
        assert!(id < self.block_count(), "block id {id} out of range");
        layout::block_offset(id)
    }

    //
    // Block views
    //

    pub fn header(&self, id: BlockId) -> BlockHeader {
        let off = self.block_at(id);
        BlockHeader::decode(&self.map[off..off + BLOCK_HEADER_SIZE])
    }

    pub fn block_type(&self, id: BlockId) -> [u8; 4] {
        self.header(id).block_type
    }

    /// Header of `id`, which must still be on the free list.
    pub fn free_header(&self, id: BlockId) -> BlockHeader {
        let hdr = self.header(id);
        assert_eq!(hdr.block_type, TYPE_FREE, "block {id} is not free");
        hdr
    }

    pub fn set_type(&mut self, id: BlockId, tag: [u8; 4]) {
        let off = self.block_at(id);
        self.map[off..off + 4].copy_from_slice(&tag);
    }

    pub fn set_prev(&mut self, id: BlockId, prev: BlockId) {
        let off = self.block_at(id);
        layout::write_u32(&mut self.map, off + 4, prev);
    }

    pub fn set_next(&mut self, id: BlockId, next: BlockId) {
        let off = self.block_at(id);
        layout::write_u32(&mut self.map, off + 8, next);
    }

    /// Data region of a file block.
    pub fn file_data(&self, id: BlockId) -> &[u8] {
        let off = self.block_at(id);
        assert_eq!(self.block_type(id), TYPE_FILE, "block {id} is not a file block");
        &self.map[off + BLOCK_HEADER_SIZE..off + BLOCK_SIZE]
    }

    pub fn file_data_mut(&mut self, id: BlockId) -> &mut [u8] {
        let off = self.block_at(id);
        assert_eq!(self.block_type(id), TYPE_FILE, "block {id} is not a file block");
        &mut self.map[off + BLOCK_HEADER_SIZE..off + BLOCK_SIZE]
    }

    //
    // Superblock views
    //

    pub fn write_magic(&mut self) {
        self.map[..DISK_MAGIC.len()].copy_from_slice(&DISK_MAGIC);
    }

    pub fn n_blocks(&self) -> u32 {
        layout::read_u32(&self.map, layout::SUPER_NBLOCKS_OFFSET)
    }

    pub fn set_n_blocks(&mut self, n: u32) {
        layout::write_u32(&mut self.map, layout::SUPER_NBLOCKS_OFFSET, n);
    }

    pub fn freelist(&self) -> BlockId {
        layout::read_u32(&self.map, layout::SUPER_FREELIST_OFFSET)
    }

    pub fn set_freelist(&mut self, head: BlockId) {
        layout::write_u32(&mut self.map, layout::SUPER_FREELIST_OFFSET, head);
    }

    pub fn next_rootdir(&self) -> BlockId {
        layout::read_u32(&self.map, layout::SUPER_NEXT_ROOTDIR_OFFSET)
    }

    /// Directory entry `slot` of the embedded root directory.
    pub fn dir_entry(&self, slot: usize) -> DirEntry {
        layout::dir_entry_at(&self.map, 0, slot)
    }

    pub fn set_dir_entry(&mut self, slot: usize, entry: &DirEntry) {
        let off = layout::dir_entry_offset(0, slot);
        entry.encode(&mut self.map[off..off + DIR_ENTRY_SIZE]);
    }

    pub fn set_entry_first_block(&mut self, slot: usize, first: BlockId) {
        let off = layout::dir_entry_offset(0, slot);
        layout::write_u32(&mut self.map, off, first);
    }

    pub fn set_entry_size(&mut self, slot: usize, size: u32) {
        let off = layout::dir_entry_offset(0, slot);
        layout::write_u32(&mut self.map, off + 4, size);
    }

    /// Rewrite the name field of a live entry, NUL-padded.
    pub fn set_entry_name(&mut self, slot: usize, name: &[u8]) {
        debug_assert!(!name.is_empty() && name.len() < NAME_SIZE_LIMIT);
        let off = layout::dir_entry_offset(0, slot) + 8;
        let field = &mut self.map[off..off + NAME_SIZE_LIMIT];
        field.fill(0);
        field[..name.len()].copy_from_slice(name);
    }
}
