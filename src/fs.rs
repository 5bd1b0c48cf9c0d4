//! The file-system engine: volume lifecycle, the POSIX-like file API,
//! and the directory iterator.

use std::path::Path;

use log::debug;

use crate::alloc;
use crate::config::*;
use crate::dir;
use crate::error::{FsError, Result};
use crate::image::{page_size, DiskImage};
use crate::io;
use crate::layout::DirEntry;
use crate::ofile::OpenFiles;

/// Opaque cursor for [`FileSystem::list`]. A default cursor starts a
/// fresh listing; the engine resets it once the listing is exhausted.
/// Mutating the directory between calls invalidates the cursor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListCursor(usize);

/// The engine: at most one mounted volume plus the open-file tables.
///
/// The engine is single-mutator by design: all methods take `&mut self`
/// and nothing blocks. Callers that want concurrent access wrap the
/// whole engine in one lock.
#[derive(Debug)]
pub struct FileSystem {
    image: Option<DiskImage>,
    open_files: OpenFiles,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem {
    pub fn new() -> Self {
        Self {
            image: None,
            open_files: OpenFiles::new(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.image.is_some()
    }

    /// Create and format a fresh volume of exactly `size` bytes at
    /// `path`, erasing any previous contents, and leave it mounted.
    /// `size` must be a nonzero multiple of the host page size.
    ///
    /// Caution: an existing file at `path` may be erased even when this
    /// fails partway through.
    pub fn format(&mut self, path: impl AsRef<Path>, size: u64) -> Result<()> {
        let path = path.as_ref();
        if self.image.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        if size == 0 || size % page_size() as u64 != 0 {
            return Err(FsError::InvalidArgument);
        }
        if size > MAX_DISK_SIZE {
            return Err(FsError::TooLarge);
        }

        let mut img = DiskImage::create(path, size)?;

        // The fresh image is all zero, so only the superblock fields and
        // the free-list links need writing: every block from 1 up is
        // threaded into one chain.
        img.write_magic();
        let n_blocks = (size / BLOCK_SIZE as u64) as u32;
        img.set_n_blocks(n_blocks);
        img.set_freelist(1);
        for id in 1..n_blocks {
            img.set_type(id, TYPE_FREE);
            img.set_prev(id, id - 1);
            img.set_next(id, if id + 1 == n_blocks { 0 } else { id + 1 });
        }

        debug!("formatted {} as {} blocks", path.display(), n_blocks);
        self.image = Some(img);
        Ok(())
    }

    /// Attach an existing volume.
    pub fn mount(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.image.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        let img = DiskImage::open(path)?;
        debug!("mounted {} ({} blocks)", path.display(), img.block_count());
        self.image = Some(img);
        Ok(())
    }

    /// Flush and detach the mounted volume. Succeeds trivially when
    /// nothing is mounted; refuses while any descriptor is open.
    pub fn unmount(&mut self) -> Result<()> {
        let Some(img) = self.image.as_ref() else {
            return Ok(());
        };
        if self.open_files.any_open() {
            return Err(FsError::Busy);
        }
        img.flush()?;
        self.image = None;
        Ok(())
    }

    /// Open `name` for reading and writing, creating it if absent.
    /// Returns a descriptor index for the other file operations.
    pub fn open(&mut self, name: &str) -> Result<usize> {
        dir::validate_name(name.as_bytes())?;
        let img = self.image.as_mut().ok_or(FsError::NotMounted)?;

        let scan = dir::scan(img, name.as_bytes());
        if let Some(slot) = scan.found {
            let first = img.dir_entry(slot).first_block;
            return self.open_files.open(slot, first);
        }

        let Some(slot) = scan.empty else {
            return Err(FsError::NoSpace);
        };
        let first = alloc::allocate(img, 1, TYPE_FILE);
        if first == 0 {
            return Err(FsError::NoSpace);
        }
        img.set_dir_entry(slot, &DirEntry::new(first, 0, name.as_bytes()));
        debug!("created '{}' in slot {}", name, slot);
        self.open_files.open(slot, first)
    }

    /// Release a descriptor. Unknown descriptors are silently ignored;
    /// this cannot fail.
    pub fn close(&mut self, fd: usize) {
        self.open_files.close(fd);
    }

    /// Read up to `buf.len()` bytes at the descriptor's position and
    /// advance it. A short count means the end of the file was reached;
    /// reading at the very end returns 0, which is not an error.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize> {
        let desc = self.open_files.get_mut(fd)?;
        let img = self
            .image
            .as_ref()
            .expect("open descriptor without a mounted volume");

        let size = img.dir_entry(desc.dir_slot).size as u64;
        assert!(desc.curr_pos <= size);
        let total = ((size - desc.curr_pos).min(buf.len() as u64)) as usize;
        io::read_chunks(img, desc, &mut buf[..total]);
        Ok(total)
    }

    /// Write all of `buf` at the descriptor's position, advancing it and
    /// growing the file on demand. The write is all-or-nothing: on
    /// `NoSpace` or `TooLarge` the volume is untouched.
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize> {
        let desc = self.open_files.get_mut(fd)?;
        let img = self
            .image
            .as_mut()
            .expect("open descriptor without a mounted volume");

        let size = img.dir_entry(desc.dir_slot).size as u64;
        assert!(desc.curr_pos <= size);

        let end = desc.curr_pos + buf.len() as u64;
        let allocated = io::round_up(size);
        let mut extra = 0;
        if end > allocated {
            let need = io::round_up(end);
            if need > MAX_FILE_SIZE {
                return Err(FsError::TooLarge);
            }
            let grow = ((need - allocated) / BLOCK_DATA_SIZE as u64) as u32;
            extra = alloc::allocate(img, grow, TYPE_FILE);
            if extra == 0 {
                return Err(FsError::NoSpace);
            }
        }

        io::write_chunks(img, desc, buf, extra);
        if end > size {
            assert!(end <= MAX_FILE_SIZE);
            img.set_entry_size(desc.dir_slot, end as u32);
        }
        Ok(buf.len())
    }

    /// Current position of `fd`.
    pub fn getpos(&self, fd: usize) -> Result<u64> {
        Ok(self.open_files.get(fd)?.curr_pos)
    }

    /// Shift the position of `fd` by `delta` bytes, clamping to the file
    /// bounds, and return the new position.
    pub fn seek(&mut self, fd: usize, delta: i64) -> Result<u64> {
        let desc = self.open_files.get_mut(fd)?;
        let img = self
            .image
            .as_ref()
            .expect("open descriptor without a mounted volume");

        let size = img.dir_entry(desc.dir_slot).size as u64;
        let new_pos = desc.curr_pos.saturating_add_signed(delta).min(size);
        io::seek_to(img, desc, new_pos);
        Ok(new_pos)
    }

    /// Delete `name`, returning its blocks to the free list. A file that
    /// is open anywhere cannot be removed.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        dir::validate_name(name.as_bytes())?;
        let img = self.image.as_mut().ok_or(FsError::NotMounted)?;

        let Some(slot) = dir::scan(img, name.as_bytes()).found else {
            return Err(FsError::NoEntry);
        };
        if self.open_files.is_open(slot) {
            return Err(FsError::Busy);
        }

        let first = img.dir_entry(slot).first_block;
        img.set_entry_first_block(slot, 0);
        alloc::free(img, first);
        debug!("removed '{}' from slot {}", name, slot);
        Ok(())
    }

    /// Rename `old` to `new`. An existing `new` is replaced and its
    /// blocks freed, unless it is open, which fails `Busy`. Renaming an
    /// open file is fine: the file keeps its directory slot, so its
    /// descriptors stay valid.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        dir::validate_name(old.as_bytes())?;
        dir::validate_name(new.as_bytes())?;
        let img = self.image.as_mut().ok_or(FsError::NotMounted)?;

        let Some(old_slot) = dir::scan(img, old.as_bytes()).found else {
            return Err(FsError::NoEntry);
        };
        if old == new {
            return Ok(());
        }

        if let Some(new_slot) = dir::scan(img, new.as_bytes()).found {
            if self.open_files.is_open(new_slot) {
                return Err(FsError::Busy);
            }
            let first = img.dir_entry(new_slot).first_block;
            img.set_entry_first_block(new_slot, 0);
            alloc::free(img, first);
        }

        img.set_entry_name(old_slot, new.as_bytes());
        debug!("renamed '{}' to '{}'", old, new);
        Ok(())
    }

    /// Copy the next live file name, NUL terminated, into `name_out`.
    ///
    /// Returns `Ok(true)` when a name was produced and `Ok(false)` once
    /// the listing is exhausted, resetting the cursor so it can start
    /// over. `name_out` must be nonempty; a name that does not fit
    /// (together with its NUL) fails `NameTooLong` and leaves the cursor
    /// alone. The directory must not be mutated during a listing.
    pub fn list(&self, cursor: &mut ListCursor, name_out: &mut [u8]) -> Result<bool> {
        if name_out.is_empty() {
            return Err(FsError::InvalidArgument);
        }
        let img = self.image.as_ref().ok_or(FsError::NotMounted)?;

        while cursor.0 < FILE_COUNT_LIMIT {
            let entry = img.dir_entry(cursor.0);
            if entry.is_live() {
                let name = entry.name_bytes();
                if name.len() + 1 > name_out.len() {
                    return Err(FsError::NameTooLong);
                }
                name_out[..name.len()].copy_from_slice(name);
                name_out[name.len()] = 0;
                cursor.0 += 1;
                return Ok(true);
            }
            cursor.0 += 1;
        }

        *cursor = ListCursor::default();
        Ok(false)
    }
}
