//! SFS is a tiny FAT-style file system held in a single memory-mapped
//! disk image, built to show the moving parts of a real file system with
//! as little machinery as possible. Files are accessed by name, created,
//! deleted, renamed, read and written; there are no permissions,
//! timestamps, nested directories or long names.
//!
//! The volume is an array of 512-byte blocks:
//! - Block 0 is the superblock: magic number, block count, the head of
//!   the free list, and the embedded root directory.
//! - Every other block starts with a 12-byte header carrying a type tag
//!   and `prev`/`next` links. File contents, the free list, and the
//!   (optional) root-directory extension are all doubly-linked chains of
//!   such blocks.
//!
//! The pieces, bottom to top:
//! 1. [`layout`]: byte-exact codecs for the on-disk structures.
//! 2. `image`: the mapped volume and typed block views over it.
//! 3. `alloc`: the free-list allocator.
//! 4. `ofile`: descriptor and v-node tables for open files.
//! 5. [`FileSystem`]: the engine tying it together behind a small
//!    POSIX-like API (`format`/`mount`/`open`/`read`/`write`/...).
//! 6. [`fsck`]: an offline, read-only structural checker over the same
//!    layout, also available as the `sfs-fsck` binary.
//!
//! The engine assumes a single mutator. Wrap it in a lock if several
//! threads need it; nothing inside blocks.

mod alloc;
mod config;
mod dir;
mod error;
mod fs;
mod image;
mod io;
mod ofile;

pub mod fsck;
pub mod layout;

pub use config::*;
pub use error::{FsError, Result};
pub use fs::{FileSystem, ListCursor};
pub use image::{page_size, DiskImage};
pub use layout::{BlockHeader, BlockId, DirEntry};
