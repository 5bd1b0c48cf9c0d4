//! On-disk format constants and engine limits.

/// Size of one disk block in bytes. Every on-disk structure is laid out
/// in units of this.
pub const BLOCK_SIZE: usize = 512;

/// The first 8 bytes of every SFS image, *including* the terminating NUL.
/// The high-bit bytes do not form valid UTF-8, so the format cannot be
/// mistaken for text; the trailing 0x01 is the format version.
pub const DISK_MAGIC: [u8; 8] = *b"SFS\xB2\xB1\xB3\x01\0";

/// Type tag of an unallocated block. Unlike the magic, type tags carry
/// no terminating NUL.
pub const TYPE_FREE: [u8; 4] = *b"SFU\xF5";
/// Type tag of a block holding file data.
pub const TYPE_FILE: [u8; 4] = *b"SFF\xE6";
/// Type tag of a block holding directory entries.
pub const TYPE_DIR: [u8; 4] = *b"SFD\xE4";

/// Bytes taken by the header at the start of every non-superblock block.
pub const BLOCK_HEADER_SIZE: usize = 12;

/// File data stored in any one block.
pub const BLOCK_DATA_SIZE: usize = BLOCK_SIZE - BLOCK_HEADER_SIZE;

/// A directory entry is exactly this many bytes.
pub const DIR_ENTRY_SIZE: usize = 32;

/// Byte offset of the entry array inside a directory block. The header
/// (or, in the superblock, the volume metadata) is padded out to one
/// entry's width so the array sits at the same offset everywhere.
pub const DIR_ENTRIES_OFFSET: usize = DIR_ENTRY_SIZE;

/// Directory entries per block: one block's worth minus the slot lost to
/// the header padding.
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE - 1;

/// Maximum number of files that can exist. The root directory is never
/// extended past its embedded block, so this equals the entries that fit
/// in one block.
pub const FILE_COUNT_LIMIT: usize = DIR_ENTRIES_PER_BLOCK;

/// Maximum number of open descriptors. Larger than [`FILE_COUNT_LIMIT`]
/// so the same file can be opened more than once.
pub const OPEN_FILE_LIMIT: usize = 32;

/// Maximum file name length, *including* the terminating NUL.
pub const NAME_SIZE_LIMIT: usize = 24;

/// Block ids are 32-bit, and the block count must itself fit in the
/// superblock's 32-bit field.
pub const MAX_DISK_SIZE: u64 = u32::MAX as u64 * BLOCK_SIZE as u64;

/// Capped by the 32-bit size field of a directory entry.
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

const _: () = assert!(DIR_ENTRIES_OFFSET + DIR_ENTRIES_PER_BLOCK * DIR_ENTRY_SIZE == BLOCK_SIZE);
const _: () = assert!(BLOCK_HEADER_SIZE <= DIR_ENTRIES_OFFSET);
const _: () = assert!(OPEN_FILE_LIMIT >= FILE_COUNT_LIMIT);
