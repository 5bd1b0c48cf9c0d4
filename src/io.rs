//! Chunked traversal of file block chains.
//!
//! Reads and writes move through a chain in up-to-500-byte chunks. The
//! first chunk covers the stretch from the current position to the end
//! of the current block (possibly zero bytes when the position sits
//! exactly on a block boundary); every later chunk starts at a block's
//! first data byte.

use crate::config::*;
use crate::image::DiskImage;
use crate::layout::BlockId;
use crate::ofile::Descriptor;

const DATA: u64 = BLOCK_DATA_SIZE as u64;

/// Round `size` up to a whole number of data blocks' worth of bytes.
/// Zero rounds up to one block: even an empty file owns a block, since a
/// nonzero first block is what marks its directory entry live.
pub(crate) fn round_up(size: u64) -> u64 {
    let size = size.max(1);
    (size + DATA - 1) / DATA * DATA
}

/// Index within a chain of the block the walkers expect for `pos`: the
/// block containing byte `pos`, except that a position on a block
/// boundary maps to the block just finished.
fn block_index(pos: u64) -> u64 {
    round_up(pos) / DATA - 1
}

/// Copy `buf.len()` bytes out of the chain at the descriptor position,
/// advancing it. The caller has already capped the length at the file
/// size, so the chain is long enough; running off its end anyway means
/// the volume is corrupt.
pub(crate) fn read_chunks(img: &DiskImage, desc: &mut Descriptor, buf: &mut [u8]) {
    let pos = desc.curr_pos;
    let mut remaining = buf.len();
    let mut filled = 0usize;
    let mut block = desc.curr_block;
    let mut block_pos = (pos % DATA) as usize;
    let mut chunk = ((round_up(pos) - pos) as usize).min(remaining);
    loop {
        if chunk > 0 {
            buf[filled..filled + chunk]
                .copy_from_slice(&img.file_data(block)[block_pos..block_pos + chunk]);
            filled += chunk;
            remaining -= chunk;
        }
        if remaining == 0 {
            break;
        }
        block_pos = 0;
        chunk = remaining.min(BLOCK_DATA_SIZE);
        block = img.header(block).next;
        assert!(block != 0, "file chain ended before the file size");
    }
    desc.curr_block = block;
    desc.curr_pos = pos + filled as u64;
}

/// Copy all of `buf` into the chain at the descriptor position,
/// advancing it. `extra` is a freshly allocated chain (0 if none) that
/// gets spliced onto the tail the moment the walk first runs past the
/// end; that happens at most once per call.
pub(crate) fn write_chunks(img: &mut DiskImage, desc: &mut Descriptor, buf: &[u8], mut extra: BlockId) {
    let pos = desc.curr_pos;
    let mut remaining = buf.len();
    let mut taken = 0usize;
    let mut block = desc.curr_block;
    let mut block_pos = (pos % DATA) as usize;
    let mut chunk = ((round_up(pos) - pos) as usize).min(remaining);
    loop {
        if chunk > 0 {
            img.file_data_mut(block)[block_pos..block_pos + chunk]
                .copy_from_slice(&buf[taken..taken + chunk]);
            taken += chunk;
            remaining -= chunk;
        }
        if remaining == 0 {
            break;
        }
        block_pos = 0;
        chunk = remaining.min(BLOCK_DATA_SIZE);
        let mut next = img.header(block).next;
        if next == 0 {
            assert!(extra != 0, "write ran past the chain with no growth blocks");
            img.set_next(block, extra);
            img.set_prev(extra, block);
            next = extra;
            extra = 0;
        }
        block = next;
    }
    desc.curr_block = block;
    desc.curr_pos = pos + taken as u64;
}

/// Reposition the descriptor at `new_pos` (already clamped to the file
/// bounds by the caller), re-walking the chain from its first block.
pub(crate) fn seek_to(img: &DiskImage, desc: &mut Descriptor, new_pos: u64) {
    let mut block = desc.start_block;
    for _ in 0..block_index(new_pos) {
        block = img.header(block).next;
        assert!(block != 0, "file chain ended before the file size");
    }
    desc.curr_block = block;
    desc.curr_pos = new_pos;
}
