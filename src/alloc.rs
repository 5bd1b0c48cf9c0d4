//! Free-list block allocation.
//!
//! The free list is an ordinary doubly-linked block chain rooted at the
//! superblock, so allocation is a detach of its prefix and deallocation a
//! splice onto its front. Blocks keep their relative links across both.

use crate::config::*;
use crate::image::DiskImage;
use crate::layout::BlockId;

/// Detach `n` blocks from the front of the free list, retag them `tag`,
/// and return the first block of the (still linked) chain. Returns 0 if
/// `n` is zero or the free list holds fewer than `n` blocks; the list is
/// untouched in that case.
pub(crate) fn allocate(img: &mut DiskImage, n: u32, tag: [u8; 4]) -> BlockId {
    let first = img.freelist();
    if first == 0 || n == 0 {
        return 0;
    }

    // Find the n-th free block before modifying anything, so a short
    // list is left exactly as it was.
    let mut last = first;
    for _ in 1..n {
        let next = img.free_header(last).next;
        if next == 0 {
            return 0;
        }
        last = next;
    }

    let residual = img.free_header(last).next;
    if residual != 0 {
        img.set_prev(residual, 0);
        img.set_next(last, 0);
    }
    img.set_freelist(residual);

    // The detached prefix is already internally linked; only the type
    // tags change.
    let mut id = first;
    while id != 0 {
        img.free_header(id);
        img.set_type(id, tag);
        id = img.header(id).next;
    }

    first
}

/// Move the chain starting at `first` onto the free list, retagging every
/// block FREE. `first` need not be the head of its chain; the stretch in
/// front of it is cut loose first.
pub(crate) fn free(img: &mut DiskImage, first: BlockId) {
    let hdr = img.header(first);
    if hdr.prev != 0 {
        img.set_next(hdr.prev, 0);
        img.set_prev(first, 0);
    }

    let mut last = first;
    loop {
        assert_ne!(img.block_type(last), TYPE_FREE, "freeing already-free block {last}");
        img.set_type(last, TYPE_FREE);
        let next = img.header(last).next;
        if next == 0 {
            break;
        }
        last = next;
    }

    let old_head = img.freelist();
    img.set_next(last, old_head);
    if old_head != 0 {
        img.set_prev(old_head, last);
    }
    img.set_freelist(first);
}
