//! In-memory open-file bookkeeping.
//!
//! Two-level structure: the descriptor table tracks a position per open,
//! and the v-node table has at most one entry per file so that every
//! descriptor on the same file observes one size and the file cannot be
//! removed while any of them is live. A v-node's slot index equals the
//! file's directory slot; its ref count decides its lifetime.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::layout::BlockId;

/// Shared per-file record; exists only while the file is open.
#[derive(Debug, Clone, Copy)]
struct VNode {
    ref_count: u32,
}

/// One open descriptor: position state over a file's block chain.
///
/// `curr_block` always agrees with `curr_pos`: it is the block the
/// read/write walkers expect for that position, and `curr_pos` never
/// exceeds the file size.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Descriptor {
    /// Directory slot (and v-node index) of the file.
    pub dir_slot: usize,
    pub start_block: BlockId,
    pub curr_block: BlockId,
    pub curr_pos: u64,
}

#[derive(Debug)]
pub(crate) struct OpenFiles {
    descriptors: [Option<Descriptor>; OPEN_FILE_LIMIT],
    vnodes: [Option<VNode>; FILE_COUNT_LIMIT],
}

impl OpenFiles {
    pub fn new() -> Self {
        Self {
            descriptors: [None; OPEN_FILE_LIMIT],
            vnodes: [None; FILE_COUNT_LIMIT],
        }
    }

    /// Allocate a descriptor on the file in `dir_slot`, creating its
    /// v-node on first open.
    pub fn open(&mut self, dir_slot: usize, first_block: BlockId) -> Result<usize> {
        let fd = self
            .descriptors
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TooManyOpenFiles)?;
        let vnode = self.vnodes[dir_slot].get_or_insert(VNode { ref_count: 0 });
        vnode.ref_count += 1;
        self.descriptors[fd] = Some(Descriptor {
            dir_slot,
            start_block: first_block,
            curr_block: first_block,
            curr_pos: 0,
        });
        Ok(fd)
    }

    /// Release `fd`, dropping the v-node when its last descriptor goes.
    /// Out-of-range and unused descriptors are silently ignored.
    pub fn close(&mut self, fd: usize) {
        let Some(desc) = self.descriptors.get_mut(fd).and_then(Option::take) else {
            return;
        };
        let vnode = self.vnodes[desc.dir_slot]
            .as_mut()
            .expect("descriptor without a v-node");
        vnode.ref_count -= 1;
        if vnode.ref_count == 0 {
            self.vnodes[desc.dir_slot] = None;
        }
    }

    pub fn get(&self, fd: usize) -> Result<Descriptor> {
        self.descriptors
            .get(fd)
            .copied()
            .flatten()
            .ok_or(FsError::BadDescriptor)
    }

    pub fn get_mut(&mut self, fd: usize) -> Result<&mut Descriptor> {
        self.descriptors
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FsError::BadDescriptor)
    }

    /// Whether any descriptor holds the file in `dir_slot` open.
    pub fn is_open(&self, dir_slot: usize) -> bool {
        self.vnodes[dir_slot].is_some()
    }

    pub fn any_open(&self) -> bool {
        self.descriptors.iter().any(Option::is_some)
    }
}
