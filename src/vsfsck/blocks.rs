/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! Block reference checks.
//!
//! The walker visits every block referenced by every in-use inode, in
//! positional order: the twelve direct pointers, then the singly, doubly and
//! triply indirect trees. An indirect block is accounted before its entries,
//! since it consumes a data block itself. Each visit checks the reference
//! (range, uniqueness, data bitmap agreement) and accumulates a per-block
//! reference count; the reconciliation then compares the data bitmap against
//! the accumulated counts.
//!
//! The descent is bounded: an indirect tree is at most three levels deep and
//! one scratch buffer is live per level.

use crate::vsfsck::report::Finding;
use crate::vsfsck::report::Slot;
use std::io::Read;
use std::io::Seek;
use std::mem::size_of;
use utils::bitmap::Bitmap;
use utils::image::Image;
use utils::layout::FIRST_DATA_BLOCK;
use utils::layout::Inode;
use utils::layout::TOTAL_BLOCKS;

/// Reference counts for the blocks of the data area, indexed by
/// `block - FIRST_DATA_BLOCK`.
pub struct RefCounts(Vec<u32>);

impl RefCounts {
    /// Creates a zeroed array covering the whole data area.
    pub fn new() -> Self {
        Self(vec![0; (TOTAL_BLOCKS - FIRST_DATA_BLOCK) as usize])
    }

    /// Returns the number of recorded references to the data block `block`.
    pub fn get(&self, block: u32) -> u32 {
        self.0[(block - FIRST_DATA_BLOCK) as usize]
    }

    /// Records a reference to the data block `block`.
    fn increment(&mut self, block: u32) {
        self.0[(block - FIRST_DATA_BLOCK) as usize] += 1;
    }
}

/// Walks the block tree of in-use inodes, checking every block reference.
pub struct Walker<'c, D> {
    img: &'c mut Image<D>,
    data_bitmap: &'c Bitmap,
    refs: RefCounts,
    findings: Vec<Finding>,
    /// The number of the inode being walked.
    inode: u32,
}

impl<'c, D: Read + Seek> Walker<'c, D> {
    /// Creates a walker reading indirect blocks from `img` and checking
    /// references against `data_bitmap`.
    pub fn new(img: &'c mut Image<D>, data_bitmap: &'c Bitmap) -> Self {
        Self {
            img,
            data_bitmap,
            refs: RefCounts::new(),
            findings: Vec::new(),
            inode: 0,
        }
    }

    /// Walks every inode of `inodes` in order, returning the findings in
    /// discovery order along with the accumulated reference counts.
    ///
    /// An inode is walked only if it is in use and uses at least one block.
    pub fn walk(mut self, inodes: &[Inode]) -> (Vec<Finding>, RefCounts) {
        for (i, inode) in inodes.iter().enumerate() {
            if !inode.is_used() || inode.used_blocks == 0 {
                continue;
            }
            self.inode = i as u32;
            self.walk_inode(inode);
        }
        (self.findings, self.refs)
    }

    /// Walks the block tree of a single inode.
    fn walk_inode(&mut self, inode: &Inode) {
        let direct = inode.direct_block_ptrs;
        for (k, block) in direct.into_iter().enumerate() {
            self.visit(block, Slot::Direct(k));
        }
        let indirect = inode.singly_indirect_block_ptr;
        if indirect != 0 && self.visit(indirect, Slot::Indirect) {
            if let Some(ptrs) = self.read_pointers(indirect, "indirect") {
                for (k, block) in ptrs.into_iter().enumerate() {
                    self.visit(block, Slot::IndirectPtr(k));
                }
            }
        }
        let double_indirect = inode.doubly_indirect_block_ptr;
        if double_indirect != 0 && self.visit(double_indirect, Slot::DoubleIndirect) {
            if let Some(l1) = self.read_pointers(double_indirect, "double indirect") {
                for (i, l2_block) in l1.into_iter().enumerate() {
                    if l2_block == 0 {
                        continue;
                    }
                    if !self.visit(l2_block, Slot::DoubleIndirectL1(i)) {
                        continue;
                    }
                    let Some(l2) = self.read_pointers(l2_block, "level2") else {
                        continue;
                    };
                    for (j, block) in l2.into_iter().enumerate() {
                        self.visit(block, Slot::DoubleIndirectL2(i, j));
                    }
                }
            }
        }
        let triple_indirect = inode.triply_indirect_block_ptr;
        if triple_indirect != 0 && self.visit(triple_indirect, Slot::TripleIndirect) {
            if let Some(l1) = self.read_pointers(triple_indirect, "triple indirect") {
                for (i, l2_block) in l1.into_iter().enumerate() {
                    if l2_block == 0 {
                        continue;
                    }
                    if !self.visit(l2_block, Slot::TripleIndirectL1(i)) {
                        continue;
                    }
                    let Some(l2) = self.read_pointers(l2_block, "level2") else {
                        continue;
                    };
                    for (j, l3_block) in l2.into_iter().enumerate() {
                        if l3_block == 0 {
                            continue;
                        }
                        if !self.visit(l3_block, Slot::TripleIndirectL2(i, j)) {
                            continue;
                        }
                        let Some(l3) = self.read_pointers(l3_block, "level3") else {
                            continue;
                        };
                        for (k, block) in l3.into_iter().enumerate() {
                            self.visit(block, Slot::TripleIndirectL3(i, j, k));
                        }
                    }
                }
            }
        }
    }

    /// Runs the reference check for the block `block`, referenced by the slot
    /// `slot` of the current inode.
    ///
    /// The reference is recorded iff the block is in range and not already
    /// referenced; data bitmap disagreement is reported but does not affect
    /// the accounting.
    ///
    /// Returns `true` if the walker may descend into the block.
    fn visit(&mut self, block: u32, slot: Slot) -> bool {
        if block == 0 {
            return false;
        }
        let inode = self.inode;
        if !(FIRST_DATA_BLOCK..TOTAL_BLOCKS).contains(&block) {
            self.findings.push(Finding::BadBlock { inode, block, slot });
            return false;
        }
        if self.refs.get(block) > 0 {
            self.findings.push(Finding::Duplicate { inode, block, slot });
            return false;
        }
        if !self.data_bitmap.is_set((block - FIRST_DATA_BLOCK) as usize) {
            self.findings.push(Finding::BitmapError { inode, block, slot });
        }
        self.refs.increment(block);
        true
    }

    /// Reads the indirect block `block` and parses its entries.
    ///
    /// On failure, the error is reported and `None` is returned: the subtree
    /// is pruned but the walk carries on with siblings and further inodes.
    fn read_pointers(&mut self, block: u32, level: &'static str) -> Option<Vec<u32>> {
        match self.img.read_block(block) {
            Ok(buf) => Some(
                buf.chunks_exact(size_of::<u32>())
                    .map(|e| u32::from_le_bytes(e.try_into().unwrap()))
                    .collect(),
            ),
            Err(_) => {
                self.findings.push(Finding::ReadError { level, block });
                None
            }
        }
    }
}

/// Compares the data bitmap against the reference counts accumulated by the
/// walker.
pub fn reconcile(data_bitmap: &Bitmap, refs: &RefCounts) -> Vec<Finding> {
    let mut findings = Vec::new();
    for block in FIRST_DATA_BLOCK..TOTAL_BLOCKS {
        let allocated = data_bitmap.is_set((block - FIRST_DATA_BLOCK) as usize);
        let count = refs.get(block);
        if allocated && count == 0 {
            findings.push(Finding::UnusedBlock { block });
        } else if !allocated && count > 0 {
            findings.push(Finding::MissingBitmap { block, count });
        }
    }
    findings
}
