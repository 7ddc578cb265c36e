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

//! Findings reported by the checker.
//!
//! A finding is a consistency violation on the volume, not an operational
//! error: findings are the product of a successful run and never abort it.

use std::fmt;

/// The slot of an inode's block tree that holds a block reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Slot {
    /// The direct pointer at the given index.
    Direct(usize),
    /// The singly indirect pointer.
    Indirect,
    /// The entry at the given index of the singly indirect block.
    IndirectPtr(usize),
    /// The doubly indirect pointer.
    DoubleIndirect,
    /// The entry at the given index of the doubly indirect block.
    DoubleIndirectL1(usize),
    /// The entry `.1` of the level 2 block referenced by the entry `.0` of the
    /// doubly indirect block.
    DoubleIndirectL2(usize, usize),
    /// The triply indirect pointer.
    TripleIndirect,
    /// The entry at the given index of the triply indirect block.
    TripleIndirectL1(usize),
    /// The entry `.1` of the level 2 block referenced by the entry `.0` of the
    /// triply indirect block.
    TripleIndirectL2(usize, usize),
    /// The entry `.2` of the level 3 block reached through the entries `.0`
    /// then `.1` of the triply indirect tree.
    TripleIndirectL3(usize, usize, usize),
}

impl fmt::Display for Slot {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(k) => write!(fmt, "DIRECT[{k}]"),
            Self::Indirect => write!(fmt, "INDIRECT"),
            Self::IndirectPtr(k) => write!(fmt, "INDIRECT_PTR[{k}]"),
            Self::DoubleIndirect => write!(fmt, "DOUBLE_INDIRECT"),
            Self::DoubleIndirectL1(i) => write!(fmt, "DOUBLE_INDIRECT_L1[{i}]"),
            Self::DoubleIndirectL2(i, j) => write!(fmt, "DOUBLE_INDIRECT_L2[{i}][{j}]"),
            Self::TripleIndirect => write!(fmt, "TRIPLE_INDIRECT"),
            Self::TripleIndirectL1(i) => write!(fmt, "TRIPLE_INDIRECT_L1[{i}]"),
            Self::TripleIndirectL2(i, j) => write!(fmt, "TRIPLE_INDIRECT_L2[{i}][{j}]"),
            Self::TripleIndirectL3(i, j, k) => {
                write!(fmt, "TRIPLE_INDIRECT_L3[{i}][{j}][{k}]")
            }
        }
    }
}

/// A consistency violation found on the volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Finding {
    /// The slot `slot` of the inode `inode` references a block outside of the
    /// data area.
    BadBlock { inode: u32, block: u32, slot: Slot },
    /// The slot `slot` of the inode `inode` references a block that is already
    /// referenced elsewhere.
    Duplicate { inode: u32, block: u32, slot: Slot },
    /// The slot `slot` of the inode `inode` references a block the data bitmap
    /// marks as free.
    BitmapError { inode: u32, block: u32, slot: Slot },
    /// An indirect block could not be read. Its subtree was not walked.
    ReadError { level: &'static str, block: u32 },
    /// The inode bitmap marks the inode `inode` as allocated, but the inode is
    /// not in use.
    InodeBitmapExtra { inode: u32, links: u32, dtime: u32 },
    /// The inode bitmap marks the inode `inode` as free, but the inode is in
    /// use.
    InodeBitmapMissing { inode: u32, links: u32 },
    /// The data bitmap marks the block `block` as used, but no inode
    /// references it.
    UnusedBlock { block: u32 },
    /// The block `block` is referenced `count` times, but the data bitmap
    /// marks it as free.
    MissingBitmap { block: u32, count: u32 },
}

impl fmt::Display for Finding {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadBlock { inode, block, slot } => {
                write!(fmt, "BADBLOCK: Inode {inode} references invalid block {block} || {slot}")
            }
            Self::Duplicate { inode, block, slot } => write!(
                fmt,
                "DUPLICATE: Inode {inode} references block {block} which is already referenced || {slot}"
            ),
            Self::BitmapError { inode, block, slot } => write!(
                fmt,
                "BITMAPERROR: Inode {inode} references block {block} but bitmap says free || {slot}"
            ),
            Self::ReadError { level, block } => {
                write!(fmt, "ERROR: Failed to read {level} block {block}")
            }
            Self::InodeBitmapExtra { links, dtime, .. } => {
                write!(fmt, "ERROR: Inode has links={links} dtime={dtime}")
            }
            Self::InodeBitmapMissing { links, .. } => {
                write!(fmt, "ERROR: Inode should be allocated (links={links})")
            }
            Self::UnusedBlock { block } => {
                write!(fmt, "UNUSED_BLOCK: Block {block} marked used but not referenced")
            }
            Self::MissingBitmap { block, count } => write!(
                fmt,
                "MISSING_BITMAP: Block {block} referenced {count} times but marked free"
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slot_display() {
        assert_eq!(Slot::Direct(3).to_string(), "DIRECT[3]");
        assert_eq!(Slot::Indirect.to_string(), "INDIRECT");
        assert_eq!(Slot::IndirectPtr(1023).to_string(), "INDIRECT_PTR[1023]");
        assert_eq!(Slot::DoubleIndirect.to_string(), "DOUBLE_INDIRECT");
        assert_eq!(Slot::DoubleIndirectL1(4).to_string(), "DOUBLE_INDIRECT_L1[4]");
        assert_eq!(Slot::DoubleIndirectL2(4, 7).to_string(), "DOUBLE_INDIRECT_L2[4][7]");
        assert_eq!(Slot::TripleIndirect.to_string(), "TRIPLE_INDIRECT");
        assert_eq!(Slot::TripleIndirectL1(0).to_string(), "TRIPLE_INDIRECT_L1[0]");
        assert_eq!(Slot::TripleIndirectL2(1, 2).to_string(), "TRIPLE_INDIRECT_L2[1][2]");
        assert_eq!(
            Slot::TripleIndirectL3(1, 2, 3).to_string(),
            "TRIPLE_INDIRECT_L3[1][2][3]"
        );
    }

    #[test]
    fn finding_display() {
        let f = Finding::BadBlock {
            inode: 0,
            block: 100,
            slot: Slot::Direct(0),
        };
        assert_eq!(
            f.to_string(),
            "BADBLOCK: Inode 0 references invalid block 100 || DIRECT[0]"
        );
        let f = Finding::Duplicate {
            inode: 1,
            block: 8,
            slot: Slot::Direct(0),
        };
        assert_eq!(
            f.to_string(),
            "DUPLICATE: Inode 1 references block 8 which is already referenced || DIRECT[0]"
        );
        let f = Finding::BitmapError {
            inode: 0,
            block: 8,
            slot: Slot::IndirectPtr(2),
        };
        assert_eq!(
            f.to_string(),
            "BITMAPERROR: Inode 0 references block 8 but bitmap says free || INDIRECT_PTR[2]"
        );
        let f = Finding::ReadError {
            level: "level2",
            block: 12,
        };
        assert_eq!(f.to_string(), "ERROR: Failed to read level2 block 12");
        let f = Finding::UnusedBlock { block: 9 };
        assert_eq!(f.to_string(), "UNUSED_BLOCK: Block 9 marked used but not referenced");
        let f = Finding::MissingBitmap { block: 8, count: 2 };
        assert_eq!(
            f.to_string(),
            "MISSING_BITMAP: Block 8 referenced 2 times but marked free"
        );
    }
}
