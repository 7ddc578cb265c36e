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

//! Validation of the superblock.
//!
//! The layout constants of a VSFS volume are fixed, so every field of the
//! superblock except the inode count must match the expected constant. The
//! superblock is the precondition of every other check: on mismatch the whole
//! run is abandoned.

use std::fmt;
use utils::layout::BLOCK_SIZE;
use utils::layout::DATA_BITMAP_BLOCK;
use utils::layout::FIRST_DATA_BLOCK;
use utils::layout::INODE_BITMAP_BLOCK;
use utils::layout::INODE_SIZE;
use utils::layout::INODE_TABLE_START;
use utils::layout::Superblock;
use utils::layout::TOTAL_BLOCKS;
use utils::layout::VSFS_MAGIC;

/// The first invalid field found in the superblock, along with its actual
/// value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SuperblockError {
    /// Invalid signature.
    Magic(u16),
    /// Invalid block size.
    BlockSize(u32),
    /// Invalid number of blocks.
    TotalBlocks(u32),
    /// Invalid inode bitmap block index.
    InodeBitmapBlock(u32),
    /// Invalid data bitmap block index.
    DataBitmapBlock(u32),
    /// Invalid inode table start index.
    InodeTableStart(u32),
    /// Invalid first data block index.
    FirstDataBlock(u32),
    /// Invalid inode record size.
    InodeSize(u32),
}

impl fmt::Display for SuperblockError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Magic(n) => {
                write!(fmt, "Error: Invalid magic number {n:04X} (expected {VSFS_MAGIC:04X})")
            }
            Self::BlockSize(n) => {
                write!(fmt, "Error: Invalid block size {n} (expected {BLOCK_SIZE})")
            }
            Self::TotalBlocks(n) => {
                write!(fmt, "Error: Invalid total blocks {n} (expected {TOTAL_BLOCKS})")
            }
            Self::InodeBitmapBlock(n) => write!(
                fmt,
                "Error: Invalid inode bitmap block {n} (expected {INODE_BITMAP_BLOCK})"
            ),
            Self::DataBitmapBlock(n) => write!(
                fmt,
                "Error: Invalid data bitmap block {n} (expected {DATA_BITMAP_BLOCK})"
            ),
            Self::InodeTableStart(n) => write!(
                fmt,
                "Error: Invalid inode table start {n} (expected {INODE_TABLE_START})"
            ),
            Self::FirstDataBlock(n) => write!(
                fmt,
                "Error: Invalid first data block {n} (expected {FIRST_DATA_BLOCK})"
            ),
            Self::InodeSize(n) => {
                write!(fmt, "Error: Invalid inode size {n} (expected {INODE_SIZE})")
            }
        }
    }
}

/// Checks every constant field of the superblock, in field order.
///
/// The first mismatch wins; further fields are not checked.
pub fn check(sb: &Superblock) -> Result<(), SuperblockError> {
    let magic = sb.magic;
    if magic != VSFS_MAGIC {
        return Err(SuperblockError::Magic(magic));
    }
    let block_size = sb.block_size;
    if block_size != BLOCK_SIZE {
        return Err(SuperblockError::BlockSize(block_size));
    }
    let total_blocks = sb.total_blocks;
    if total_blocks != TOTAL_BLOCKS {
        return Err(SuperblockError::TotalBlocks(total_blocks));
    }
    let inode_bitmap_block = sb.inode_bitmap_block;
    if inode_bitmap_block != INODE_BITMAP_BLOCK {
        return Err(SuperblockError::InodeBitmapBlock(inode_bitmap_block));
    }
    let data_bitmap_block = sb.data_bitmap_block;
    if data_bitmap_block != DATA_BITMAP_BLOCK {
        return Err(SuperblockError::DataBitmapBlock(data_bitmap_block));
    }
    let inode_table_start = sb.inode_table_start;
    if inode_table_start != INODE_TABLE_START {
        return Err(SuperblockError::InodeTableStart(inode_table_start));
    }
    let first_data_block = sb.first_data_block;
    if first_data_block != FIRST_DATA_BLOCK {
        return Err(SuperblockError::FirstDataBlock(first_data_block));
    }
    let inode_size = sb.inode_size;
    if inode_size != INODE_SIZE {
        return Err(SuperblockError::InodeSize(inode_size));
    }
    Ok(())
}

/// Prints the fields of the superblock.
pub fn print(sb: &Superblock) {
    let magic = sb.magic;
    let block_size = sb.block_size;
    let total_blocks = sb.total_blocks;
    let inode_bitmap_block = sb.inode_bitmap_block;
    let data_bitmap_block = sb.data_bitmap_block;
    let inode_table_start = sb.inode_table_start;
    let first_data_block = sb.first_data_block;
    let inode_size = sb.inode_size;
    let inode_count = sb.inode_count;
    println!("Superblock:");
    println!(" Magic number        0x{magic:04X}");
    println!(" Block size          {block_size} bytes");
    println!(" Total blocks        {total_blocks}");
    println!(" Inode bitmap block  {inode_bitmap_block}");
    println!(" Data bitmap block   {data_bitmap_block}");
    println!(" Inode table start   {inode_table_start}");
    println!(" First data block    {first_data_block}");
    println!(" Inode size          {inode_size} bytes");
    println!(" Inode count         {inode_count}");
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;
    use utils::image::Image;

    /// Serializes a valid superblock into an image buffer.
    fn valid_bytes() -> Vec<u8> {
        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        buf[0..2].copy_from_slice(&VSFS_MAGIC.to_le_bytes());
        let fields = [
            BLOCK_SIZE,
            TOTAL_BLOCKS,
            INODE_BITMAP_BLOCK,
            DATA_BITMAP_BLOCK,
            INODE_TABLE_START,
            FIRST_DATA_BLOCK,
            INODE_SIZE,
            80,
        ];
        // `block_size` is stored 4 bytes into the block
        for (i, f) in fields.into_iter().enumerate() {
            let off = 4 + i * 4;
            buf[off..off + 4].copy_from_slice(&f.to_le_bytes());
        }
        buf
    }

    fn parse(buf: Vec<u8>) -> Superblock {
        Superblock::read(&mut Image::new(Cursor::new(buf))).unwrap()
    }

    #[test]
    fn valid_superblock() {
        let sb = parse(valid_bytes());
        assert_eq!(check(&sb), Ok(()));
        let inode_count = sb.inode_count;
        assert_eq!(inode_count, 80);
    }

    #[test]
    fn field_mismatches() {
        let mut sb = parse(valid_bytes());
        sb.magic = 0xef53;
        assert_eq!(check(&sb), Err(SuperblockError::Magic(0xef53)));

        let mut sb = parse(valid_bytes());
        sb.block_size = 1024;
        assert_eq!(check(&sb), Err(SuperblockError::BlockSize(1024)));

        let mut sb = parse(valid_bytes());
        sb.total_blocks = 128;
        assert_eq!(check(&sb), Err(SuperblockError::TotalBlocks(128)));

        let mut sb = parse(valid_bytes());
        sb.inode_bitmap_block = 2;
        assert_eq!(check(&sb), Err(SuperblockError::InodeBitmapBlock(2)));

        let mut sb = parse(valid_bytes());
        sb.data_bitmap_block = 1;
        assert_eq!(check(&sb), Err(SuperblockError::DataBitmapBlock(1)));

        let mut sb = parse(valid_bytes());
        sb.inode_table_start = 4;
        assert_eq!(check(&sb), Err(SuperblockError::InodeTableStart(4)));

        let mut sb = parse(valid_bytes());
        sb.first_data_block = 9;
        assert_eq!(check(&sb), Err(SuperblockError::FirstDataBlock(9)));

        let mut sb = parse(valid_bytes());
        sb.inode_size = 128;
        assert_eq!(check(&sb), Err(SuperblockError::InodeSize(128)));
    }

    #[test]
    fn first_mismatch_wins() {
        let mut sb = parse(valid_bytes());
        sb.magic = 0;
        sb.block_size = 0;
        assert_eq!(check(&sb), Err(SuperblockError::Magic(0)));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            SuperblockError::Magic(0xef53).to_string(),
            "Error: Invalid magic number EF53 (expected D34D)"
        );
        assert_eq!(
            SuperblockError::BlockSize(1024).to_string(),
            "Error: Invalid block size 1024 (expected 4096)"
        );
        assert_eq!(
            SuperblockError::FirstDataBlock(9).to_string(),
            "Error: Invalid first data block 9 (expected 8)"
        );
    }
}
