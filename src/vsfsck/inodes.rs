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

//! Loading of the inode table and inode bitmap consistency.

use crate::vsfsck::report::Finding;
use std::io;
use std::io::Read;
use std::io::Seek;
use utils::bitmap::Bitmap;
use utils::image::Image;
use utils::layout::INODE_TABLE_CAPACITY;
use utils::layout::Inode;

/// Loads `count` inode records from the inode table of the given image.
pub fn load_table<D: Read + Seek>(img: &mut Image<D>, count: u32) -> io::Result<Vec<Inode>> {
    if count > INODE_TABLE_CAPACITY {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("inode count {count} exceeds the table capacity ({INODE_TABLE_CAPACITY})"),
        ));
    }
    (0..count).map(|i| Inode::read(img, i)).collect()
}

/// The state of one inode against the inode bitmap.
pub struct Row {
    /// Whether the bitmap marks the inode as allocated.
    pub allocated: bool,
    /// The mismatch between the bitmap and the inode, if any.
    pub finding: Option<Finding>,
}

/// Compares the inode bitmap against the state of each inode.
///
/// The bitmap must mark an inode as allocated iff the inode is in use.
pub fn check_bitmap(bitmap: &Bitmap, inodes: &[Inode]) -> Vec<Row> {
    inodes
        .iter()
        .enumerate()
        .map(|(i, inode)| {
            let allocated = bitmap.is_set(i);
            let finding = match (allocated, inode.is_used()) {
                (true, false) => Some(Finding::InodeBitmapExtra {
                    inode: i as u32,
                    links: inode.hard_links,
                    dtime: inode.dtime,
                }),
                (false, true) => Some(Finding::InodeBitmapMissing {
                    inode: i as u32,
                    links: inode.hard_links,
                }),
                _ => None,
            };
            Row { allocated, finding }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;
    use utils::layout::BLOCK_SIZE;
    use utils::layout::TOTAL_BLOCKS;

    /// Serializes the head of an inode record into an image buffer.
    fn put_inode(vol: &mut [u8], i: u32, hard_links: u32, dtime: u32, used_blocks: u32) {
        let off = Inode::disk_offset(i) as usize;
        vol[off + 28..off + 32].copy_from_slice(&dtime.to_le_bytes());
        vol[off + 32..off + 36].copy_from_slice(&hard_links.to_le_bytes());
        vol[off + 36..off + 40].copy_from_slice(&used_blocks.to_le_bytes());
    }

    fn inode(hard_links: u32, dtime: u32) -> Inode {
        let mut inode = Inode::zeroed();
        inode.hard_links = hard_links;
        inode.dtime = dtime;
        inode
    }

    #[test]
    fn table_loading() {
        let mut vol = vec![0u8; (TOTAL_BLOCKS * BLOCK_SIZE) as usize];
        put_inode(&mut vol, 0, 1, 0, 3);
        put_inode(&mut vol, 1, 0, 12345, 0);
        put_inode(&mut vol, 2, 5, 0, 0);
        let mut img = Image::new(Cursor::new(vol));
        let inodes = load_table(&mut img, 3).unwrap();
        assert_eq!(inodes.len(), 3);
        let links = inodes[0].hard_links;
        let blocks = inodes[0].used_blocks;
        assert_eq!(links, 1);
        assert_eq!(blocks, 3);
        let dtime = inodes[1].dtime;
        assert_eq!(dtime, 12345);
        let links = inodes[2].hard_links;
        assert_eq!(links, 5);
        assert!(inodes[0].is_used());
        assert!(!inodes[1].is_used());
    }

    #[test]
    fn table_capacity() {
        let vol = vec![0u8; (TOTAL_BLOCKS * BLOCK_SIZE) as usize];
        let mut img = Image::new(Cursor::new(vol));
        assert!(load_table(&mut img, INODE_TABLE_CAPACITY).is_ok());
        assert!(load_table(&mut img, INODE_TABLE_CAPACITY + 1).is_err());
    }

    #[test]
    fn bitmap_parity() {
        let mut bitmap = Bitmap::new([0; BLOCK_SIZE as usize]);
        bitmap.set(0);
        bitmap.set(2);
        bitmap.set(3);
        let inodes = [
            // Allocated and in use
            inode(1, 0),
            // Free and unused
            inode(0, 0),
            // Allocated but deleted
            inode(0, 12345),
            // Allocated but dtime set despite remaining links
            inode(2, 777),
            // In use but free
            inode(3, 0),
        ];
        let rows = check_bitmap(&bitmap, &inodes);
        assert!(rows[0].allocated);
        assert_eq!(rows[0].finding, None);
        assert!(!rows[1].allocated);
        assert_eq!(rows[1].finding, None);
        assert_eq!(
            rows[2].finding,
            Some(Finding::InodeBitmapExtra {
                inode: 2,
                links: 0,
                dtime: 12345,
            })
        );
        assert_eq!(
            rows[3].finding,
            Some(Finding::InodeBitmapExtra {
                inode: 3,
                links: 2,
                dtime: 777,
            })
        );
        assert_eq!(
            rows[4].finding,
            Some(Finding::InodeBitmapMissing { inode: 4, links: 3 })
        );
    }
}
