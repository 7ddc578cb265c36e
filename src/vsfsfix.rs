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

//! `vsfsfix` clears the bit of an inode in the inode bitmap of a VSFS volume.
//!
//! It releases an inode that `vsfsck` reported as allocated in the bitmap
//! while not being in use. Nothing else on the volume is modified.

use std::env::ArgsOs;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;
use utils::bitmap::Bitmap;
use utils::disk::get_disk_size;
use utils::error;
use utils::image::Image;
use utils::layout::INODE_BITMAP_BLOCK;
use utils::layout::INODE_TABLE_CAPACITY;
use utils::layout::VOLUME_SIZE;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// If true, print command line help.
    help: bool,
    /// The path to the filesystem image to fix.
    image_path: Option<PathBuf>,
    /// The number of the inode whose bitmap bit is to be cleared.
    inode: Option<u32>,
}

fn parse_args(args: ArgsOs) -> Args {
    let mut res: Args = Default::default();
    for arg in args {
        match arg.to_str() {
            Some("-h" | "--help") => res.help = true,
            _ if res.image_path.is_none() => res.image_path = Some(PathBuf::from(arg)),
            Some(n) if res.inode.is_none() => match n.parse() {
                Ok(n) => res.inode = Some(n),
                Err(_) => error("vsfsfix", format_args!("invalid inode number `{n}`")),
            },
            _ => {
                print_usage();
                exit(1);
            }
        }
    }
    res
}

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" vsfsfix [-h] <fs_image> <inode>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -h:\t\tprints usage");
    eprintln!(" fs_image:\tthe path to the filesystem image to fix");
    eprintln!(" inode:\t\tthe number of the inode to release");
}

pub fn main(args: ArgsOs) {
    let args = parse_args(args);
    if args.help {
        print_usage();
        exit(0);
    }
    let (Some(path), Some(inode)) = (args.image_path, args.inode) else {
        print_usage();
        exit(1);
    };
    if inode >= INODE_TABLE_CAPACITY {
        error("vsfsfix", format_args!("inode {inode} is out of range"));
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .unwrap_or_else(|e| {
            error("vsfsfix", format_args!("{}: {e}", path.display()));
        });
    let size = get_disk_size(&file).unwrap_or_else(|e| {
        error("vsfsfix", format_args!("{}: {e}", path.display()));
    });
    if size < VOLUME_SIZE {
        error(
            "vsfsfix",
            format_args!("{}: volume is too small ({size} bytes)", path.display()),
        );
    }
    let mut img = Image::new(file);
    clear_inode_bit(&mut img, inode as usize).unwrap_or_else(|e| {
        error("vsfsfix", format_args!("{}: {e}", path.display()));
    });
}

/// Clears the bit `inode` of the inode bitmap of the given image.
fn clear_inode_bit<D: Read + Write + Seek>(img: &mut Image<D>, inode: usize) -> io::Result<()> {
    let mut bitmap = Bitmap::new(img.read_block(INODE_BITMAP_BLOCK)?);
    bitmap.clear(inode);
    img.write_block(INODE_BITMAP_BLOCK, bitmap.as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;
    use utils::layout::BLOCK_SIZE;

    #[test]
    fn clear_single_bit() {
        let mut vol = vec![0u8; VOLUME_SIZE as usize];
        let bitmap_off = (INODE_BITMAP_BLOCK * BLOCK_SIZE) as usize;
        vol[bitmap_off] = 0xff;
        vol[bitmap_off + 1] = 0xff;
        let mut expected = vol.clone();
        // Bit 5 of byte 1
        expected[bitmap_off + 1] = 0xdf;

        let mut img = Image::new(Cursor::new(vol));
        clear_inode_bit(&mut img, 13).unwrap();
        assert_eq!(img.into_inner().into_inner(), expected);
    }

    #[test]
    fn clearing_a_clear_bit_is_a_noop() {
        let mut vol = vec![0u8; VOLUME_SIZE as usize];
        let bitmap_off = (INODE_BITMAP_BLOCK * BLOCK_SIZE) as usize;
        vol[bitmap_off] = 0xf0;
        let expected = vol.clone();

        let mut img = Image::new(Cursor::new(vol));
        clear_inode_bit(&mut img, 0).unwrap();
        assert_eq!(img.into_inner().into_inner(), expected);
    }
}
