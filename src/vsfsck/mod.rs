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

//! `vsfsck` checks a VSFS volume for consistency.
//!
//! The command validates the superblock, compares the inode bitmap against
//! the state of each inode, walks the block tree of every in-use inode while
//! checking each block reference, then compares the data bitmap against the
//! accumulated reference counts. Findings are printed on the standard output;
//! the volume is never modified.
//!
//! Finding an inconsistency is a successful run: the command exits with a
//! nonzero status only if the volume cannot be opened at all.

mod blocks;
mod inodes;
mod report;
mod superblock;

use blocks::Walker;
use std::env::ArgsOs;
use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::path::PathBuf;
use std::process::exit;
use utils::bitmap::Bitmap;
use utils::disk::get_disk_size;
use utils::error;
use utils::image::Image;
use utils::layout::DATA_BITMAP_BLOCK;
use utils::layout::INODE_BITMAP_BLOCK;
use utils::layout::Inode;
use utils::layout::Superblock;
use utils::layout::VOLUME_SIZE;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// If true, print command line help.
    help: bool,
    /// The path to the filesystem image to check.
    image_path: Option<PathBuf>,
}

fn parse_args(args: ArgsOs) -> Args {
    let mut res: Args = Default::default();
    for arg in args {
        match arg.to_str() {
            Some("-h" | "--help") => res.help = true,
            _ if res.image_path.is_none() => res.image_path = Some(PathBuf::from(arg)),
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
    eprintln!(" vsfsck [-h] <fs_image>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -h:\t\tprints usage");
    eprintln!(" fs_image:\tthe path to the filesystem image to check");
}

pub fn main(args: ArgsOs) {
    let args = parse_args(args);
    if args.help {
        print_usage();
        exit(0);
    }
    let Some(path) = args.image_path else {
        print_usage();
        exit(1);
    };
    let file = File::open(&path).unwrap_or_else(|e| {
        error("vsfsck", format_args!("{}: {e}", path.display()));
    });
    let size = get_disk_size(&file).unwrap_or_else(|e| {
        error("vsfsck", format_args!("{}: {e}", path.display()));
    });
    if size < VOLUME_SIZE {
        error(
            "vsfsck",
            format_args!("{}: volume is too small ({size} bytes)", path.display()),
        );
    }
    let mut img = Image::new(file);
    check(&mut img).unwrap_or_else(|e| {
        error("vsfsck", format_args!("{}: {e}", path.display()));
    });
}

/// Runs every check on the given image.
///
/// The returned error is a failure to read the superblock, without which
/// nothing can run. A read failure confined to one check is printed and the
/// remaining independent checks proceed.
fn check<D: Read + Seek>(img: &mut Image<D>) -> io::Result<()> {
    let sb = Superblock::read(img)?;
    superblock::print(&sb);
    if let Err(e) = superblock::check(&sb) {
        println!("{e}");
        println!("Error in superblock. Exiting program ...");
        return Ok(());
    }
    println!("No error on superblock.");
    let inode_count = sb.inode_count;
    match inodes::load_table(img, inode_count) {
        Ok(inodes) => {
            check_inode_bitmap(img, &inodes);
            check_block_refs(img, &inodes);
        }
        // Every remaining check depends on the inode table
        Err(e) => eprintln!("vsfsck: failed to read the inode table: {e}"),
    }
    println!("File system check completed successfully");
    Ok(())
}

/// Compares the inode bitmap against the state of each inode and prints one
/// row per inode.
fn check_inode_bitmap<D: Read + Seek>(img: &mut Image<D>, inodes: &[Inode]) {
    let bitmap = match img.read_block(INODE_BITMAP_BLOCK) {
        Ok(buf) => Bitmap::new(buf),
        Err(e) => {
            eprintln!("vsfsck: failed to read the inode bitmap: {e}");
            return;
        }
    };
    println!();
    println!("Checking inode bitmap consistency...");
    println!(" Inode  Bitmap     Status");
    let mut errors_found = 0;
    for (i, row) in inodes::check_bitmap(&bitmap, inodes).into_iter().enumerate() {
        let state = if row.allocated { "allocated" } else { "free" };
        match row.finding {
            Some(finding) => {
                println!(" {i:<6} {state:<10} {finding}");
                errors_found += 1;
            }
            None => println!(" {i:<6} {state:<10} OK"),
        }
    }
    println!("Found {errors_found} inode bitmap inconsistencies");
}

/// Walks the block tree of every in-use inode, then reconciles the data
/// bitmap with the reference counts, printing findings in discovery order.
fn check_block_refs<D: Read + Seek>(img: &mut Image<D>, inodes: &[Inode]) {
    let bitmap = match img.read_block(DATA_BITMAP_BLOCK) {
        Ok(buf) => Bitmap::new(buf),
        Err(e) => {
            eprintln!("vsfsck: failed to read the data bitmap: {e}");
            return;
        }
    };
    let (findings, refs) = Walker::new(img, &bitmap).walk(inodes);
    for finding in findings {
        println!("{finding}");
    }
    for finding in blocks::reconcile(&bitmap, &refs) {
        println!("{finding}");
    }
}
