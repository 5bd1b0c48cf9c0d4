//! Volume lifecycle, read/write and positioning.

mod common;

use common::*;
use sfs::layout;
use sfs::{FileSystem, FsError, BLOCK_SIZE, DISK_MAGIC, MAX_DISK_SIZE, TYPE_FREE};

#[test]
fn format_geometry() {
    let (scratch, mut fs) = fresh_volume(8);
    fs.unmount().unwrap();

    let bytes = raw(&scratch.image);
    let n_blocks = (bytes.len() / BLOCK_SIZE) as u32;
    assert_eq!(&bytes[..8], &DISK_MAGIC);

    let (sb_blocks, freelist, next_rootdir) = super_info(&bytes);
    assert_eq!(sb_blocks, n_blocks);
    assert_eq!(freelist, 1);
    assert_eq!(next_rootdir, 0);

    // Every block from 1 up sits on one free chain in index order.
    for id in 1..n_blocks {
        let hdr = header(&bytes, id);
        assert_eq!(hdr.block_type, TYPE_FREE, "block {id}");
        assert_eq!(hdr.prev, id - 1, "block {id}");
        let next = if id + 1 == n_blocks { 0 } else { id + 1 };
        assert_eq!(hdr.next, next, "block {id}");
    }

    assert_clean(&scratch.image);
}

#[test]
fn format_rejects_bad_sizes() {
    let scratch = Scratch::new();
    let mut fs = FileSystem::new();

    assert!(matches!(
        fs.format(&scratch.image, 0),
        Err(FsError::InvalidArgument)
    ));
    assert!(matches!(
        fs.format(&scratch.image, one_page() + BLOCK_SIZE as u64),
        Err(FsError::InvalidArgument)
    ));

    let oversize = (MAX_DISK_SIZE / one_page() + 1) * one_page();
    assert!(matches!(
        fs.format(&scratch.image, oversize),
        Err(FsError::TooLarge)
    ));

    fs.format(&scratch.image, one_page()).unwrap();
    assert!(matches!(
        fs.format(&scratch.image, one_page()),
        Err(FsError::AlreadyMounted)
    ));
}

#[test]
fn mount_validates_the_image() {
    let scratch = Scratch::new();
    let mut fs = FileSystem::new();

    assert!(matches!(
        fs.mount(&scratch.image),
        Err(FsError::Io(_))
    ));

    // Right size, wrong magic.
    std::fs::write(&scratch.image, vec![0u8; one_page() as usize]).unwrap();
    assert!(matches!(
        fs.mount(&scratch.image),
        Err(FsError::InvalidArgument)
    ));

    // Not a page multiple.
    std::fs::write(&scratch.image, vec![0u8; one_page() as usize + 100]).unwrap();
    assert!(matches!(
        fs.mount(&scratch.image),
        Err(FsError::InvalidArgument)
    ));

    fs.format(&scratch.image, one_page()).unwrap();
    assert!(matches!(
        fs.mount(&scratch.image),
        Err(FsError::AlreadyMounted)
    ));
    fs.unmount().unwrap();
    fs.mount(&scratch.image).unwrap();
    assert!(fs.is_mounted());
    fs.unmount().unwrap();
    // Unmounting an unmounted engine is a no-op.
    fs.unmount().unwrap();
}

#[test]
fn write_then_read_back() {
    let (scratch, mut fs) = fresh_volume(8);
    let n_blocks = (image_size_for(8) / BLOCK_SIZE as u64) as u32;

    let fd = fs.open("hello").unwrap();
    let data = "Hi!".repeat(200);
    assert_eq!(fs.write(fd, data.as_bytes()).unwrap(), 600);
    assert_eq!(fs.getpos(fd).unwrap(), 600);
    fs.close(fd);
    fs.unmount().unwrap();

    // 600 bytes span exactly two blocks, linked both ways.
    let bytes = raw(&scratch.image);
    let entry = layout::dir_entry_at(&bytes, 0, 0);
    assert_eq!(entry.name_bytes(), b"hello");
    assert_eq!(entry.size, 600);
    let first = header(&bytes, entry.first_block);
    assert_eq!(first.prev, 0);
    assert_ne!(first.next, 0);
    let second = header(&bytes, first.next);
    assert_eq!(second.prev, entry.first_block);
    assert_eq!(second.next, 0);
    assert_eq!(freelist_ids(&bytes).len(), n_blocks as usize - 3);
    assert_clean(&scratch.image);

    let mut fs = FileSystem::new();
    fs.mount(&scratch.image).unwrap();
    let fd = fs.open("hello").unwrap();
    let mut buf = vec![0u8; 1024];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 600);
    assert_eq!(&buf[..600], data.as_bytes());
    // At the end of the file, reading is not an error, it just returns 0.
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
    fs.close(fd);
    fs.unmount().unwrap();
}

#[test]
fn empty_file_owns_one_block() {
    let (scratch, mut fs) = fresh_volume(8);
    let fd = fs.open("empty").unwrap();
    fs.close(fd);
    fs.unmount().unwrap();

    let bytes = raw(&scratch.image);
    let entry = layout::dir_entry_at(&bytes, 0, 0);
    assert!(entry.is_live());
    assert_eq!(entry.size, 0);
    assert_eq!(header(&bytes, entry.first_block).next, 0);
    assert_clean(&scratch.image);
}

#[test]
fn read_in_small_chunks() {
    let (scratch, mut fs) = fresh_volume(8);
    let data: Vec<u8> = (0..1337u32).map(|i| (i * 7 % 251) as u8).collect();

    let fd = fs.open("pattern").unwrap();
    assert_eq!(fs.write(fd, &data).unwrap(), data.len());
    fs.close(fd);

    let fd = fs.open("pattern").unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 7];
    loop {
        let n = fs.read(fd, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, data);
    fs.close(fd);
    fs.unmount().unwrap();
    assert_clean(&scratch.image);
}

#[test]
fn seek_and_getpos() {
    let (scratch, mut fs) = fresh_volume(8);
    let data: Vec<u8> = (0..1200u32).map(|i| (i % 251) as u8).collect();

    let fd = fs.open("f").unwrap();
    fs.write(fd, &data).unwrap();

    // Clamped at both ends.
    assert_eq!(fs.seek(fd, -10_000).unwrap(), 0);
    assert_eq!(fs.getpos(fd).unwrap(), 0);
    assert_eq!(fs.seek(fd, 10_000).unwrap(), 1200);

    // Mid-block position, read crossing a block boundary.
    assert_eq!(fs.seek(fd, -950).unwrap(), 250);
    let mut buf = [0u8; 500];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 500);
    assert_eq!(&buf[..], &data[250..750]);

    // Position exactly on a block boundary.
    assert_eq!(fs.seek(fd, -250).unwrap(), 500);
    let mut buf = [0u8; 10];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 10);
    assert_eq!(&buf[..], &data[500..510]);
    assert_eq!(fs.getpos(fd).unwrap(), 510);

    assert!(matches!(fs.seek(99, 0), Err(FsError::BadDescriptor)));
    assert!(matches!(fs.getpos(99), Err(FsError::BadDescriptor)));

    fs.close(fd);
    fs.unmount().unwrap();
    assert_clean(&scratch.image);
}

#[test]
fn overwrite_across_block_boundary() {
    let (scratch, mut fs) = fresh_volume(8);
    let mut data: Vec<u8> = vec![0xAA; 1000];

    let fd = fs.open("f").unwrap();
    fs.write(fd, &data).unwrap();
    fs.seek(fd, -505).unwrap();
    fs.write(fd, &[0x55; 10]).unwrap();
    data[495..505].fill(0x55);

    fs.seek(fd, -1000 - 10).unwrap();
    let mut buf = vec![0u8; 1000];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 1000);
    assert_eq!(buf, data);

    fs.close(fd);
    fs.unmount().unwrap();
    assert_clean(&scratch.image);
}

#[test]
fn grow_from_the_middle_of_a_file() {
    let (scratch, mut fs) = fresh_volume(16);

    let fd = fs.open("f").unwrap();
    let head: Vec<u8> = vec![1; 600];
    let tail: Vec<u8> = (0..1000u32).map(|i| (i % 199) as u8).collect();
    fs.write(fd, &head).unwrap();
    fs.seek(fd, -50).unwrap();
    // End position 1550 needs four blocks; two get spliced on mid-walk.
    assert_eq!(fs.write(fd, &tail).unwrap(), 1000);
    assert_eq!(fs.getpos(fd).unwrap(), 1550);

    fs.seek(fd, -10_000).unwrap();
    let mut buf = vec![0u8; 2000];
    assert_eq!(fs.read(fd, &mut buf).unwrap(), 1550);
    assert_eq!(&buf[..550], &head[..550]);
    assert_eq!(&buf[550..1550], &tail[..]);

    fs.close(fd);
    fs.unmount().unwrap();
    assert_clean(&scratch.image);
}

#[test]
fn zero_length_io() {
    let (scratch, mut fs) = fresh_volume(8);
    let fd = fs.open("f").unwrap();
    assert_eq!(fs.write(fd, b"").unwrap(), 0);
    assert_eq!(fs.read(fd, &mut []).unwrap(), 0);
    assert_eq!(fs.getpos(fd).unwrap(), 0);
    fs.close(fd);
    fs.unmount().unwrap();
    assert_clean(&scratch.image);
}

#[test]
fn descriptor_errors_and_tolerant_close() {
    let (_scratch, mut fs) = fresh_volume(8);
    let mut buf = [0u8; 8];
    assert!(matches!(fs.read(0, &mut buf), Err(FsError::BadDescriptor)));
    assert!(matches!(fs.write(3, b"x"), Err(FsError::BadDescriptor)));

    let fd = fs.open("f").unwrap();
    fs.close(fd);
    // Closing again, or closing nonsense, does nothing.
    fs.close(fd);
    fs.close(9999);
    fs.unmount().unwrap();
}
