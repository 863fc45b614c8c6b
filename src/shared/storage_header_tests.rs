use crate::shared::storage_header::{BinaryHeader, FileKind, MagicFile};
use std::io::Cursor;

struct SpillLike;

impl MagicFile for SpillLike {
    const MAGIC: [u8; 8] = FileKind::SpillFile.magic();
}

#[test]
fn header_roundtrip_ok() {
    let hdr = BinaryHeader::new(FileKind::OperatorSnapshot.magic(), 1, 0x3);
    let mut buf = Vec::new();
    hdr.write_to(&mut buf).unwrap();
    assert_eq!(buf.len(), BinaryHeader::TOTAL_LEN);

    let read = BinaryHeader::read_from(Cursor::new(buf)).unwrap();
    assert_eq!(read, hdr);
    assert_eq!(read.flags, 0x3);
}

#[test]
fn flipped_byte_fails_crc() {
    let mut buf = Vec::new();
    BinaryHeader::new(FileKind::SpillFile.magic(), 1, 0)
        .write_to(&mut buf)
        .unwrap();
    buf[10] ^= 0xFF;
    assert!(BinaryHeader::read_from(Cursor::new(buf)).is_err());
}

#[test]
fn trait_checks_magic_and_version() {
    let mut buf = Vec::new();
    SpillLike::write_header(&mut buf, 1).unwrap();
    let header = SpillLike::read_and_validate_header(&mut Cursor::new(buf.clone())).unwrap();
    assert_eq!(header.flags, 1);

    let mut wrong_magic = Vec::new();
    BinaryHeader::new(FileKind::OperatorSnapshot.magic(), 1, 0)
        .write_to(&mut wrong_magic)
        .unwrap();
    assert!(SpillLike::read_and_validate_header(&mut Cursor::new(wrong_magic)).is_err());

    let mut wrong_version = Vec::new();
    BinaryHeader::new(FileKind::SpillFile.magic(), 2, 0)
        .write_to(&mut wrong_version)
        .unwrap();
    assert!(SpillLike::read_and_validate_header(&mut Cursor::new(wrong_version)).is_err());
}

#[test]
fn truncated_header_is_an_error() {
    let buf = vec![0u8; BinaryHeader::TOTAL_LEN - 1];
    assert!(BinaryHeader::read_from(Cursor::new(buf)).is_err());
}
