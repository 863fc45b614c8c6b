use std::io::Cursor;

use super::serde_util::SERIALIZED_PAGE_HEADER_LEN;
use super::{PageCodecMarker, SerializedPage, read_serialized_pages, write_serialized_page};
use crate::engine::errors::SerdeError;

fn sample(tag: u8) -> SerializedPage {
    SerializedPage::new(vec![tag; 5], PageCodecMarker::COMPRESSED, tag as u32, 10)
}

#[test]
fn framed_pages_read_back_in_order() {
    let mut buf = Vec::new();
    let mut written = 0;
    for tag in 1..=3 {
        written += write_serialized_page(&mut buf, &sample(tag)).unwrap();
    }
    assert_eq!(written, buf.len());
    assert_eq!(written, 3 * (SERIALIZED_PAGE_HEADER_LEN + 5));

    let pages: Vec<SerializedPage> = read_serialized_pages(Cursor::new(buf))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(pages, vec![sample(1), sample(2), sample(3)]);
}

#[test]
fn frame_layout_is_little_endian() {
    let mut buf = Vec::new();
    write_serialized_page(&mut buf, &sample(2)).unwrap();
    assert_eq!(&buf[..4], &[2, 0, 0, 0]);
    assert_eq!(buf[4], PageCodecMarker::COMPRESSED.bits());
    assert_eq!(&buf[5..9], &[10, 0, 0, 0]);
    assert_eq!(&buf[9..13], &[5, 0, 0, 0]);
}

#[test]
fn truncated_frame_is_reported() {
    let mut buf = Vec::new();
    write_serialized_page(&mut buf, &sample(1)).unwrap();
    buf.truncate(buf.len() - 2);

    let mut reader = read_serialized_pages(Cursor::new(buf));
    assert!(matches!(
        reader.next(),
        Some(Err(SerdeError::UnexpectedEof("serialized page body")))
    ));
    assert!(reader.next().is_none());
}

#[test]
fn empty_stream_has_no_pages() {
    assert!(read_serialized_pages(Cursor::new(Vec::new())).next().is_none());
}
