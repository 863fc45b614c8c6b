use super::{Block, BlockBuilder, BlockEncoding};
use crate::engine::errors::BlockError;

#[test]
fn int128_entry_requires_exactly_two_words() {
    let mut builder = BlockBuilder::int128(1);
    builder.write_long(1).unwrap();
    assert_eq!(
        builder.close_entry().expect_err("one word is not an int128"),
        BlockError::EntrySize {
            expected: 2,
            actual: 1
        }
    );

    builder.write_long(2).unwrap();
    assert_eq!(
        builder.write_long(3).expect_err("third word overflows the entry"),
        BlockError::EntrySize {
            expected: 2,
            actual: 3
        }
    );
    builder.close_entry().expect("two words close the entry");
    assert_eq!(builder.position_count(), 1);
}

#[test]
fn append_null_fails_mid_entry() {
    let mut builder = BlockBuilder::int128(2);
    builder.write_long(1).unwrap();
    assert_eq!(
        builder.append_null().expect_err("entry still open"),
        BlockError::EntryNotClosed
    );

    let mut varchar = BlockBuilder::variable_width(2, 4);
    varchar.write_bytes(b"ab").unwrap();
    assert_eq!(
        varchar.append_null().expect_err("entry still open"),
        BlockError::EntryNotClosed
    );
}

#[test]
fn wrong_write_for_builder_kind_is_unsupported() {
    let mut builder = BlockBuilder::byte(1);
    assert!(matches!(
        builder.write_long(1),
        Err(BlockError::Unsupported {
            operation: "writeLong",
            encoding: "BYTE_ARRAY"
        })
    ));
    let mut long = BlockBuilder::long(1);
    assert!(matches!(
        long.write_bytes(b"x"),
        Err(BlockError::Unsupported { .. })
    ));
}

#[test]
fn all_null_builder_collapses_to_run_length() {
    let mut builder = BlockBuilder::long(4);
    for _ in 0..3 {
        builder.append_null().unwrap();
    }
    let block = builder.build().expect("build");

    assert_eq!(block.encoding(), BlockEncoding::RunLengthEncoded);
    assert_eq!(block.position_count(), 3);
    assert!(block.is_null(2).unwrap());
    assert_eq!(block.value_encoding(), BlockEncoding::LongArray);
}

#[test]
fn mixed_builder_keeps_null_flags() {
    let mut builder = BlockBuilder::variable_width(1, 1);
    builder.write_bytes(b"hello").unwrap();
    builder.close_entry().unwrap();
    builder.append_null().unwrap();
    builder.close_entry().unwrap();

    let block = builder.build().expect("build");
    let Block::VariableWidth(_) = &block else {
        panic!("expected a variable width block");
    };
    assert_eq!(block.position_count(), 3);
    assert!(!block.is_null(0).unwrap());
    assert!(block.is_null(1).unwrap());
    assert!(!block.is_null(2).unwrap());
    assert_eq!(block.get_slice(2).unwrap().len(), 0);
}

#[test]
fn builder_without_nulls_builds_without_null_array() {
    let mut builder = BlockBuilder::byte(0);
    for value in [1u8, 0, 1] {
        builder.write_byte(value).unwrap();
        builder.close_entry().unwrap();
    }
    let block = builder.build().expect("build");
    assert!(!block.may_have_null());
    assert_eq!(block.get_byte(2).unwrap(), 1);
}

#[test]
fn builder_grows_past_expected_entries() {
    let mut builder = BlockBuilder::long(1);
    for value in 0..100 {
        builder.write_long(value).unwrap();
        builder.close_entry().unwrap();
    }
    assert_eq!(builder.position_count(), 100);
    assert_eq!(builder.size_in_bytes(), 900);
    assert!(builder.retained_size_in_bytes() >= 800);

    let like = builder.new_block_builder_like();
    assert_eq!(like.position_count(), 0);
    assert_eq!(like.encoding(), BlockEncoding::LongArray);

    let block = builder.build().unwrap();
    assert_eq!(block.get_long(99, 0).unwrap(), 99);
}

#[test]
fn build_rejects_open_entry() {
    let mut builder = BlockBuilder::long(1);
    builder.write_long(1).unwrap();
    builder.close_entry().unwrap();
    builder.write_long(2).unwrap();
    assert_eq!(
        builder.build().expect_err("open entry"),
        BlockError::EntryNotClosed
    );
}

#[test]
fn open_entry_after_only_nulls_is_not_dropped() {
    let mut builder = BlockBuilder::long(2);
    builder.append_null().unwrap();
    builder.write_long(5).unwrap();
    assert_eq!(
        builder.build().expect_err("dangling write"),
        BlockError::EntryNotClosed
    );

    let mut builder = BlockBuilder::variable_width(2, 8);
    builder.append_null().unwrap();
    builder.write_bytes(b"ab").unwrap();
    assert_eq!(
        builder.build().expect_err("dangling bytes"),
        BlockError::EntryNotClosed
    );
}
