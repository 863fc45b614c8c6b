use bytes::Bytes;

use super::{
    Block, BlockBuilder, BlockEncoding, DictionaryBlock, Int128ArrayBlock, LongArrayBlock,
    RunLengthEncodedBlock, VariableWidthBlock,
};
use crate::engine::errors::BlockError;

fn long_block(values: &[Option<i64>]) -> Block {
    let nulls: Vec<bool> = values.iter().map(Option::is_none).collect();
    let has_null = nulls.iter().any(|n| *n);
    let raw = values.iter().map(|v| v.unwrap_or(0)).collect();
    Block::LongArray(
        LongArrayBlock::new(values.len(), has_null.then_some(nulls), raw)
            .expect("valid long block"),
    )
}

fn varchar_block(values: &[&str]) -> Block {
    let mut data = Vec::new();
    let mut offsets = vec![0u32];
    for v in values {
        data.extend_from_slice(v.as_bytes());
        offsets.push(data.len() as u32);
    }
    Block::VariableWidth(
        VariableWidthBlock::new(values.len(), Bytes::from(data), offsets, None)
            .expect("valid varchar block"),
    )
}

fn read_long(block: &Block, position: usize) -> Option<i64> {
    if block.is_null(position).expect("position in range") {
        None
    } else {
        Some(block.get_long(position, 0).expect("long readable"))
    }
}

#[test]
fn region_reads_match_direct_reads() {
    let block = long_block(&[Some(1), None, Some(3), Some(4), None, Some(6)]);
    for offset in 0..block.position_count() {
        for length in 0..=block.position_count() - offset {
            let region = block.get_region(offset, length).expect("valid region");
            assert_eq!(region.position_count(), length);
            for i in 0..length {
                assert_eq!(read_long(&region, i), read_long(&block, offset + i));
            }
        }
    }
}

#[test]
fn region_shares_storage_and_copy_does_not() {
    let block = long_block(&[Some(10), Some(20), Some(30), Some(40)]);
    let Block::LongArray(source) = &block else {
        panic!("expected long array");
    };

    let region = block.get_region(1, 2).expect("region");
    let copy = block.copy_region(1, 2).expect("copy");

    match (&region, &copy) {
        (Block::LongArray(r), Block::LongArray(c)) => {
            assert!(r.shares_storage_with(source));
            assert!(!c.shares_storage_with(source));
        }
        other => panic!("unexpected encodings: {:?}", other),
    }
    assert_eq!(read_long(&copy, 0), Some(20));
    assert_eq!(read_long(&copy, 1), Some(30));
    assert!(copy.retained_size_in_bytes() < block.retained_size_in_bytes());
}

#[test]
fn copy_is_independent_of_the_builder_that_produced_the_source() {
    let mut builder = BlockBuilder::long(2);
    builder.write_long(7).unwrap();
    builder.close_entry().unwrap();
    builder.write_long(8).unwrap();
    builder.close_entry().unwrap();
    let mut next = builder.new_block_builder_like();
    let block = builder.build().expect("build");
    let copy = block.copy_region(0, 2).expect("copy");

    next.write_long(99).unwrap();
    next.close_entry().unwrap();
    let _ = next.build().expect("second build");

    assert_eq!(read_long(&copy, 0), Some(7));
    assert_eq!(read_long(&copy, 1), Some(8));
}

#[test]
fn out_of_range_access_is_an_error() {
    let block = long_block(&[Some(1), Some(2)]);
    assert_eq!(
        block.get_long(2, 0).expect_err("position 2 is out of range"),
        BlockError::PositionOutOfBounds {
            position: 2,
            count: 2
        }
    );
    assert!(matches!(
        block.get_region(1, 2),
        Err(BlockError::InvalidRegion { .. })
    ));
    assert!(matches!(
        block.copy_positions(&[0, 5]),
        Err(BlockError::PositionOutOfBounds { position: 5, .. })
    ));
    assert!(matches!(
        block.get_slice(0),
        Err(BlockError::Unsupported { .. })
    ));
}

#[test]
fn int128_words_and_offsets() {
    let value: i128 = -(1i128 << 70) + 5;
    let low = value as i64;
    let high = (value >> 64) as i64;
    let block = Block::Int128Array(
        Int128ArrayBlock::new(2, Some(vec![false, true]), vec![low, high, 0, 0])
            .expect("valid int128 block"),
    );

    assert_eq!(block.get_long(0, 0).unwrap(), low);
    assert_eq!(block.get_long(0, 8).unwrap(), high);
    assert_eq!(block.get_int128(0).unwrap(), value);
    assert_eq!(
        block.get_long(0, 4).expect_err("offset 4 is not a word boundary"),
        BlockError::InvalidWordOffset(4)
    );
    assert!(block.is_null(1).unwrap());

    let single = block.get_single_value_block(0).expect("single value");
    assert_eq!(single.position_count(), 1);
    assert_eq!(single.get_int128(0).unwrap(), value);
}

#[test]
fn variable_width_region_and_copy() {
    let block = varchar_block(&["alpha", "", "gamma", "delta"]);
    let region = block.get_region(1, 3).expect("region");
    assert_eq!(region.get_slice(0).unwrap(), Bytes::from_static(b""));
    assert_eq!(region.get_slice(1).unwrap(), Bytes::from_static(b"gamma"));

    let copy = block.copy_region(2, 2).expect("copy");
    assert_eq!(copy.get_slice(0).unwrap(), Bytes::from_static(b"gamma"));
    assert_eq!(copy.get_slice(1).unwrap(), Bytes::from_static(b"delta"));
    assert_eq!(copy.size_in_bytes(), 10 + 2 * 5);

    let gathered = block.copy_positions(&[3, 0, 3]).expect("gather");
    assert_eq!(gathered.get_slice(0).unwrap(), Bytes::from_static(b"delta"));
    assert_eq!(gathered.get_slice(1).unwrap(), Bytes::from_static(b"alpha"));
    assert_eq!(gathered.get_slice(2).unwrap(), Bytes::from_static(b"delta"));
}

#[test]
fn dictionary_copy_compacts_the_dictionary() {
    let dictionary = varchar_block(&["a", "b", "c", "d"]);
    let block = Block::Dictionary(
        DictionaryBlock::new(5, dictionary, vec![3, 3, 0, 1, 3]).expect("valid dictionary"),
    );

    let region = block.get_region(0, 2).expect("region");
    assert_eq!(region.get_slice(1).unwrap(), Bytes::from_static(b"d"));

    let copy = block.copy_region(0, 3).expect("copy");
    let Block::Dictionary(compacted) = &copy else {
        panic!("copy of a dictionary stays a dictionary");
    };
    assert_eq!(compacted.dictionary().position_count(), 2);
    assert_eq!(copy.get_slice(0).unwrap(), Bytes::from_static(b"d"));
    assert_eq!(copy.get_slice(2).unwrap(), Bytes::from_static(b"a"));
    assert_eq!(copy.value_encoding(), BlockEncoding::VariableWidth);
}

#[test]
fn dictionary_rejects_ids_past_the_dictionary() {
    let err = DictionaryBlock::new(1, varchar_block(&["x"]), vec![1])
        .expect_err("id 1 does not exist");
    assert!(matches!(err, BlockError::PositionOutOfBounds { position: 1, .. }));
}

#[test]
fn run_length_block_repeats_its_value() {
    let value = long_block(&[Some(42)]);
    let block = Block::RunLengthEncoded(RunLengthEncodedBlock::new(value, 4).expect("rle"));

    for position in 0..4 {
        assert_eq!(block.get_long(position, 0).unwrap(), 42);
    }
    assert_eq!(block.get_region(1, 2).unwrap().position_count(), 2);
    assert_eq!(block.copy_positions(&[0, 0, 3]).unwrap().position_count(), 3);
    assert_eq!(
        block.get_single_value_block(3).unwrap().get_long(0, 0).unwrap(),
        42
    );
    assert!(block.get_long(4, 0).is_err());
}

#[test]
fn write_position_to_preserves_nulls() {
    let block = long_block(&[Some(5), None, Some(7)]);
    let mut builder = BlockBuilder::long(3);
    for position in [2, 1, 0] {
        block
            .write_position_to(position, &mut builder)
            .expect("write position");
    }
    let rebuilt = builder.build().expect("build");
    assert_eq!(read_long(&rebuilt, 0), Some(7));
    assert_eq!(read_long(&rebuilt, 1), None);
    assert_eq!(read_long(&rebuilt, 2), Some(5));
}

#[test]
fn encoding_names_resolve_back() {
    for encoding in [
        BlockEncoding::LongArray,
        BlockEncoding::Int128Array,
        BlockEncoding::ByteArray,
        BlockEncoding::VariableWidth,
        BlockEncoding::Dictionary,
        BlockEncoding::RunLengthEncoded,
    ] {
        assert_eq!(BlockEncoding::from_name(encoding.name()), Some(encoding));
    }
    assert_eq!(BlockEncoding::from_name("ARRAY"), None);
}
