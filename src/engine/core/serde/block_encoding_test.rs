use bytes::{Bytes, BytesMut};

use super::block_encoding::{read_block, write_block};
use crate::engine::core::block::{
    Block, BlockEncoding, DictionaryBlock, LongArrayBlock, RunLengthEncodedBlock,
    VariableWidthBlock,
};
use crate::engine::errors::SerdeError;
use crate::engine::types::{ScalarValue, Type};

fn values(ty: Type, block: &Block) -> Vec<ScalarValue> {
    (0..block.position_count())
        .map(|p| ty.get_value(block, p).unwrap())
        .collect()
}

fn round_trip(block: &Block) -> Block {
    let mut out = BytesMut::new();
    write_block(block, &mut out).unwrap();
    let mut buf = out.freeze();
    let decoded = read_block(&mut buf).unwrap();
    assert!(buf.is_empty(), "every byte consumed");
    decoded
}

#[test]
fn dictionary_and_rle_keep_their_encoding() {
    let dictionary = Block::VariableWidth(
        VariableWidthBlock::new(2, Bytes::from_static(b"xyz"), vec![0, 1, 3], None).unwrap(),
    );
    let block = Block::Dictionary(DictionaryBlock::new(4, dictionary, vec![1, 0, 1, 1]).unwrap());
    let decoded = round_trip(&block);
    assert_eq!(decoded.encoding(), BlockEncoding::Dictionary);
    assert_eq!(values(Type::Varchar, &decoded), values(Type::Varchar, &block));

    let value = Block::LongArray(LongArrayBlock::new(1, None, vec![9]).unwrap());
    let rle = Block::RunLengthEncoded(RunLengthEncodedBlock::new(value, 3).unwrap());
    let decoded = round_trip(&rle);
    assert_eq!(decoded.encoding(), BlockEncoding::RunLengthEncoded);
    assert_eq!(values(Type::BigInt, &decoded), vec![ScalarValue::BigInt(9); 3]);
}

#[test]
fn region_views_encode_only_their_positions() {
    let block = Block::LongArray(
        LongArrayBlock::new(5, Some(vec![false, true, false, false, true]), vec![1, 0, 3, 4, 0])
            .unwrap(),
    );
    let region = block.get_region(1, 3).unwrap();
    let decoded = round_trip(&region);
    assert_eq!(
        values(Type::BigInt, &decoded),
        vec![ScalarValue::Null, ScalarValue::BigInt(3), ScalarValue::BigInt(4)]
    );
}

#[test]
fn unknown_encoding_name_is_rejected() {
    let mut raw = BytesMut::new();
    bytes::BufMut::put_u32_le(&mut raw, 3);
    bytes::BufMut::put_slice(&mut raw, b"ZZZ");
    let err = read_block(&mut raw.freeze()).expect_err("unknown name");
    assert!(matches!(err, SerdeError::UnknownEncoding(name) if name == "ZZZ"));
}

#[test]
fn truncated_body_is_rejected() {
    let block = Block::LongArray(LongArrayBlock::new(2, None, vec![1, 2]).unwrap());
    let mut out = BytesMut::new();
    write_block(&block, &mut out).unwrap();
    let truncated = out.split_to(out.len() - 3).freeze();
    assert!(matches!(
        read_block(&mut truncated.clone()),
        Err(SerdeError::UnexpectedEof(_))
    ));
}

fn header(encoding: BlockEncoding, count: u32) -> BytesMut {
    let mut raw = BytesMut::new();
    let name = encoding.name().as_bytes();
    bytes::BufMut::put_u32_le(&mut raw, name.len() as u32);
    bytes::BufMut::put_slice(&mut raw, name);
    bytes::BufMut::put_u32_le(&mut raw, count);
    raw
}

#[test]
fn overflowing_slice_lengths_are_corrupt() {
    let mut raw = header(BlockEncoding::VariableWidth, 2);
    bytes::BufMut::put_u8(&mut raw, 0);
    bytes::BufMut::put_u32_le(&mut raw, u32::MAX);
    bytes::BufMut::put_u32_le(&mut raw, 2);
    assert!(matches!(
        read_block(&mut raw.freeze()),
        Err(SerdeError::Corrupt(_))
    ));
}

#[test]
fn position_count_larger_than_the_frame_fails_cleanly() {
    let mut raw = header(BlockEncoding::LongArray, u32::MAX);
    bytes::BufMut::put_u8(&mut raw, 0);
    bytes::BufMut::put_i64_le(&mut raw, 7);
    assert!(matches!(
        read_block(&mut raw.freeze()),
        Err(SerdeError::UnexpectedEof("long value"))
    ));
}
