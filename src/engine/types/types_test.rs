use std::cmp::Ordering;

use super::{ScalarValue, SortOrder, Type};
use crate::engine::core::block::Block;
use crate::engine::errors::BlockError;

fn build(ty: Type, values: &[ScalarValue]) -> Block {
    let mut builder = ty.create_block_builder(values.len());
    for value in values {
        ty.write_value(&mut builder, value).expect("value matches type");
    }
    builder.build().expect("block builds")
}

#[test]
fn values_survive_a_block_for_every_type() {
    let cases = vec![
        (Type::Boolean, vec![true.into(), ScalarValue::Null, false.into()]),
        (Type::BigInt, vec![1i64.into(), (-7i64).into(), ScalarValue::Null]),
        (
            Type::Double,
            vec![ScalarValue::Double(1.5), ScalarValue::Null, ScalarValue::Double(-0.25)],
        ),
        (
            Type::Int128,
            vec![
                ScalarValue::Int128(i128::MIN),
                ScalarValue::Int128(1 << 100),
                ScalarValue::Null,
            ],
        ),
        (Type::Varchar, vec!["a".into(), "".into(), ScalarValue::Null]),
    ];

    for (ty, values) in cases {
        let block = build(ty, &values);
        for (position, expected) in values.iter().enumerate() {
            assert_eq!(&ty.get_value(&block, position).unwrap(), expected, "{}", ty);
        }
    }
}

#[test]
fn writing_the_wrong_scalar_is_a_type_mismatch() {
    let mut builder = Type::BigInt.create_block_builder(1);
    let err = Type::BigInt
        .write_value(&mut builder, &"text".into())
        .expect_err("varchar into bigint");
    assert!(matches!(err, BlockError::TypeMismatch(_)));
}

#[test]
fn sort_order_places_nulls_independent_of_direction() {
    let block = build(Type::BigInt, &[1i64.into(), ScalarValue::Null, 5i64.into()]);

    let cmp = |order: SortOrder, l: usize, r: usize| {
        order.compare(Type::BigInt, &block, l, &block, r).unwrap()
    };

    assert_eq!(cmp(SortOrder::AscNullsFirst, 1, 0), Ordering::Less);
    assert_eq!(cmp(SortOrder::DescNullsFirst, 1, 0), Ordering::Less);
    assert_eq!(cmp(SortOrder::AscNullsLast, 1, 2), Ordering::Greater);
    assert_eq!(cmp(SortOrder::DescNullsLast, 1, 2), Ordering::Greater);
    assert_eq!(cmp(SortOrder::AscNullsLast, 0, 2), Ordering::Less);
    assert_eq!(cmp(SortOrder::DescNullsLast, 0, 2), Ordering::Greater);
    assert_eq!(cmp(SortOrder::AscNullsFirst, 1, 1), Ordering::Equal);
}

#[test]
fn equality_treats_nulls_as_not_distinct() {
    let block = build(
        Type::Varchar,
        &["x".into(), ScalarValue::Null, "x".into(), ScalarValue::Null],
    );
    assert!(Type::Varchar.equal(&block, 0, &block, 2).unwrap());
    assert!(Type::Varchar.equal(&block, 1, &block, 3).unwrap());
    assert!(!Type::Varchar.equal(&block, 0, &block, 1).unwrap());
}

#[test]
fn key_bytes_distinguish_null_from_values() {
    let block = build(Type::BigInt, &[0i64.into(), ScalarValue::Null, 0i64.into()]);
    let key = |position| {
        let mut out = Vec::new();
        Type::BigInt
            .append_key_bytes(&block, position, &mut out)
            .unwrap();
        out
    };
    assert_eq!(key(0), key(2));
    assert_ne!(key(0), key(1));
}
