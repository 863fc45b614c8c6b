use super::{Page, PageBuilder};
use crate::engine::core::block::Block;
use crate::engine::errors::PageError;
use crate::engine::types::{ScalarValue, Type};
use crate::test_helpers::factories::PageFactory;
use crate::test_helpers::page_rows;

fn two_column_page() -> Page {
    PageFactory::new()
        .with_types(vec![Type::BigInt, Type::Varchar])
        .with_rows(vec![
            vec![1i64.into(), "a".into()],
            vec![2i64.into(), ScalarValue::Null],
            vec![3i64.into(), "c".into()],
        ])
        .create()
}

#[test]
fn mismatched_block_counts_are_rejected() {
    let page = two_column_page();
    let short = page.block(0).unwrap().get_region(0, 2).unwrap();
    let blocks: Vec<Block> = vec![page.block(1).unwrap().clone(), short];

    let err = Page::new(blocks).expect_err("2 positions against 3");
    assert_eq!(
        err,
        PageError::InconsistentPositionCount {
            channel: 1,
            expected: 3,
            got: 2
        }
    );
    assert_eq!(Page::new(Vec::new()).expect_err("no blocks"), PageError::EmptyPage);
}

#[test]
fn region_copy_and_column_selection() {
    let page = two_column_page();
    let types = [Type::BigInt, Type::Varchar];

    let region = page.get_region(1, 2).unwrap();
    assert_eq!(
        page_rows(&region, &types),
        vec![
            vec![ScalarValue::BigInt(2), ScalarValue::Null],
            vec![ScalarValue::BigInt(3), "c".into()],
        ]
    );

    let gathered = page.copy_positions(&[2, 0]).unwrap();
    assert_eq!(
        page_rows(&gathered, &types),
        vec![
            vec![ScalarValue::BigInt(3), "c".into()],
            vec![ScalarValue::BigInt(1), "a".into()],
        ]
    );

    let swapped = page.get_columns(&[1, 0]).unwrap();
    assert_eq!(swapped.channel_count(), 2);
    assert_eq!(
        Type::Varchar.get_value(swapped.block(0).unwrap(), 0).unwrap(),
        ScalarValue::from("a")
    );
    assert_eq!(
        page.block(5).expect_err("no channel 5"),
        PageError::ChannelOutOfBounds(5)
    );
}

#[test]
fn channel_less_pages_keep_their_position_count() {
    let page = Page::with_position_count(4, Vec::new()).unwrap();
    assert_eq!(page.position_count(), 4);
    assert_eq!(page.get_region(1, 3).unwrap().position_count(), 3);
    assert!(page.get_region(2, 3).is_err());
    assert!(page.copy_positions(&[4]).is_err());
}

#[test]
fn page_builder_cuts_at_row_limit_and_resets() {
    let mut builder = PageBuilder::with_limits(vec![Type::BigInt], 2, u64::MAX);
    for value in 0..2 {
        Type::BigInt
            .write_value(builder.builder(0).unwrap(), &ScalarValue::BigInt(value))
            .unwrap();
        builder.declare_position();
    }
    assert!(builder.is_full());

    let page = builder.build().unwrap();
    assert_eq!(page.position_count(), 2);
    assert!(builder.is_empty());
    assert!(!builder.is_full());
}

#[test]
fn page_builder_detects_undeclared_positions() {
    let mut builder = PageBuilder::new(vec![Type::BigInt]);
    Type::BigInt
        .write_value(builder.builder(0).unwrap(), &ScalarValue::BigInt(1))
        .unwrap();
    assert!(matches!(
        builder.build(),
        Err(PageError::InconsistentPositionCount { .. })
    ));
}
