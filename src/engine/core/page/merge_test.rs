use super::{MergeSortedPages, Page, RowComparator};
use crate::engine::errors::PageError;
use crate::engine::types::{ScalarValue, SortOrder, Type};
use crate::test_helpers::factories::PageFactory;
use crate::test_helpers::pages_rows;

fn sorted_stream(values: &[i64], page_size: usize) -> std::vec::IntoIter<Result<Page, PageError>> {
    let rows = values.iter().map(|v| vec![ScalarValue::BigInt(*v)]).collect();
    PageFactory::new()
        .with_rows(rows)
        .create_list(page_size)
        .into_iter()
        .map(Ok)
        .collect::<Vec<_>>()
        .into_iter()
}

#[test]
fn merges_sorted_streams_into_one_sorted_stream() {
    let comparator =
        RowComparator::for_channels(&[Type::BigInt], vec![0], vec![SortOrder::AscNullsLast])
            .unwrap();
    let merge = MergeSortedPages::new(
        vec![
            sorted_stream(&[1, 4, 7, 10], 2),
            sorted_stream(&[2, 5, 8], 1),
            sorted_stream(&[], 1),
            sorted_stream(&[0, 3, 6, 9], 3),
        ],
        vec![Type::BigInt],
        comparator,
        4,
    );

    let pages: Vec<Page> = merge.collect::<Result<_, PageError>>().unwrap();
    assert!(pages.iter().all(|p| p.position_count() <= 4));
    let values: Vec<Vec<ScalarValue>> = pages_rows(&pages, &[Type::BigInt]);
    let expected: Vec<Vec<ScalarValue>> =
        (0..=10).map(|v| vec![ScalarValue::BigInt(v)]).collect();
    assert_eq!(values, expected);
}

#[test]
fn empty_input_produces_no_pages() {
    let comparator =
        RowComparator::for_channels(&[Type::BigInt], vec![0], vec![SortOrder::AscNullsLast])
            .unwrap();
    let mut merge = MergeSortedPages::new(
        Vec::<std::vec::IntoIter<Result<Page, PageError>>>::new(),
        vec![Type::BigInt],
        comparator,
        4,
    );
    assert!(merge.next().is_none());
}
