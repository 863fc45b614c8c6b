use super::{PagesIndex, RowComparator};
use crate::engine::types::{ScalarValue, SortOrder, Type};
use crate::test_helpers::factories::PageFactory;
use crate::test_helpers::pages_rows;

fn index_with(rows: Vec<Vec<ScalarValue>>, page_size: usize) -> PagesIndex {
    let types = vec![Type::BigInt, Type::BigInt];
    let mut index = PagesIndex::new(types.clone(), rows.len());
    for page in PageFactory::new()
        .with_types(types)
        .with_rows(rows)
        .create_list(page_size)
    {
        index.add_page(&page).unwrap();
    }
    index
}

fn row(a: i64, b: Option<i64>) -> Vec<ScalarValue> {
    vec![a.into(), b.into()]
}

#[test]
fn sorts_addresses_across_pages() {
    let mut index = index_with(
        vec![
            row(2, Some(5)),
            row(1, Some(9)),
            row(2, None),
            row(1, Some(3)),
            row(3, Some(1)),
        ],
        2,
    );
    let comparator = RowComparator::for_channels(
        index.types(),
        vec![0, 1],
        vec![SortOrder::AscNullsLast, SortOrder::DescNullsFirst],
    )
    .unwrap();
    index.sort(&comparator).unwrap();

    let pages = index.to_pages(10).unwrap();
    assert_eq!(
        pages_rows(&pages, index.types()),
        vec![
            row(1, Some(9)),
            row(1, Some(3)),
            row(2, None),
            row(2, Some(5)),
            row(3, Some(1)),
        ]
    );
}

#[test]
fn group_end_and_equality_treat_nulls_as_equal() {
    let index = index_with(
        vec![row(1, None), row(1, None), row(1, Some(2)), row(4, Some(2))],
        3,
    );
    assert!(index.position_equals(&[0, 1], 0, 1).unwrap());
    assert!(!index.position_equals(&[0, 1], 1, 2).unwrap());
    assert_eq!(index.find_group_end(&[0, 1], 0, 4).unwrap(), 2);
    assert_eq!(index.find_group_end(&[0], 0, 4).unwrap(), 3);
    assert_eq!(index.find_group_end(&[0], 3, 4).unwrap(), 4);
}

#[test]
fn build_pages_respects_page_size_and_range() {
    let index = index_with((0..7).map(|i| row(i, Some(i))).collect(), 7);
    let pages = index.build_pages(1, 6, 2).unwrap();
    assert_eq!(
        pages.iter().map(|p| p.position_count()).collect::<Vec<_>>(),
        vec![2, 2, 1]
    );
    assert_eq!(index.get_long(0, 6).unwrap(), 6);
    assert!(index.get_long(0, 7).is_err());
    assert!(index.estimated_size_in_bytes() > 0);
}

#[test]
fn empty_pages_are_ignored_and_clear_resets() {
    let mut index = index_with(vec![row(1, Some(1))], 1);
    let empty = PageFactory::new()
        .with_types(vec![Type::BigInt, Type::BigInt])
        .create();
    index.add_page(&empty).unwrap();
    assert_eq!(index.position_count(), 1);

    index.clear();
    assert!(index.is_empty());
    assert_eq!(index.estimated_size_in_bytes(), 0);
}
