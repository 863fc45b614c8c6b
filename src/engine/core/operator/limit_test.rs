use super::{LimitOperator, Operator};
use crate::engine::core::page::{MarkerPage, Page};
use crate::engine::core::serde::PagesSerde;
use crate::engine::core::snapshot::{OperatorState, Restorable};
use crate::test_helpers::factories::PageFactory;
use crate::test_helpers::factory::Factory;

fn page(rows: usize) -> Page {
    PageFactory::new().with_sequence(0, rows).create()
}

#[test]
fn truncates_the_page_that_crosses_the_limit() {
    let mut limit = LimitOperator::new(Factory::task().operator("LimitOperator"), 7);
    let mut output = Vec::new();
    for rows in [3, 1, 1, 1, 3] {
        assert!(limit.needs_input());
        limit.add_input(page(rows)).unwrap();
        output.push(limit.get_output().unwrap().unwrap().position_count());
    }
    assert_eq!(output, vec![3, 1, 1, 1, 1]);
    assert!(!limit.needs_input());
    assert!(limit.is_finished());
}

#[test]
fn zero_limit_is_finished_immediately() {
    let limit = LimitOperator::new(Factory::task().operator("LimitOperator"), 0);
    assert!(!limit.needs_input());
    assert!(limit.is_finished());
}

#[test]
fn finish_without_reaching_the_limit() {
    let mut limit = LimitOperator::new(Factory::task().operator("LimitOperator"), 10);
    limit.add_input(page(4)).unwrap();
    limit.finish().unwrap();
    assert!(!limit.is_finished());
    assert_eq!(limit.get_output().unwrap().unwrap().position_count(), 4);
    assert!(limit.is_finished());
}

#[test]
fn marker_captures_remaining_rows() {
    let mut limit = LimitOperator::new(
        Factory::task().with_snapshots().operator("LimitOperator"),
        7,
    );
    limit.add_input(page(3)).unwrap();
    limit.get_output().unwrap();
    limit.add_input(page(2)).unwrap();

    // The buffered page travels with the captured state.
    let OperatorState::Limit(state) = limit.capture(&PagesSerde::default()).unwrap() else {
        panic!("limit state expected");
    };
    assert_eq!(state.remaining, 2);
    assert!(state.pending.is_some());

    limit.get_output().unwrap();
    limit.add_input(Page::marker(MarkerPage::snapshot_page(1))).unwrap();
    assert!(limit.get_output().unwrap().unwrap().is_marker());
    limit.add_input(page(3)).unwrap();
    assert_eq!(limit.get_output().unwrap().unwrap().position_count(), 2);
    assert!(limit.is_finished());

    limit.add_input(Page::marker(MarkerPage::resume_page(1))).unwrap();
    assert_eq!(limit.remaining(), 2);
    assert!(limit.get_output().unwrap().unwrap().is_marker());
    assert!(limit.needs_input());
}
