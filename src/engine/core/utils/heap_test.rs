use std::cmp::Ordering;
use std::convert::Infallible;

use super::heap::ComparatorHeap;

fn natural(a: &i32, b: &i32) -> Result<Ordering, Infallible> {
    Ok(a.cmp(b))
}

#[test]
fn pops_in_descending_comparator_order() {
    let mut heap = ComparatorHeap::with_capacity(8);
    let mut cmp = natural;
    for value in [5, 1, 9, 3, 7, 3] {
        heap.push(value, &mut cmp).unwrap();
    }
    assert_eq!(heap.peek(), Some(&9));

    let mut drained = Vec::new();
    while let Some(value) = heap.pop(&mut cmp).unwrap() {
        drained.push(value);
    }
    assert_eq!(drained, vec![9, 7, 5, 3, 3, 1]);
}

#[test]
fn reversed_comparator_gives_a_min_heap() {
    let mut heap = ComparatorHeap::default();
    let mut cmp = |a: &i32, b: &i32| natural(b, a);
    for value in [4, 2, 8] {
        heap.push(value, &mut cmp).unwrap();
    }
    assert_eq!(heap.replace_top(6, &mut cmp).unwrap(), Some(2));
    assert_eq!(heap.pop(&mut cmp).unwrap(), Some(4));
    assert_eq!(heap.pop(&mut cmp).unwrap(), Some(6));
    assert_eq!(heap.pop(&mut cmp).unwrap(), Some(8));
    assert!(heap.is_empty());
}

#[test]
fn comparator_errors_propagate() {
    let mut heap = ComparatorHeap::default();
    let mut failing = |_: &i32, _: &i32| -> Result<Ordering, &'static str> { Err("boom") };
    heap.push(1, &mut failing).unwrap();
    assert_eq!(heap.push(2, &mut failing), Err("boom"));
}

#[test]
fn rebuild_restores_order_after_mutation() {
    let mut heap = ComparatorHeap::default();
    let mut cmp = natural;
    for value in [1, 2, 3, 4] {
        heap.push(value, &mut cmp).unwrap();
    }
    for value in heap.iter_mut() {
        *value = 10 - *value;
    }
    heap.rebuild(&mut cmp).unwrap();
    assert_eq!(heap.peek(), Some(&9));
}
