use std::sync::Arc;

use super::AggregatedMemoryContext;
use crate::engine::errors::MemoryError;

#[test]
fn reservations_roll_up_to_every_ancestor() {
    let root = AggregatedMemoryContext::new_root("query", None);
    let pipeline = root.new_child("pipeline");
    let a = pipeline.new_local("a");
    let b = pipeline.new_local("b");

    a.set_bytes(100).unwrap();
    b.set_bytes(50).unwrap();
    assert_eq!(pipeline.bytes(), 150);
    assert_eq!(root.bytes(), 150);

    a.set_bytes(30).unwrap();
    assert_eq!(root.bytes(), 80);
    assert_eq!(a.bytes(), 30);
}

#[test]
fn limit_rejects_and_rolls_back() {
    let root = AggregatedMemoryContext::new_root("query", Some(100));
    let child = root.new_child_with_limit("operator", Some(1_000));
    let local = child.new_local("topn");

    local.set_bytes(60).unwrap();
    let err = local.set_bytes(120).expect_err("root limit is 100");
    assert_eq!(
        err,
        MemoryError::ExceededLimit {
            context: "query".into(),
            limit: 100,
            reserved: 60,
            requested: 60,
        }
    );
    assert_eq!(local.bytes(), 60);
    assert_eq!(child.bytes(), 60);
    assert_eq!(root.bytes(), 60);
    assert!(!local.try_set_bytes(101));
    assert!(local.try_set_bytes(100));
}

#[test]
fn dropping_a_local_context_releases_its_bytes() {
    let root = AggregatedMemoryContext::new_simple();
    {
        let local = root.new_local("spiller");
        local.set_bytes(4096).unwrap();
        assert_eq!(root.bytes(), 4096);
    }
    assert_eq!(root.bytes(), 0);

    let local = root.new_local("again");
    local.set_bytes(10).unwrap();
    local.close();
    assert_eq!(local.bytes(), 0);
    assert_eq!(root.bytes(), 0);
}

#[test]
fn concurrent_updates_balance_out() {
    let root = AggregatedMemoryContext::new_simple();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ctx = root.new_child(format!("driver-{i}"));
            std::thread::spawn(move || {
                let local = Arc::new(ctx.new_local("op"));
                for n in 0..1_000u64 {
                    local.set_bytes(n % 97).unwrap();
                }
                local.set_bytes(0).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(root.bytes(), 0);
}
