use std::time::Duration;

use super::{Blocked, NOT_BLOCKED, SettableBlocked};

#[test]
fn not_blocked_is_never_waiting() {
    assert!(!NOT_BLOCKED.is_blocked());
    assert!(!Blocked::default().is_blocked());
}

#[tokio::test]
async fn settable_releases_every_waiter() {
    let mut signal = SettableBlocked::new();
    let first = signal.blocked();
    let second = signal.blocked();
    assert!(first.is_blocked());
    assert!(!signal.is_set());

    signal.set();
    assert!(signal.is_set());
    tokio::time::timeout(Duration::from_secs(1), first.wait())
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), second.clone().wait())
        .await
        .unwrap();
    assert!(!second.is_blocked());
}

#[tokio::test]
async fn dropping_the_signal_releases_waiters() {
    let signal = SettableBlocked::new();
    let blocked = signal.blocked();
    drop(signal);
    tokio::time::timeout(Duration::from_secs(1), blocked.wait())
        .await
        .unwrap();
}

#[tokio::test]
async fn any_resolves_with_the_first_item() {
    let mut first = SettableBlocked::new();
    let second = SettableBlocked::new();
    let combined = Blocked::any([first.blocked(), second.blocked()]);
    assert!(combined.is_blocked());

    first.set();
    tokio::time::timeout(Duration::from_secs(1), combined.wait())
        .await
        .unwrap();
    assert!(second.blocked().is_blocked());
}

#[test]
fn any_is_not_blocked_when_one_item_is_free() {
    let pending = SettableBlocked::new();
    assert!(!Blocked::any([pending.blocked(), NOT_BLOCKED]).is_blocked());
    assert!(!Blocked::any(Vec::new()).is_blocked());
}
