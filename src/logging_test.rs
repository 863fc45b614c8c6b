use tracing::Level;

use super::snapflow_targets;

#[test]
fn crate_targets_follow_the_configured_level() {
    let targets = snapflow_targets("debug").unwrap();
    assert!(targets.would_enable("snapflow::exchange", &Level::DEBUG));
    assert!(!targets.would_enable("snapflow::spill", &Level::TRACE));
    assert!(!targets.would_enable("tokio", &Level::DEBUG));
    assert!(targets.would_enable("tokio", &Level::WARN));
}

#[test]
fn quieter_levels_apply_to_other_crates_too() {
    let targets = snapflow_targets("error").unwrap();
    assert!(!targets.would_enable("snapflow::driver", &Level::WARN));
    assert!(!targets.would_enable("hyper", &Level::WARN));
}

#[test]
fn unknown_level_is_rejected() {
    assert!(snapflow_targets("loud").is_err());
}
