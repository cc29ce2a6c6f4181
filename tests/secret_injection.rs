//! The secret surface: one token, injected into the lint step only

mod helpers;

use conveyor::core::TriggerEvent;
use helpers::{run_workflow_yaml, MockRunner};

const RUST_CI: &str = include_str!("../demos/rust-ci.yml");

#[tokio::test]
async fn lint_step_receives_the_token() {
    let result = run_workflow_yaml(
        RUST_CI,
        TriggerEvent::Push,
        MockRunner::ok(),
        &[("GITHUB_TOKEN", "tok123")],
    )
    .await;
    assert!(result.is_passed());

    let clippy = result
        .invocation_containing("cargo clippy")
        .expect("clippy invocation");
    assert_eq!(clippy.env.get("GITHUB_TOKEN"), Some(&"tok123".to_string()));
}

#[tokio::test]
async fn token_never_reaches_other_steps() {
    let result = run_workflow_yaml(
        RUST_CI,
        TriggerEvent::Push,
        MockRunner::ok(),
        &[("GITHUB_TOKEN", "tok123")],
    )
    .await;

    for invocation in &result.invocations {
        if invocation.display().contains("cargo clippy") {
            continue;
        }
        assert!(
            !invocation.env.contains_key("GITHUB_TOKEN"),
            "token leaked into: {}",
            invocation.display()
        );
        assert!(
            !invocation.display().contains("tok123"),
            "token leaked onto command line: {}",
            invocation.display()
        );
    }
}

#[tokio::test]
async fn missing_token_does_not_fail_the_run() {
    // An absent credential interpolates empty; the run only fails on a
    // failing step, never on the missing secret itself.
    let result = run_workflow_yaml(RUST_CI, TriggerEvent::Push, MockRunner::ok(), &[]).await;

    assert!(result.is_passed());
    let clippy = result
        .invocation_containing("cargo clippy")
        .expect("clippy invocation");
    assert!(!clippy.env.contains_key("GITHUB_TOKEN"));
}

#[tokio::test]
async fn lint_findings_still_fail_the_run_without_a_token() {
    let result = run_workflow_yaml(
        RUST_CI,
        TriggerEvent::Push,
        MockRunner::failing_on("cargo clippy"),
        &[],
    )
    .await;

    assert!(result.is_failed());
    assert_eq!(result.skipped_steps(), vec!["format-check"]);
}
