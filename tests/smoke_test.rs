//! Smoke test - runs real processes through the engine end-to-end
//!
//! These tests shell out to `sh` and so exercise the same path a real
//! workflow run takes, minus the Rust toolchain.

use conveyor::core::{RunContext, RunStatus, StepState, TriggerEvent, WorkflowConfig};
use conveyor::runner::ProcessRunner;
use conveyor::RunEngine;

async fn run(yaml: &str, workspace: std::path::PathBuf) -> conveyor::Workflow {
    let config = WorkflowConfig::from_yaml(yaml).expect("workflow should parse");
    let mut workflow = config.to_workflow().expect("workflow should build");
    let mut ctx = RunContext::new(TriggerEvent::Push, workspace);

    let engine = RunEngine::new(ProcessRunner::new());
    engine
        .execute(&mut workflow, &mut ctx)
        .await
        .expect("run should be instantiated");
    workflow
}

#[tokio::test]
async fn smoke_test_basic_workflow() {
    let yaml = r#"
name: Smoke
on: push
jobs:
  default:
    runs-on: ubuntu-latest
    steps:
      - name: Greet
        run: echo hello from conveyor
      - name: Overlay
        run: test "$SMOKE_FLAG" = "on"
        env:
          SMOKE_FLAG: "on"
"#;
    let workspace = tempfile::tempdir().unwrap();
    let workflow = run(yaml, workspace.path().to_path_buf()).await;

    assert_eq!(workflow.state.status, RunStatus::Completed);

    match &workflow.step("greet").unwrap().state {
        StepState::Completed { output, exit_code, .. } => {
            assert_eq!(*exit_code, 0);
            assert!(output.contains("hello from conveyor"));
        }
        other => panic!("expected completed step, got {:?}", other),
    }
}

#[tokio::test]
async fn smoke_test_fail_fast() {
    let yaml = r#"
name: Smoke
on: push
jobs:
  default:
    runs-on: ubuntu-latest
    steps:
      - name: Boom
        run: exit 3
      - name: Never
        run: echo unreachable
"#;
    let workspace = tempfile::tempdir().unwrap();
    let workflow = run(yaml, workspace.path().to_path_buf()).await;

    assert_eq!(workflow.state.status, RunStatus::Failed);

    match &workflow.step("boom").unwrap().state {
        StepState::Failed { exit_code, .. } => assert_eq!(*exit_code, Some(3)),
        other => panic!("expected failed step, got {:?}", other),
    }
    assert!(matches!(
        workflow.step("never").unwrap().state,
        StepState::Skipped { .. }
    ));
}

#[tokio::test]
async fn smoke_test_steps_run_in_the_workspace() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::write(workspace.path().join("marker.txt"), "present").unwrap();

    let yaml = r#"
name: Smoke
on: push
jobs:
  default:
    runs-on: ubuntu-latest
    steps:
      - name: Probe
        run: test -f marker.txt
"#;
    let workflow = run(yaml, workspace.path().to_path_buf()).await;
    assert_eq!(workflow.state.status, RunStatus::Completed);
}
