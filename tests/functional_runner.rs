//! Two-phase functional test protocol against scripted stand-ins for `act`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ci_forge::sandbox::{FunctionalTestRunner, RunnerConfig};
use tempfile::TempDir;

const WORKFLOW: &str = "name: CI\non: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo hi\n";

/// Write an executable fake `act` whose behaviour depends on `--dryrun`.
fn fake_act(dir: &Path, dry_run: &str, execute: &str) -> PathBuf {
    let path = dir.join("act");
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"--dryrun\" ]; then\n{dry_run}\nfi\n{execute}\n"
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn runner(act: &Path, timeout: Duration) -> FunctionalTestRunner {
    FunctionalTestRunner::new(
        RunnerConfig::new()
            .with_act_path(act)
            .with_timeout(timeout),
    )
}

#[tokio::test]
async fn test_dry_run_failure_skips_execution() {
    let tools = TempDir::new().unwrap();
    let marker = tools.path().join("executed");
    let act = fake_act(
        tools.path(),
        "echo 'dry output'; echo 'bad workflow' >&2; exit 2",
        &format!("touch {}; exit 0", marker.display()),
    );

    let outcome = runner(&act, Duration::from_secs(30))
        .run_test(WORKFLOW, "push", None)
        .await;

    assert!(!outcome.success);
    assert!(!outcome.dryrun_success);
    assert!(!outcome.execution_success);
    assert!(outcome.jobs_executed.is_empty() && outcome.jobs_failed.is_empty());
    assert!(outcome.output.contains("dry output"));
    assert!(outcome.errors.contains("bad workflow"));
    assert!(!marker.exists(), "execution must not run after a failed dry run");
}

#[tokio::test]
async fn test_successful_run_parses_jobs_and_isolates_workflow() {
    let tools = TempDir::new().unwrap();
    let capture = tools.path().join("capture");
    fs::create_dir(&capture).unwrap();

    let repo = TempDir::new().unwrap();
    fs::create_dir_all(repo.path().join(".github/workflows")).unwrap();
    fs::write(repo.path().join(".github/workflows/ci.yml"), "name: original").unwrap();
    fs::create_dir_all(repo.path().join("src")).unwrap();
    fs::write(repo.path().join("src/main.rs"), "fn main() {}").unwrap();

    let act = fake_act(
        tools.path(),
        "echo '[CI/build] dry run ok'; exit 0",
        &format!(
            "echo \"$@\" > {c}/args\n\
             ls .github/workflows > {c}/workflows\n\
             cat event.json > {c}/event.json\n\
             test -f src/main.rs && touch {c}/copied\n\
             echo '[CI/build] SUCCESS build'\n\
             echo '[CI/test] SUCCESS test'\n\
             exit 0",
            c = capture.display()
        ),
    );

    let outcome = runner(&act, Duration::from_secs(30))
        .run_test(WORKFLOW, "pull_request", Some(repo.path()))
        .await;

    assert!(outcome.success, "errors: {}", outcome.errors);
    assert!(outcome.dryrun_success && outcome.execution_success);
    assert_eq!(outcome.jobs_executed, vec!["build", "test"]);
    assert!(outcome.jobs_failed.is_empty());
    assert!(outcome.output.contains("dry run ok"));
    assert!(outcome.output.contains("SUCCESS test"));

    let args = fs::read_to_string(capture.join("args")).unwrap();
    assert!(!args.contains("--dryrun"));
    assert!(args.contains("test_workflow.yml"));
    assert!(args.contains("--container-architecture linux/amd64"));
    assert!(args.contains("-s NPM_TOKEN=mock_npm_token"));

    let workflows = fs::read_to_string(capture.join("workflows")).unwrap();
    assert_eq!(workflows.trim(), "test_workflow.yml");
    assert!(capture.join("copied").exists());

    let event: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(capture.join("event.json")).unwrap()).unwrap();
    assert_eq!(event["event"], "pull_request");

    // the source repository is untouched
    assert!(repo.path().join(".github/workflows/ci.yml").exists());
}

#[tokio::test]
async fn test_failed_execution_reports_failed_jobs() {
    let tools = TempDir::new().unwrap();
    let act = fake_act(
        tools.path(),
        "exit 0",
        "echo '[CI/build] SUCCESS build'; echo '[CI/test] FAIL test'; exit 1",
    );

    let outcome = runner(&act, Duration::from_secs(30))
        .run_test(WORKFLOW, "push", None)
        .await;

    assert!(!outcome.success);
    assert!(outcome.dryrun_success);
    assert!(!outcome.execution_success);
    assert_eq!(outcome.jobs_executed, vec!["build"]);
    assert_eq!(outcome.jobs_failed, vec!["test"]);
}

#[tokio::test]
async fn test_execution_timeout_keeps_dry_run_output() {
    let tools = TempDir::new().unwrap();
    let act = fake_act(
        tools.path(),
        "echo 'planned jobs: build'; exit 0",
        "echo '[CI/build] SUCCESS build'; exec sleep 5",
    );

    let started = Instant::now();
    let outcome = runner(&act, Duration::from_secs(1))
        .run_test(WORKFLOW, "push", None)
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(outcome.dryrun_success);
    assert!(!outcome.execution_success);
    assert!(!outcome.success);
    assert_eq!(outcome.errors, "Execution timed out after 1 seconds");
    assert!(outcome.output.contains("planned jobs: build"));
    assert!(outcome.jobs_executed.is_empty() && outcome.jobs_failed.is_empty());
}

#[tokio::test]
async fn test_dry_run_timeout_is_a_failed_outcome() {
    let tools = TempDir::new().unwrap();
    let act = fake_act(tools.path(), "exec sleep 5", "exit 0");

    let outcome = runner(&act, Duration::from_secs(1))
        .run_test(WORKFLOW, "push", None)
        .await;

    assert!(!outcome.dryrun_success && !outcome.execution_success);
    assert_eq!(outcome.errors, "Dry run timed out after 1 seconds");
}

#[tokio::test]
async fn test_missing_binary_is_an_error_in_try_run() {
    let runner = runner(Path::new("/nonexistent/act"), Duration::from_secs(1));
    let result = runner.try_run_test(WORKFLOW, "push", None).await;
    assert!(matches!(result, Err(ci_forge::SandboxError::Spawn { .. })));
}
