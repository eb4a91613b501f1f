//! Two-phase functional test runner on top of `act`.
//!
//! A run prepares a [`SandboxWorkspace`], performs a dry run and, only if
//! that succeeds, executes the workflow. Timeouts never surface as errors:
//! the child process is killed and the outcome is marked as failed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::event::MockEvent;
use super::outcome::{ActLogParser, JobOutcomeParser, TestOutcome};
use super::workspace::SandboxWorkspace;
use crate::error::SandboxError;

/// Default timeout of each `act` phase.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub const DEFAULT_CONTAINER_ARCHITECTURE: &str = "linux/amd64";

/// Secrets passed to every run unless overridden.
pub fn default_mock_secrets() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("DEPLOY_KEY".to_string(), "mock_deploy_key".to_string()),
        ("NPM_TOKEN".to_string(), "mock_npm_token".to_string()),
    ])
}

/// Configuration of a [`FunctionalTestRunner`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub act_path: PathBuf,
    /// Applied separately to the dry run and to the execution.
    pub timeout: Duration,
    pub mock_secrets: BTreeMap<String, String>,
    pub container_architecture: String,
    /// Restrict the run to a single job.
    pub job: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            act_path: PathBuf::from("act"),
            timeout: DEFAULT_TIMEOUT,
            mock_secrets: default_mock_secrets(),
            container_architecture: DEFAULT_CONTAINER_ARCHITECTURE.to_string(),
            job: None,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_act_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.act_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add or override one mock secret.
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.mock_secrets.insert(name.into(), value.into());
        self
    }

    pub fn with_job(mut self, job: impl Into<String>) -> Self {
        self.job = Some(job.into());
        self
    }
}

/// What happened to one `act` invocation.
#[derive(Debug)]
enum ActRun {
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

/// Runs candidate workflows through `act` in isolated sandboxes.
#[derive(Clone)]
pub struct FunctionalTestRunner {
    config: RunnerConfig,
    parser: Arc<dyn JobOutcomeParser>,
}

impl FunctionalTestRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            parser: Arc::new(ActLogParser),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn JobOutcomeParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Arguments of one `act` invocation against `sandbox`.
    pub fn act_args(&self, sandbox: &SandboxWorkspace, dry_run: bool) -> Vec<String> {
        let mut args = Vec::new();
        if dry_run {
            args.push("--dryrun".to_string());
        }
        args.extend([
            "-e".to_string(),
            sandbox.event_path().display().to_string(),
            "-W".to_string(),
            sandbox.workflow_path().display().to_string(),
            "--container-architecture".to_string(),
            self.config.container_architecture.clone(),
            "--artifact-server-path".to_string(),
            sandbox.artifacts_dir().display().to_string(),
        ]);
        if let Some(job) = &self.config.job {
            args.push("-j".to_string());
            args.push(job.clone());
        }
        for (name, value) in &self.config.mock_secrets {
            args.push("-s".to_string());
            args.push(format!("{name}={value}"));
        }
        args
    }

    async fn run_act(&self, sandbox: &SandboxWorkspace, dry_run: bool) -> Result<ActRun, SandboxError> {
        let child = Command::new(&self.config.act_path)
            .args(self.act_args(sandbox, dry_run))
            .current_dir(sandbox.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                program: self.config.act_path.display().to_string(),
                source,
            })?;

        // dropping the child on timeout kills it
        match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(ActRun::Completed {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            Err(_) => Ok(ActRun::TimedOut),
        }
    }

    /// Run the two-phase protocol; setup and spawn failures are returned as errors.
    pub async fn try_run_test(
        &self,
        workflow_yaml: &str,
        event_type: &str,
        repository: Option<&Path>,
    ) -> Result<TestOutcome, SandboxError> {
        let event = MockEvent::new(event_type);
        let sandbox = {
            let yaml = workflow_yaml.to_string();
            let repository = repository.map(Path::to_path_buf);
            tokio::task::spawn_blocking(move || {
                SandboxWorkspace::prepare(&yaml, &event, repository.as_deref())
            })
            .await
            .map_err(|e| SandboxError::Setup(e.to_string()))??
        };
        let secs = self.config.timeout.as_secs();

        debug!(event_type, sandbox = %sandbox.root().display(), "Starting dry run");
        let (dry_stdout, dry_stderr) = match self.run_act(&sandbox, true).await? {
            ActRun::Completed {
                exit_code: 0,
                stdout,
                stderr,
            } => (stdout, stderr),
            ActRun::Completed {
                exit_code,
                stdout,
                stderr,
            } => {
                info!(exit_code, "Dry run failed");
                return Ok(TestOutcome::dry_run_failed(stdout, stderr));
            }
            ActRun::TimedOut => {
                warn!(timeout_secs = secs, "Dry run timed out");
                return Ok(TestOutcome::failed(format!(
                    "Dry run timed out after {secs} seconds"
                )));
            }
        };

        debug!("Dry run succeeded, executing workflow");
        let outcome = match self.run_act(&sandbox, false).await? {
            ActRun::Completed {
                exit_code,
                stdout,
                stderr,
            } => {
                let (jobs_executed, jobs_failed) =
                    self.parser.parse(&format!("{stdout}{stderr}"));
                let execution_success = exit_code == 0;
                TestOutcome {
                    success: execution_success,
                    dryrun_success: true,
                    execution_success,
                    output: format!("{dry_stdout}\n{stdout}"),
                    errors: format!("{dry_stderr}\n{stderr}"),
                    skipped_jobs: Vec::new(),
                    jobs_executed,
                    jobs_failed,
                }
            }
            ActRun::TimedOut => {
                warn!(timeout_secs = secs, "Execution timed out");
                TestOutcome {
                    success: false,
                    dryrun_success: true,
                    execution_success: false,
                    output: dry_stdout,
                    errors: format!("Execution timed out after {secs} seconds"),
                    ..TestOutcome::default()
                }
            }
        };

        info!(
            success = outcome.success,
            jobs_executed = outcome.jobs_executed.len(),
            jobs_failed = outcome.jobs_failed.len(),
            "Functional test finished"
        );
        Ok(outcome)
    }

    /// Run the two-phase protocol, folding every failure into the outcome.
    pub async fn run_test(
        &self,
        workflow_yaml: &str,
        event_type: &str,
        repository: Option<&Path>,
    ) -> TestOutcome {
        match self.try_run_test(workflow_yaml, event_type, repository).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "Functional test could not run");
                TestOutcome::failed(err.to_string())
            }
        }
    }
}

impl Default for FunctionalTestRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}
