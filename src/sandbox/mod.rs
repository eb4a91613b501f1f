//! Functional testing of workflows in isolated sandboxes.
//!
//! This module provides:
//! - [`SandboxWorkspace`]: a temporary copy of a repository holding only the
//!   candidate workflow and a mock trigger event
//! - [`FunctionalTestRunner`]: the dry-run-then-execute protocol over `act`
//! - [`JobOutcomeParser`]: pluggable classification of jobs from runner logs

pub mod event;
pub mod outcome;
pub mod runner;
pub mod workspace;

pub use event::MockEvent;
pub use outcome::{ActLogParser, JobOutcomeParser, TestOutcome};
pub use runner::{
    default_mock_secrets, FunctionalTestRunner, RunnerConfig, DEFAULT_CONTAINER_ARCHITECTURE,
    DEFAULT_TIMEOUT,
};
pub use workspace::{SandboxWorkspace, EVENT_FILE, WORKFLOW_FILE};
