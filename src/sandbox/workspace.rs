//! Isolated workspaces for one functional test.
//!
//! A workspace is a fresh temporary copy of the target repository whose
//! `.github/workflows` holds only the candidate workflow, plus a minimal git
//! marker and the mock event file. Both the workspace and the artifact
//! staging directory are removed when the [`SandboxWorkspace`] is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use super::event::MockEvent;
use crate::error::SandboxError;
use crate::workflow::WORKFLOWS_DIR;

/// File name of the candidate workflow inside the sandbox.
pub const WORKFLOW_FILE: &str = "test_workflow.yml";

/// File name of the mock event payload.
pub const EVENT_FILE: &str = "event.json";

const GIT_CONFIG: &str = "[core]\n\trepositoryformatversion = 0\n";

const MOCK_README: &str =
    "# Test Repository\n\nThis is a mock repository for testing GitHub Actions workflows.\n";

/// A prepared sandbox for one test execution.
#[derive(Debug)]
pub struct SandboxWorkspace {
    root: TempDir,
    artifacts: TempDir,
    workflow_path: PathBuf,
    event_path: PathBuf,
}

impl SandboxWorkspace {
    /// Build a sandbox containing a copy of `repository` (if any), the
    /// candidate workflow and the mock event.
    pub fn prepare(
        workflow_yaml: &str,
        event: &MockEvent,
        repository: Option<&Path>,
    ) -> Result<Self, SandboxError> {
        let root = tempfile::Builder::new().prefix("ci-forge-sandbox-").tempdir()?;
        let artifacts = tempfile::Builder::new().prefix("act_artifacts_").tempdir()?;

        if let Some(repository) = repository {
            if !repository.is_dir() {
                return Err(SandboxError::Setup(format!(
                    "repository not found: {}",
                    repository.display()
                )));
            }
            copy_tree(repository, root.path())?;
        }

        let workflows_dir = root.path().join(WORKFLOWS_DIR);
        if workflows_dir.exists() {
            std::fs::remove_dir_all(&workflows_dir)?;
        }
        std::fs::create_dir_all(&workflows_dir)?;
        let workflow_path = workflows_dir.join(WORKFLOW_FILE);
        std::fs::write(&workflow_path, workflow_yaml)?;

        write_repository_marker(root.path())?;

        let event_path = root.path().join(EVENT_FILE);
        let payload = serde_json::to_string(&event.to_payload())?;
        std::fs::write(&event_path, payload)?;

        tracing::debug!(
            sandbox = %root.path().display(),
            copied = repository.is_some(),
            "Prepared sandbox workspace"
        );

        Ok(Self {
            root,
            artifacts,
            workflow_path,
            event_path,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn artifacts_dir(&self) -> &Path {
        self.artifacts.path()
    }

    pub fn workflow_path(&self) -> &Path {
        &self.workflow_path
    }

    pub fn event_path(&self) -> &Path {
        &self.event_path
    }
}

/// Minimal `.git/config` so `act` accepts the directory, plus a README if absent.
fn write_repository_marker(root: &Path) -> Result<(), SandboxError> {
    let git_dir = root.join(".git");
    std::fs::create_dir_all(&git_dir)?;
    std::fs::write(git_dir.join("config"), GIT_CONFIG)?;

    let readme = root.join("README.md");
    if !readme.exists() {
        std::fs::write(readme, MOCK_README)?;
    }
    Ok(())
}

/// Copy every directory and regular file under `src` into `dst`.
fn copy_tree(src: &Path, dst: &Path) -> Result<(), SandboxError> {
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| SandboxError::Setup(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| SandboxError::Setup(e.to_string()))?;
        let target = dst.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
        } else if let Err(err) = std::fs::copy(entry.path(), &target) {
            // dangling symlinks are skipped
            tracing::debug!(path = %entry.path().display(), error = %err, "Skipping unreadable entry");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture_repo() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/nested/lib.rs"), "pub fn f() {}").unwrap();
        fs::create_dir_all(dir.path().join(".github/workflows")).unwrap();
        fs::write(dir.path().join(".github/workflows/other.yml"), "name: other").unwrap();
        fs::write(dir.path().join("README.md"), "# Real").unwrap();
        dir
    }

    #[test]
    fn test_candidate_is_sole_workflow() {
        let repo = fixture_repo();
        let sandbox =
            SandboxWorkspace::prepare("name: CI", &MockEvent::new("push"), Some(repo.path()))
                .unwrap();

        let workflows: Vec<_> = fs::read_dir(sandbox.root().join(WORKFLOWS_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(workflows, vec![WORKFLOW_FILE.to_string()]);
        assert_eq!(fs::read_to_string(sandbox.workflow_path()).unwrap(), "name: CI");
        assert!(sandbox.root().join("src/nested/lib.rs").exists());
        assert_eq!(
            fs::read_to_string(sandbox.root().join("README.md")).unwrap(),
            "# Real"
        );
        // source repository untouched
        assert!(repo.path().join(".github/workflows/other.yml").exists());
    }

    #[test]
    fn test_empty_sandbox_gets_markers() {
        let sandbox = SandboxWorkspace::prepare("", &MockEvent::new("push"), None).unwrap();
        assert_eq!(
            fs::read_to_string(sandbox.root().join(".git/config")).unwrap(),
            GIT_CONFIG
        );
        assert!(fs::read_to_string(sandbox.root().join("README.md"))
            .unwrap()
            .starts_with("# Test Repository"));
        let event: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(sandbox.event_path()).unwrap()).unwrap();
        assert_eq!(event["event"], "push");
    }

    #[test]
    fn test_directories_removed_on_drop() {
        let sandbox = SandboxWorkspace::prepare("x", &MockEvent::new("push"), None).unwrap();
        let root = sandbox.root().to_path_buf();
        let artifacts = sandbox.artifacts_dir().to_path_buf();
        drop(sandbox);
        assert!(!root.exists());
        assert!(!artifacts.exists());
    }

    #[test]
    fn test_missing_repository_is_setup_error() {
        let result = SandboxWorkspace::prepare(
            "x",
            &MockEvent::new("push"),
            Some(Path::new("/nonexistent/ci-forge-repo")),
        );
        assert!(matches!(result, Err(SandboxError::Setup(_))));
    }
}
