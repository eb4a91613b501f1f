//! Temporary relocation of a ground-truth workflow out of its repository.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::workflow::WorkItem;

/// Directory under the repositories root where hidden workflows are parked.
pub const HIDDEN_DIR: &str = "workflows";

/// Keeps a ground-truth workflow out of its repository while alive.
///
/// The file is moved from `<repos>/<repo>/.github/workflows/<file>` to
/// `<repos>/workflows/<repo>/<file>` and moved back when the guard is
/// dropped, including during unwinding.
#[derive(Debug)]
pub struct HiddenWorkflow {
    original: PathBuf,
    hidden: PathBuf,
    active: bool,
}

impl HiddenWorkflow {
    /// Parking location of `item`'s workflow.
    pub fn hidden_path(repositories_dir: &Path, item: &WorkItem) -> PathBuf {
        repositories_dir
            .join(HIDDEN_DIR)
            .join(&item.repository_name)
            .join(&item.file_name)
    }

    /// Move the workflow aside. A missing file yields an inactive guard.
    pub fn hide(repositories_dir: &Path, item: &WorkItem) -> io::Result<Self> {
        let original = item.workflow_path(repositories_dir);
        let hidden = Self::hidden_path(repositories_dir, item);

        if !original.is_file() {
            debug!(path = %original.display(), "No ground-truth workflow to hide");
            return Ok(Self {
                original,
                hidden,
                active: false,
            });
        }

        if let Some(parent) = hidden.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&original, &hidden)?;
        debug!(from = %original.display(), to = %hidden.display(), "Ground-truth workflow hidden");
        Ok(Self {
            original,
            hidden,
            active: true,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Move the workflow back now instead of on drop.
    pub fn restore(mut self) -> io::Result<()> {
        self.move_back()
    }

    fn move_back(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        if let Some(parent) = self.original.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&self.hidden, &self.original)?;
        self.active = false;
        Ok(())
    }
}

impl Drop for HiddenWorkflow {
    fn drop(&mut self) {
        if let Err(err) = self.move_back() {
            warn!(
                hidden = %self.hidden.display(),
                original = %self.original.display(),
                error = %err,
                "Failed to restore ground-truth workflow"
            );
        }
    }
}
