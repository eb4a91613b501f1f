//! Running an external linter against a workflow written to a temp file.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::error::LintError;

/// Write `content` to a fresh `.yml` temp file. The file is removed on drop.
pub(crate) fn write_temp_workflow(content: &str) -> Result<NamedTempFile, LintError> {
    let mut file = tempfile::Builder::new()
        .prefix("ci-forge-")
        .suffix(".yml")
        .tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Run `program args... file` and return `(exit_code, stdout, stderr)`.
pub(crate) async fn run_tool(
    program: &Path,
    args: &[&str],
    file: &Path,
    timeout: Duration,
) -> Result<(i32, String, String), LintError> {
    let tool = program.display().to_string();
    let child = Command::new(program)
        .args(args)
        .arg(file)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| LintError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(LintError::Timeout {
                tool,
                secs: timeout.as_secs(),
            })
        }
    };

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    tracing::debug!(tool = %tool, exit_code, "Linter finished");
    Ok((exit_code, stdout, stderr))
}
