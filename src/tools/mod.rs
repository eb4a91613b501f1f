//! Read-only repository tools used to give the generator context.
//!
//! Every tool is scoped to an explicit repository root carried by
//! [`RepoTools`]; relative paths are resolved against it and any path that
//! would leave it is rejected. No tool reads process-wide state such as the
//! current directory. [`ActionDetails`] looks up the metadata of published
//! actions over HTTP.

mod actions;

pub use actions::{ActionDetails, ActionRef, RAW_GITHUB_BASE};

use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::ToolError;
use crate::utils::truncate;
use crate::workflow::WORKFLOWS_DIR;

/// Maximum number of bytes returned by [`RepoTools::read_file`].
const MAX_FILE_SIZE: usize = 1_048_576;

/// Maximum number of hits returned by [`RepoTools::file_search`].
const MAX_RESULTS: usize = 100;

/// Files skipped by search larger than this.
const MAX_SEARCH_FILE_SIZE: u64 = 512 * 1024;

/// Per-section cap of the generator context.
const CONTEXT_SECTION_CHARS: usize = 4_000;

/// Build manifests worth showing to the generator when present.
const MANIFESTS: &[&str] = &[
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "requirements.txt",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
    "Dockerfile",
    "Makefile",
];

/// One line matched by [`RepoTools::file_search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub line: usize,
    pub text: String,
}

/// Read-only tools over one repository checkout.
#[derive(Debug, Clone)]
pub struct RepoTools {
    root: PathBuf,
}

impl RepoTools {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` against the root, rejecting escapes.
    fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        if relative.contains('\0') {
            return Err(ToolError::InvalidPath(
                "path contains a null character".to_string(),
            ));
        }

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(relative).components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(ToolError::OutsideRoot(relative.to_string()));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::OutsideRoot(relative.to_string()));
                }
            }
        }

        // symlinks may still point outside
        if resolved.exists() {
            let canonical_root = self.root.canonicalize()?;
            let canonical = resolved.canonicalize()?;
            if !canonical.starts_with(&canonical_root) {
                return Err(ToolError::OutsideRoot(relative.to_string()));
            }
        }
        Ok(resolved)
    }

    fn read_first(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .find_map(|name| std::fs::read_to_string(self.root.join(name)).ok())
    }

    /// Content of `README.md` or `README`.
    pub fn read_readme(&self) -> String {
        self.read_first(&["README.md", "README"])
            .unwrap_or_else(|| "README not found".to_string())
    }

    /// Content of `CONTRIBUTING.md` or `CONTRIBUTING`.
    pub fn read_contributing(&self) -> String {
        self.read_first(&["CONTRIBUTING.md", "CONTRIBUTING"])
            .unwrap_or_else(|| "CONTRIBUTING.md not found".to_string())
    }

    /// Sorted entry names of a directory; directories carry a trailing `/`.
    pub fn list_files(&self, relative: &str) -> Result<Vec<String>, ToolError> {
        let dir = self.resolve(relative)?;
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type()?.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();
        Ok(entries)
    }

    /// Content of a file, truncated past 1 MiB.
    pub fn read_file(&self, relative: &str) -> Result<String, ToolError> {
        if relative.trim().is_empty() {
            return Err(ToolError::InvalidPath("path cannot be empty".to_string()));
        }
        let path = self.resolve(relative)?;
        let bytes = std::fs::read(&path)?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(truncate(&content, MAX_FILE_SIZE))
    }

    /// Case-insensitive regex search over all text files, `.git` excluded.
    pub fn file_search(&self, pattern: &str) -> Result<Vec<SearchHit>, ToolError> {
        let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        let mut hits = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let too_large = entry
                .metadata()
                .map(|m| m.len() > MAX_SEARCH_FILE_SIZE)
                .unwrap_or(true);
            if too_large {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            for (idx, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    hits.push(SearchHit {
                        path: relative.clone(),
                        line: idx + 1,
                        text: line.trim().to_string(),
                    });
                    if hits.len() >= MAX_RESULTS {
                        return Ok(hits);
                    }
                }
            }
        }
        Ok(hits)
    }

    /// Context block appended to the generator prompt.
    pub fn repository_context(&self) -> String {
        let mut out = String::new();

        if let Ok(entries) = self.list_files(".") {
            let _ = writeln!(out, "Repository files:\n{}\n", entries.join("\n"));
        }
        if let Ok(entries) = self.list_files(WORKFLOWS_DIR) {
            if !entries.is_empty() {
                let _ = writeln!(out, "Existing workflows:\n{}\n", entries.join("\n"));
            }
        }

        let readme = self.read_readme();
        let _ = writeln!(out, "README:\n{}\n", truncate(&readme, CONTEXT_SECTION_CHARS));

        let contributing = self.read_contributing();
        if self.root.join("CONTRIBUTING.md").exists() || self.root.join("CONTRIBUTING").exists() {
            let _ = writeln!(
                out,
                "CONTRIBUTING:\n{}\n",
                truncate(&contributing, CONTEXT_SECTION_CHARS)
            );
        }

        for manifest in MANIFESTS {
            if let Ok(content) = self.read_file(manifest) {
                let _ = writeln!(
                    out,
                    "{}:\n{}\n",
                    manifest,
                    truncate(&content, CONTEXT_SECTION_CHARS)
                );
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# Demo\nBuild with make.\n").unwrap();
        fs::write(dir.path().join("Makefile"), "all:\n\tcargo build\n").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {\n    println!(\"hi\");\n}\n").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/config"), "println in git config\n").unwrap();
        dir
    }

    #[test]
    fn test_readme_and_missing_contributing() {
        let dir = repo();
        let tools = RepoTools::new(dir.path());
        assert!(tools.read_readme().starts_with("# Demo"));
        assert_eq!(tools.read_contributing(), "CONTRIBUTING.md not found");
    }

    #[test]
    fn test_list_files_marks_directories() {
        let dir = repo();
        let tools = RepoTools::new(dir.path());
        let entries = tools.list_files(".").unwrap();
        assert!(entries.contains(&"src/".to_string()));
        assert!(entries.contains(&"README.md".to_string()));
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = repo();
        let tools = RepoTools::new(dir.path());
        assert!(matches!(
            tools.read_file("../outside.txt"),
            Err(ToolError::OutsideRoot(_))
        ));
        assert!(matches!(
            tools.read_file("/etc/passwd"),
            Err(ToolError::OutsideRoot(_))
        ));
        assert!(matches!(
            tools.read_file("src/../../x"),
            Err(ToolError::OutsideRoot(_))
        ));
        assert!(tools.read_file("src/../README.md").is_ok());
    }

    #[test]
    fn test_file_search_skips_git_dir() {
        let dir = repo();
        let tools = RepoTools::new(dir.path());
        let hits = tools.file_search("PRINTLN").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "src/main.rs");
        assert_eq!(hits[0].line, 2);
    }

    #[test]
    fn test_invalid_search_pattern() {
        let dir = repo();
        let tools = RepoTools::new(dir.path());
        assert!(matches!(
            tools.file_search("("),
            Err(ToolError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_repository_context() {
        let dir = repo();
        let tools = RepoTools::new(dir.path());
        let context = tools.repository_context();
        assert!(context.contains("README:\n# Demo"));
        assert!(context.contains("Makefile:\n"));
        assert!(!context.contains("CONTRIBUTING:"));
    }
}
