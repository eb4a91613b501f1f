//! Metadata lookup for actions referenced in `uses:` entries.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::ToolError;

/// Host serving raw repository content.
pub const RAW_GITHUB_BASE: &str = "https://raw.githubusercontent.com";

/// Refs tried when a `uses:` string carries none.
const DEFAULT_REFS: &[&str] = &["main", "master"];

const METADATA_FILES: &[&str] = &["action.yml", "action.yaml"];

const FETCH_TIMEOUT_SECS: u64 = 30;

/// A parsed `owner/repo[/path][@ref]` action reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    pub owner: String,
    pub repo: String,
    /// Subdirectory holding the action metadata, empty for the repository root.
    pub path: String,
    /// Refs to try, in order.
    pub refs: Vec<String>,
}

impl ActionRef {
    /// Parse a `uses:` value. Local (`./`) and `docker://` references are rejected.
    pub fn parse(uses: &str) -> Result<Self, ToolError> {
        let uses = uses.trim();
        let invalid = || ToolError::InvalidAction(uses.to_string());
        if uses.starts_with("./") || uses.starts_with("docker://") {
            return Err(invalid());
        }

        let (location, refs) = match uses.split_once('@') {
            Some((location, git_ref)) if !git_ref.is_empty() => {
                (location, vec![git_ref.to_string()])
            }
            Some(_) => return Err(invalid()),
            None => (uses, DEFAULT_REFS.iter().map(|r| r.to_string()).collect()),
        };

        let mut parts = location.splitn(3, '/');
        let owner = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let repo = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let path = parts.next().unwrap_or("").trim_matches('/');

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            path: path.to_string(),
            refs,
        })
    }

    /// Metadata URLs under `base`, `action.yml` for every ref before `action.yaml`.
    pub fn candidate_urls(&self, base: &str) -> Vec<String> {
        let base = base.trim_end_matches('/');
        let dir = if self.path.is_empty() {
            String::new()
        } else {
            format!("{}/", self.path)
        };
        let dir = dir.as_str();
        METADATA_FILES
            .iter()
            .flat_map(|file| {
                self.refs.iter().map(move |git_ref| {
                    format!("{base}/{}/{}/{git_ref}/{dir}{file}", self.owner, self.repo)
                })
            })
            .collect()
    }
}

/// Fetches `action.yml` metadata of published actions.
#[derive(Debug, Clone)]
pub struct ActionDetails {
    client: Client,
    base_url: String,
}

impl Default for ActionDetails {
    fn default() -> Self {
        Self::new(RAW_GITHUB_BASE)
    }
}

impl ActionDetails {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Metadata of the action `uses`, or `None` when no candidate exists.
    pub async fn fetch(&self, uses: &str) -> Result<Option<String>, ToolError> {
        let action = ActionRef::parse(uses)?;
        for url in action.candidate_urls(&self.base_url) {
            let response = self
                .client
                .get(&url)
                .header("User-Agent", "ci_forge/1.0")
                .send()
                .await?;
            match response.status() {
                status if status.is_success() => {
                    tracing::debug!(%url, "Fetched action metadata");
                    return Ok(Some(response.text().await?));
                }
                StatusCode::NOT_FOUND => continue,
                status => {
                    tracing::debug!(%url, %status, "Unexpected status fetching action metadata");
                }
            }
        }
        tracing::info!(action = uses, "No metadata found for action");
        Ok(None)
    }
}
