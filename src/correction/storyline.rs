//! Per-item JSONL storyline of pipeline state transitions.
//!
//! Each line is one JSON object. `storyline` lines carry the step name, a
//! snapshot of the [`PipelineState`] and a message; the final `score` line
//! carries the score record. Every completion exchange goes to a sibling
//! `_messages.log` file as `message` lines. A disabled storyline drops
//! everything.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use super::state::PipelineState;
use crate::llm::{Exchange, Transcript};

/// Append-only storyline and message files for one work item.
#[derive(Debug, Clone, Default)]
pub struct Storyline {
    path: Option<PathBuf>,
    messages: Option<PathBuf>,
}

impl Storyline {
    /// A storyline that writes nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Files `<timestamp>_<item_id>_state.log` and
    /// `<timestamp>_<item_id>_messages.log` inside `log_dir`.
    pub async fn open(log_dir: &Path, item_id: u64) -> Self {
        if let Err(err) = tokio::fs::create_dir_all(log_dir).await {
            tracing::warn!(dir = %log_dir.display(), error = %err, "Cannot create log directory");
            return Self::disabled();
        }
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        Self {
            path: Some(log_dir.join(format!("{stamp}_{item_id}_state.log"))),
            messages: Some(log_dir.join(format!("{stamp}_{item_id}_messages.log"))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn messages_path(&self) -> Option<&Path> {
        self.messages.as_deref()
    }

    /// Record a state snapshot after `step`.
    pub async fn record<M: Serialize>(&self, step: &str, state: &PipelineState, message: &M) {
        let Some(path) = &self.path else {
            return;
        };
        let line = json!({
            "log_type": "storyline",
            "timestamp": Local::now().to_rfc3339(),
            "level": "INFO",
            "step": step,
            "state": state,
            "message": message,
        });
        append(path, &line).await;
    }

    /// Record the final score of the item.
    pub async fn record_score<S: Serialize>(&self, score: &S) {
        let Some(path) = &self.path else {
            return;
        };
        let mut line = match serde_json::to_value(score) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                let mut map = serde_json::Map::new();
                map.insert("score".to_string(), other);
                map
            }
            Err(err) => {
                tracing::warn!(error = %err, "Cannot serialize score for storyline");
                return;
            }
        };
        line.insert("log_type".to_string(), Value::from("score"));
        append(path, &Value::Object(line)).await;
    }

    /// Record a raw message in the messages file.
    pub async fn record_message<M: Serialize>(&self, level: &str, message: &M) {
        let Some(path) = &self.messages else {
            return;
        };
        let line = json!({
            "log_type": "message",
            "timestamp": Local::now().to_rfc3339(),
            "level": level,
            "message": message,
        });
        append(path, &line).await;
    }
}

#[async_trait]
impl Transcript for Storyline {
    async fn record_exchange(&self, exchange: &Exchange<'_>) {
        let level = if exchange.error.is_some() { "ERROR" } else { "INFO" };
        self.record_message(level, exchange).await;
    }
}

async fn append(path: &Path, line: &Value) {
    let mut text = line.to_string();
    text.push('\n');
    let result: std::io::Result<()> = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await
    }
    .await;
    if let Err(err) = result {
        tracing::warn!(path = %path.display(), error = %err, "Failed to append storyline entry");
    }
}
