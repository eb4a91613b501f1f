//! Mock trigger event payloads handed to `act`.

use serde_json::{json, Map, Value};

/// A synthetic GitHub event.
#[derive(Debug, Clone, PartialEq)]
pub struct MockEvent {
    pub event_type: String,
    pub git_ref: String,
    /// `owner/name` of the mocked repository.
    pub repository: String,
    pub sha: String,
    pub actor: String,
    /// Top-level keys merged over the generated payload.
    pub extra_payload: Map<String, Value>,
}

impl MockEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            git_ref: "refs/heads/main".to_string(),
            repository: "test/repo".to_string(),
            sha: "abc123def456".to_string(),
            actor: "testuser".to_string(),
            extra_payload: Map::new(),
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_payload.insert(key.into(), value);
        self
    }

    /// The JSON payload written to `event.json`.
    pub fn to_payload(&self) -> Value {
        let (owner, name) = self
            .repository
            .split_once('/')
            .unwrap_or(("", self.repository.as_str()));

        let mut payload = json!({
            "event": self.event_type,
            "ref": self.git_ref,
            "repository": {
                "full_name": self.repository,
                "name": name,
                "owner": {"login": owner},
            },
            "sha": self.sha,
            "actor": self.actor,
            "head_commit": {"id": self.sha, "message": "Test commit"},
            "github": {
                "event_name": self.event_type,
                "event": {},
                "repository": self.repository,
                "ref": self.git_ref,
                "sha": self.sha,
                "actor": self.actor,
                "workflow": "test-workflow",
                "run_id": "12345",
                "run_number": "1",
            },
        });

        if let Value::Object(map) = &mut payload {
            for (key, value) in &self.extra_payload {
                map.insert(key.clone(), value.clone());
            }
        }
        payload
    }
}
