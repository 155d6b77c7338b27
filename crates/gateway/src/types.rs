use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The action kinds the Tool Gateway understands (spec.md §4.4). `OpenPr` is
/// accepted and parsed but always denied — it is deliberately not
/// implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    RunCmd,
    WriteFile,
    ReadFile,
    GitCommit,
    GitDiff,
    OpenPr,
}

impl ActionType {
    /// Mutating actions require chief authorization (spec.md §4.4 point 2).
    #[must_use]
    pub fn is_mutating(self) -> bool {
        matches!(self, Self::RunCmd | Self::WriteFile | Self::GitCommit | Self::OpenPr)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RunCmd => "RUN_CMD",
            Self::WriteFile => "WRITE_FILE",
            Self::ReadFile => "READ_FILE",
            Self::GitCommit => "GIT_COMMIT",
            Self::GitDiff => "GIT_DIFF",
            Self::OpenPr => "OPEN_PR",
        };
        f.write_str(s)
    }
}

/// A single proposed invocation through the gateway.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub agent_id: String,
    pub authorized_by: Option<String>,
    pub action_type: ActionType,
    pub working_dir: PathBuf,
    pub payload: Map<String, Value>,
    pub idempotency_key: Option<String>,
    pub allow_duplicate: bool,
    pub correlation_id: Option<String>,
}

impl ActionRequest {
    #[must_use]
    pub fn new(agent_id: impl Into<String>, action_type: ActionType, working_dir: PathBuf) -> Self {
        Self {
            agent_id: agent_id.into(),
            authorized_by: None,
            action_type,
            working_dir,
            payload: Map::new(),
            idempotency_key: None,
            allow_duplicate: false,
            correlation_id: None,
        }
    }

    #[must_use]
    pub fn with_authorized_by(mut self, authorized_by: impl Into<String>) -> Self {
        self.authorized_by = Some(authorized_by.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Does `requester` satisfy chief authorization for this request?
    #[must_use]
    pub fn is_authorized_for(&self, chief: &str) -> bool {
        self.agent_id == chief || self.authorized_by.as_deref() == Some(chief)
    }
}

/// The outcome of a gateway invocation, whether allowed or denied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub allowed: bool,
    pub reason: String,
    pub return_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub result: Map<String, Value>,
    pub audit_id: i64,
}

/// Tool Gateway configuration: the chief agent and the command whitelist.
/// Timeout and concurrency are governed separately by
/// [`hiveguard_executor::ExecutorConfig`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub chief_agent: String,
    /// Each entry is an allowed argv prefix, e.g. `["git", "status"]`.
    pub command_whitelist: Vec<Vec<String>>,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(chief_agent: impl Into<String>) -> Self {
        Self {
            chief_agent: chief_agent.into(),
            command_whitelist: default_whitelist(),
        }
    }
}

fn default_whitelist() -> Vec<Vec<String>> {
    [
        "git status",
        "git diff",
        "git add",
        "git commit",
        "git apply",
        "pytest",
        "python -m pytest",
    ]
    .into_iter()
    .map(|s| s.split_whitespace().map(str::to_owned).collect())
    .collect()
}
