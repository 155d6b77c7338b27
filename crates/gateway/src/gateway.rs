use std::process::Stdio;

use hiveguard_executor::{DeadLetterEntry, DeadLetterQueue, ExecutorConfig};
use hiveguard_store::MailStore;
use hiveguard_workspace::WorkspaceManager;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::policy;
use crate::tokenizer;
use crate::types::{ActionRequest, ActionResult, ActionType, GatewayConfig};

/// The single choke point through which a process may perform an external
/// side effect (spec.md §4.4).
pub struct ToolGateway {
    store: MailStore,
    workspace: WorkspaceManager,
    config: GatewayConfig,
    executor: ExecutorConfig,
    concurrency: Semaphore,
    dlq: DeadLetterQueue,
}

impl ToolGateway {
    #[must_use]
    pub fn new(store: MailStore, workspace: WorkspaceManager, config: GatewayConfig) -> Self {
        Self::with_executor_config(store, workspace, config, ExecutorConfig::default())
    }

    #[must_use]
    pub fn with_executor_config(store: MailStore, workspace: WorkspaceManager, config: GatewayConfig, executor: ExecutorConfig) -> Self {
        let concurrency = Semaphore::new(executor.max_concurrent);
        Self {
            store,
            workspace,
            config,
            executor,
            concurrency,
            dlq: DeadLetterQueue::new(),
        }
    }

    /// Transient execution failures (timeout, spawn error) held for the
    /// caller to inspect and possibly re-enqueue (spec.md §7).
    #[must_use]
    pub fn dead_letters(&self) -> &DeadLetterQueue {
        &self.dlq
    }

    /// Run the full preflight-then-execute pipeline, writing exactly one
    /// audit row regardless of outcome (spec.md §4.4).
    pub async fn execute(&self, req: ActionRequest) -> Result<ActionResult, GatewayError> {
        match self.preflight(&req).await? {
            Err(reason) => self.deny(&req, &reason).await,
            Ok(resolved_argv) => self.perform(&req, resolved_argv).await,
        }
    }

    /// Runs every mechanical policy check in spec order. Returns `Ok(Err(reason))`
    /// for a policy denial (still requires an audit row) and `Ok(Ok(argv))` once
    /// every check has passed, where `argv` is populated only for `RUN_CMD`.
    async fn preflight(&self, req: &ActionRequest) -> Result<Result<Option<Vec<String>>, String>, GatewayError> {
        if matches!(req.action_type, ActionType::OpenPr) {
            return Ok(Err("OPEN_PR is not implemented".to_owned()));
        }

        let workspace_root = match self.workspace.worktree_for(&req.agent_id) {
            Ok(root) => root,
            Err(e) => return Ok(Err(format!("no registered workspace for {}: {e}", req.agent_id))),
        };

        if let Err(reason) = policy::check_working_dir(&req.working_dir, &workspace_root) {
            return Ok(Err(reason));
        }

        if req.action_type.is_mutating() && !req.is_authorized_for(&self.config.chief_agent) {
            return Ok(Err(format!(
                "action requires chief ({}) authorization",
                self.config.chief_agent
            )));
        }

        if matches!(req.action_type, ActionType::WriteFile | ActionType::ReadFile) {
            if let Some(path) = req.payload.get("path").and_then(Value::as_str) {
                if let Err(reason) = policy::resolve_within(&req.working_dir, path) {
                    return Ok(Err(reason));
                }
            } else {
                return Ok(Err("payload.path is required".to_owned()));
            }
        }

        let argv = match req.action_type {
            ActionType::RunCmd => {
                let argv = match self.resolve_argv(req) {
                    Ok(argv) => argv,
                    Err(reason) => return Ok(Err(reason)),
                };
                if !tokenizer::matches_whitelist(&argv, &self.config.command_whitelist) {
                    return Ok(Err(format!("command `{}` is not on the whitelist", argv.join(" "))));
                }
                Some(argv)
            }
            ActionType::GitCommit => {
                let message = req
                    .payload
                    .get("message")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "payload.message is required".to_owned());
                let message = match message {
                    Ok(m) => m,
                    Err(reason) => return Ok(Err(reason)),
                };
                Some(vec!["git".into(), "commit".into(), "-am".into(), message.to_owned()])
            }
            ActionType::GitDiff => Some(vec!["git".into(), "diff".into()]),
            _ => None,
        };

        if let Some(key) = req.idempotency_key.as_deref() {
            if key.is_empty() {
                return Ok(Err("idempotency_key must not be empty".to_owned()));
            }
            let existing = self.store.get_idempotency_record(key).await?;
            if existing.is_some() && !req.allow_duplicate {
                return Ok(Err("duplicate idempotency_key".to_owned()));
            }
            let reserved = self
                .store
                .reserve_idempotency_key(key, &req.agent_id, &req.action_type.to_string(), None)
                .await?;
            if !reserved {
                return Ok(Err("duplicate idempotency_key".to_owned()));
            }
        } else {
            return Ok(Err("idempotency_key is required".to_owned()));
        }

        Ok(Ok(argv))
    }

    fn resolve_argv(&self, req: &ActionRequest) -> Result<Vec<String>, String> {
        if let Some(Value::Array(items)) = req.payload.get("argv") {
            let argv = items
                .iter()
                .map(|v| v.as_str().map(str::to_owned).ok_or_else(|| "argv entries must be strings".to_owned()))
                .collect::<Result<Vec<String>, String>>()?;
            for token in &argv {
                if token.trim().is_empty() {
                    return Err("argv entries must not be empty".to_owned());
                }
                if let Some(bad) = token.chars().find(|c| tokenizer::FORBIDDEN.contains(c)) {
                    return Err(format!("disallowed shell metacharacter `{bad}` in token `{token}`"));
                }
            }
            return Ok(argv);
        }
        if let Some(command) = req.payload.get("command").and_then(Value::as_str) {
            return tokenizer::tokenize(command);
        }
        Err("RUN_CMD requires payload.argv or payload.command".to_owned())
    }

    async fn deny(&self, req: &ActionRequest, reason: &str) -> Result<ActionResult, GatewayError> {
        warn!(agent_id = %req.agent_id, action = %req.action_type, reason, "gateway denied action");
        let audit_id = self
            .store
            .append_tool_audit(
                &req.agent_id,
                &req.action_type.to_string(),
                &req.working_dir.display().to_string(),
                req.idempotency_key.as_deref(),
                false,
                reason,
                req.payload.clone(),
                None,
                req.correlation_id.as_deref(),
            )
            .await?;
        Ok(ActionResult {
            allowed: false,
            reason: reason.to_owned(),
            return_code: None,
            stdout: None,
            stderr: None,
            result: Map::new(),
            audit_id,
        })
    }

    async fn perform(&self, req: &ActionRequest, argv: Option<Vec<String>>) -> Result<ActionResult, GatewayError> {
        let (return_code, stdout, stderr, result) = match req.action_type {
            ActionType::RunCmd | ActionType::GitDiff | ActionType::GitCommit => {
                let argv = argv.expect("argv resolved during preflight");
                self.run_command(req, &argv).await?
            }
            ActionType::WriteFile => {
                let path = req
                    .payload
                    .get("path")
                    .and_then(Value::as_str)
                    .expect("validated during preflight");
                let content = req.payload.get("content").and_then(Value::as_str).unwrap_or_default();
                let resolved = policy::resolve_within(&req.working_dir, path).expect("validated during preflight");
                match std::fs::write(&resolved, content) {
                    Ok(()) => (Some(0), None, None, Map::new()),
                    Err(e) => (Some(1), None, Some(e.to_string()), Map::new()),
                }
            }
            ActionType::ReadFile => {
                let path = req
                    .payload
                    .get("path")
                    .and_then(Value::as_str)
                    .expect("validated during preflight");
                let resolved = policy::resolve_within(&req.working_dir, path).expect("validated during preflight");
                match std::fs::read_to_string(&resolved) {
                    Ok(content) => {
                        let mut result = Map::new();
                        result.insert("content".into(), Value::String(content));
                        (Some(0), None, None, result)
                    }
                    Err(e) => (Some(1), None, Some(e.to_string()), Map::new()),
                }
            }
            ActionType::OpenPr => unreachable!("rejected during preflight"),
        };

        let reason = "allowed".to_owned();
        info!(agent_id = %req.agent_id, action = %req.action_type, return_code, "gateway executed action");

        let mut result_map = result.clone();
        result_map.insert("return_code".into(), Value::from(return_code));
        if let Some(ref key) = req.idempotency_key {
            self.store.set_idempotency_result(key, result_map.clone()).await?;
        }

        let audit_id = self
            .store
            .append_tool_audit(
                &req.agent_id,
                &req.action_type.to_string(),
                &req.working_dir.display().to_string(),
                req.idempotency_key.as_deref(),
                true,
                &reason,
                req.payload.clone(),
                Some(result_map.clone()),
                req.correlation_id.as_deref(),
            )
            .await?;

        Ok(ActionResult {
            allowed: true,
            reason,
            return_code,
            stdout,
            stderr,
            result: result_map,
            audit_id,
        })
    }

    async fn run_command(
        &self,
        req: &ActionRequest,
        argv: &[String],
    ) -> Result<(Option<i32>, Option<String>, Option<String>, Map<String, Value>), GatewayError> {
        let _permit = self.concurrency.acquire().await.expect("concurrency semaphore never closed");

        let mut cmd = tokio::process::Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(&req.working_dir)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }

        let output = tokio::time::timeout(self.executor.command_timeout, cmd.output()).await;
        match output {
            Ok(Ok(output)) => Ok((
                output.status.code(),
                Some(String::from_utf8_lossy(&output.stdout).into_owned()),
                Some(String::from_utf8_lossy(&output.stderr).into_owned()),
                Map::new(),
            )),
            Ok(Err(e)) => {
                self.push_dead_letter(req, e.to_string()).await;
                Err(GatewayError::Spawn(e))
            }
            Err(_) => {
                self.push_dead_letter(req, "command timed out".to_owned()).await;
                Ok((None, None, Some("command timed out".to_owned()), Map::new()))
            }
        }
    }

    async fn push_dead_letter(&self, req: &ActionRequest, error: String) {
        self.dlq.push(DeadLetterEntry {
            agent_id: req.agent_id.clone(),
            action_type: req.action_type.to_string(),
            idempotency_key: req.idempotency_key.clone(),
            payload: req.payload.clone(),
            error,
            attempts: 1,
            timestamp: chrono::Utc::now(),
        });
    }
}
