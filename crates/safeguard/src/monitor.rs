use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::SafeguardConfig;
use crate::error::SafeguardError;

/// Per-`action_key` retry/cooldown bookkeeping (spec.md §4.10 point iv).
#[derive(Debug, Clone, Default)]
struct ActionKeyState {
    retry_count: u32,
    cooldown_until: Option<DateTime<Utc>>,
}

/// The outcome of one [`SafeguardMonitor::check`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeguardDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl SafeguardDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Independent of the Tool Gateway: the legacy gate single-process setups
/// use to check external actions before performing them (spec.md §4.10).
pub struct SafeguardMonitor {
    config: SafeguardConfig,
    state: Mutex<HashMap<String, ActionKeyState>>,
}

impl SafeguardMonitor {
    #[must_use]
    pub fn new(config: SafeguardConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate a proposed action against whitelist, simulation, payload
    /// scan, and cooldown policy, in that order.
    pub fn check(&self, action_key: &str, endpoint: &str, method: &str, payload: &Map<String, Value>) -> Result<SafeguardDecision, SafeguardError> {
        if action_key.trim().is_empty() {
            return Err(SafeguardError::EmptyActionKey);
        }

        if !self.config.endpoint_whitelist.iter().any(|e| e == endpoint) {
            return Ok(SafeguardDecision::deny(format!("endpoint {endpoint} is not whitelisted")));
        }

        if !self.config.allow_real_world_impact && !self.config.simulated_methods.iter().any(|m| m == method) {
            return Ok(SafeguardDecision::deny(format!(
                "method {method} is not permitted outside simulation"
            )));
        }

        if let Some(keyword) = scan_for_monetary_keywords(payload, &self.config.monetary_keywords) {
            return Ok(SafeguardDecision::deny(format!("payload references monetary keyword '{keyword}'")));
        }
        if let Some(field) = scan_for_shell_fields(payload, &self.config.shell_field_names) {
            return Ok(SafeguardDecision::deny(format!("payload carries shell-like field '{field}'")));
        }

        let now = Utc::now();
        let mut state = self.state.lock().expect("safeguard state mutex poisoned");
        let entry = state.entry(action_key.to_owned()).or_default();
        if let Some(cooldown_until) = entry.cooldown_until {
            if now < cooldown_until {
                return Ok(SafeguardDecision::deny(format!("action key {action_key} is in cooldown until {cooldown_until}")));
            }
        }

        Ok(SafeguardDecision::allow())
    }

    /// Record the outcome of a previously-allowed action, advancing the
    /// retry counter and entering cooldown once `retry_max` is reached.
    pub fn record_result(&self, action_key: &str, success: bool) {
        let mut state = self.state.lock().expect("safeguard state mutex poisoned");
        let entry = state.entry(action_key.to_owned()).or_default();
        if success {
            entry.retry_count = 0;
            entry.cooldown_until = None;
            return;
        }

        entry.retry_count += 1;
        if entry.retry_count >= self.config.retry_max {
            let cooldown_until = Utc::now() + chrono::Duration::seconds(self.config.cooldown_seconds);
            warn!(action_key, %cooldown_until, "safeguard cooldown engaged");
            entry.cooldown_until = Some(cooldown_until);
        }
    }
}

fn scan_for_monetary_keywords(payload: &Map<String, Value>, keywords: &[String]) -> Option<String> {
    let haystack = payload_text(payload).to_lowercase();
    keywords.iter().find(|kw| haystack.contains(kw.to_lowercase().as_str())).cloned()
}

fn scan_for_shell_fields(payload: &Map<String, Value>, field_names: &[String]) -> Option<String> {
    field_names.iter().find(|f| payload.contains_key(f.as_str())).cloned()
}

fn payload_text(payload: &Map<String, Value>) -> String {
    let mut out = String::new();
    for (key, value) in payload {
        out.push_str(key);
        out.push(' ');
        collect_value_text(value, &mut out);
    }
    out
}

fn collect_value_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_value_text(v, out)),
        Value::Object(map) => {
            for (k, v) in map {
                out.push_str(k);
                out.push(' ');
                collect_value_text(v, out);
            }
        }
        _ => {}
    }
}
