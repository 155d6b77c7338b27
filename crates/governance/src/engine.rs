use std::path::PathBuf;

use chrono::Utc;
use hiveguard_core::{canonical_sha256_hex, GovernanceRegistry, LedgerEntryType, ProjectionView};
use serde_json::json;
use tracing::info;

use crate::arbitration::{arbitrate, ArbitrationOutcome, Ballot};
use crate::config::GovernanceConfig;
use crate::error::GovernanceError;
use crate::ledger_store::LedgerFile;
use crate::outcomes::derive_outcomes;
use crate::relationship::apply_outcome;
use crate::stability::stability_metric;
use crate::water_cooler::maybe_propagate;

/// Summary of one `ingest` cycle, useful for CLI reporting.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub outcomes_applied: usize,
    pub lesson_emitted: bool,
    pub stability: f64,
    pub registry_version: u64,
    pub chain_valid: bool,
}

/// Deterministic, pure-function-over-state governance engine (spec.md
/// §4.8). Owns the registry and the append-only ledger; every public
/// mutator appends to the ledger before returning.
pub struct GovernanceEngine {
    registry: GovernanceRegistry,
    ledger: LedgerFile,
    config: GovernanceConfig,
}

impl GovernanceEngine {
    pub fn open(registry_path: impl Into<PathBuf>, ledger_path: impl Into<PathBuf>, config: GovernanceConfig) -> Result<Self, GovernanceError> {
        let registry_path = registry_path.into();
        let registry = match std::fs::read(&registry_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => GovernanceRegistry::new(),
            Err(source) => {
                return Err(GovernanceError::Io {
                    path: registry_path,
                    source,
                });
            }
        };
        let ledger = LedgerFile::open(ledger_path)?;
        Ok(Self {
            registry,
            ledger,
            config,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &GovernanceRegistry {
        &self.registry
    }

    /// Mutable access to the registry, e.g. to seed agent definitions before
    /// the first `ingest` call.
    pub fn registry_mut(&mut self) -> &mut GovernanceRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn ledger(&self) -> &LedgerFile {
        &self.ledger
    }

    pub fn persist_registry(&self, registry_path: impl Into<PathBuf>) -> Result<(), GovernanceError> {
        let path = registry_path.into();
        let bytes = serde_json::to_vec_pretty(&self.registry)?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes).map_err(|source| GovernanceError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| GovernanceError::Io { path, source })
    }

    /// Ingest one projection-view delta: derive outcomes, update
    /// reputations, maybe propagate a lesson, snapshot the registry, and
    /// record the stability metric (spec.md §4.8 steps 1-5).
    pub fn ingest(&mut self, previous: &ProjectionView, current: &ProjectionView) -> Result<IngestReport, GovernanceError> {
        let now = Utc::now();
        let outcomes = derive_outcomes(previous, current);
        for outcome in &outcomes {
            let payload = apply_outcome(&mut self.registry, outcome, &self.config, now);
            self.ledger.append(LedgerEntryType::TrustChange, payload)?;
        }

        let lesson = maybe_propagate(&mut self.registry, current, &self.config);
        if let Some(lesson) = &lesson {
            self.ledger.append(
                LedgerEntryType::WaterCoolerLesson,
                json!({
                    "lesson_id": lesson.lesson_id,
                    "source_agent": lesson.source_agent,
                    "recipients": lesson.recipients,
                    "propagation_metric": lesson.propagation_metric,
                }),
            )?;
        }

        let snapshot_hash = canonical_sha256_hex(&serde_json::to_value(&self.registry)?);
        self.ledger.append(
            LedgerEntryType::RegistryUpdate,
            json!({
                "version": self.registry.version,
                "snapshot": self.registry,
                "snapshot_hash": snapshot_hash,
            }),
        )?;

        let stability = stability_metric(&self.registry, self.config.stability_window);
        self.ledger.append(
            LedgerEntryType::TrustStabilityMetric,
            json!({"metric": stability, "agents": self.registry.agents.len()}),
        )?;

        info!(
            outcomes = outcomes.len(),
            lesson_emitted = lesson.is_some(),
            stability,
            "governance ingest cycle complete"
        );

        Ok(IngestReport {
            outcomes_applied: outcomes.len(),
            lesson_emitted: lesson.is_some(),
            stability,
            registry_version: self.registry.version,
            chain_valid: self.ledger.verify_chain(),
        })
    }

    /// Run a boardroom arbitration and append its outcome to the ledger.
    pub fn arbitrate(&mut self, target: &str, ballots: &[Ballot]) -> Result<ArbitrationOutcome, GovernanceError> {
        let outcome = arbitrate(&self.registry, target, ballots, self.config.arbitration_threshold);
        self.ledger.append(LedgerEntryType::ArbitrationOutcome, outcome.to_ledger_payload())?;
        Ok(outcome)
    }

    /// Whether the live ledger chain currently verifies.
    #[must_use]
    pub fn chain_valid(&self) -> bool {
        self.ledger.verify_chain()
    }

    /// The canonical hash of the live registry, for comparison against the
    /// hash recorded in the latest `REGISTRY_UPDATE` entry.
    #[must_use]
    pub fn registry_hash(&self) -> String {
        canonical_sha256_hex(&serde_json::to_value(&self.registry).expect("registry always serializes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveguard_core::{Event, EventStatus};
    use serde_json::Map;

    fn view_with_event(last_seen_event_id: i64, event_type: &str, origin_id: &str) -> ProjectionView {
        let mut view = ProjectionView::default();
        view.last_seen_event_id = last_seen_event_id;
        view.current_event = Some(Event {
            id: last_seen_event_id,
            timestamp: Utc::now(),
            event_type: event_type.to_owned(),
            origin_id: origin_id.to_owned(),
            target_agent: None,
            correlation_id: None,
            payload: Map::new(),
            justification: None,
            status: EventStatus::Done,
            error: None,
        });
        view
    }

    #[test]
    fn ingest_appends_trust_change_and_registry_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = GovernanceEngine::open(
            dir.path().join("registry.json"),
            dir.path().join("ledger.jsonl"),
            GovernanceConfig::default(),
        )
        .unwrap();

        let previous = ProjectionView::default();
        let current = view_with_event(1, "WORKER_STARTED", "recon");
        let report = engine.ingest(&previous, &current).unwrap();

        assert_eq!(report.outcomes_applied, 1);
        assert!(report.chain_valid);
        assert!(engine.ledger().entries().len() >= 2);
    }

    #[test]
    fn registry_hash_matches_latest_registry_update_snapshot_hash() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = GovernanceEngine::open(
            dir.path().join("registry.json"),
            dir.path().join("ledger.jsonl"),
            GovernanceConfig::default(),
        )
        .unwrap();

        let previous = ProjectionView::default();
        let current = view_with_event(1, "WORKER_STARTED", "recon");
        engine.ingest(&previous, &current).unwrap();

        let last_registry_update = engine
            .ledger()
            .entries()
            .iter()
            .rev()
            .find(|e| e.entry_type == LedgerEntryType::RegistryUpdate)
            .unwrap();
        let recorded_hash = last_registry_update.payload["snapshot_hash"].as_str().unwrap();
        assert_eq!(recorded_hash, engine.registry_hash());
    }

    #[test]
    fn arbitrate_appends_ledger_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = GovernanceEngine::open(
            dir.path().join("registry.json"),
            dir.path().join("ledger.jsonl"),
            GovernanceConfig::default(),
        )
        .unwrap();
        engine.registry.ensure_agent("command", "lead").authority_level = 0.9;
        engine.registry.ensure_agent("supervisor", "lead").authority_level = 1.0;

        let ballots = vec![
            Ballot { voter: "supervisor".into(), reasoning_score: 0.9 },
            Ballot { voter: "command".into(), reasoning_score: 0.5 },
        ];
        let outcome = engine.arbitrate("command", &ballots).unwrap();
        assert!(engine
            .ledger()
            .entries()
            .iter()
            .any(|e| e.entry_type == LedgerEntryType::ArbitrationOutcome));
        assert_eq!(outcome.target, "command");
    }
}
