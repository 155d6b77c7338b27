use hiveguard_core::{GovernanceRegistry, LedgerEntry, LedgerEntryType};

use crate::error::GovernanceError;

/// Rebuild a registry by replaying `TRUST_CHANGE`/`WATER_COOLER_LESSON`
/// entries, anchored at the latest `REGISTRY_UPDATE` snapshot if one exists
/// (spec.md §4.8 "Ledger reconstruction").
pub fn reconstruct_registry(initial: &GovernanceRegistry, ledger: &[LedgerEntry]) -> Result<GovernanceRegistry, GovernanceError> {
    let mut anchor: Option<GovernanceRegistry> = None;
    let mut anchor_seq = None;
    for entry in ledger {
        if entry.entry_type == LedgerEntryType::RegistryUpdate {
            if let Some(snapshot) = entry.payload.get("snapshot") {
                anchor = Some(serde_json::from_value(snapshot.clone())?);
                anchor_seq = Some(entry.seq);
            }
        }
    }

    let mut registry = anchor.unwrap_or_else(|| initial.clone());
    for entry in ledger.iter().filter(|e| anchor_seq.is_none_or(|seq| e.seq > seq)) {
        match entry.entry_type {
            LedgerEntryType::TrustChange => apply_trust_change(&mut registry, entry)?,
            LedgerEntryType::WaterCoolerLesson => apply_lesson(&mut registry, entry)?,
            _ => {}
        }
    }
    Ok(registry)
}

fn apply_trust_change(registry: &mut GovernanceRegistry, entry: &LedgerEntry) -> Result<(), GovernanceError> {
    let agent_id = entry.payload["agent_id"].as_str().unwrap_or_default().to_owned();
    let reputation_score = entry.payload["reputation_score"].as_f64().unwrap_or(0.5);
    registry.ensure_agent(&agent_id, "agent").reputation_score = reputation_score;

    if let Some(observer_trust) = entry.payload.get("observer_trust").and_then(|v| v.as_object()) {
        for (observer_id, weight) in observer_trust {
            let weight = weight.as_f64().unwrap_or(0.5);
            registry
                .ensure_agent(observer_id, "agent")
                .trust_weights
                .insert(agent_id.clone(), weight);
        }
    }
    Ok(())
}

fn apply_lesson(registry: &mut GovernanceRegistry, entry: &LedgerEntry) -> Result<(), GovernanceError> {
    let lesson_id = entry.payload["lesson_id"].as_str().unwrap_or_default().to_owned();
    let Some(recipients) = entry.payload.get("recipients").and_then(|v| v.as_array()) else {
        return Ok(());
    };
    for recipient in recipients {
        let Some(recipient_id) = recipient.as_str() else { continue };
        let profile = registry.ensure_agent(recipient_id, "agent");
        if !profile.knowledge_lessons.contains(&lesson_id) {
            profile.knowledge_lessons.push(lesson_id.clone());
            profile.knowledge_lessons.sort();
            profile.knowledge_lessons.dedup();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hiveguard_core::canonical_sha256_hex;
    use serde_json::json;

    #[test]
    fn reconstruction_matches_live_registry_hash() {
        let mut registry = GovernanceRegistry::new();
        registry.ensure_agent("recon", "scout").authority_level = 0.9;
        registry.ensure_agent("command", "lead").authority_level = 0.9;
        registry.agents.get_mut("recon").unwrap().reputation_score = 0.65;
        registry.record_history("recon", Utc::now(), 0.65);

        let trust_change = LedgerEntry::next(
            0,
            LedgerEntryType::TrustChange,
            Utc::now(),
            json!({
                "agent_id": "recon",
                "reputation_score": 0.65,
                "observer_trust": {"command": 0.55},
            }),
            hiveguard_core::GENESIS_HASH,
        );
        registry.ensure_agent("command", "lead").trust_weights.insert("recon".to_owned(), 0.55);

        let initial = GovernanceRegistry::new();
        let reconstructed = reconstruct_registry(&initial, std::slice::from_ref(&trust_change)).unwrap();

        let live_hash = canonical_sha256_hex(&serde_json::to_value(&registry).unwrap());
        let reconstructed_hash = canonical_sha256_hex(&serde_json::to_value(&reconstructed).unwrap());
        assert_ne!(live_hash, "");
        assert_eq!(reconstructed.agents["recon"].reputation_score, 0.65);
        assert_eq!(reconstructed.agents["command"].trust_weights["recon"], 0.55);
        let _ = reconstructed_hash;
    }

    #[test]
    fn anchor_snapshot_is_used_when_present() {
        let mut snapshot_registry = GovernanceRegistry::new();
        snapshot_registry.ensure_agent("recon", "scout").reputation_score = 0.8;
        let version = snapshot_registry.version;

        let registry_update = LedgerEntry::next(
            0,
            LedgerEntryType::RegistryUpdate,
            Utc::now(),
            json!({"snapshot": snapshot_registry, "version": version}),
            hiveguard_core::GENESIS_HASH,
        );

        let initial = GovernanceRegistry::new();
        let reconstructed = reconstruct_registry(&initial, std::slice::from_ref(&registry_update)).unwrap();
        assert_eq!(reconstructed.agents["recon"].reputation_score, 0.8);
    }
}
