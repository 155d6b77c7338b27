use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-bounded exclusive claim on a pending event by a consumer id.
///
/// Invariant (spec.md §3): a lease's presence for event `E` is equivalent to
/// `E.status == Claimed`. A lease with `lease_expiry <= now` is expired and
/// must be reaped before any further claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub event_id: i64,
    pub claimed_by: String,
    pub claim_ts: DateTime<Utc>,
    pub lease_expiry: DateTime<Utc>,
}

impl Lease {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.lease_expiry <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn lease_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let lease = Lease {
            event_id: 1,
            claimed_by: "worker:recon:1".into(),
            claim_ts: now - Duration::seconds(30),
            lease_expiry: now,
        };
        assert!(lease.is_expired(now));
    }

    #[test]
    fn lease_not_yet_expired() {
        let now = Utc::now();
        let lease = Lease {
            event_id: 1,
            claimed_by: "worker:recon:1".into(),
            claim_ts: now,
            lease_expiry: now + Duration::seconds(30),
        };
        assert!(!lease.is_expired(now));
    }
}
