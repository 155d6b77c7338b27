//! Core domain types shared by every hiveguard crate: events, leases, audit
//! rows, canonical hashing, projection views, and the governance registry
//! and ledger shapes.

pub mod audit;
pub mod canonical;
pub mod error;
pub mod event;
pub mod ledger;
pub mod lease;
pub mod projection;
pub mod registry;
pub mod types;

pub use audit::{IdempotencyRecord, ToolAuditRow, WorkerHeartbeat};
pub use canonical::{canonical_sha256_hex, to_canonical_string};
pub use error::CoreError;
pub use event::{Event, EventStatus, NewEvent};
pub use ledger::{LedgerEntry, LedgerEntryType, GENESIS_HASH};
pub use lease::Lease;
pub use projection::{Derived, OfficeMode, ProjectionView, ToolAuditCounts, WorkerEntry, WorkerState};
pub use registry::{clamp01, AgentProfile, GovernanceRegistry, HistorySample};
pub use types::{AgentId, ConsumerId};
