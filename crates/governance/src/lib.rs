mod arbitration;
mod config;
mod engine;
mod error;
mod ledger_store;
mod outcomes;
mod reconstruct;
mod relationship;
mod replay;
mod stability;
mod water_cooler;

pub use arbitration::{arbitrate, ArbitrationOutcome, Ballot, VoteDetail};
pub use config::GovernanceConfig;
pub use engine::{GovernanceEngine, IngestReport};
pub use error::GovernanceError;
pub use ledger_store::LedgerFile;
pub use outcomes::{derive_outcomes, Outcome, OutcomeEvent};
pub use reconstruct::reconstruct_registry;
pub use relationship::{apply_outcome, authority_band};
pub use replay::{run_replay, AgentSeed, ReplayReport};
pub use stability::{population_variance, stability_metric};
pub use water_cooler::{maybe_propagate, LessonRecord};
