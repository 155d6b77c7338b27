pub mod run_governance;
pub mod run_projector;
pub mod run_replay;
pub mod run_supervisor;
pub mod run_worker;
