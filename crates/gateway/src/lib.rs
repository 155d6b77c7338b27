//! The Tool Gateway: the single choke point through which any process may
//! perform an external side effect, enforcing policy, idempotency, and
//! audit (spec.md §4.4).

mod error;
mod gateway;
mod policy;
mod tokenizer;
mod types;

pub use error::GatewayError;
pub use gateway::ToolGateway;
pub use types::{ActionRequest, ActionResult, ActionType, GatewayConfig};
