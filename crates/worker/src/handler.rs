use async_trait::async_trait;
use hiveguard_core::Event;

/// An agent-provided handler for one domain-specific event type (spec.md
/// §4.6, §9: "per-agent handlers via attribute dispatch become a registry
/// `map[string]func(event) error`").
#[async_trait]
pub trait DomainHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), String>;
}

#[async_trait]
impl<F> DomainHandler for F
where
    F: Fn(&Event) -> Result<(), String> + Send + Sync,
{
    async fn handle(&self, event: &Event) -> Result<(), String> {
        self(event)
    }
}
