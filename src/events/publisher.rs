//! Publisher abstraction over `EventFabric` (spec §4.1, C1).
//!
//! Mirrors the vault's `ExecutionAdapter` trait: services depend on the
//! trait object so they can be exercised against an in-memory double in
//! tests instead of a live broker connection.

use std::sync::Arc;

use super::envelope::Envelope;

#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: &Envelope) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl EventPublisher for super::fabric::EventFabric {
    async fn publish(&self, envelope: &Envelope) -> anyhow::Result<()> {
        super::fabric::EventFabric::publish(self, envelope).await
    }
}

#[async_trait::async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, envelope: &Envelope) -> anyhow::Result<()> {
        T::publish(self, envelope).await
    }
}
