//! Event Fabric contracts (spec §4.1, C1).

pub mod envelope;
pub mod fabric;
pub mod idempotency;
pub mod publisher;
pub mod routing;

pub use envelope::{Envelope, Headers};
pub use fabric::EventFabric;
pub use idempotency::IdempotencyStore;
pub use publisher::EventPublisher;
pub use routing::{Exchange, RoutingKey};
