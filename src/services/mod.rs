//! Service-layer orchestration: persistence-backed use cases wrapping the
//! pure domain model (spec §4.2–§4.4, §4.7, §4.8).

pub mod cart_store;
pub mod checkout_service;
pub mod compensation_orchestrator;
pub mod cross_service_sync;
pub mod notification_dispatcher;
pub mod order_repository;
pub mod order_service;
pub mod payment_service;
pub mod session_store;

pub use cart_store::CartStore;
pub use checkout_service::CheckoutService;
pub use compensation_orchestrator::CompensationOrchestrator;
pub use cross_service_sync::CrossServiceSync;
pub use notification_dispatcher::NotificationDispatcher;
pub use order_repository::OrderRepository;
pub use order_service::OrderService;
pub use payment_service::PaymentService;
pub use session_store::SessionStore;
