//! CreateCheckoutSession / ConfirmPayment orchestration (spec §4.3, C3/C4).

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{Order, OrderItem};
use crate::domain::{Address, CheckoutSession, Money, ShoppingCart};
use crate::error::{AppError, DomainError};
use crate::events::{Envelope, EventFabric, RoutingKey};

use super::cart_store::CartStore;
use super::order_repository::OrderRepository;
use super::payment_service::PaymentService;
use super::session_store::SessionStore;

pub struct CheckoutService {
    session_store: Arc<SessionStore>,
    cart_store: Arc<CartStore>,
    order_repo: Arc<OrderRepository>,
    payment_service: Arc<PaymentService>,
    fabric: Arc<EventFabric>,
    platform_fee_pct: rust_decimal::Decimal,
    session_ttl_minutes: i64,
}

impl CheckoutService {
    pub fn new(
        session_store: Arc<SessionStore>,
        cart_store: Arc<CartStore>,
        order_repo: Arc<OrderRepository>,
        payment_service: Arc<PaymentService>,
        fabric: Arc<EventFabric>,
        platform_fee_pct: rust_decimal::Decimal,
        session_ttl_minutes: i64,
    ) -> Self {
        Self {
            session_store,
            cart_store,
            order_repo,
            payment_service,
            fabric,
            platform_fee_pct,
            session_ttl_minutes,
        }
    }

    /// §4.3 CreateCheckoutSession: snapshot the cart into per-seller
    /// allocations with fee/payout splits, persist with a TTL, return it.
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        delivery_address: Address,
    ) -> Result<CheckoutSession, AppError> {
        let cart: ShoppingCart = self.cart_store.load(customer_id).await.map_err(|e| AppError::unexpected(e.to_string()))?;

        let session = CheckoutSession::build(
            customer_id,
            &cart,
            delivery_address,
            self.platform_fee_pct,
            self.session_ttl_minutes,
        )?;
        session.check_invariants()?;

        self.session_store.save(&session).await?;
        Ok(session)
    }

    /// §4.3/§4.4 ConfirmPayment: load the session, materialize an Order from
    /// its allocations, attempt settlement via PaymentService, and on success
    /// transition the order Pending -> Paid, clear the cart, delete the
    /// session, and return the domain event for the caller to publish.
    pub async fn confirm_payment(
        &self,
        session_id: Uuid,
        customer_id: &str,
    ) -> Result<Order, AppError> {
        let session = self
            .session_store
            .load(session_id)
            .await?
            .ok_or(AppError::from(DomainError::SessionExpired))?;

        if session.is_expired(chrono::Utc::now()) {
            self.session_store.delete(session_id).await?;
            return Err(AppError::from(DomainError::SessionExpired));
        }
        if session.customer_id != customer_id {
            return Err(AppError::auth_failure("session does not belong to this customer"));
        }

        let mut order_items = Vec::new();
        for alloc in &session.allocations {
            for item in &alloc.items {
                order_items.push(OrderItem::new(
                    item.isbn.clone(),
                    item.seller_id.clone(),
                    item.quantity,
                    item.unit_price.clone(),
                )?);
            }
        }

        let order = Order::new(customer_id, session.delivery_address.clone(), order_items)?;
        self.order_repo
            .insert(&order)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))?;

        let correlation_id = Uuid::new_v4();
        let envelope = Envelope::wrap(
            RoutingKey::OrderCreated,
            correlation_id,
            &serde_json::json!({ "orderId": order.id, "customerId": order.customer_id }),
        )
        .map_err(|e| AppError::unexpected(e.to_string()))?;
        self.fabric
            .publish(&envelope)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let total = order.total_amount.clone();
        self.payment_service
            .settle_order(&order, &session, correlation_id)
            .await?;

        let mut paid_order = order;
        let expected_version = paid_order.version;
        let event = paid_order.process_payment(&total)?;
        self.order_repo
            .update_with_version_check(&paid_order, expected_version)
            .await?;

        let paid_envelope = Envelope::wrap(
            RoutingKey::OrderPaid,
            correlation_id,
            &event,
        )
        .map_err(|e| AppError::unexpected(e.to_string()))?;
        self.fabric
            .publish(&paid_envelope)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        self.cart_store
            .clear(customer_id)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        self.session_store.delete(session_id).await?;

        Ok(paid_order)
    }
}
