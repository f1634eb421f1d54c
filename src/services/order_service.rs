//! Order lifecycle orchestration (spec §4.2, C2).
//!
//! Each public method loads the aggregate, applies a domain transition,
//! persists with the optimistic-concurrency check, and returns the domain
//! event for the caller to publish to the event fabric AFTER the commit
//! succeeds — mirroring the commit-then-publish discipline the aggregate's
//! own doc comment calls out.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{Order, OrderDomainEvent};
use crate::domain::Money;
use crate::error::{AppError, DomainError};

use super::order_repository::OrderRepository;

pub struct OrderService {
    repo: Arc<OrderRepository>,
}

impl OrderService {
    pub fn new(repo: Arc<OrderRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, order: Order) -> Result<Order, AppError> {
        self.repo
            .insert(&order)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))?;
        Ok(order)
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Order, AppError> {
        self.repo
            .load(order_id)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("order {order_id} not found")))
    }

    async fn apply<F>(&self, order_id: Uuid, transition: F) -> Result<(Order, OrderDomainEvent), AppError>
    where
        F: FnOnce(&mut Order) -> Result<OrderDomainEvent, DomainError>,
    {
        let mut order = self.get(order_id).await?;
        let expected_version = order.version;
        let event = transition(&mut order)?;
        self.repo
            .update_with_version_check(&order, expected_version)
            .await?;
        Ok((order, event))
    }

    pub async fn confirm_payment(
        &self,
        order_id: Uuid,
        amount: &Money,
    ) -> Result<(Order, OrderDomainEvent), AppError> {
        self.apply(order_id, |o| o.process_payment(amount)).await
    }

    pub async fn mark_shipped(&self, order_id: Uuid) -> Result<(Order, OrderDomainEvent), AppError> {
        self.apply(order_id, |o| o.mark_as_shipped()).await
    }

    pub async fn mark_delivered(&self, order_id: Uuid) -> Result<(Order, OrderDomainEvent), AppError> {
        self.apply(order_id, |o| o.mark_as_delivered()).await
    }

    pub async fn complete(&self, order_id: Uuid) -> Result<(Order, OrderDomainEvent), AppError> {
        self.apply(order_id, |o| o.complete()).await
    }

    pub async fn cancel(
        &self,
        order_id: Uuid,
        reason: impl Into<String> + Send + 'static,
    ) -> Result<(Order, OrderDomainEvent), AppError> {
        self.apply(order_id, move |o| o.cancel(reason)).await
    }

    pub async fn refund(
        &self,
        order_id: Uuid,
        reason: impl Into<String> + Send + 'static,
        refund_window_days: i64,
    ) -> Result<(Order, OrderDomainEvent), AppError> {
        self.apply(order_id, move |o| o.process_refund(reason, refund_window_days))
            .await
    }
}
