//! Compensation ledger (spec §3, §4.4 C5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum FailureType {
    InventoryReservation,
    SellerStatsUpdate,
    Notification,
}

impl FailureType {
    /// InventoryReservation and SellerStatsUpdate are critical; Notification
    /// never by itself triggers compensation.
    pub fn is_critical(self) -> bool {
        !matches!(self, FailureType::Notification)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub order_item_id: Option<Uuid>,
    pub failure_type: FailureType,
    pub error_message: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationLedger {
    pub order_id: Uuid,
    pub entries: Vec<FailureEntry>,
    pub triggered: bool,
    pub completed_item_ids: std::collections::HashSet<Uuid>,

    /// True once a critical failure has been seen but `CompensationRequired`
    /// has not yet been finalized — gates `record_failure` from scheduling a
    /// second finalization while one is already pending.
    pub trigger_scheduled: bool,
    /// Correlation id of the failure that first scheduled the trigger,
    /// carried forward so the eventually-emitted `CompensationRequired`
    /// still threads back to the message that started it.
    pub trigger_correlation_id: Option<Uuid>,
    /// Timestamp of the most recent failure recorded, used to decide
    /// whether the quiet period has elapsed.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Sticky guard on `OrderCancellationRequested`: sourced from
    /// `triggered` rather than re-derived, so it cannot fire before
    /// `CompensationRequired` has, and fires at most once.
    pub cancellation_requested: bool,
}

impl CompensationLedger {
    pub fn new(order_id: Uuid) -> Self {
        Self {
            order_id,
            entries: Vec::new(),
            triggered: false,
            completed_item_ids: std::collections::HashSet::new(),
            trigger_scheduled: false,
            trigger_correlation_id: None,
            last_failure_at: None,
            cancellation_requested: false,
        }
    }

    /// Appends the failure and, if it is the first critical failure seen
    /// and no trigger is already pending, marks one scheduled. Deliberately
    /// does not itself decide to emit `CompensationRequired` — that decision
    /// belongs to `try_trigger`, invoked once the quiet period has elapsed,
    /// so a second critical failure landing moments later still makes it
    /// into the one event that gets published.
    pub fn record_failure(
        &mut self,
        order_item_id: Option<Uuid>,
        failure_type: FailureType,
        error_message: impl Into<String>,
        correlation_id: Uuid,
    ) {
        self.entries.push(FailureEntry {
            order_item_id,
            failure_type,
            error_message: error_message.into(),
            failed_at: Utc::now(),
        });
        self.last_failure_at = Some(Utc::now());

        if failure_type.is_critical() && !self.triggered && !self.trigger_scheduled {
            self.trigger_scheduled = true;
            self.trigger_correlation_id = Some(correlation_id);
        }
    }

    pub fn has_critical_failure(&self) -> bool {
        self.entries.iter().any(|e| e.failure_type.is_critical())
    }

    /// True once a trigger has been scheduled, not yet fired, and the quiet
    /// period since the last failure has elapsed.
    pub fn ready_to_finalize_trigger(&self, quiet_period: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.trigger_scheduled
            && !self.triggered
            && self
                .last_failure_at
                .is_some_and(|t| now - t >= quiet_period)
    }

    /// Returns the critical-failure subset if this call is the one that
    /// should trigger `CompensationRequired` (sticky: true at most once).
    /// Reflects every critical entry recorded up to this call, not just the
    /// one that originally scheduled the trigger.
    pub fn try_trigger(&mut self) -> Option<Vec<FailureEntry>> {
        if self.triggered || !self.has_critical_failure() {
            return None;
        }
        self.triggered = true;
        self.trigger_scheduled = false;
        Some(
            self.entries
                .iter()
                .filter(|e| e.failure_type.is_critical())
                .cloned()
                .collect(),
        )
    }

    pub fn record_completion(&mut self, order_item_id: Uuid) {
        self.completed_item_ids.insert(order_item_id);
    }

    /// True once every critical failure's item has a matching completion.
    fn all_critical_failures_completed(&self) -> bool {
        self.entries
            .iter()
            .filter(|e| e.failure_type.is_critical())
            .all(|e| match e.order_item_id {
                Some(id) => self.completed_item_ids.contains(&id),
                None => true,
            })
    }

    /// Sticky, at-most-once gate on `OrderCancellationRequested`. Requires
    /// `triggered` (so `CompensationRequired` has already fired, which
    /// itself requires at least one critical failure — this is what rules
    /// out the vacuous-truth case of zero critical entries) and every
    /// critical item completed. Returns `true` exactly once, on the call
    /// that should emit the event.
    pub fn try_request_cancellation(&mut self) -> bool {
        if self.cancellation_requested || !self.triggered {
            return false;
        }
        if self.all_critical_failures_completed() {
            self.cancellation_requested = true;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_3_finalized_trigger_lists_every_critical_failure_and_is_sticky() {
        let order_id = Uuid::new_v4();
        let item1 = Uuid::new_v4();
        let item2 = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let mut ledger = CompensationLedger::new(order_id);

        ledger.record_failure(Some(item1), FailureType::InventoryReservation, "boom", correlation_id);
        assert!(ledger.trigger_scheduled);
        assert!(!ledger.triggered);

        ledger.record_failure(None, FailureType::Notification, "email down", Uuid::new_v4());
        ledger.record_failure(Some(item2), FailureType::InventoryReservation, "boom2", Uuid::new_v4());

        // Finalizing after both criticals landed lists both, not just the
        // one that scheduled the trigger.
        let triggered = ledger.try_trigger();
        assert_eq!(triggered.unwrap().len(), 2);

        // Sticky: already triggered, no second CompensationRequired.
        assert!(ledger.try_trigger().is_none());
    }

    #[test]
    fn notification_only_never_schedules_a_trigger() {
        let mut ledger = CompensationLedger::new(Uuid::new_v4());
        ledger.record_failure(None, FailureType::Notification, "email down", Uuid::new_v4());
        assert!(!ledger.trigger_scheduled);
        assert!(ledger.try_trigger().is_none());
    }

    #[test]
    fn ready_to_finalize_trigger_waits_out_the_quiet_period() {
        let mut ledger = CompensationLedger::new(Uuid::new_v4());
        ledger.record_failure(Some(Uuid::new_v4()), FailureType::InventoryReservation, "boom", Uuid::new_v4());

        let quiet_period = chrono::Duration::seconds(5);
        assert!(!ledger.ready_to_finalize_trigger(quiet_period, ledger.last_failure_at.unwrap()));
        assert!(ledger.ready_to_finalize_trigger(
            quiet_period,
            ledger.last_failure_at.unwrap() + chrono::Duration::seconds(10)
        ));
    }

    #[test]
    fn completion_tracking_drives_cancellation_request_exactly_once() {
        let item1 = Uuid::new_v4();
        let item2 = Uuid::new_v4();
        let mut ledger = CompensationLedger::new(Uuid::new_v4());
        ledger.record_failure(Some(item1), FailureType::InventoryReservation, "e1", Uuid::new_v4());
        ledger.record_failure(Some(item2), FailureType::SellerStatsUpdate, "e2", Uuid::new_v4());
        ledger.try_trigger();

        assert!(!ledger.try_request_cancellation());
        ledger.record_completion(item1);
        assert!(!ledger.try_request_cancellation());
        ledger.record_completion(item2);
        assert!(ledger.try_request_cancellation());

        // Sticky: a later call (e.g. a duplicate completion delivery) must
        // not fire a second OrderCancellationRequested.
        assert!(!ledger.try_request_cancellation());
    }

    #[test]
    fn zero_critical_entries_never_requests_cancellation() {
        // Vacuous-truth guard: an order with only a Notification failure
        // has no critical entries, so `all().` over an empty filter would
        // be true — but `triggered` can never become true without a
        // critical failure, so this must stay false regardless.
        let mut ledger = CompensationLedger::new(Uuid::new_v4());
        ledger.record_failure(None, FailureType::Notification, "email down", Uuid::new_v4());
        assert!(!ledger.try_request_cancellation());
    }
}
