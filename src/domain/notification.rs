//! Notification & preference model (spec §3, §4.7 C8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderCreated,
    OrderPaid,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    OrderRefunded,
    SellerPayout,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum NotificationStatus {
    Created,
    Sending,
    Sent,
    Failed,
    Read,
}

impl NotificationStatus {
    pub fn is_terminal_non_retryable(self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Read)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: String,
    pub email: String,
    pub notification_type: NotificationType,
    pub subject: String,
    pub body: String,
    pub status: NotificationStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: impl Into<String>,
        email: impl Into<String>,
        notification_type: NotificationType,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            recipient_id: recipient_id.into(),
            email: email.into(),
            notification_type,
            subject: subject.into(),
            body: body.into(),
            status: NotificationStatus::Created,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// §4.7.3: allowed only if status == Failed and retryCount < max.
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.status == NotificationStatus::Failed && self.retry_count < max_retries
    }

    pub fn begin_retry(&mut self) {
        self.retry_count += 1;
        self.status = NotificationStatus::Created;
        self.updated_at = Utc::now();
    }

    pub fn mark_sending(&mut self) {
        self.status = NotificationStatus::Sending;
        self.updated_at = Utc::now();
    }

    pub fn mark_sent(&mut self, note: Option<&str>) {
        self.status = NotificationStatus::Sent;
        self.last_error = note.map(|s| s.to_string());
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = NotificationStatus::Failed;
        self.last_error = Some(error.into());
        self.updated_at = Utc::now();
    }

    /// §4.7.4: exceeding max attempts is terminal; caller emits
    /// `NotificationFailed` when this returns true.
    pub fn exceeded_max_retries(&self, max_retries: u32) -> bool {
        self.status == NotificationStatus::Failed && self.retry_count >= max_retries
    }
}

/// Per-user boolean matrix over notification types plus a master gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub user_id: String,
    pub email_enabled: bool,
    pub type_flags: HashMap<NotificationType, bool>,
}

impl NotificationPreference {
    pub fn all_enabled(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email_enabled: true,
            type_flags: HashMap::new(),
        }
    }

    /// effective(type) == master_gate AND type_specific_flag (default true
    /// when unset, so a preference row that's silent on a type doesn't
    /// silently suppress it).
    pub fn effective(&self, notification_type: NotificationType) -> bool {
        self.email_enabled && *self.type_flags.get(&notification_type).unwrap_or(&true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_allowed_only_when_failed_and_under_cap() {
        let mut n = Notification::new("u1", "u1@example.com", NotificationType::OrderPaid, "s", "b");
        assert!(!n.can_retry(5));
        n.mark_failed("smtp down");
        assert!(n.can_retry(5));
        n.retry_count = 5;
        assert!(!n.can_retry(5));
    }

    #[test]
    fn exceeding_max_retries_is_terminal() {
        let mut n = Notification::new("u1", "u1@example.com", NotificationType::OrderPaid, "s", "b");
        n.mark_failed("err");
        n.retry_count = 5;
        assert!(n.exceeded_max_retries(5));
    }

    #[test]
    fn effective_preference_ands_master_and_type_flag() {
        let mut pref = NotificationPreference::all_enabled("u1");
        assert!(pref.effective(NotificationType::OrderShipped));
        pref.type_flags.insert(NotificationType::OrderShipped, false);
        assert!(!pref.effective(NotificationType::OrderShipped));
        pref.type_flags.insert(NotificationType::OrderShipped, true);
        pref.email_enabled = false;
        assert!(!pref.effective(NotificationType::OrderShipped));
    }
}
