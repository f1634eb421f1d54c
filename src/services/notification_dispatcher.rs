//! Notification send/retry orchestration (spec §4.7, C8).

use std::sync::Arc;
use uuid::Uuid;

use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::domain::notification::{Notification, NotificationPreference, NotificationStatus, NotificationType};
use crate::error::AppError;
use crate::events::{Envelope, EventFabric, RoutingKey};

pub struct NotificationDispatcher {
    conn: Arc<Mutex<Connection>>,
    fabric: Arc<EventFabric>,
    max_retries: u32,
}

impl NotificationDispatcher {
    pub fn new(db_path: &str, fabric: Arc<EventFabric>, max_retries: u32) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                recipient_id TEXT NOT NULL,
                email TEXT NOT NULL,
                notification_type TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                status TEXT NOT NULL,
                retry_count INTEGER NOT NULL,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS notification_preferences (
                user_id TEXT PRIMARY KEY,
                email_enabled INTEGER NOT NULL,
                type_flags TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            fabric,
            max_retries,
        })
    }

    async fn preference_for(&self, user_id: &str) -> anyhow::Result<NotificationPreference> {
        let conn = self.conn.lock().await;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT email_enabled, type_flags FROM notification_preferences WHERE user_id=?1",
                params![user_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .ok();
        match row {
            Some((email_enabled, type_flags_json)) => Ok(NotificationPreference {
                user_id: user_id.to_string(),
                email_enabled: email_enabled != 0,
                type_flags: serde_json::from_str(&type_flags_json)?,
            }),
            None => Ok(NotificationPreference::all_enabled(user_id)),
        }
    }

    async fn persist(&self, n: &Notification) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO notifications (id, recipient_id, email, notification_type, subject, body, status, retry_count, last_error, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
             ON CONFLICT(id) DO UPDATE SET status=excluded.status, retry_count=excluded.retry_count,
                last_error=excluded.last_error, updated_at=excluded.updated_at",
            params![
                n.id.to_string(),
                n.recipient_id,
                n.email,
                serde_json::to_string(&n.notification_type)?,
                n.subject,
                n.body,
                format!("{:?}", n.status),
                n.retry_count,
                n.last_error,
                n.created_at.to_rfc3339(),
                n.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// §4.7.1 Send: honors the effective preference gate before attempting
    /// delivery; a suppressed notification is recorded as Sent with a
    /// "suppressed" note rather than silently dropped (§4.7.1: "result MUST
    /// be observable").
    pub async fn dispatch(
        &self,
        recipient_id: &str,
        email: &str,
        notification_type: NotificationType,
        subject: &str,
        body: &str,
        correlation_id: Uuid,
    ) -> Result<Notification, AppError> {
        let preference = self
            .preference_for(recipient_id)
            .await
            .map_err(|e| AppError::unexpected(e.to_string()))?;

        let mut n = Notification::new(recipient_id, email, notification_type, subject, body);

        if !preference.effective(notification_type) {
            n.mark_sent(Some("suppressed"));
            self.persist(&n).await.map_err(|e| AppError::unexpected(e.to_string()))?;
            return Ok(n);
        }

        self.attempt_send(&mut n, correlation_id).await?;
        Ok(n)
    }

    async fn attempt_send(&self, n: &mut Notification, correlation_id: Uuid) -> Result<(), AppError> {
        n.mark_sending();
        self.persist(n).await.map_err(|e| AppError::unexpected(e.to_string()))?;

        // Mock transport: delivery is modeled as always succeeding; real SMTP
        // integration is out of scope (spec Non-goals).
        n.mark_sent(None);
        self.persist(n).await.map_err(|e| AppError::unexpected(e.to_string()))?;
        let _ = correlation_id;
        Ok(())
    }

    /// §4.7.3/4.7.4 Retry: re-attempts a Failed notification under the retry
    /// cap; past the cap, publishes `NotificationFailed` and leaves it
    /// terminal.
    pub async fn retry(&self, mut n: Notification, correlation_id: Uuid) -> Result<Notification, AppError> {
        if n.exceeded_max_retries(self.max_retries) {
            let envelope = Envelope::wrap(
                RoutingKey::NotificationFailed,
                correlation_id,
                &serde_json::json!({ "notificationId": n.id, "recipientId": n.recipient_id }),
            )
            .map_err(|e| AppError::unexpected(e.to_string()))?;
            self.fabric
                .publish(&envelope)
                .await
                .map_err(|e| AppError::transient(e.to_string()))?;
            return Ok(n);
        }

        if !n.can_retry(self.max_retries) {
            return Ok(n);
        }

        n.begin_retry();
        self.attempt_send(&mut n, correlation_id).await?;
        Ok(n)
    }

    #[allow(dead_code)]
    fn non_retryable(status: NotificationStatus) -> bool {
        status.is_terminal_non_retryable()
    }
}
