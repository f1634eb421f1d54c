//! User Storage
//! Mission: Securely store and manage user accounts with SQLite, including
//! the five-strikes/15-minute lockout from spec §7/§8 scenario 1.

use std::sync::Arc;

use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::models::User;

const MAX_FAILED_ATTEMPTS: u32 = 5;
const LOCKOUT_MINUTES: i64 = 15;

/// Outcome of a login attempt, distinguishing the lockout case from a plain
/// bad password so the handler can surface the right message (spec §8
/// scenario 1: "Account is temporarily locked" vs. "Invalid credentials").
pub enum LoginOutcome {
    Success(User),
    InvalidCredentials,
    Locked,
}

/// User storage with SQLite backend, shared across requests the way
/// `OrderRepository`/`CartStore` hold an `Arc<Mutex<Connection>>`.
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
}

impl UserStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("opening auth database")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                failed_login_attempts INTEGER NOT NULL DEFAULT 0,
                locked_until TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let id: String = row.get(0)?;
        let locked_until: Option<String> = row.get(4)?;
        let created_at: String = row.get(5)?;
        Ok(User {
            id: Uuid::parse_str(&id).map_err(|_| {
                rusqlite::Error::InvalidColumnType(0, "id".into(), rusqlite::types::Type::Text)
            })?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            failed_login_attempts: row.get::<_, i64>(3)? as u32,
            locked_until: locked_until.map(|s| parse_timestamp(&s)).transpose().map_err(|_| {
                rusqlite::Error::InvalidColumnType(4, "locked_until".into(), rusqlite::types::Type::Text)
            })?,
            created_at: parse_timestamp(&created_at).map_err(|_| {
                rusqlite::Error::InvalidColumnType(5, "created_at".into(), rusqlite::types::Type::Text)
            })?,
        })
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, email, password_hash, failed_login_attempts, locked_until, created_at
             FROM users WHERE email = ?1",
            params![email],
            Self::row_to_user,
        )
        .optional()
        .context("loading user by email")
    }

    /// Register a new user. Conflicts (duplicate email) are surfaced as
    /// `Ok(None)` so the handler can map it to `409`, rather than an error
    /// path the caller has to pattern-match by SQLite error code.
    pub async fn register(&self, email: &str, password: &str) -> Result<Option<User>> {
        let password_hash = hash(password, DEFAULT_COST).context("hashing password")?;
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            failed_login_attempts: 0,
            locked_until: None,
            created_at: Utc::now(),
        };

        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (id, email, password_hash, failed_login_attempts, locked_until, created_at)
             VALUES (?1, ?2, ?3, 0, NULL, ?4)",
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.created_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }

        info!(email = %email, "registered user");
        Ok(Some(user))
    }

    /// Verify credentials against the current lockout state. `now` is
    /// threaded through explicitly (rather than read from the clock inside)
    /// so the five-strikes scenario in spec §8 can be exercised
    /// deterministically by advancing a test clock.
    pub async fn verify_login(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<LoginOutcome> {
        let Some(user) = self.get_by_email(email).await? else {
            return Ok(LoginOutcome::InvalidCredentials);
        };

        if user.is_locked(now) {
            return Ok(LoginOutcome::Locked);
        }

        let valid = verify(password, &user.password_hash).context("verifying password")?;
        if valid {
            self.reset_failed_attempts(&user.id).await?;
            let mut user = user;
            user.failed_login_attempts = 0;
            user.locked_until = None;
            return Ok(LoginOutcome::Success(user));
        }

        let attempts = user.failed_login_attempts + 1;
        let locked_until = if attempts >= MAX_FAILED_ATTEMPTS {
            warn!(email = %email, "account locked after repeated failed logins");
            Some(now + chrono::Duration::minutes(LOCKOUT_MINUTES))
        } else {
            user.locked_until
        };
        self.record_failed_attempt(&user.id, attempts, locked_until).await?;

        Ok(LoginOutcome::InvalidCredentials)
    }

    async fn reset_failed_attempts(&self, user_id: &Uuid) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE users SET failed_login_attempts = 0, locked_until = NULL WHERE id = ?1",
            params![user_id.to_string()],
        )?;
        Ok(())
    }

    async fn record_failed_attempt(
        &self,
        user_id: &Uuid,
        attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE users SET failed_login_attempts = ?1, locked_until = ?2 WHERE id = ?3",
            params![
                attempts as i64,
                locked_until.map(|t| t.to_rfc3339()),
                user_id.to_string(),
            ],
        )?;
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    async fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::new(db_path).unwrap();
        (store, temp_file)
    }

    #[tokio::test]
    async fn test_register_then_login_succeeds() {
        let (store, _temp) = create_test_store().await;
        store.register("u@gatech.edu", "Password123!").await.unwrap().unwrap();

        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        match store.verify_login("u@gatech.edu", "Password123!", now).await.unwrap() {
            LoginOutcome::Success(user) => {
                assert_eq!(user.email, "u@gatech.edu");
                assert_eq!(user.failed_login_attempts, 0);
            }
            _ => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let (store, _temp) = create_test_store().await;
        store.register("u@gatech.edu", "Password123!").await.unwrap();
        let second = store.register("u@gatech.edu", "Other123!").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_five_failures_lock_the_account_then_clear_after_window() {
        let (store, _temp) = create_test_store().await;
        store.register("u@gatech.edu", "Password123!").await.unwrap();

        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for _ in 0..5 {
            let outcome = store.verify_login("u@gatech.edu", "wrong", t0).await.unwrap();
            assert!(matches!(outcome, LoginOutcome::InvalidCredentials));
        }

        // Sixth attempt, correct password, still inside the lockout window.
        let t1 = t0 + chrono::Duration::minutes(1);
        let locked = store.verify_login("u@gatech.edu", "Password123!", t1).await.unwrap();
        assert!(matches!(locked, LoginOutcome::Locked));

        // Seventh attempt, 15 minutes later: succeeds and resets the counter.
        let t2 = t0 + chrono::Duration::minutes(15);
        match store.verify_login("u@gatech.edu", "Password123!", t2).await.unwrap() {
            LoginOutcome::Success(user) => assert_eq!(user.failed_login_attempts, 0),
            _ => panic!("expected success after lockout window elapses"),
        }
    }
}
