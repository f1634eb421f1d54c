//! Cross-service sync handlers (spec §4.8, C9): user/role propagation and
//! seller-profile seeding. Stock→availability projection is delegated to the
//! search indexing pipeline (§4.5) rather than duplicated here.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerProfile {
    pub seller_id: String,
    pub seller_name: String,
}

pub struct CrossServiceSync {
    conn: Arc<Mutex<Connection>>,
}

impl CrossServiceSync {
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_profiles (user_id TEXT PRIMARY KEY, role TEXT NOT NULL);
             CREATE TABLE IF NOT EXISTS seller_profiles (seller_id TEXT PRIMARY KEY, seller_name TEXT NOT NULL);",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// `UserCreated` → create default UserProfile if absent (idempotent).
    pub async fn on_user_created(&self, user_id: &str, default_role: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO user_profiles (user_id, role) VALUES (?1, ?2)",
            params![user_id, default_role],
        )?;
        Ok(())
    }

    /// `UserUpdated` / `UserRoleChanged` → update role iff different; never
    /// touches unrelated fields.
    pub async fn on_user_role_changed(&self, user_id: &str, new_role: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        let current: Option<String> = conn
            .query_row(
                "SELECT role FROM user_profiles WHERE user_id=?1",
                params![user_id],
                |row| row.get(0),
            )
            .ok();

        match current {
            Some(role) if role == new_role => {}
            Some(_) | None => {
                conn.execute(
                    "INSERT INTO user_profiles (user_id, role) VALUES (?1, ?2)
                     ON CONFLICT(user_id) DO UPDATE SET role=excluded.role",
                    params![user_id, new_role],
                )?;
                info!(user_id, new_role, "user role synced");
            }
        }
        Ok(())
    }

    /// `SellerCreated` → seeds SellerProfile.
    pub async fn on_seller_created(&self, seller_id: &str, seller_name: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO seller_profiles (seller_id, seller_name) VALUES (?1, ?2)",
            params![seller_id, seller_name],
        )?;
        Ok(())
    }

    pub async fn seller_name(&self, seller_id: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn.lock().await;
        Ok(conn
            .query_row(
                "SELECT seller_name FROM seller_profiles WHERE seller_id=?1",
                params![seller_id],
                |row| row.get(0),
            )
            .ok())
    }

    /// Every known seller profile, for the `SellerNameRefresh` startup
    /// backfill (spec §4.5): the search projection's cached `seller_name`
    /// can drift if a rename event is lost, so the indexer re-syncs the
    /// whole catalog against this table once on boot.
    pub async fn list_sellers(&self) -> anyhow::Result<Vec<SellerProfile>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT seller_id, seller_name FROM seller_profiles")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SellerProfile {
                    seller_id: row.get(0)?,
                    seller_name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    async fn sync() -> (CrossServiceSync, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        (CrossServiceSync::new(temp.path().to_str().unwrap()).unwrap(), temp)
    }

    #[tokio::test]
    async fn user_created_is_idempotent() {
        let (sync, _t) = sync().await;
        sync.on_user_created("u1", "customer").await.unwrap();
        sync.on_user_created("u1", "seller").await.unwrap();

        let conn = sync.conn.lock().await;
        let role: String = conn
            .query_row("SELECT role FROM user_profiles WHERE user_id='u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(role, "customer");
    }

    #[tokio::test]
    async fn role_changed_updates_only_role() {
        let (sync, _t) = sync().await;
        sync.on_user_created("u1", "customer").await.unwrap();
        sync.on_user_role_changed("u1", "seller").await.unwrap();

        let conn = sync.conn.lock().await;
        let role: String = conn
            .query_row("SELECT role FROM user_profiles WHERE user_id='u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(role, "seller");
    }

    #[tokio::test]
    async fn seller_created_seeds_profile() {
        let (sync, _t) = sync().await;
        sync.on_seller_created("s1", "Acme Books").await.unwrap();
        assert_eq!(sync.seller_name("s1").await.unwrap(), Some("Acme Books".to_string()));
    }
}
