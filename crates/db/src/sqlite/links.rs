//! SQLite-Implementierung des ShareLinkRepository

use chrono::Utc;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::LinkRecord;
use crate::repository::{DbResult, ShareLinkRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{auf_millis, uuid_parsen, zeit_formatieren, zeit_parsen};

impl ShareLinkRepository for SqliteDb {
    async fn create(&self, recipient_id: Uuid, share_token: &str) -> DbResult<LinkRecord> {
        let id = Uuid::new_v4();
        let now = auf_millis(Utc::now());

        sqlx::query(
            "INSERT INTO share_links (id, recipient_id, share_token, is_active, created_at)
             VALUES (?, ?, ?, 1, ?)",
        )
        .bind(id.to_string())
        .bind(recipient_id.to_string())
        .bind(share_token)
        .bind(zeit_formatieren(now))
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::aus_insert(e, || "Share-Token bereits vergeben".to_string()))?;

        Ok(LinkRecord {
            id,
            recipient_id,
            share_token: share_token.to_string(),
            is_active: true,
            created_at: now,
        })
    }

    async fn get_active_by_token(&self, share_token: &str) -> DbResult<Option<LinkRecord>> {
        let row = sqlx::query(
            "SELECT id, recipient_id, share_token, is_active, created_at
             FROM share_links WHERE share_token = ? AND is_active = 1",
        )
        .bind(share_token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_link(&r)).transpose()
    }

    async fn list_for_recipient(&self, recipient_id: Uuid) -> DbResult<Vec<LinkRecord>> {
        let rows = sqlx::query(
            "SELECT id, recipient_id, share_token, is_active, created_at
             FROM share_links WHERE recipient_id = ? ORDER BY created_at",
        )
        .bind(recipient_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_link).collect()
    }

    async fn deactivate(&self, id: Uuid, recipient_id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query(
            "UPDATE share_links SET is_active = 0 WHERE id = ? AND recipient_id = ?",
        )
        .bind(id.to_string())
        .bind(recipient_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_link(row: &sqlx::sqlite::SqliteRow) -> DbResult<LinkRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let recipient_str: String = row.try_get("recipient_id")?;
    let created_at_str: String = row.try_get("created_at")?;
    let is_active: i64 = row.try_get("is_active")?;

    Ok(LinkRecord {
        id: uuid_parsen(&id_str)?,
        recipient_id: uuid_parsen(&recipient_str)?,
        share_token: row.try_get("share_token")?,
        is_active: is_active != 0,
        created_at: zeit_parsen("created_at", &created_at_str)?,
    })
}
