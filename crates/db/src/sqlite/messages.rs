//! SQLite-Implementierung des MessageRepository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{NachrichtRecord, NachrichtenStatus, NeueNachricht};
use crate::repository::{DbResult, MessageRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{auf_millis, uuid_parsen, zeit_formatieren, zeit_parsen, zeit_parsen_opt};

const SPALTEN: &str = "id, recipient_id, envelope_content, envelope_reasoning, flag, status, \
                       created_at, read_at";

impl MessageRepository for SqliteDb {
    async fn create(&self, data: NeueNachricht<'_>) -> DbResult<NachrichtRecord> {
        let id = Uuid::new_v4();
        let now = auf_millis(Utc::now());

        sqlx::query(
            "INSERT INTO messages
                (id, recipient_id, envelope_content, envelope_reasoning, flag, status, created_at)
             VALUES (?, ?, ?, ?, ?, 'unread', ?)",
        )
        .bind(id.to_string())
        .bind(data.recipient_id.to_string())
        .bind(data.envelope_content)
        .bind(data.envelope_reasoning)
        .bind(data.flag as i64)
        .bind(zeit_formatieren(now))
        .execute(&self.pool)
        .await?;

        Ok(NachrichtRecord {
            id,
            recipient_id: data.recipient_id,
            envelope_content: data.envelope_content.to_string(),
            envelope_reasoning: data.envelope_reasoning.to_string(),
            flag: data.flag,
            status: NachrichtenStatus::Unread,
            created_at: now,
            read_at: None,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<NachrichtRecord>> {
        let sql = format!("SELECT {SPALTEN} FROM messages WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_nachricht(&r)).transpose()
    }

    async fn list_for_recipient(&self, recipient_id: Uuid) -> DbResult<Vec<NachrichtRecord>> {
        let sql = format!(
            "SELECT {SPALTEN} FROM messages WHERE recipient_id = ?
             ORDER BY created_at DESC, rowid DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(recipient_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_nachricht).collect()
    }

    async fn set_status(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        status: NachrichtenStatus,
        read_at: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        let affected = sqlx::query(
            "UPDATE messages SET status = ?, read_at = COALESCE(?, read_at)
             WHERE id = ? AND recipient_id = ?",
        )
        .bind(status.als_str())
        .bind(read_at.map(|t| zeit_formatieren(auf_millis(t))))
        .bind(id.to_string())
        .bind(recipient_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn delete(&self, id: Uuid, recipient_id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM messages WHERE id = ? AND recipient_id = ?")
            .bind(id.to_string())
            .bind(recipient_id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<NachrichtRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let recipient_str: String = row.try_get("recipient_id")?;
    let status_str: String = row.try_get("status")?;
    let created_at_str: String = row.try_get("created_at")?;
    let flag: i64 = row.try_get("flag")?;

    let status = NachrichtenStatus::aus_str(&status_str)
        .ok_or_else(|| DbError::intern(format!("Unbekannter Status '{status_str}'")))?;

    Ok(NachrichtRecord {
        id: uuid_parsen(&id_str)?,
        recipient_id: uuid_parsen(&recipient_str)?,
        envelope_content: row.try_get("envelope_content")?,
        envelope_reasoning: row.try_get("envelope_reasoning")?,
        flag: flag != 0,
        status,
        created_at: zeit_parsen("created_at", &created_at_str)?,
        read_at: zeit_parsen_opt("read_at", row.try_get("read_at")?)?,
    })
}
