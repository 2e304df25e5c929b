//! SQLite-Implementierung des RecipientRepository

use chrono::Utc;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{EmpfaengerRecord, EmpfaengerUpdate, NeuerEmpfaenger};
use crate::repository::{DbResult, RecipientRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{auf_millis, uuid_parsen, zeit_formatieren, zeit_parsen};

const SPALTEN: &str =
    "id, username, email, public_key, upstream_credential, filter_enabled, created_at";

impl RecipientRepository for SqliteDb {
    async fn create(&self, data: NeuerEmpfaenger<'_>) -> DbResult<EmpfaengerRecord> {
        let id = Uuid::new_v4();
        let now = auf_millis(Utc::now());

        sqlx::query(
            "INSERT INTO recipients (id, username, email, public_key, filter_enabled, created_at)
             VALUES (?, ?, ?, ?, 1, ?)",
        )
        .bind(id.to_string())
        .bind(data.username)
        .bind(data.email)
        .bind(data.public_key)
        .bind(zeit_formatieren(now))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::aus_insert(e, || {
                format!("Benutzername '{}' bereits vergeben", data.username)
            })
        })?;

        Ok(EmpfaengerRecord {
            id,
            username: data.username.to_string(),
            email: data.email.to_string(),
            public_key: data.public_key.map(str::to_string),
            upstream_credential: None,
            filter_enabled: true,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<EmpfaengerRecord>> {
        let sql = format!("SELECT {SPALTEN} FROM recipients WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_empfaenger(&r)).transpose()
    }

    async fn get_by_name(&self, username: &str) -> DbResult<Option<EmpfaengerRecord>> {
        let sql = format!("SELECT {SPALTEN} FROM recipients WHERE username = ?");
        let row = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_empfaenger(&r)).transpose()
    }

    async fn update(&self, id: Uuid, data: EmpfaengerUpdate) -> DbResult<EmpfaengerRecord> {
        // Dynamisches UPDATE – nur gesetzte Felder aendern
        let mut sets: Vec<&str> = Vec::new();
        if data.email.is_some() {
            sets.push("email = ?");
        }
        if data.public_key.is_some() {
            sets.push("public_key = ?");
        }
        if data.upstream_credential.is_some() {
            sets.push("upstream_credential = ?");
        }
        if data.filter_enabled.is_some() {
            sets.push("filter_enabled = ?");
        }

        if sets.is_empty() {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| DbError::nicht_gefunden(format!("Empfaenger {id}")));
        }

        let sql = format!("UPDATE recipients SET {} WHERE id = ?", sets.join(", "));
        let mut q = sqlx::query(&sql);

        if let Some(ref v) = data.email {
            q = q.bind(v);
        }
        if let Some(ref v) = data.public_key {
            q = q.bind(v.as_deref());
        }
        if let Some(ref v) = data.upstream_credential {
            q = q.bind(v.as_deref());
        }
        if let Some(v) = data.filter_enabled {
            q = q.bind(v as i64);
        }
        q = q.bind(id.to_string());

        let affected = q.execute(&self.pool).await?.rows_affected();
        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Empfaenger {id}")));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::intern("Empfaenger nach Update nicht gefunden"))
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM recipients WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_empfaenger(row: &sqlx::sqlite::SqliteRow) -> DbResult<EmpfaengerRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let created_at_str: String = row.try_get("created_at")?;
    let filter_enabled: i64 = row.try_get("filter_enabled")?;

    Ok(EmpfaengerRecord {
        id: uuid_parsen(&id_str)?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        public_key: row.try_get("public_key")?,
        upstream_credential: row.try_get("upstream_credential")?,
        filter_enabled: filter_enabled != 0,
        created_at: zeit_parsen("created_at", &created_at_str)?,
    })
}
