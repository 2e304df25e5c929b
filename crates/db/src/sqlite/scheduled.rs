//! SQLite-Implementierung des ScheduledRepository
//!
//! Claim-Protokoll: eine Zeile gilt als beansprucht, solange `claimed_by`
//! gesetzt ist. Beanspruchen, Freigeben und Aufraeumen sind jeweils eine
//! einzelne UPDATE-Anweisung; SQLite serialisiert Schreiber, daher sieht ein
//! zweiter Dispatcher bereits beanspruchte Zeilen nicht mehr als frei.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Freigabe, GeplanteNachrichtRecord, NeueGeplanteNachricht};
use crate::repository::{DbResult, ScheduledRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{auf_millis, uuid_parsen, zeit_formatieren, zeit_parsen, zeit_parsen_opt};

const SPALTEN: &str = "id, recipient_id, envelope_content, envelope_reasoning, flag, deliver_at, \
                       claimed_by, claimed_at, attempts, dead_lettered_at, created_at";

/// Ids pro DELETE-Anweisung, deutlich unter dem Variablenlimit von SQLite
const LOESCH_BLOCK: usize = 500;

impl ScheduledRepository for SqliteDb {
    async fn create(&self, data: NeueGeplanteNachricht<'_>) -> DbResult<GeplanteNachrichtRecord> {
        let id = Uuid::new_v4();
        let now = auf_millis(Utc::now());
        let deliver_at = auf_millis(data.deliver_at);

        sqlx::query(
            "INSERT INTO scheduled_messages
                (id, recipient_id, envelope_content, envelope_reasoning, flag, deliver_at,
                 attempts, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(id.to_string())
        .bind(data.recipient_id.to_string())
        .bind(data.envelope_content)
        .bind(data.envelope_reasoning)
        .bind(data.flag as i64)
        .bind(zeit_formatieren(deliver_at))
        .bind(zeit_formatieren(now))
        .execute(&self.pool)
        .await?;

        Ok(GeplanteNachrichtRecord {
            id,
            recipient_id: data.recipient_id,
            envelope_content: data.envelope_content.to_string(),
            envelope_reasoning: data.envelope_reasoning.to_string(),
            flag: data.flag,
            deliver_at,
            claimed_by: None,
            claimed_at: None,
            attempts: 0,
            dead_lettered_at: None,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<GeplanteNachrichtRecord>> {
        let sql = format!("SELECT {SPALTEN} FROM scheduled_messages WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_geplant(&r)).transpose()
    }

    async fn reap_stale_claims(&self, grenze: DateTime<Utc>) -> DbResult<u64> {
        let affected = sqlx::query(
            "UPDATE scheduled_messages
             SET claimed_by = NULL, claimed_at = NULL
             WHERE claimed_by IS NOT NULL AND claimed_at < ?",
        )
        .bind(zeit_formatieren(grenze))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected > 0 {
            debug!(anzahl = affected, "Verwaiste Claims geloest");
        }
        Ok(affected)
    }

    async fn claim_due(
        &self,
        token: Uuid,
        jetzt: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<GeplanteNachrichtRecord>> {
        let jetzt_str = zeit_formatieren(jetzt);

        // Die aeussere Bedingung `claimed_by IS NULL` haelt die Anweisung
        // auch dann korrekt, wenn die Unterabfrage veraltet waere.
        let sql = format!(
            "UPDATE scheduled_messages
             SET claimed_by = ?, claimed_at = ?
             WHERE claimed_by IS NULL
               AND id IN (
                   SELECT id FROM scheduled_messages
                   WHERE claimed_by IS NULL
                     AND dead_lettered_at IS NULL
                     AND deliver_at <= ?
                   ORDER BY deliver_at ASC
                   LIMIT ?
               )
             RETURNING {SPALTEN}"
        );

        let rows = sqlx::query(&sql)
            .bind(token.to_string())
            .bind(&jetzt_str)
            .bind(&jetzt_str)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        // RETURNING garantiert keine Reihenfolge
        let mut records = rows.iter().map(row_to_geplant).collect::<DbResult<Vec<_>>>()?;
        records.sort_by(|a, b| a.deliver_at.cmp(&b.deliver_at));
        Ok(records)
    }

    async fn release_claim(
        &self,
        id: Uuid,
        token: Uuid,
        max_versuche: Option<u32>,
        jetzt: DateTime<Utc>,
    ) -> DbResult<Freigabe> {
        use sqlx::Row as _;

        let grenze = max_versuche.map(i64::from);

        let row = sqlx::query(
            "UPDATE scheduled_messages
             SET claimed_by = NULL,
                 claimed_at = NULL,
                 attempts = attempts + 1,
                 dead_lettered_at = CASE
                     WHEN ? IS NOT NULL AND attempts + 1 >= ? THEN ?
                     ELSE dead_lettered_at
                 END
             WHERE id = ? AND claimed_by = ?
             RETURNING attempts, dead_lettered_at",
        )
        .bind(grenze)
        .bind(grenze)
        .bind(zeit_formatieren(jetzt))
        .bind(id.to_string())
        .bind(token.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(Freigabe::NichtBeansprucht);
        };

        let versuche = versuche_lesen(row.try_get("attempts")?);
        let abgelegt: Option<String> = row.try_get("dead_lettered_at")?;

        Ok(match abgelegt {
            Some(_) => Freigabe::Abgelegt { versuche },
            None => Freigabe::Zurueckgestellt { versuche },
        })
    }

    async fn delete_many(&self, ids: &[Uuid]) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut geloescht = 0;
        for block in ids.chunks(LOESCH_BLOCK) {
            let platzhalter = vec!["?"; block.len()].join(", ");
            let sql = format!("DELETE FROM scheduled_messages WHERE id IN ({platzhalter})");
            let mut q = sqlx::query(&sql);
            for id in block {
                q = q.bind(id.to_string());
            }
            geloescht += q.execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(geloescht)
    }

    async fn list_dead_lettered(&self, limit: u32) -> DbResult<Vec<GeplanteNachrichtRecord>> {
        let sql = format!(
            "SELECT {SPALTEN} FROM scheduled_messages
             WHERE dead_lettered_at IS NOT NULL
             ORDER BY dead_lettered_at ASC
             LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_geplant).collect()
    }

    async fn revive(&self, id: Uuid) -> DbResult<bool> {
        let affected = sqlx::query(
            "UPDATE scheduled_messages
             SET dead_lettered_at = NULL, attempts = 0
             WHERE id = ? AND dead_lettered_at IS NOT NULL",
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }
}

fn versuche_lesen(wert: i64) -> u32 {
    u32::try_from(wert.max(0)).unwrap_or(u32::MAX)
}

fn row_to_geplant(row: &sqlx::sqlite::SqliteRow) -> DbResult<GeplanteNachrichtRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let recipient_str: String = row.try_get("recipient_id")?;
    let deliver_at_str: String = row.try_get("deliver_at")?;
    let created_at_str: String = row.try_get("created_at")?;
    let claimed_by: Option<String> = row.try_get("claimed_by")?;
    let flag: i64 = row.try_get("flag")?;

    Ok(GeplanteNachrichtRecord {
        id: uuid_parsen(&id_str)?,
        recipient_id: uuid_parsen(&recipient_str)?,
        envelope_content: row.try_get("envelope_content")?,
        envelope_reasoning: row.try_get("envelope_reasoning")?,
        flag: flag != 0,
        deliver_at: zeit_parsen("deliver_at", &deliver_at_str)?,
        claimed_by: claimed_by.as_deref().map(uuid_parsen).transpose()?,
        claimed_at: zeit_parsen_opt("claimed_at", row.try_get("claimed_at")?)?,
        attempts: versuche_lesen(row.try_get("attempts")?),
        dead_lettered_at: zeit_parsen_opt("dead_lettered_at", row.try_get("dead_lettered_at")?)?,
        created_at: zeit_parsen("created_at", &created_at_str)?,
    })
}
