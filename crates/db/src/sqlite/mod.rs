//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod links;
pub mod messages;
pub mod pool;
pub mod recipients;
pub mod scheduled;

pub use pool::SqliteDb;

use chrono::{DateTime, Timelike, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::DbResult;

/// Zeitstempel werden mit fester Breite gespeichert, damit der
/// Textvergleich in SQL der zeitlichen Ordnung entspricht.
const ZEIT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Kuerzt auf Millisekunden, die Speichergenauigkeit
pub(crate) fn auf_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(dt.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(dt)
}

pub(crate) fn zeit_formatieren(dt: DateTime<Utc>) -> String {
    dt.format(ZEIT_FORMAT).to_string()
}

pub(crate) fn zeit_parsen(feld: &str, wert: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(wert)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltiges {feld} '{wert}': {e}")))
}

pub(crate) fn zeit_parsen_opt(feld: &str, wert: Option<String>) -> DbResult<Option<DateTime<Utc>>> {
    wert.as_deref().map(|s| zeit_parsen(feld, s)).transpose()
}

pub(crate) fn uuid_parsen(wert: &str) -> DbResult<Uuid> {
    Uuid::parse_str(wert).map_err(|e| DbError::intern(format!("Ungueltige UUID '{wert}': {e}")))
}
