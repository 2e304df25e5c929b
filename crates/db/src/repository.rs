//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Geschaeftslogik von der konkreten
//! Datenbank-Implementierung. Dispatcher und Dienste kennen nur diese
//! Traits; `SqliteDb` implementiert sie alle.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    EmpfaengerRecord, EmpfaengerUpdate, Freigabe, GeplanteNachrichtRecord, LinkRecord,
    NachrichtRecord, NachrichtenStatus, NeueGeplanteNachricht, NeueNachricht, NeuerEmpfaenger,
};

/// Ergebnis-Typ fuer Datenbankoperationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://sealpost.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus aktiviert werden soll
    pub sqlite_wal: bool,
    /// Wartezeit bei gesperrter Datenbank in Millisekunden
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sealpost.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Repository fuer Empfaenger
#[allow(async_fn_in_trait)]
pub trait RecipientRepository: Send + Sync {
    async fn create(&self, data: NeuerEmpfaenger<'_>) -> DbResult<EmpfaengerRecord>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<EmpfaengerRecord>>;
    async fn get_by_name(&self, username: &str) -> DbResult<Option<EmpfaengerRecord>>;
    async fn update(&self, id: Uuid, data: EmpfaengerUpdate) -> DbResult<EmpfaengerRecord>;
    /// Loescht den Empfaenger samt Links, Posteingang und Warteschlange
    async fn delete(&self, id: Uuid) -> DbResult<bool>;
}

/// Repository fuer Share-Links
#[allow(async_fn_in_trait)]
pub trait ShareLinkRepository: Send + Sync {
    async fn create(&self, recipient_id: Uuid, share_token: &str) -> DbResult<LinkRecord>;
    /// Laedt einen aktiven Link; deaktivierte Links gelten als unbekannt
    async fn get_active_by_token(&self, share_token: &str) -> DbResult<Option<LinkRecord>>;
    async fn list_for_recipient(&self, recipient_id: Uuid) -> DbResult<Vec<LinkRecord>>;
    async fn deactivate(&self, id: Uuid, recipient_id: Uuid) -> DbResult<bool>;
}

/// Repository fuer den Posteingang
#[allow(async_fn_in_trait)]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, data: NeueNachricht<'_>) -> DbResult<NachrichtRecord>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<NachrichtRecord>>;
    /// Posteingang, neueste zuerst
    async fn list_for_recipient(&self, recipient_id: Uuid) -> DbResult<Vec<NachrichtRecord>>;
    /// Setzt den Status; `read_at` bleibt unveraendert wenn `None`.
    /// Gibt false zurueck wenn die Nachricht nicht dem Empfaenger gehoert.
    async fn set_status(
        &self,
        id: Uuid,
        recipient_id: Uuid,
        status: NachrichtenStatus,
        read_at: Option<DateTime<Utc>>,
    ) -> DbResult<bool>;
    async fn delete(&self, id: Uuid, recipient_id: Uuid) -> DbResult<bool>;
}

/// Repository fuer die Warteschlange zeitgesteuerter Nachrichten
///
/// Jede Operation ist eine einzelne atomare Anweisung. Zwei Dispatcher, die
/// gleichzeitig `claim_due` ausfuehren, erhalten disjunkte Mengen.
#[allow(async_fn_in_trait)]
pub trait ScheduledRepository: Send + Sync {
    async fn create(&self, data: NeueGeplanteNachricht<'_>) -> DbResult<GeplanteNachrichtRecord>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<GeplanteNachrichtRecord>>;

    /// Loest Claims, die vor `grenze` gesetzt wurden. Gibt die Anzahl zurueck.
    async fn reap_stale_claims(&self, grenze: DateTime<Utc>) -> DbResult<u64>;

    /// Beansprucht bis zu `limit` faellige, unbeanspruchte Zeilen fuer `token`.
    /// Ergebnis ist nach `deliver_at` aufsteigend sortiert.
    async fn claim_due(
        &self,
        token: Uuid,
        jetzt: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<GeplanteNachrichtRecord>>;

    /// Gibt einen eigenen Claim nach einem Fehlversuch frei und zaehlt den
    /// Versuch. Bei `max_versuche` erreicht wird die Zeile abgelegt.
    async fn release_claim(
        &self,
        id: Uuid,
        token: Uuid,
        max_versuche: Option<u32>,
        jetzt: DateTime<Utc>,
    ) -> DbResult<Freigabe>;

    /// Loescht die angegebenen Zeilen in einer Anweisung
    async fn delete_many(&self, ids: &[Uuid]) -> DbResult<u64>;

    /// Abgelegte Zeilen, aelteste zuerst
    async fn list_dead_lettered(&self, limit: u32) -> DbResult<Vec<GeplanteNachrichtRecord>>;

    /// Holt eine abgelegte Zeile zurueck in die Warteschlange
    async fn revive(&self, id: Uuid) -> DbResult<bool>;
}
