//! Datenbankmodelle fuer Sealpost
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Umschlag-Felder sind undurchsichtige Base64-Strings; die Datenbank sieht
//! nie Klartext.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Empfaenger
// ---------------------------------------------------------------------------

/// Empfaenger-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmpfaengerRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Oeffentlicher RSA-Schluessel als PEM (SPKI)
    pub public_key: Option<String>,
    /// Upstream-Zugangsdaten als `v1.`-Token unter dem Master-Key
    #[serde(skip_serializing)]
    pub upstream_credential: Option<String>,
    /// Erlaubt Klartext-Einreichungen, die der Server selbst versiegelt
    pub filter_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Erstellen eines neuen Empfaengers
#[derive(Debug, Clone)]
pub struct NeuerEmpfaenger<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub public_key: Option<&'a str>,
}

/// Daten zum Aktualisieren eines Empfaengers
///
/// Bei `Option<Option<_>>` bedeutet `Some(None)` "Feld leeren".
#[derive(Debug, Clone, Default)]
pub struct EmpfaengerUpdate {
    pub email: Option<String>,
    pub public_key: Option<Option<String>>,
    pub upstream_credential: Option<Option<String>>,
    pub filter_enabled: Option<bool>,
}

// ---------------------------------------------------------------------------
// Share-Links
// ---------------------------------------------------------------------------

/// Share-Link-Datensatz
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub share_token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Nachrichten (Posteingang)
// ---------------------------------------------------------------------------

/// Status einer Nachricht im Posteingang
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NachrichtenStatus {
    Unread,
    Read,
    Archived,
}

impl NachrichtenStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Archived => "archived",
        }
    }

    pub fn aus_str(s: &str) -> Option<Self> {
        match s {
            "unread" => Some(Self::Unread),
            "read" => Some(Self::Read),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Nachricht im Posteingang eines Empfaengers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NachrichtRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub envelope_content: String,
    pub envelope_reasoning: String,
    pub flag: bool,
    pub status: NachrichtenStatus,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Daten zum Einliefern einer Nachricht in den Posteingang
#[derive(Debug, Clone)]
pub struct NeueNachricht<'a> {
    pub recipient_id: Uuid,
    pub envelope_content: &'a str,
    pub envelope_reasoning: &'a str,
    pub flag: bool,
}

// ---------------------------------------------------------------------------
// Zeitgesteuerte Nachrichten
// ---------------------------------------------------------------------------

/// Zeitgesteuerte Nachricht in der Warteschlange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeplanteNachrichtRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub envelope_content: String,
    pub envelope_reasoning: String,
    pub flag: bool,
    pub deliver_at: DateTime<Utc>,
    /// Claim-Token des Dispatch-Laufs, der die Zeile gerade haelt
    pub claimed_by: Option<Uuid>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Anzahl fehlgeschlagener Zustellversuche
    pub attempts: u32,
    /// Gesetzt, sobald die Zeile nach zu vielen Fehlversuchen abgelegt wurde
    pub dead_lettered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GeplanteNachrichtRecord {
    /// Gibt die Felder zurueck, die in den Posteingang uebernommen werden
    pub fn als_neue_nachricht(&self) -> NeueNachricht<'_> {
        NeueNachricht {
            recipient_id: self.recipient_id,
            envelope_content: &self.envelope_content,
            envelope_reasoning: &self.envelope_reasoning,
            flag: self.flag,
        }
    }
}

/// Daten zum Einplanen einer Nachricht
#[derive(Debug, Clone)]
pub struct NeueGeplanteNachricht<'a> {
    pub recipient_id: Uuid,
    pub envelope_content: &'a str,
    pub envelope_reasoning: &'a str,
    pub flag: bool,
    pub deliver_at: DateTime<Utc>,
}

/// Ergebnis beim Freigeben eines Claims nach fehlgeschlagener Zustellung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freigabe {
    /// Claim geloest, Zeile wird beim naechsten Lauf erneut versucht
    Zurueckgestellt { versuche: u32 },
    /// Versuchsgrenze erreicht, Zeile wird nicht mehr beansprucht
    Abgelegt { versuche: u32 },
    /// Zeile gehoerte nicht (mehr) diesem Claim-Token
    NichtBeansprucht,
}
