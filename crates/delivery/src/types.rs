//! Ein- und Ausgabetypen der Dienste

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inhalt einer Einreichung
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Nutzlast {
    /// Klartext, der Server versiegelt ihn fuer den Empfaenger
    Plain { content: String },
    /// Beim Absender versiegelte Umschlaege (Base64)
    Sealed {
        envelope_content: String,
        envelope_reasoning: String,
    },
}

/// Eine Einreichung ueber einen Share-Link
#[derive(Debug, Clone)]
pub struct Einreichung {
    pub share_token: String,
    pub nutzlast: Nutzlast,
    /// Gewuenschter Zustellzeitpunkt
    pub deliver_at: Option<DateTime<Utc>>,
}

/// Ergebnis einer erfolgreichen Einreichung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EinreichungsErgebnis {
    Zugestellt,
    Geplant { scheduled_at: DateTime<Utc> },
}

/// Oeffentliche Angaben zu einem Share-Link
#[derive(Debug, Clone, Serialize)]
pub struct LinkInfo {
    pub username: String,
    pub public_key: Option<String>,
    pub filter_enabled: bool,
}

/// Grenzen fuer Einreichungen
#[derive(Debug, Clone)]
pub struct EinreichungsGrenzen {
    /// Maximale Laenge einer Klartext-Nachricht in Zeichen
    pub max_klartext_zeichen: usize,
    /// Maximale Laenge je Umschlag-Feld in Zeichen
    pub max_umschlag_zeichen: usize,
    /// Wie weit in der Zukunft eine Zustellung geplant werden darf
    pub max_vorlauf_tage: i64,
}

impl Default for EinreichungsGrenzen {
    fn default() -> Self {
        Self {
            max_klartext_zeichen: 1000,
            max_umschlag_zeichen: 16_384,
            max_vorlauf_tage: 14,
        }
    }
}
