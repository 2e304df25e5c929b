//! Fehlertypen fuer das Delivery-Crate

use thiserror::Error;

/// Fehler bei Einreichung, Zustellung und Empfaenger-Verwaltung
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Link ungueltig oder deaktiviert")]
    LinkNichtGefunden,

    #[error("Empfaenger nicht gefunden: {0}")]
    EmpfaengerNichtGefunden(String),

    #[error("Nachricht nicht gefunden: {0}")]
    NachrichtNichtGefunden(String),

    #[error("Empfaenger hat keinen oeffentlichen Schluessel hinterlegt")]
    KeinSchluessel,

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("{feld} zu gross: {laenge} Zeichen (Maximum: {max})")]
    ZuGross {
        feld: &'static str,
        laenge: usize,
        max: usize,
    },

    #[error("Serverseitige Filterung deaktiviert: versiegelte Nachricht erforderlich")]
    VersiegelungErforderlich,

    #[error("Benutzername bereits vergeben: {0}")]
    NameVergeben(String),

    #[error("Zustellung in den Posteingang fehlgeschlagen: {0}")]
    Zustellung(String),

    #[error("Kein Master-Key konfiguriert")]
    KeinMasterKey,

    #[error("Krypto-Fehler: {0}")]
    Krypto(#[from] sealpost_crypto::CryptoError),

    #[error("Datenbank-Fehler: {0}")]
    Datenbank(#[from] sealpost_db::DbError),
}

impl DeliveryError {
    /// HTTP-Statuscode fuer REST-Antworten
    pub fn http_status(&self) -> u16 {
        match self {
            Self::LinkNichtGefunden
            | Self::EmpfaengerNichtGefunden(_)
            | Self::NachrichtNichtGefunden(_) => 404,
            Self::UngueltigeEingabe(_) | Self::VersiegelungErforderlich => 400,
            Self::ZuGross { .. } => 413,
            Self::KeinSchluessel | Self::NameVergeben(_) => 409,
            Self::Zustellung(_)
            | Self::KeinMasterKey
            | Self::Krypto(_)
            | Self::Datenbank(_) => 500,
        }
    }
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Fehler beim Versenden einer Benachrichtigung. Wird nie an den
/// Aufrufer weitergereicht, nur protokolliert.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP-Fehler: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unerwarteter Status vom Mail-Dienst: {0}")]
    Status(u16),
}
