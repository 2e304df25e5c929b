//! Fehlertypen fuer das Kryptografie-Subsystem
//!
//! Entschluesselungsfehler sind absichtlich ohne Ursache: falscher Schluessel,
//! manipulierte Bytes und Tag-Mismatch ergeben denselben Fehler.

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Versiegeln fuer einen Empfaenger fehlgeschlagen (ungueltiger oeffentlicher Schluessel)
    #[error("Versiegelung fehlgeschlagen: {0}")]
    Versiegelung(String),

    /// Generischer Entschluesselungsfehler ohne Ursachenangabe
    #[error("Entschluesselung fehlgeschlagen")]
    Entschluesselung,

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Ungueltiger Schluessel: {0}")]
    UngueltigerSchluessel(String),

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Schluessel-Generierung fehlgeschlagen: {0}")]
    SchluesselGenerierung(String),

    #[error("Nicht unterstuetzte Token-Version: {0}")]
    NichtUnterstuetzteVersion(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
