//! # sealpost-crypto
//!
//! Umschlag-Verschluesselung und At-Rest-Geheimnisse fuer Sealpost.
//!
//! ## Module
//! - `aead` - AES-256-GCM mit abgetrenntem Tag
//! - `sealer` - RSA-OAEP (SHA-256) Schluessel-Einwicklung, PEM-Import/-Export
//! - `envelope` - Umschlag-Codec (Versiegeln/Oeffnen fuer einen Empfaenger)
//! - `at_rest` - Server-Geheimnisse unter dem Master-Key (`v1.`-Tokens)
//! - `keystore` - Passwortschutz fuer den privaten Schluessel (Empfaengerseite)
//! - `types` - Gemeinsame Typen
//! - `error` - Fehlertypen
//!
//! Der Server haelt nur oeffentliche Schluessel. Er kann versiegeln, aber
//! keinen Umschlag oeffnen.

pub mod aead;
pub mod at_rest;
pub mod envelope;
pub mod error;
pub mod keystore;
pub mod sealer;
pub mod types;

// Bequeme Re-Exports
pub use at_rest::GeheimnisBox;
pub use envelope::{oeffnen, oeffnen_text, struktur_gueltig, versiegeln, versiegeln_text, Umschlag};
pub use error::{CryptoError, CryptoResult};
pub use sealer::{OeffentlicherSchluessel, PrivaterSchluessel, SchluesselPaar, STANDARD_MODULUS_BITS};
pub use types::{geheimnis_gleich, SecretBytes};
