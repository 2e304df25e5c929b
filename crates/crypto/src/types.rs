//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone)]
pub struct SecretBytes(Vec<u8>);

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Vergleicht zwei Geheimnisse (z.B. Bearer-Token) ohne fruehen Abbruch.
///
/// Beide Seiten werden vorher auf SHA-256 abgebildet, damit die Laufzeit
/// weder von der Laenge noch von der ersten abweichenden Stelle abhaengt.
pub fn geheimnis_gleich(a: &[u8], b: &[u8]) -> bool {
    Sha256::digest(a).ct_eq(&Sha256::digest(b)).into()
}
