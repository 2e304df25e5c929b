//! Passwortschutz fuer den privaten Schluessel (Empfaengerseite)
//!
//! Der private Schluessel wird lokal beim Empfaenger abgelegt. Damit er dort
//! nicht im Klartext liegt, wird er mit einem aus dem Passwort abgeleiteten
//! Schluessel verschluesselt:
//!
//! - PBKDF2-HMAC-SHA256, 100 000 Iterationen
//! - Salt: `<hex-salt>_priv`
//! - AES-256-GCM, Ausgabe `base64(iv(12) || ciphertext || tag(16))`

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use sha2::Sha256;

use crate::aead::{self, NONCE_LAENGE, SCHLUESSEL_LAENGE, TAG_LAENGE};
use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

/// PBKDF2-Iterationen fuer die Passwort-Ableitung
pub const PBKDF2_ITERATIONEN: u32 = 100_000;

/// Erzeugt ein zufaelliges Salt (32 Bytes, hex-kodiert)
pub fn salt_generieren() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn schluessel_ableiten(passwort: &str, salt: &str) -> SecretBytes {
    let mut key = vec![0u8; SCHLUESSEL_LAENGE];
    let salz = format!("{salt}_priv");
    pbkdf2::pbkdf2_hmac::<Sha256>(passwort.as_bytes(), salz.as_bytes(), PBKDF2_ITERATIONEN, &mut key);
    SecretBytes::new(key)
}

/// Verschluesselt einen PEM-Schluessel mit einem Passwort
pub fn privaten_schluessel_schuetzen(
    pem: &str,
    passwort: &str,
    salt: &str,
) -> CryptoResult<String> {
    let key = schluessel_ableiten(passwort, salt);
    let nonce = aead::zufalls_nonce();
    let versiegelt = aead::verschluesseln(key.as_bytes(), &nonce, pem.as_bytes())?;

    let mut out = Vec::with_capacity(NONCE_LAENGE + versiegelt.ciphertext.len() + TAG_LAENGE);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&versiegelt.ciphertext);
    out.extend_from_slice(&versiegelt.tag);
    Ok(B64.encode(out))
}

/// Entschluesselt einen passwortgeschuetzten PEM-Schluessel.
///
/// Ein falsches Passwort ist von beschaedigten Daten nicht unterscheidbar.
pub fn privaten_schluessel_oeffnen(
    geschuetzt: &str,
    passwort: &str,
    salt: &str,
) -> CryptoResult<String> {
    let bytes = B64
        .decode(geschuetzt.trim())
        .map_err(|_| CryptoError::Entschluesselung)?;
    if bytes.len() < NONCE_LAENGE + TAG_LAENGE {
        return Err(CryptoError::Entschluesselung);
    }

    let (nonce, rest) = bytes.split_at(NONCE_LAENGE);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LAENGE);

    let key = schluessel_ableiten(passwort, salt);
    let klartext = aead::entschluesseln(key.as_bytes(), nonce, ciphertext, tag)?;
    String::from_utf8(klartext).map_err(|_| CryptoError::Entschluesselung)
}
