//! Umschlag-Codec: hybrides Versiegeln fuer genau einen Empfaenger
//!
//! Jede Nachricht bekommt einen frischen AES-256-GCM-Schluessel und eine
//! frische Nonce. Der Schluessel wird mit RSA-OAEP (SHA-256) fuer den
//! Empfaenger eingewickelt.
//!
//! ## Format (Base64-kodiert gespeichert)
//! ```text
//! [key_len(2, BE)] [wrapped_key(key_len)] [nonce(12)] [tag(16)] [ciphertext]
//! ```
//!
//! Aeltere Umschlaege verwenden an derselben Stelle eine 16-Byte-Nonce.
//! Dieses Layout wird beim Oeffnen als Fallback versucht, aber nie erzeugt.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use tracing::debug;

use crate::aead::{self, LEGACY_NONCE_LAENGE, NONCE_LAENGE, SCHLUESSEL_LAENGE, TAG_LAENGE};
use crate::error::{CryptoError, CryptoResult};
use crate::sealer::{OeffentlicherSchluessel, PrivaterSchluessel};

/// Ein zerlegter Umschlag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Umschlag {
    /// Mit RSA-OAEP eingewickelter Inhaltsschluessel
    pub eingewickelter_schluessel: Vec<u8>,
    /// 12 Bytes (16 Bytes im Legacy-Layout)
    pub nonce: Vec<u8>,
    pub tag: [u8; TAG_LAENGE],
    pub ciphertext: Vec<u8>,
}

impl Umschlag {
    /// Serialisiert ins Wire-Format
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        let key_len = u16::try_from(self.eingewickelter_schluessel.len()).map_err(|_| {
            CryptoError::Versiegelung(format!(
                "Eingewickelter Schluessel zu lang: {} Bytes",
                self.eingewickelter_schluessel.len()
            ))
        })?;

        let mut out = Vec::with_capacity(
            2 + self.eingewickelter_schluessel.len()
                + self.nonce.len()
                + TAG_LAENGE
                + self.ciphertext.len(),
        );
        out.extend_from_slice(&key_len.to_be_bytes());
        out.extend_from_slice(&self.eingewickelter_schluessel);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        Ok(out)
    }

    /// Zerlegt Bytes mit der gegebenen Nonce-Laenge
    pub fn from_bytes(bytes: &[u8], nonce_laenge: usize) -> Option<Self> {
        if bytes.len() < 2 {
            return None;
        }
        let key_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;

        let mut offset = 2;
        let eingewickelter_schluessel = bytes.get(offset..offset + key_len)?.to_vec();
        offset += key_len;
        let nonce = bytes.get(offset..offset + nonce_laenge)?.to_vec();
        offset += nonce_laenge;
        let mut tag = [0u8; TAG_LAENGE];
        tag.copy_from_slice(bytes.get(offset..offset + TAG_LAENGE)?);
        offset += TAG_LAENGE;
        let ciphertext = bytes[offset..].to_vec();

        Some(Self {
            eingewickelter_schluessel,
            nonce,
            tag,
            ciphertext,
        })
    }

    /// Serialisiert und kodiert als Base64
    pub fn to_base64(&self) -> CryptoResult<String> {
        Ok(B64.encode(self.to_bytes()?))
    }
}

/// Versiegelt `klartext` fuer den Empfaenger und gibt den Base64-Umschlag zurueck
pub fn versiegeln(klartext: &[u8], empfaenger: &OeffentlicherSchluessel) -> CryptoResult<String> {
    let schluessel = aead::zufalls_schluessel();
    let nonce = aead::zufalls_nonce();

    let versiegelt = aead::verschluesseln(schluessel.as_bytes(), &nonce, klartext)?;
    let eingewickelt = empfaenger.einwickeln(schluessel.as_bytes())?;

    Umschlag {
        eingewickelter_schluessel: eingewickelt,
        nonce: nonce.to_vec(),
        tag: versiegelt.tag,
        ciphertext: versiegelt.ciphertext,
    }
    .to_base64()
}

/// Bequemlichkeit fuer UTF-8-Text
pub fn versiegeln_text(text: &str, empfaenger: &OeffentlicherSchluessel) -> CryptoResult<String> {
    versiegeln(text.as_bytes(), empfaenger)
}

/// Oeffnet einen Base64-Umschlag mit dem privaten Schluessel des Empfaengers.
///
/// Falscher Schluessel, ungueltiges Base64, abgeschnittene oder manipulierte
/// Bytes ergeben alle `CryptoError::Entschluesselung`.
pub fn oeffnen(umschlag_b64: &str, schluessel: &PrivaterSchluessel) -> CryptoResult<Vec<u8>> {
    let bytes = B64
        .decode(umschlag_b64.trim())
        .map_err(|_| CryptoError::Entschluesselung)?;

    let umschlag =
        Umschlag::from_bytes(&bytes, NONCE_LAENGE).ok_or(CryptoError::Entschluesselung)?;

    // Der eingewickelte Schluessel liegt in beiden Layouts an derselben Stelle
    let inhalt_schluessel = schluessel.auswickeln(&umschlag.eingewickelter_schluessel)?;
    if inhalt_schluessel.len() != SCHLUESSEL_LAENGE {
        return Err(CryptoError::Entschluesselung);
    }

    if let Ok(klartext) = aead::entschluesseln(
        inhalt_schluessel.as_bytes(),
        &umschlag.nonce,
        &umschlag.ciphertext,
        &umschlag.tag,
    ) {
        return Ok(klartext);
    }

    // Legacy-Layout: 16-Byte-Nonce (nur lesen, nie schreiben)
    let legacy =
        Umschlag::from_bytes(&bytes, LEGACY_NONCE_LAENGE).ok_or(CryptoError::Entschluesselung)?;
    let klartext = aead::entschluesseln(
        inhalt_schluessel.as_bytes(),
        &legacy.nonce,
        &legacy.ciphertext,
        &legacy.tag,
    )?;
    debug!("Umschlag im Legacy-Layout (16-Byte-Nonce) geoeffnet");
    Ok(klartext)
}

/// Oeffnet einen Umschlag und dekodiert den Inhalt als UTF-8
pub fn oeffnen_text(umschlag_b64: &str, schluessel: &PrivaterSchluessel) -> CryptoResult<String> {
    let bytes = oeffnen(umschlag_b64, schluessel)?;
    String::from_utf8(bytes).map_err(|_| CryptoError::Entschluesselung)
}

/// Prueft nur die Struktur eines Umschlags (Base64 + Laengenfelder).
///
/// Damit kann der Server clientseitig versiegelte Umschlaege annehmen,
/// ohne sie oeffnen zu koennen.
pub fn struktur_gueltig(umschlag_b64: &str) -> bool {
    B64.decode(umschlag_b64.trim())
        .ok()
        .and_then(|bytes| Umschlag::from_bytes(&bytes, NONCE_LAENGE))
        .is_some_and(|u| !u.eingewickelter_schluessel.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
