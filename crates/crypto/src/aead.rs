//! AES-256-GCM mit abgetrenntem Auth-Tag
//!
//! Der Umschlag und das At-Rest-Token speichern Nonce, Tag und Ciphertext
//! getrennt. Daher wird hier mit `*_in_place_detached` gearbeitet statt mit
//! dem angehaengten Tag der `Aead`-Schnittstelle.
//!
//! ## Nonce-Laengen
//! - 12 Bytes: aktuelles Format
//! - 16 Bytes: Legacy-Format, nur beim Entschluesseln

use aes_gcm::{
    aead::{consts::U16, rand_core::RngCore, AeadInPlace, KeyInit, OsRng},
    aes::Aes256,
    Aes256Gcm, AesGcm,
};

use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

/// Laenge des symmetrischen Schluessels (256 Bit)
pub const SCHLUESSEL_LAENGE: usize = 32;
/// Laenge der Nonce im aktuellen Format (96 Bit)
pub const NONCE_LAENGE: usize = 12;
/// Laenge der Nonce in aelteren Umschlaegen
pub const LEGACY_NONCE_LAENGE: usize = 16;
/// Laenge des Auth-Tags (128 Bit)
pub const TAG_LAENGE: usize = 16;

/// AES-256-GCM mit 16-Byte-Nonce (nur Legacy-Entschluesselung)
type Aes256GcmLegacy = AesGcm<Aes256, U16>;

/// Ergebnis einer AEAD-Verschluesselung
#[derive(Debug, Clone)]
pub struct Versiegelt {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LAENGE],
}

/// Erzeugt einen frischen 256-Bit-Schluessel aus dem OS-Zufallsgenerator
pub fn zufalls_schluessel() -> SecretBytes {
    let mut bytes = vec![0u8; SCHLUESSEL_LAENGE];
    OsRng.fill_bytes(&mut bytes);
    SecretBytes::new(bytes)
}

/// Erzeugt eine frische 96-Bit-Nonce
pub fn zufalls_nonce() -> [u8; NONCE_LAENGE] {
    let mut nonce = [0u8; NONCE_LAENGE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Verschluesselt `klartext` unter (Schluessel, Nonce)
pub fn verschluesseln(
    schluessel: &[u8],
    nonce: &[u8; NONCE_LAENGE],
    klartext: &[u8],
) -> CryptoResult<Versiegelt> {
    if schluessel.len() != SCHLUESSEL_LAENGE {
        return Err(CryptoError::UngueltigeSchluesselLaenge {
            erwartet: SCHLUESSEL_LAENGE,
            erhalten: schluessel.len(),
        });
    }

    let cipher = Aes256Gcm::new_from_slice(schluessel)
        .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

    let mut puffer = klartext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(aes_gcm::Nonce::from_slice(nonce), b"", &mut puffer)
        .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

    let mut tag_bytes = [0u8; TAG_LAENGE];
    tag_bytes.copy_from_slice(&tag);

    Ok(Versiegelt {
        ciphertext: puffer,
        tag: tag_bytes,
    })
}

/// Entschluesselt und verifiziert den Tag.
///
/// Akzeptiert 12-Byte-Nonces und (Legacy) 16-Byte-Nonces. Jeder Fehler
/// wird zu `CryptoError::Entschluesselung`.
pub fn entschluesseln(
    schluessel: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> CryptoResult<Vec<u8>> {
    if schluessel.len() != SCHLUESSEL_LAENGE || tag.len() != TAG_LAENGE {
        return Err(CryptoError::Entschluesselung);
    }

    match nonce.len() {
        NONCE_LAENGE => {
            let cipher =
                Aes256Gcm::new_from_slice(schluessel).map_err(|_| CryptoError::Entschluesselung)?;
            oeffnen_mit(&cipher, nonce, ciphertext, tag)
        }
        LEGACY_NONCE_LAENGE => {
            let cipher = Aes256GcmLegacy::new_from_slice(schluessel)
                .map_err(|_| CryptoError::Entschluesselung)?;
            oeffnen_mit(&cipher, nonce, ciphertext, tag)
        }
        _ => Err(CryptoError::Entschluesselung),
    }
}

fn oeffnen_mit<C: AeadInPlace>(
    cipher: &C,
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> CryptoResult<Vec<u8>> {
    let mut puffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            aes_gcm::aead::Nonce::<C>::from_slice(nonce),
            b"",
            &mut puffer,
            aes_gcm::aead::Tag::<C>::from_slice(tag),
        )
        .map_err(|_| CryptoError::Entschluesselung)?;
    Ok(puffer)
}

/// Verschluesselt im Legacy-Format (16-Byte-Nonce).
///
/// Wird nur in Tests benoetigt, um alte Umschlaege nachzubilden.
#[cfg(test)]
pub(crate) fn verschluesseln_legacy(
    schluessel: &[u8],
    nonce: &[u8; LEGACY_NONCE_LAENGE],
    klartext: &[u8],
) -> Versiegelt {
    let cipher = Aes256GcmLegacy::new_from_slice(schluessel).unwrap();
    let mut puffer = klartext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(aes_gcm::aead::Nonce::<Aes256GcmLegacy>::from_slice(nonce), b"", &mut puffer)
        .unwrap();
    let mut tag_bytes = [0u8; TAG_LAENGE];
    tag_bytes.copy_from_slice(&tag);
    Versiegelt {
        ciphertext: puffer,
        tag: tag_bytes,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
