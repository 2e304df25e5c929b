//! At-Rest-Geheimnisse unter dem Server-Master-Key
//!
//! Fuer Geheimnisse, die der Server spaeter selbst im Namen eines Benutzers
//! verwenden muss (z.B. ein persoenlicher Upstream-API-Schluessel). Der
//! Master-Key ist ein einzelner, prozessweiter 256-Bit-Schluessel und hat
//! nichts mit den Empfaenger-Schluesselpaaren zu tun.
//!
//! ## Token-Format
//! ```text
//! v1.<b64(nonce)>.<b64(ciphertext)>.<b64(tag)>
//! ```

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};

use crate::aead::{self, NONCE_LAENGE, SCHLUESSEL_LAENGE, TAG_LAENGE};
use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

/// Versionspraefix aktueller Tokens
pub const TOKEN_VERSION: &str = "v1";

/// Verschluesselt und entschluesselt Server-Geheimnisse mit dem Master-Key
#[derive(Clone)]
pub struct GeheimnisBox {
    master_key: SecretBytes,
}

impl std::fmt::Debug for GeheimnisBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeheimnisBox")
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

impl GeheimnisBox {
    /// Erstellt die Box aus rohem Schluesselmaterial (genau 32 Bytes)
    pub fn neu(master_key: &[u8]) -> CryptoResult<Self> {
        if master_key.len() != SCHLUESSEL_LAENGE {
            return Err(CryptoError::UngueltigeSchluesselLaenge {
                erwartet: SCHLUESSEL_LAENGE,
                erhalten: master_key.len(),
            });
        }
        Ok(Self {
            master_key: SecretBytes::new(master_key.to_vec()),
        })
    }

    /// Erstellt die Box aus einem Base64-kodierten Master-Key
    pub fn aus_base64(master_key_b64: &str) -> CryptoResult<Self> {
        let bytes = SecretBytes::new(B64.decode(master_key_b64.trim()).map_err(|e| {
            CryptoError::UngueltigerSchluessel(format!("Master-Key ist kein Base64: {e}"))
        })?);
        Self::neu(bytes.as_bytes())
    }

    /// Schuetzt ein Geheimnis und gibt das versionierte Token zurueck
    pub fn schuetzen(&self, geheimnis: &str) -> CryptoResult<String> {
        let nonce = aead::zufalls_nonce();
        let versiegelt =
            aead::verschluesseln(self.master_key.as_bytes(), &nonce, geheimnis.as_bytes())?;

        Ok(format!(
            "{TOKEN_VERSION}.{}.{}.{}",
            B64.encode(nonce),
            B64.encode(&versiegelt.ciphertext),
            B64.encode(versiegelt.tag)
        ))
    }

    /// Deckt ein Token wieder auf.
    ///
    /// Eine fremde Version ergibt `NichtUnterstuetzteVersion`, jede andere
    /// Abweichung `Entschluesselung`.
    pub fn aufdecken(&self, token: &str) -> CryptoResult<String> {
        let teile: Vec<&str> = token.trim().split('.').collect();
        let [version, nonce_b64, ct_b64, tag_b64] = teile.as_slice() else {
            return Err(CryptoError::Entschluesselung);
        };

        if *version != TOKEN_VERSION {
            return Err(CryptoError::NichtUnterstuetzteVersion((*version).to_string()));
        }

        let nonce = B64.decode(nonce_b64).map_err(|_| CryptoError::Entschluesselung)?;
        let ciphertext = B64.decode(ct_b64).map_err(|_| CryptoError::Entschluesselung)?;
        let tag = B64.decode(tag_b64).map_err(|_| CryptoError::Entschluesselung)?;

        if nonce.len() != NONCE_LAENGE || tag.len() != TAG_LAENGE {
            return Err(CryptoError::Entschluesselung);
        }

        let klartext = aead::entschluesseln(self.master_key.as_bytes(), &nonce, &ciphertext, &tag)?;
        String::from_utf8(klartext).map_err(|_| CryptoError::Entschluesselung)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
