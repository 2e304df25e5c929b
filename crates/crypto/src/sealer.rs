//! RSA-OAEP (SHA-256) Schluessel-Einwicklung
//!
//! Der Server kennt nur den oeffentlichen Schluessel eines Empfaengers und
//! kann damit einwickeln, aber nie auswickeln. Der private Schluessel wird
//! auf der Empfaengerseite erzeugt und verlaesst sie nicht.
//!
//! Schluessel werden als PEM ausgetauscht (SPKI fuer den oeffentlichen,
//! PKCS#8 fuer den privaten Schluessel).

use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    traits::PublicKeyParts,
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;

use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

/// Standard-Modulusgroesse fuer neue Schluessel-Paare
pub const STANDARD_MODULUS_BITS: usize = 2048;

const PEM_PUBLIC: &str = "PUBLIC KEY";
const PEM_PRIVATE: &str = "PRIVATE KEY";

/// Oeffentlicher Schluessel eines Empfaengers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OeffentlicherSchluessel(RsaPublicKey);

/// Privater Schluessel eines Empfaengers (nur auf Empfaengerseite)
#[derive(Clone)]
pub struct PrivaterSchluessel(RsaPrivateKey);

impl std::fmt::Debug for PrivaterSchluessel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivaterSchluessel([REDACTED] {} bit)", self.0.size() * 8)
    }
}

/// Ein Schluessel-Paar (oeffentlich + privat)
#[derive(Debug, Clone)]
pub struct SchluesselPaar {
    pub privat: PrivaterSchluessel,
    pub oeffentlich: OeffentlicherSchluessel,
}

impl SchluesselPaar {
    /// Generiert ein neues RSA-Schluessel-Paar (e = 65537)
    pub fn generieren(bits: usize) -> CryptoResult<Self> {
        let privat = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::SchluesselGenerierung(e.to_string()))?;
        let oeffentlich = RsaPublicKey::from(&privat);
        Ok(Self {
            privat: PrivaterSchluessel(privat),
            oeffentlich: OeffentlicherSchluessel(oeffentlich),
        })
    }
}

impl OeffentlicherSchluessel {
    /// Importiert einen SPKI-PEM-Schluessel.
    ///
    /// Zeilenumbrueche, `\r` und Leerzeichen im Base64-Koerper werden toleriert.
    pub fn aus_pem(pem: &str) -> CryptoResult<Self> {
        let der = pem_koerper(pem, PEM_PUBLIC)?;
        RsaPublicKey::from_public_key_der(&der)
            .map(Self)
            .map_err(|e| CryptoError::UngueltigerSchluessel(e.to_string()))
    }

    /// Exportiert als SPKI-PEM
    pub fn als_pem(&self) -> CryptoResult<String> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::UngueltigerSchluessel(e.to_string()))
    }

    /// Modulusgroesse in Bytes (= Laenge eines eingewickelten Schluessels)
    pub fn modulus_bytes(&self) -> usize {
        self.0.size()
    }

    /// Wickelt einen symmetrischen Schluessel fuer diesen Empfaenger ein
    pub fn einwickeln(&self, schluessel: &[u8]) -> CryptoResult<Vec<u8>> {
        self.0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), schluessel)
            .map_err(|e| CryptoError::Versiegelung(e.to_string()))
    }
}

impl PrivaterSchluessel {
    /// Importiert einen PKCS#8-PEM-Schluessel
    pub fn aus_pem(pem: &str) -> CryptoResult<Self> {
        let der = SecretBytes::new(pem_koerper(pem, PEM_PRIVATE)?);
        RsaPrivateKey::from_pkcs8_der(der.as_bytes())
            .map(Self)
            .map_err(|e| CryptoError::UngueltigerSchluessel(e.to_string()))
    }

    /// Exportiert als PKCS#8-PEM
    pub fn als_pem(&self) -> CryptoResult<String> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.as_str().to_owned())
            .map_err(|e| CryptoError::UngueltigerSchluessel(e.to_string()))
    }

    /// Der zugehoerige oeffentliche Schluessel
    pub fn oeffentlicher_schluessel(&self) -> OeffentlicherSchluessel {
        OeffentlicherSchluessel(RsaPublicKey::from(&self.0))
    }

    /// Wickelt einen eingewickelten Schluessel aus.
    ///
    /// Jeder Fehler ergibt `CryptoError::Entschluesselung`.
    pub fn auswickeln(&self, eingewickelt: &[u8]) -> CryptoResult<SecretBytes> {
        self.0
            .decrypt_blinded(&mut OsRng, Oaep::new::<Sha256>(), eingewickelt)
            .map(SecretBytes::new)
            .map_err(|_| CryptoError::Entschluesselung)
    }
}

/// Extrahiert den DER-Inhalt eines PEM-Blocks mit dem gegebenen Label
fn pem_koerper(pem: &str, label: &str) -> CryptoResult<Vec<u8>> {
    let anfang = format!("-----BEGIN {label}-----");
    let ende = format!("-----END {label}-----");

    let start = pem
        .find(&anfang)
        .ok_or_else(|| CryptoError::UngueltigerSchluessel(format!("PEM-Kopf '{anfang}' fehlt")))?
        + anfang.len();
    let stop = pem[start..]
        .find(&ende)
        .ok_or_else(|| CryptoError::UngueltigerSchluessel(format!("PEM-Ende '{ende}' fehlt")))?
        + start;

    let koerper: String = pem[start..stop]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    B64.decode(koerper.as_bytes())
        .map_err(|e| CryptoError::UngueltigerSchluessel(format!("PEM-Koerper: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
