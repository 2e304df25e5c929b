//! Integrationstests fuer den Umschlag-Codec (oeffentliche API)

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use sealpost_crypto::{
    oeffnen, oeffnen_text, versiegeln, versiegeln_text, CryptoError, OeffentlicherSchluessel,
    PrivaterSchluessel, SchluesselPaar, STANDARD_MODULUS_BITS,
};

fn paar() -> SchluesselPaar {
    SchluesselPaar::generieren(STANDARD_MODULUS_BITS).expect("Schluessel-Paar generieren")
}

#[test]
fn roundtrip_verschiedene_laengen() {
    let p = paar();
    let grosser_text = "x".repeat(100_000);
    let faelle: Vec<&[u8]> = vec![
        b"",
        b"a",
        b"hello",
        "Ruecklaeufiges Feedback mit Umlauten: äöü ß 🚀".as_bytes(),
        grosser_text.as_bytes(),
    ];

    for klartext in faelle {
        let umschlag = versiegeln(klartext, &p.oeffentlich).unwrap();
        let ergebnis = oeffnen(&umschlag, &p.privat).unwrap();
        assert_eq!(ergebnis, klartext);
    }
}

#[test]
fn roundtrip_ueber_pem_wie_im_betrieb() {
    // Empfaenger erzeugt das Paar, der Server bekommt nur das oeffentliche PEM
    let p = paar();
    let pub_pem = p.oeffentlich.als_pem().unwrap();
    let priv_pem = p.privat.als_pem().unwrap();

    let server_seitig = OeffentlicherSchluessel::aus_pem(&pub_pem).unwrap();
    let umschlag = versiegeln_text("nur fuer dich", &server_seitig).unwrap();

    let empfaenger = PrivaterSchluessel::aus_pem(&priv_pem).unwrap();
    assert_eq!(oeffnen_text(&umschlag, &empfaenger).unwrap(), "nur fuer dich");
}

#[test]
fn falscher_schluessel_wird_abgelehnt() {
    let p1 = paar();
    let p2 = paar();

    let umschlag = versiegeln(b"vertraulich", &p1.oeffentlich).unwrap();
    let ergebnis = oeffnen(&umschlag, &p2.privat);

    assert!(matches!(ergebnis, Err(CryptoError::Entschluesselung)));
}

#[test]
fn jedes_gekippte_byte_wird_erkannt() {
    let p = paar();
    let umschlag = versiegeln(b"hello", &p.oeffentlich).unwrap();
    let original = B64.decode(&umschlag).unwrap();

    // Laengenpraefix, Stichproben im eingewickelten Schluessel, dann
    // jedes Byte von Nonce, Tag und Ciphertext
    let key_ende = 2 + 256;
    let mut positionen: Vec<usize> = vec![0, 1];
    positionen.extend((2..key_ende).step_by(17));
    positionen.push(key_ende - 1);
    positionen.extend(key_ende..original.len());

    for pos in positionen {
        let mut manipuliert = original.clone();
        manipuliert[pos] ^= 0x01;
        let ergebnis = oeffnen(&B64.encode(&manipuliert), &p.privat);
        assert!(
            matches!(ergebnis, Err(CryptoError::Entschluesselung)),
            "Manipulation an Position {pos} wurde nicht erkannt"
        );
    }
}

#[test]
fn fehler_verraten_keine_ursache() {
    let p = paar();
    let anderer = paar();
    let umschlag = versiegeln(b"x", &p.oeffentlich).unwrap();

    let mut kaputt = B64.decode(&umschlag).unwrap();
    let letzte = kaputt.len() - 1;
    kaputt[letzte] ^= 0xff;

    let falscher_key = oeffnen(&umschlag, &anderer.privat).unwrap_err();
    let manipuliert = oeffnen(&B64.encode(&kaputt), &p.privat).unwrap_err();

    assert_eq!(falscher_key.to_string(), manipuliert.to_string());
}
