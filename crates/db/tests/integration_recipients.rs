//! Integration-Tests fuer RecipientRepository und ShareLinkRepository (In-Memory SQLite)

use sealpost_db::{
    models::{EmpfaengerUpdate, NeuerEmpfaenger},
    RecipientRepository, ShareLinkRepository, SqliteDb,
};

async fn db() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

fn neu<'a>(name: &'a str) -> NeuerEmpfaenger<'a> {
    NeuerEmpfaenger {
        username: name,
        email: "alice@example.org",
        public_key: None,
    }
}

#[tokio::test]
async fn empfaenger_erstellen_und_laden() {
    let db = db().await;

    let e = RecipientRepository::create(&db, neu("alice"))
        .await
        .expect("Empfaenger erstellen fehlgeschlagen");

    assert_eq!(e.username, "alice");
    assert!(e.filter_enabled);
    assert!(e.public_key.is_none());

    let geladen = RecipientRepository::get_by_id(&db, e.id)
        .await
        .unwrap()
        .expect("Empfaenger sollte gefunden werden");
    assert_eq!(geladen.id, e.id);
    assert_eq!(geladen.created_at, e.created_at);

    let per_name = RecipientRepository::get_by_name(&db, "alice").await.unwrap();
    assert_eq!(per_name.map(|r| r.id), Some(e.id));
}

#[tokio::test]
async fn doppelter_benutzername_schlaegt_fehl() {
    let db = db().await;
    RecipientRepository::create(&db, neu("bob")).await.unwrap();

    let err = RecipientRepository::create(&db, neu("bob"))
        .await
        .expect_err("Doppelter Name muss fehlschlagen");
    assert!(err.ist_eindeutigkeit());
}

#[tokio::test]
async fn empfaenger_aktualisieren() {
    let db = db().await;
    let e = RecipientRepository::create(&db, neu("carol")).await.unwrap();

    let aktualisiert = RecipientRepository::update(
        &db,
        e.id,
        EmpfaengerUpdate {
            public_key: Some(Some("-----BEGIN PUBLIC KEY-----".into())),
            upstream_credential: Some(Some("v1.a.b.c".into())),
            filter_enabled: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(aktualisiert.public_key.as_deref(), Some("-----BEGIN PUBLIC KEY-----"));
    assert_eq!(aktualisiert.upstream_credential.as_deref(), Some("v1.a.b.c"));
    assert!(!aktualisiert.filter_enabled);

    // Some(None) leert das Feld
    let geleert = RecipientRepository::update(
        &db,
        e.id,
        EmpfaengerUpdate {
            upstream_credential: Some(None),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(geleert.upstream_credential.is_none());
    assert!(geleert.public_key.is_some());
}

#[tokio::test]
async fn update_unbekannter_empfaenger() {
    let db = db().await;
    let err = RecipientRepository::update(
        &db,
        uuid::Uuid::new_v4(),
        EmpfaengerUpdate {
            filter_enabled: Some(true),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(err, Err(sealpost_db::DbError::NichtGefunden(_))));
}

// ---------------------------------------------------------------------------
// Share-Links
// ---------------------------------------------------------------------------

#[tokio::test]
async fn link_erstellen_und_aufloesen() {
    let db = db().await;
    let e = RecipientRepository::create(&db, neu("dave")).await.unwrap();

    let link = ShareLinkRepository::create(&db, e.id, "tok-dave").await.unwrap();
    assert!(link.is_active);

    let gefunden = ShareLinkRepository::get_active_by_token(&db, "tok-dave")
        .await
        .unwrap()
        .expect("Link sollte aktiv sein");
    assert_eq!(gefunden.recipient_id, e.id);

    assert!(ShareLinkRepository::get_active_by_token(&db, "unbekannt")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn deaktivierter_link_ist_unbekannt() {
    let db = db().await;
    let e = RecipientRepository::create(&db, neu("erin")).await.unwrap();
    let fremd = RecipientRepository::create(&db, neu("frank")).await.unwrap();
    let link = ShareLinkRepository::create(&db, e.id, "tok-erin").await.unwrap();

    // Nur der Eigentuemer darf deaktivieren
    assert!(!ShareLinkRepository::deactivate(&db, link.id, fremd.id).await.unwrap());
    assert!(ShareLinkRepository::deactivate(&db, link.id, e.id).await.unwrap());

    assert!(ShareLinkRepository::get_active_by_token(&db, "tok-erin")
        .await
        .unwrap()
        .is_none());

    let alle = ShareLinkRepository::list_for_recipient(&db, e.id).await.unwrap();
    assert_eq!(alle.len(), 1);
    assert!(!alle[0].is_active);
}

#[tokio::test]
async fn doppelter_share_token_schlaegt_fehl() {
    let db = db().await;
    let e = RecipientRepository::create(&db, neu("gina")).await.unwrap();
    ShareLinkRepository::create(&db, e.id, "gleich").await.unwrap();

    let err = ShareLinkRepository::create(&db, e.id, "gleich").await.unwrap_err();
    assert!(err.ist_eindeutigkeit());
}

#[tokio::test]
async fn loeschen_entfernt_links_kaskadierend() {
    let db = db().await;
    let e = RecipientRepository::create(&db, neu("hank")).await.unwrap();
    ShareLinkRepository::create(&db, e.id, "tok-hank").await.unwrap();

    assert!(RecipientRepository::delete(&db, e.id).await.unwrap());
    assert!(ShareLinkRepository::get_active_by_token(&db, "tok-hank")
        .await
        .unwrap()
        .is_none());
    assert!(!RecipientRepository::delete(&db, e.id).await.unwrap());
}
