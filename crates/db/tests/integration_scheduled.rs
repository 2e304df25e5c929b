//! Integration-Tests fuer ScheduledRepository (Claim-Protokoll)

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use sealpost_db::{
    models::{Freigabe, NeueGeplanteNachricht, NeuerEmpfaenger},
    DatabaseConfig, RecipientRepository, ScheduledRepository, SqliteDb,
};
use uuid::Uuid;

async fn empfaenger(db: &SqliteDb) -> Uuid {
    RecipientRepository::create(
        db,
        NeuerEmpfaenger {
            username: "alice",
            email: "alice@example.org",
            public_key: None,
        },
    )
    .await
    .unwrap()
    .id
}

async fn einplanen(db: &SqliteDb, recipient_id: Uuid, deliver_at: DateTime<Utc>) -> Uuid {
    ScheduledRepository::create(
        db,
        NeueGeplanteNachricht {
            recipient_id,
            envelope_content: "Y29udGVudA==",
            envelope_reasoning: "cmVhc29u",
            flag: false,
            deliver_at,
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn nur_faellige_zeilen_werden_beansprucht() {
    let db = SqliteDb::in_memory().await.unwrap();
    let alice = empfaenger(&db).await;
    let t0 = Utc::now();

    let id = einplanen(&db, alice, t0 + Duration::hours(1)).await;

    let zu_frueh = db.claim_due(Uuid::new_v4(), t0 + Duration::minutes(30), 100).await.unwrap();
    assert!(zu_frueh.is_empty());

    let token = Uuid::new_v4();
    let faellig = db.claim_due(token, t0 + Duration::minutes(61), 100).await.unwrap();
    assert_eq!(faellig.len(), 1);
    assert_eq!(faellig[0].id, id);
    assert_eq!(faellig[0].claimed_by, Some(token));
    assert!(faellig[0].claimed_at.is_some());
}

#[tokio::test]
async fn beanspruchte_zeilen_sind_fuer_andere_unsichtbar() {
    let db = SqliteDb::in_memory().await.unwrap();
    let alice = empfaenger(&db).await;
    let jetzt = Utc::now();
    einplanen(&db, alice, jetzt - Duration::minutes(1)).await;

    let erster = db.claim_due(Uuid::new_v4(), jetzt, 10).await.unwrap();
    let zweiter = db.claim_due(Uuid::new_v4(), jetzt, 10).await.unwrap();
    assert_eq!(erster.len(), 1);
    assert!(zweiter.is_empty());
}

#[tokio::test]
async fn limit_und_reihenfolge() {
    let db = SqliteDb::in_memory().await.unwrap();
    let alice = empfaenger(&db).await;
    let jetzt = Utc::now();

    // Absichtlich nicht in Zeitreihenfolge eingefuegt
    let c = einplanen(&db, alice, jetzt - Duration::minutes(1)).await;
    let a = einplanen(&db, alice, jetzt - Duration::minutes(30)).await;
    let b = einplanen(&db, alice, jetzt - Duration::minutes(10)).await;

    let erste = db.claim_due(Uuid::new_v4(), jetzt, 2).await.unwrap();
    let ids: Vec<Uuid> = erste.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![a, b]);

    let rest = db.claim_due(Uuid::new_v4(), jetzt, 2).await.unwrap();
    assert_eq!(rest.iter().map(|r| r.id).collect::<Vec<_>>(), vec![c]);
}

#[tokio::test]
async fn verwaiste_claims_werden_geloest() {
    let db = SqliteDb::in_memory().await.unwrap();
    let alice = empfaenger(&db).await;
    let t0 = Utc::now();
    let id = einplanen(&db, alice, t0 - Duration::minutes(1)).await;

    db.claim_due(Uuid::new_v4(), t0, 10).await.unwrap();

    // Grenze vor dem Claim: nichts zu tun
    assert_eq!(db.reap_stale_claims(t0 - Duration::minutes(5)).await.unwrap(), 0);

    // Grenze nach dem Claim: Zeile wird wieder frei
    let spaeter = t0 + Duration::minutes(6);
    assert_eq!(db.reap_stale_claims(spaeter - Duration::minutes(5)).await.unwrap(), 1);

    let zeile = ScheduledRepository::get_by_id(&db, id).await.unwrap().unwrap();
    assert!(zeile.claimed_by.is_none());
    assert!(zeile.claimed_at.is_none());

    let erneut = db.claim_due(Uuid::new_v4(), spaeter, 10).await.unwrap();
    assert_eq!(erneut.len(), 1);
}

#[tokio::test]
async fn freigabe_nur_mit_eigenem_token() {
    let db = SqliteDb::in_memory().await.unwrap();
    let alice = empfaenger(&db).await;
    let jetzt = Utc::now();
    let id = einplanen(&db, alice, jetzt).await;

    let token = Uuid::new_v4();
    db.claim_due(token, jetzt, 10).await.unwrap();

    let fremd = db.release_claim(id, Uuid::new_v4(), None, jetzt).await.unwrap();
    assert_eq!(fremd, Freigabe::NichtBeansprucht);
    let gehalten = ScheduledRepository::get_by_id(&db, id).await.unwrap().unwrap();
    assert_eq!(gehalten.claimed_by, Some(token));

    let eigen = db.release_claim(id, token, None, jetzt).await.unwrap();
    assert_eq!(eigen, Freigabe::Zurueckgestellt { versuche: 1 });

    let zeile = ScheduledRepository::get_by_id(&db, id).await.unwrap().unwrap();
    assert!(zeile.claimed_by.is_none());
    assert_eq!(zeile.attempts, 1);
}

#[tokio::test]
async fn versuchsgrenze_legt_zeile_ab() {
    let db = SqliteDb::in_memory().await.unwrap();
    let alice = empfaenger(&db).await;
    let jetzt = Utc::now();
    let id = einplanen(&db, alice, jetzt).await;

    for erwartet in 1..=2u32 {
        let token = Uuid::new_v4();
        assert_eq!(db.claim_due(token, jetzt, 10).await.unwrap().len(), 1);
        let f = db.release_claim(id, token, Some(3), jetzt).await.unwrap();
        assert_eq!(f, Freigabe::Zurueckgestellt { versuche: erwartet });
    }

    let token = Uuid::new_v4();
    db.claim_due(token, jetzt, 10).await.unwrap();
    let f = db.release_claim(id, token, Some(3), jetzt).await.unwrap();
    assert_eq!(f, Freigabe::Abgelegt { versuche: 3 });

    // Abgelegte Zeilen werden nicht mehr beansprucht
    assert!(db.claim_due(Uuid::new_v4(), jetzt, 10).await.unwrap().is_empty());

    let abgelegt = db.list_dead_lettered(10).await.unwrap();
    assert_eq!(abgelegt.len(), 1);
    assert_eq!(abgelegt[0].id, id);

    assert!(db.revive(id).await.unwrap());
    let zurueck = db.claim_due(Uuid::new_v4(), jetzt, 10).await.unwrap();
    assert_eq!(zurueck.len(), 1);
    assert_eq!(zurueck[0].attempts, 0);
}

#[tokio::test]
async fn delete_many_loescht_genau_die_ids() {
    let db = SqliteDb::in_memory().await.unwrap();
    let alice = empfaenger(&db).await;
    let jetzt = Utc::now();
    let a = einplanen(&db, alice, jetzt).await;
    let b = einplanen(&db, alice, jetzt).await;
    let c = einplanen(&db, alice, jetzt).await;

    assert_eq!(db.delete_many(&[]).await.unwrap(), 0);
    assert_eq!(db.delete_many(&[a, c, Uuid::new_v4()]).await.unwrap(), 2);

    assert!(ScheduledRepository::get_by_id(&db, a).await.unwrap().is_none());
    assert!(ScheduledRepository::get_by_id(&db, b).await.unwrap().is_some());
    assert!(ScheduledRepository::get_by_id(&db, c).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_many_ueber_variablenlimit() {
    let db = SqliteDb::in_memory().await.unwrap();
    let alice = empfaenger(&db).await;
    let jetzt = Utc::now();
    let a = einplanen(&db, alice, jetzt).await;
    let b = einplanen(&db, alice, jetzt).await;
    let c = einplanen(&db, alice, jetzt).await;

    // Mehr Ids als SQLite in einer Anweisung binden kann (32 766)
    let mut ids: Vec<Uuid> = (0..40_000).map(|_| Uuid::new_v4()).collect();
    ids[0] = a;
    ids[20_000] = b;
    ids[39_999] = c;

    assert_eq!(db.delete_many(&ids).await.unwrap(), 3);
    for id in [a, b, c] {
        assert!(ScheduledRepository::get_by_id(&db, id).await.unwrap().is_none());
    }
}

// ---------------------------------------------------------------------------
// Nebenlaeufigkeit (Datei-DB, mehrere Verbindungen)
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallele_claims_sind_disjunkt() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("claims.db").display()),
        max_verbindungen: 8,
        sqlite_wal: true,
        busy_timeout_ms: 10_000,
    };
    let db = SqliteDb::oeffnen(&config).await.unwrap();
    let alice = empfaenger(&db).await;
    let jetzt = Utc::now();

    let mut alle_ids = HashSet::new();
    for i in 0..60 {
        alle_ids.insert(einplanen(&db, alice, jetzt - Duration::seconds(i)).await);
    }

    let mut handles = Vec::new();
    for _ in 0..6 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let token = Uuid::new_v4();
            let mut meine = Vec::new();
            loop {
                let batch = db.claim_due(token, jetzt, 7).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                assert!(batch.iter().all(|r| r.claimed_by == Some(token)));
                meine.extend(batch.into_iter().map(|r| r.id));
            }
            meine
        }));
    }

    let mut gesehen = HashSet::new();
    for h in handles {
        for id in h.await.unwrap() {
            assert!(gesehen.insert(id), "Zeile {id} doppelt beansprucht");
        }
    }
    assert_eq!(gesehen, alle_ids);
}
