//! Tests fuer den Dispatcher (Claim-Protokoll, Wiederholung, Ablage)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sealpost_crypto::oeffnen_text;
use sealpost_db::{
    models::GeplanteNachrichtRecord, DatabaseConfig, MessageRepository, ScheduledRepository,
    SqliteDb,
};
use uuid::Uuid;

use super::helfer::{einplanen, empfaenger_anlegen, schluessel, test_db, FehlerSink, ZaehlNotifier};
use crate::dispatcher::{DispatchKonfig, Dispatcher, MAX_LIMIT};
use crate::error::{DeliveryResult, NotifyError};
use crate::notify::{Benachrichtigung, Notifier};
use crate::sink::{DeliverySink, InboxSink};

fn inbox_dispatcher(
    db: Arc<SqliteDb>,
    notifier: Arc<ZaehlNotifier>,
    konfig: DispatchKonfig,
) -> Dispatcher<SqliteDb, InboxSink<SqliteDb>> {
    let sink = Arc::new(InboxSink::neu(db.clone(), notifier));
    Dispatcher::neu(db, sink, konfig)
}

#[tokio::test]
async fn test_zustellung_erst_nach_faelligkeit() {
    let db = test_db().await;
    let alice = empfaenger_anlegen(&db, "alice").await;
    let notifier = Arc::new(ZaehlNotifier::default());
    let dispatcher = inbox_dispatcher(db.clone(), notifier.clone(), DispatchKonfig::default());

    let t0 = Utc::now();
    let zeile = einplanen(&db, alice, "hello", t0 + Duration::hours(1)).await;

    let frueh = dispatcher.durchlauf_um(t0 + Duration::minutes(30)).await.unwrap();
    assert_eq!(frueh.zugestellt, 0);
    assert!(MessageRepository::list_for_recipient(db.as_ref(), alice)
        .await
        .unwrap()
        .is_empty());

    let spaet = dispatcher.durchlauf_um(t0 + Duration::minutes(61)).await.unwrap();
    assert_eq!(spaet.zugestellt, 1);

    assert!(ScheduledRepository::get_by_id(db.as_ref(), zeile.id)
        .await
        .unwrap()
        .is_none());

    let inbox = MessageRepository::list_for_recipient(db.as_ref(), alice).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].envelope_content, zeile.envelope_content);
    assert_eq!(
        oeffnen_text(&inbox[0].envelope_content, &schluessel().privat).unwrap(),
        "hello"
    );
    assert_eq!(notifier.anzahl(), 1);
}

#[tokio::test]
async fn test_leerer_lauf() {
    let db = test_db().await;
    let dispatcher = inbox_dispatcher(
        db,
        Arc::new(ZaehlNotifier::default()),
        DispatchKonfig::default(),
    );

    let bericht = dispatcher.durchlauf().await.unwrap();
    assert_eq!(bericht.zugestellt, 0);
    assert_eq!(bericht.verwaiste_geloest, 0);
}

#[tokio::test]
async fn test_limit_und_reihenfolge() {
    let db = test_db().await;
    let alice = empfaenger_anlegen(&db, "alice").await;
    let jetzt = Utc::now();

    let spaet = einplanen(&db, alice, "drei", jetzt - Duration::minutes(1)).await;
    einplanen(&db, alice, "eins", jetzt - Duration::minutes(20)).await;
    einplanen(&db, alice, "zwei", jetzt - Duration::minutes(10)).await;

    let dispatcher = inbox_dispatcher(
        db.clone(),
        Arc::new(ZaehlNotifier::default()),
        DispatchKonfig {
            limit: 2,
            max_versuche: None,
        },
    );

    assert_eq!(dispatcher.durchlauf_um(jetzt).await.unwrap().zugestellt, 2);
    // Die juengste Zeile wartet auf den naechsten Lauf
    assert!(ScheduledRepository::get_by_id(db.as_ref(), spaet.id)
        .await
        .unwrap()
        .is_some());

    let mut texte: Vec<String> = MessageRepository::list_for_recipient(db.as_ref(), alice)
        .await
        .unwrap()
        .iter()
        .map(|n| oeffnen_text(&n.envelope_content, &schluessel().privat).unwrap())
        .collect();
    texte.sort();
    assert_eq!(texte, vec!["eins", "zwei"]);

    assert_eq!(dispatcher.durchlauf_um(jetzt).await.unwrap().zugestellt, 1);
}

#[tokio::test]
async fn test_verwaister_claim_wird_nach_ttl_zugestellt() {
    let db = test_db().await;
    let alice = empfaenger_anlegen(&db, "alice").await;
    let t0 = Utc::now();
    let zeile = einplanen(&db, alice, "hallo", t0 - Duration::minutes(1)).await;

    // Ein abgestuerzter Lauf haelt die Zeile
    let fremd = ScheduledRepository::claim_due(db.as_ref(), Uuid::new_v4(), t0, 10)
        .await
        .unwrap();
    assert_eq!(fremd.len(), 1);

    let dispatcher = inbox_dispatcher(
        db.clone(),
        Arc::new(ZaehlNotifier::default()),
        DispatchKonfig::default(),
    );

    let innerhalb_ttl = dispatcher.durchlauf_um(t0 + Duration::minutes(1)).await.unwrap();
    assert_eq!(innerhalb_ttl.zugestellt, 0);
    assert_eq!(innerhalb_ttl.verwaiste_geloest, 0);

    let nach_ttl = dispatcher.durchlauf_um(t0 + Duration::minutes(6)).await.unwrap();
    assert_eq!(nach_ttl.verwaiste_geloest, 1);
    assert_eq!(nach_ttl.zugestellt, 1);
    assert!(ScheduledRepository::get_by_id(db.as_ref(), zeile.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_absturz_zwischen_einliefern_und_loeschen() {
    let db = test_db().await;
    let alice = empfaenger_anlegen(&db, "alice").await;
    let t0 = Utc::now();
    let zeile = einplanen(&db, alice, "mindestens einmal", t0).await;

    // Lauf beansprucht und liefert ein, stirbt aber vor dem Loeschen
    let beansprucht = ScheduledRepository::claim_due(db.as_ref(), Uuid::new_v4(), t0, 10)
        .await
        .unwrap();
    MessageRepository::create(db.as_ref(), beansprucht[0].als_neue_nachricht())
        .await
        .unwrap();

    let dispatcher = inbox_dispatcher(
        db.clone(),
        Arc::new(ZaehlNotifier::default()),
        DispatchKonfig::default(),
    );
    let bericht = dispatcher.durchlauf_um(t0 + Duration::minutes(6)).await.unwrap();
    assert_eq!(bericht.zugestellt, 1);

    // Duplikat statt Verlust
    let inbox = MessageRepository::list_for_recipient(db.as_ref(), alice).await.unwrap();
    assert_eq!(inbox.len(), 2);
    assert!(inbox.iter().all(|n| n.envelope_content == zeile.envelope_content));
    assert!(ScheduledRepository::get_by_id(db.as_ref(), zeile.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_fehlgeschlagene_zustellung_wird_freigegeben() {
    let db = test_db().await;
    let alice = empfaenger_anlegen(&db, "alice").await;
    let jetzt = Utc::now();

    einplanen(&db, alice, "a", jetzt).await;
    let kaputt = einplanen(&db, alice, "b", jetzt).await;
    einplanen(&db, alice, "c", jetzt).await;

    let sink = Arc::new(FehlerSink::neu(db.clone(), Arc::new(ZaehlNotifier::default())));
    sink.fehler_fuer(kaputt.id);
    let dispatcher = Dispatcher::neu(db.clone(), sink.clone(), DispatchKonfig::default());

    let bericht = dispatcher.durchlauf_um(jetzt).await.unwrap();
    assert_eq!(bericht.zugestellt, 2);
    assert_eq!(bericht.zurueckgestellt, 1);

    let rest = ScheduledRepository::get_by_id(db.as_ref(), kaputt.id)
        .await
        .unwrap()
        .expect("Fehlgeschlagene Zeile bleibt erhalten");
    assert!(rest.claimed_by.is_none());
    assert_eq!(rest.attempts, 1);

    sink.reparieren();
    let zweiter = dispatcher.durchlauf_um(jetzt).await.unwrap();
    assert_eq!(zweiter.zugestellt, 1);
    assert_eq!(
        MessageRepository::list_for_recipient(db.as_ref(), alice)
            .await
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_versuchsgrenze_und_wiederbeleben() {
    let db = test_db().await;
    let alice = empfaenger_anlegen(&db, "alice").await;
    let jetzt = Utc::now();
    let zeile = einplanen(&db, alice, "x", jetzt).await;

    let sink = Arc::new(FehlerSink::neu(db.clone(), Arc::new(ZaehlNotifier::default())));
    sink.alle_fehlerhaft(true);
    let dispatcher = Dispatcher::neu(
        db.clone(),
        sink.clone(),
        DispatchKonfig {
            limit: 10,
            max_versuche: Some(2),
        },
    );

    assert_eq!(dispatcher.durchlauf_um(jetzt).await.unwrap().zurueckgestellt, 1);
    assert_eq!(dispatcher.durchlauf_um(jetzt).await.unwrap().abgelegt, 1);

    // Abgelegt: wird nicht mehr beansprucht
    let dritter = dispatcher.durchlauf_um(jetzt).await.unwrap();
    assert_eq!(dritter.zugestellt + dritter.zurueckgestellt + dritter.abgelegt, 0);

    let abgelegt = dispatcher.abgelegte(10).await.unwrap();
    assert_eq!(abgelegt.len(), 1);
    assert_eq!(abgelegt[0].id, zeile.id);
    assert!(abgelegt[0].dead_lettered_at.is_some());

    sink.reparieren();
    assert!(dispatcher.wiederbeleben(zeile.id).await.unwrap());
    assert_eq!(dispatcher.durchlauf_um(jetzt).await.unwrap().zugestellt, 1);
}

#[tokio::test]
async fn test_benachrichtigungsfehler_bricht_nichts_ab() {
    let db = test_db().await;
    let alice = empfaenger_anlegen(&db, "alice").await;
    let jetzt = Utc::now();
    einplanen(&db, alice, "x", jetzt).await;

    let notifier = Arc::new(ZaehlNotifier {
        fehlschlagen: true,
        ..Default::default()
    });
    let dispatcher = inbox_dispatcher(db.clone(), notifier.clone(), DispatchKonfig::default());

    let bericht = dispatcher.durchlauf_um(jetzt).await.unwrap();
    assert_eq!(bericht.zugestellt, 1);
    assert_eq!(notifier.anzahl(), 1);
}

#[tokio::test]
async fn test_limit_wird_begrenzt() {
    let db = test_db().await;
    let notifier = Arc::new(ZaehlNotifier::default());

    let gross = inbox_dispatcher(
        db.clone(),
        notifier.clone(),
        DispatchKonfig {
            limit: 40_000,
            max_versuche: None,
        },
    );
    assert_eq!(gross.konfig().limit, MAX_LIMIT);

    let null = inbox_dispatcher(
        db,
        notifier,
        DispatchKonfig {
            limit: 0,
            max_versuche: None,
        },
    );
    assert_eq!(null.konfig().limit, 1);
}

/// Liefert ein und loescht die Zeile gleich selbst, als haette ein anderer
/// Lauf sie bereits abgeschlossen
struct SelbstLoeschSink {
    db: Arc<SqliteDb>,
    inner: InboxSink<SqliteDb>,
}

impl DeliverySink for SelbstLoeschSink {
    async fn einliefern(&self, zeile: &GeplanteNachrichtRecord) -> DeliveryResult<()> {
        self.inner.einliefern(zeile).await?;
        self.db.delete_many(&[zeile.id]).await?;
        Ok(())
    }

    async fn benachrichtigen(&self, zeile: &GeplanteNachrichtRecord) {
        self.inner.benachrichtigen(zeile).await
    }
}

#[tokio::test]
async fn test_bericht_zaehlt_eingelieferte_nachrichten() {
    let db = test_db().await;
    let alice = empfaenger_anlegen(&db, "alice").await;
    let jetzt = Utc::now();
    einplanen(&db, alice, "a", jetzt).await;
    einplanen(&db, alice, "b", jetzt).await;

    let sink = Arc::new(SelbstLoeschSink {
        db: db.clone(),
        inner: InboxSink::neu(db.clone(), Arc::new(ZaehlNotifier::default())),
    });
    let dispatcher = Dispatcher::neu(db.clone(), sink, DispatchKonfig::default());

    let bericht = dispatcher.durchlauf_um(jetzt).await.unwrap();
    assert_eq!(bericht.zugestellt, 2);
    assert_eq!(
        MessageRepository::list_for_recipient(db.as_ref(), alice)
            .await
            .unwrap()
            .len(),
        2
    );
}

type InboxDispatcher = Dispatcher<SqliteDb, InboxSink<SqliteDb>>;

/// Startet bei jeder Benachrichtigung einen zweiten Lauf nach Ablauf der TTL
struct UeberholNotifier {
    zweiter: OnceLock<Arc<InboxDispatcher>>,
    zeitpunkt: DateTime<Utc>,
    fremd_zugestellt: AtomicU64,
    aufrufe: AtomicU64,
}

#[async_trait]
impl Notifier for UeberholNotifier {
    async fn neue_nachricht(&self, _an: &Benachrichtigung<'_>) -> Result<(), NotifyError> {
        self.aufrufe.fetch_add(1, Ordering::SeqCst);
        if let Some(zweiter) = self.zweiter.get() {
            let bericht = zweiter
                .durchlauf_um(self.zeitpunkt)
                .await
                .expect("zweiter Lauf");
            self.fremd_zugestellt
                .fetch_add(bericht.zugestellt, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_langsame_benachrichtigung_haelt_keinen_claim() {
    let db = test_db().await;
    let alice = empfaenger_anlegen(&db, "alice").await;
    let t0 = Utc::now();
    for i in 0..5 {
        einplanen(&db, alice, "einmal", t0 - Duration::seconds(i)).await;
    }

    let langsam = Arc::new(UeberholNotifier {
        zweiter: OnceLock::new(),
        zeitpunkt: t0 + Duration::minutes(6),
        fremd_zugestellt: AtomicU64::new(0),
        aufrufe: AtomicU64::new(0),
    });
    let zweiter = inbox_dispatcher(
        db.clone(),
        Arc::new(ZaehlNotifier::default()),
        DispatchKonfig::default(),
    );
    assert!(langsam.zweiter.set(Arc::new(zweiter)).is_ok());

    let sink = Arc::new(InboxSink::neu(db.clone(), langsam.clone()));
    let erster = Dispatcher::neu(db.clone(), sink, DispatchKonfig::default());

    let bericht = erster.durchlauf_um(t0).await.unwrap();
    assert_eq!(bericht.zugestellt, 5);
    assert_eq!(langsam.aufrufe.load(Ordering::SeqCst), 5);
    // Waehrend der Benachrichtigungen ist nichts mehr beansprucht
    assert_eq!(langsam.fremd_zugestellt.load(Ordering::SeqCst), 0);
    assert_eq!(
        MessageRepository::list_for_recipient(db.as_ref(), alice)
            .await
            .unwrap()
            .len(),
        5
    );
}

// ---------------------------------------------------------------------------
// Nebenlaeufige Laeufe
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallele_laeufe_stellen_jede_zeile_einmal_zu() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(
        SqliteDb::oeffnen(&DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("dispatch.db").display()),
            max_verbindungen: 8,
            sqlite_wal: true,
            busy_timeout_ms: 10_000,
        })
        .await
        .unwrap(),
    );
    let alice = empfaenger_anlegen(&db, "alice").await;
    let jetzt = Utc::now();

    const ZEILEN: u64 = 50;
    for i in 0..ZEILEN {
        einplanen(&db, alice, "parallel", jetzt - Duration::seconds(i as i64)).await;
    }

    let notifier = Arc::new(ZaehlNotifier::default());
    let dispatcher = Arc::new(inbox_dispatcher(
        db.clone(),
        notifier.clone(),
        DispatchKonfig {
            limit: 20,
            max_versuche: None,
        },
    ));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let d = dispatcher.clone();
        handles.push(tokio::spawn(async move { d.durchlauf_um(jetzt).await }));
    }

    let mut summe = 0;
    for h in handles {
        summe += h.await.unwrap().unwrap().zugestellt;
    }

    assert_eq!(summe, ZEILEN);
    assert_eq!(
        MessageRepository::list_for_recipient(db.as_ref(), alice)
            .await
            .unwrap()
            .len() as u64,
        ZEILEN
    );
    assert_eq!(notifier.anzahl() as u64, ZEILEN);
}
