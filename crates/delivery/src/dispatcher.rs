//! Dispatcher fuer zeitgesteuerte Nachrichten
//!
//! Ein Lauf besteht aus vier Schritten:
//!
//! 1. Verwaiste Claims aelter als [`CLAIM_TTL_SEKUNDEN`] loesen
//! 2. Bis zu `limit` faellige Zeilen mit frischem Token beanspruchen
//! 3. Jede Zeile einliefern; bei Fehler den eigenen Claim freigeben
//! 4. Erfolgreich eingelieferte Zeilen loeschen
//! 5. Empfaenger benachrichtigen, erst nachdem der Claim aufgeloest ist
//!
//! Laeufe duerfen sich beliebig ueberlappen. Die einzige Synchronisation ist
//! das atomare `claim_due` der Datenbank. Stirbt ein Lauf zwischen Einliefern
//! und Loeschen, wird die Zeile nach Ablauf der TTL erneut zugestellt
//! (mindestens einmal, Duplikate sind moeglich). Benachrichtigungen laufen
//! erst nach dem Loeschen und zaehlen nicht zur Claim-Dauer.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sealpost_db::{
    models::{Freigabe, GeplanteNachrichtRecord},
    ScheduledRepository,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::DeliveryResult;
use crate::sink::DeliverySink;

/// Lebensdauer eines Claims. Muss laenger sein als der langsamste Lauf.
pub const CLAIM_TTL_SEKUNDEN: i64 = 5 * 60;

/// Standard-Batchgroesse pro Lauf
pub const STANDARD_LIMIT: u32 = 100;

/// Obergrenze der Batchgroesse pro Lauf
pub const MAX_LIMIT: u32 = 1000;

/// Einstellungen des Dispatchers
#[derive(Debug, Clone)]
pub struct DispatchKonfig {
    /// Maximale Anzahl Zeilen pro Lauf (1 bis [`MAX_LIMIT`])
    pub limit: u32,
    /// Fehlversuche bis zur Ablage; `None` = unbegrenzt
    pub max_versuche: Option<u32>,
}

impl Default for DispatchKonfig {
    fn default() -> Self {
        Self {
            limit: STANDARD_LIMIT,
            max_versuche: Some(20),
        }
    }
}

/// Ergebnis eines Dispatch-Laufs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchBericht {
    /// In den Posteingang eingeliefert
    pub zugestellt: u64,
    /// Fehlgeschlagen, Claim freigegeben
    pub zurueckgestellt: u64,
    /// Fehlgeschlagen und Versuchsgrenze erreicht
    pub abgelegt: u64,
    /// Zu Beginn geloeste verwaiste Claims
    pub verwaiste_geloest: u64,
}

/// Stellt faellige Nachrichten aus der Warteschlange zu
pub struct Dispatcher<S, D> {
    store: Arc<S>,
    sink: Arc<D>,
    konfig: DispatchKonfig,
}

impl<S, D> Dispatcher<S, D>
where
    S: ScheduledRepository,
    D: DeliverySink,
{
    pub fn neu(store: Arc<S>, sink: Arc<D>, mut konfig: DispatchKonfig) -> Self {
        konfig.limit = konfig.limit.clamp(1, MAX_LIMIT);
        Self {
            store,
            sink,
            konfig,
        }
    }

    pub fn konfig(&self) -> &DispatchKonfig {
        &self.konfig
    }

    /// Fuehrt einen Lauf mit der aktuellen Uhrzeit aus
    pub async fn durchlauf(&self) -> DeliveryResult<DispatchBericht> {
        self.durchlauf_um(Utc::now()).await
    }

    /// Fuehrt einen Lauf zum Zeitpunkt `jetzt` aus
    pub async fn durchlauf_um(&self, jetzt: DateTime<Utc>) -> DeliveryResult<DispatchBericht> {
        let mut bericht = DispatchBericht {
            verwaiste_geloest: self
                .store
                .reap_stale_claims(jetzt - Duration::seconds(CLAIM_TTL_SEKUNDEN))
                .await?,
            ..Default::default()
        };

        let token = Uuid::new_v4();
        let zeilen = self
            .store
            .claim_due(token, jetzt, self.konfig.limit)
            .await?;

        if zeilen.is_empty() {
            debug!("Keine faelligen Nachrichten");
            return Ok(bericht);
        }

        debug!(%token, anzahl = zeilen.len(), "Faellige Nachrichten beansprucht");

        let mut zugestellt = Vec::with_capacity(zeilen.len());
        for zeile in &zeilen {
            match self.sink.einliefern(zeile).await {
                Ok(()) => zugestellt.push(zeile),
                Err(e) => {
                    warn!(id = %zeile.id, fehler = %e, "Zustellung fehlgeschlagen, Claim wird freigegeben");
                    self.freigeben(zeile.id, token, jetzt, &mut bericht).await;
                }
            }
        }

        let ids: Vec<Uuid> = zugestellt.iter().map(|z| z.id).collect();
        let geloescht = self.store.delete_many(&ids).await?;
        if geloescht != ids.len() as u64 {
            warn!(
                eingeliefert = ids.len(),
                geloescht,
                "Nicht alle eingelieferten Zeilen waren noch vorhanden"
            );
        }
        bericht.zugestellt = ids.len() as u64;

        for zeile in zugestellt {
            self.sink.benachrichtigen(zeile).await;
        }

        info!(
            zugestellt = bericht.zugestellt,
            zurueckgestellt = bericht.zurueckgestellt,
            abgelegt = bericht.abgelegt,
            "Dispatch-Lauf abgeschlossen"
        );
        Ok(bericht)
    }

    /// Abgelegte Nachrichten, aelteste zuerst
    pub async fn abgelegte(&self, limit: u32) -> DeliveryResult<Vec<GeplanteNachrichtRecord>> {
        Ok(self.store.list_dead_lettered(limit).await?)
    }

    /// Stellt eine abgelegte Nachricht mit zurueckgesetztem Zaehler erneut ein
    pub async fn wiederbeleben(&self, id: Uuid) -> DeliveryResult<bool> {
        let ok = self.store.revive(id).await?;
        if ok {
            info!(%id, "Abgelegte Nachricht wieder eingestellt");
        }
        Ok(ok)
    }

    async fn freigeben(
        &self,
        id: Uuid,
        token: Uuid,
        jetzt: DateTime<Utc>,
        bericht: &mut DispatchBericht,
    ) {
        match self
            .store
            .release_claim(id, token, self.konfig.max_versuche, jetzt)
            .await
        {
            Ok(Freigabe::Zurueckgestellt { versuche }) => {
                debug!(%id, versuche, "Nachricht zurueckgestellt");
                bericht.zurueckgestellt += 1;
            }
            Ok(Freigabe::Abgelegt { versuche }) => {
                error!(%id, versuche, "Versuchsgrenze erreicht, Nachricht abgelegt");
                bericht.abgelegt += 1;
            }
            Ok(Freigabe::NichtBeansprucht) => {
                warn!(%id, "Claim bereits verloren, nichts freizugeben");
            }
            // Der Claim verfaellt dann ueber die TTL
            Err(e) => {
                warn!(%id, fehler = %e, "Claim konnte nicht freigegeben werden");
            }
        }
    }
}
