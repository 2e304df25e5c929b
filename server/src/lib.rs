//! sealpost-server – Bibliotheks-Root
//!
//! Verdrahtet Datenbank, Dienste, Dispatcher und REST-API und stellt den
//! oeffentlichen Einstiegspunkt fuer Tests bereit.

pub mod config;
pub mod rate_limit;
pub mod rest;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::ServerConfig;
use rate_limit::RateLimiter;
use rest::{AppState, RestServer, RestServerKonfig, SqliteDispatcher};
use sealpost_crypto::GeheimnisBox;
use sealpost_db::SqliteDb;
use sealpost_delivery::{
    Dispatcher, EinreichungsService, EmpfaengerService, InboxSink, LogNotifier, Notifier,
    PostmarkNotifier,
};

/// Intervall fuer das Aufraeumen inaktiver Rate-Limit-Buckets
const RATE_LIMIT_CLEANUP: Duration = Duration::from_secs(60);

/// Alle zur Laufzeit benoetigten Komponenten
pub struct Komponenten {
    pub db: Arc<SqliteDb>,
    pub state: AppState,
    pub rate_limiter: Arc<RateLimiter>,
}

impl Komponenten {
    /// Baut Dienste und Dispatcher auf einer geoeffneten Datenbank auf
    pub fn aufbauen(config: &ServerConfig, db: Arc<SqliteDb>) -> Result<Self> {
        let geheimnisse = match config.schluessel.master_key.as_deref() {
            Some(key) => Some(Arc::new(
                GeheimnisBox::aus_base64(key).context("Master-Key ungueltig")?,
            )),
            None => {
                tracing::warn!("Kein Master-Key konfiguriert, Zugangsdaten koennen nicht gespeichert werden");
                None
            }
        };

        let notifier: Arc<dyn Notifier> = match config.postmark_konfig() {
            Some(konfig) => {
                tracing::info!(api = %konfig.api_url, "Benachrichtigung per Postmark");
                Arc::new(PostmarkNotifier::neu(konfig).context("HTTP-Client fuer Postmark")?)
            }
            None => {
                tracing::info!("Postmark nicht konfiguriert, Benachrichtigungen werden nur geloggt");
                Arc::new(LogNotifier)
            }
        };

        let sink = Arc::new(InboxSink::neu(db.clone(), notifier));
        let dispatcher = Arc::new(Dispatcher::neu(
            db.clone(),
            sink.clone(),
            config.dispatch_konfig(),
        ));
        let einreichung = EinreichungsService::neu(db.clone(), sink, config.einreichungs_grenzen());
        let empfaenger = EmpfaengerService::neu(db.clone(), geheimnisse);
        let rate_limiter = RateLimiter::neu(config.rate_limit_konfig());

        if config.dispatch.cron_secret.is_none() {
            tracing::warn!("Kein cron_secret konfiguriert, /v1/dispatch lehnt alle Aufrufe ab");
        }

        let state = AppState {
            einreichung,
            empfaenger,
            dispatcher,
            begrenzer: rate_limiter.clone(),
            cron_secret: config.dispatch.cron_secret.as_deref().map(Arc::from),
        };

        Ok(Self {
            db,
            state,
            rate_limiter,
        })
    }
}

/// Haelt den Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen und migrieren
    /// 2. Dienste, Dispatcher und Rate Limiter aufbauen
    /// 3. Optionalen Dispatch-Taktgeber starten
    /// 4. REST-API starten, bis Ctrl-C kommt
    pub async fn starten(self) -> Result<()> {
        let bind_addr: SocketAddr = self
            .config
            .api_bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.api_bind_adresse()))?;

        tracing::info!(
            server_name = %self.config.server.name,
            api = %bind_addr,
            url = %self.config.datenbank.url,
            "Server startet"
        );

        let db = Arc::new(
            SqliteDb::oeffnen(&self.config.datenbank_konfig())
                .await
                .context("Datenbank konnte nicht geoeffnet werden")?,
        );
        let komponenten = Komponenten::aufbauen(&self.config, db)?;

        let mut hintergrund = Vec::new();
        if self.config.dispatch.intervall_sekunden > 0 {
            hintergrund.push(tokio::spawn(dispatch_takt(
                komponenten.state.dispatcher.clone(),
                Duration::from_secs(self.config.dispatch.intervall_sekunden),
            )));
        }
        let limiter = komponenten.rate_limiter.clone();
        hintergrund.push(tokio::spawn(async move {
            let mut takt = tokio::time::interval(RATE_LIMIT_CLEANUP);
            loop {
                takt.tick().await;
                limiter.cleanup();
            }
        }));

        let rest = RestServer::neu(RestServerKonfig {
            bind_addr,
            cors_origins: self.config.netzwerk.cors_origins.clone(),
        });
        rest.starten(komponenten.state, shutdown_signal()).await?;

        for aufgabe in hintergrund {
            aufgabe.abort();
        }
        komponenten.db.schliessen().await;
        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Interner Taktgeber zusaetzlich zum externen Trigger
async fn dispatch_takt(dispatcher: Arc<SqliteDispatcher>, intervall: Duration) {
    tracing::info!(sekunden = intervall.as_secs(), "Dispatch-Taktgeber gestartet");
    let mut takt = tokio::time::interval(intervall);
    takt.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        takt.tick().await;
        if let Err(e) = dispatcher.durchlauf().await {
            tracing::error!(fehler = %e, "Geplanter Dispatch-Lauf fehlgeschlagen");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Shutdown-Signal konnte nicht abgewartet werden");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
}
