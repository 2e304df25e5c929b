//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Geheimnisse koennen zusaetzlich ueber Umgebungsvariablen
//! gesetzt werden (`SEALPOST_CRON_SECRET`, `SEALPOST_MASTER_KEY`).

use sealpost_db::DatabaseConfig;
use sealpost_delivery::{
    DispatchKonfig, EinreichungsGrenzen, PostmarkKonfig, MAX_LIMIT, STANDARD_LIMIT,
};
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitKonfig;

/// Umgebungsvariable fuer das Dispatch-Geheimnis
pub const ENV_CRON_SECRET: &str = "SEALPOST_CRON_SECRET";
/// Umgebungsvariable fuer den Master-Key (Base64, 32 Byte)
pub const ENV_MASTER_KEY: &str = "SEALPOST_MASTER_KEY";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Dispatcher und Trigger-Endpunkt
    pub dispatch: DispatchEinstellungen,
    /// Master-Key fuer gespeicherte Zugangsdaten
    pub schluessel: SchluesselEinstellungen,
    /// Grenzen fuer Einreichungen
    pub einreichung: EinreichungsEinstellungen,
    /// E-Mail-Benachrichtigung (Postmark)
    pub benachrichtigung: BenachrichtigungsEinstellungen,
    /// Rate Limiting fuer Einreichungen
    pub rate_limit: RateLimitEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Sealpost".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer die REST-API
    pub bind_adresse: String,
    /// Port fuer die REST-API
    pub api_port: u16,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            api_port: 8080,
            cors_origins: vec![],
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Modus aktivieren
    pub sqlite_wal: bool,
    /// Wartezeit bei gesperrter Datenbank in Millisekunden
    pub busy_timeout_ms: u64,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        let standard = DatabaseConfig::default();
        Self {
            url: standard.url,
            max_verbindungen: standard.max_verbindungen,
            sqlite_wal: standard.sqlite_wal,
            busy_timeout_ms: standard.busy_timeout_ms,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Dispatcher-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchEinstellungen {
    /// Maximale Anzahl Zeilen pro Lauf (wird auf 1 bis 1000 begrenzt)
    pub batch_limit: u32,
    /// Intervall des internen Taktgebers in Sekunden (0 = nur externer Trigger)
    pub intervall_sekunden: u64,
    /// Fehlversuche bis zur Ablage (0 = unbegrenzt)
    pub max_versuche: u32,
    /// Bearer-Geheimnis fuer `/v1/dispatch`. Ohne Geheimnis ist der Endpunkt gesperrt.
    pub cron_secret: Option<String>,
}

impl Default for DispatchEinstellungen {
    fn default() -> Self {
        Self {
            batch_limit: STANDARD_LIMIT,
            intervall_sekunden: 0,
            max_versuche: 20,
            cron_secret: None,
        }
    }
}

/// Schluessel-Einstellungen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchluesselEinstellungen {
    /// Master-Key als Base64 (genau 32 Byte)
    pub master_key: Option<String>,
}

/// Grenzen fuer Einreichungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EinreichungsEinstellungen {
    pub max_klartext_zeichen: usize,
    pub max_umschlag_zeichen: usize,
    pub max_vorlauf_tage: i64,
}

impl Default for EinreichungsEinstellungen {
    fn default() -> Self {
        let standard = EinreichungsGrenzen::default();
        Self {
            max_klartext_zeichen: standard.max_klartext_zeichen,
            max_umschlag_zeichen: standard.max_umschlag_zeichen,
            max_vorlauf_tage: standard.max_vorlauf_tage,
        }
    }
}

/// Postmark-Einstellungen. Ohne Token und Absender wird nur geloggt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenachrichtigungsEinstellungen {
    pub api_url: String,
    pub server_token: Option<String>,
    pub absender: Option<String>,
    pub message_stream: String,
    /// Basis-URL des Dashboards fuer den Link in der Mail
    pub app_url: String,
}

impl Default for BenachrichtigungsEinstellungen {
    fn default() -> Self {
        Self {
            api_url: sealpost_delivery::notify::POSTMARK_API_URL.into(),
            server_token: None,
            absender: None,
            message_stream: "outbound".into(),
            app_url: "http://localhost:8080".into(),
        }
    }
}

/// Rate-Limit-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitEinstellungen {
    /// Einreichungen pro Minute je Client-IP und Share-Link
    pub anfragen_pro_minute: u32,
}

impl Default for RateLimitEinstellungen {
    fn default() -> Self {
        Self {
            anfragen_pro_minute: RateLimitKonfig::default().anfragen_pro_minute,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei und wendet danach die
    /// Umgebungsvariablen an.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.umgebung_anwenden(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Ueberschreibt Geheimnisse aus der Umgebung. Leere Werte werden ignoriert.
    pub fn umgebung_anwenden(&mut self, lesen: impl Fn(&str) -> Option<String>) {
        let nicht_leer = |name: &str| lesen(name).filter(|v| !v.trim().is_empty());
        if let Some(secret) = nicht_leer(ENV_CRON_SECRET) {
            self.dispatch.cron_secret = Some(secret);
        }
        if let Some(key) = nicht_leer(ENV_MASTER_KEY) {
            self.schluessel.master_key = Some(key);
        }
    }

    /// Gibt die Bind-Adresse fuer die REST-API zurueck
    pub fn api_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.api_port)
    }

    pub fn datenbank_konfig(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.sqlite_wal,
            busy_timeout_ms: self.datenbank.busy_timeout_ms,
        }
    }

    pub fn dispatch_konfig(&self) -> DispatchKonfig {
        DispatchKonfig {
            limit: self.dispatch.batch_limit.clamp(1, MAX_LIMIT),
            max_versuche: (self.dispatch.max_versuche > 0).then_some(self.dispatch.max_versuche),
        }
    }

    pub fn einreichungs_grenzen(&self) -> EinreichungsGrenzen {
        EinreichungsGrenzen {
            max_klartext_zeichen: self.einreichung.max_klartext_zeichen,
            max_umschlag_zeichen: self.einreichung.max_umschlag_zeichen,
            max_vorlauf_tage: self.einreichung.max_vorlauf_tage,
        }
    }

    pub fn rate_limit_konfig(&self) -> RateLimitKonfig {
        RateLimitKonfig {
            anfragen_pro_minute: self.rate_limit.anfragen_pro_minute.max(1),
        }
    }

    /// Postmark-Konfiguration, falls Token und Absender gesetzt sind
    pub fn postmark_konfig(&self) -> Option<PostmarkKonfig> {
        let b = &self.benachrichtigung;
        let konfig = PostmarkKonfig {
            api_url: b.api_url.clone(),
            server_token: b.server_token.clone().unwrap_or_default(),
            absender: b.absender.clone().unwrap_or_default(),
            message_stream: b.message_stream.clone(),
            app_url: b.app_url.clone(),
        };
        konfig.ist_konfiguriert().then_some(konfig)
    }
}
