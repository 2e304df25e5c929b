//! Rate Limiter fuer Einreichungen
//!
//! Token-Bucket pro Schluessel (Client-IP + Share-Link). Der Limiter wird
//! dem Router ueber den State uebergeben und ist kein globaler Zustand.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

/// Prueft, ob eine Anfrage unter einem Schluessel erlaubt ist
pub trait Begrenzer: Send + Sync {
    /// `Ok(())` wenn erlaubt, sonst `Err(retry_after_secs)`
    fn pruefe(&self, schluessel: &str) -> Result<(), u64>;
}

/// Konfiguration fuer den Rate Limiter
#[derive(Debug, Clone)]
pub struct RateLimitKonfig {
    /// Maximale Anfragen pro Minute pro Schluessel
    pub anfragen_pro_minute: u32,
}

impl Default for RateLimitKonfig {
    fn default() -> Self {
        Self {
            anfragen_pro_minute: 10,
        }
    }
}

/// Ein Token-Bucket fuer einen einzelnen Schluessel
#[derive(Debug)]
struct TokenBucket {
    /// Aktuelle Token-Anzahl (als f64 fuer Bruchteil-Auffuellung)
    token: f64,
    /// Maximale Token-Anzahl (= Burst-Limit)
    max_token: f64,
    /// Auffuellrate in Token pro Sekunde
    fuellrate: f64,
    letzte_auffuellung: Instant,
}

impl TokenBucket {
    fn neu(max_anfragen_pro_minute: u32) -> Self {
        let max = max_anfragen_pro_minute as f64;
        Self {
            token: max,
            max_token: max,
            fuellrate: max / 60.0,
            letzte_auffuellung: Instant::now(),
        }
    }

    fn verbrauchen(&mut self) -> bool {
        self.auffuellen();
        if self.token >= 1.0 {
            self.token -= 1.0;
            true
        } else {
            false
        }
    }

    /// Sekunden bis zum naechsten verfuegbaren Token
    fn retry_after_secs(&mut self) -> u64 {
        self.auffuellen();
        let fehlend = 1.0 - self.token;
        if fehlend <= 0.0 {
            return 0;
        }
        (fehlend / self.fuellrate).ceil() as u64
    }

    fn auffuellen(&mut self) {
        let jetzt = Instant::now();
        let vergangen = jetzt.duration_since(self.letzte_auffuellung).as_secs_f64();
        self.token = (self.token + vergangen * self.fuellrate).min(self.max_token);
        self.letzte_auffuellung = jetzt;
    }
}

/// Rate Limiter mit Token-Bucket-Algorithmus
pub struct RateLimiter {
    konfig: RateLimitKonfig,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn neu(konfig: RateLimitKonfig) -> Arc<Self> {
        Arc::new(Self {
            konfig,
            buckets: Mutex::new(HashMap::new()),
        })
    }

    /// Anzahl der aktuell gehaltenen Buckets
    pub fn anzahl(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Bereinigt Buckets die seit mehr als 5 Minuten inaktiv sind
    pub fn cleanup(&self) {
        let schwellwert = Duration::from_secs(5 * 60);
        let jetzt = Instant::now();
        self.buckets
            .lock()
            .retain(|_, b| jetzt.duration_since(b.letzte_auffuellung) < schwellwert);
    }
}

impl Begrenzer for RateLimiter {
    fn pruefe(&self, schluessel: &str) -> Result<(), u64> {
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(schluessel.to_string())
            .or_insert_with(|| TokenBucket::neu(self.konfig.anfragen_pro_minute));
        if bucket.verbrauchen() {
            Ok(())
        } else {
            Err(bucket.retry_after_secs())
        }
    }
}
