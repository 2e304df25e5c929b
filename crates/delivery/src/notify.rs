//! Benachrichtigung des Empfaengers ueber neue Nachrichten
//!
//! Benachrichtigungen sind Best-Effort. Ein Fehler darf weder eine
//! Einreichung noch einen Dispatch-Lauf scheitern lassen; die Aufrufer
//! protokollieren ihn nur.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::error::NotifyError;

/// Inhalt einer Benachrichtigung
#[derive(Debug, Clone)]
pub struct Benachrichtigung<'a> {
    pub username: &'a str,
    pub email: &'a str,
    /// Nachricht wurde als auffaellig markiert (landet im gefilterten Postfach)
    pub markiert: bool,
}

/// Versendet Benachrichtigungen
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn neue_nachricht(&self, an: &Benachrichtigung<'_>) -> Result<(), NotifyError>;
}

/// Protokolliert nur (Standard ohne Mail-Konfiguration)
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn neue_nachricht(&self, an: &Benachrichtigung<'_>) -> Result<(), NotifyError> {
        info!(username = %an.username, markiert = an.markiert, "Neue Nachricht zugestellt");
        Ok(())
    }
}

/// Standard-Endpunkt der Postmark-API
pub const POSTMARK_API_URL: &str = "https://api.postmarkapp.com";

/// Konfiguration fuer den Postmark-Versand
#[derive(Debug, Clone)]
pub struct PostmarkKonfig {
    pub api_url: String,
    pub server_token: String,
    pub absender: String,
    pub message_stream: String,
    /// Basis-URL der Anwendung, verlinkt wird `<url>/dashboard`
    pub app_url: String,
}

impl PostmarkKonfig {
    /// Ohne Token oder Absender wird nichts versendet
    pub fn ist_konfiguriert(&self) -> bool {
        !self.server_token.is_empty() && !self.absender.is_empty()
    }
}

/// Versendet Benachrichtigungen als E-Mail ueber Postmark
pub struct PostmarkNotifier {
    client: reqwest::Client,
    konfig: PostmarkKonfig,
}

impl std::fmt::Debug for PostmarkNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostmarkNotifier")
            .field("api_url", &self.konfig.api_url)
            .field("absender", &self.konfig.absender)
            .field("server_token", &"[REDACTED]")
            .finish()
    }
}

impl PostmarkNotifier {
    pub fn neu(konfig: PostmarkKonfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, konfig })
    }

    fn dashboard_link(&self) -> String {
        format!("{}/dashboard", self.konfig.app_url.trim_end_matches('/'))
    }

    fn text_koerper(&self) -> String {
        format!(
            "You received new anonymous feedback.\n\nClick here to go to the dashboard: {}",
            self.dashboard_link()
        )
    }

    fn html_koerper(&self, markiert: bool) -> String {
        let hinweis = if markiert {
            " The feedback triggered your filter, so it will be hidden in the filtered inbox \
             until you open it."
        } else {
            ""
        };
        format!(
            "<!DOCTYPE html><html lang=\"en\"><body style=\"font-family: Georgia, serif;\">\
             <h1>New anonymous feedback received</h1>\
             <p>Click below to view the feedback.{hinweis}</p>\
             <a href=\"{link}\">Go to my dashboard</a>\
             </body></html>",
            link = self.dashboard_link()
        )
    }
}

#[async_trait]
impl Notifier for PostmarkNotifier {
    async fn neue_nachricht(&self, an: &Benachrichtigung<'_>) -> Result<(), NotifyError> {
        if !self.konfig.ist_konfiguriert() {
            debug!("Postmark nicht konfiguriert, Benachrichtigung uebersprungen");
            return Ok(());
        }

        let url = format!("{}/email", self.konfig.api_url.trim_end_matches('/'));
        let body = json!({
            "From": self.konfig.absender,
            "To": an.email,
            "Subject": "New anonymous feedback received",
            "TextBody": self.text_koerper(),
            "HtmlBody": self.html_koerper(an.markiert),
            "MessageStream": self.konfig.message_stream,
        });

        let resp = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", &self.konfig.server_token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status().as_u16()));
        }

        debug!(username = %an.username, "Benachrichtigung per Postmark versendet");
        Ok(())
    }
}
