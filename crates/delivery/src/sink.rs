//! Zustellung in den Posteingang

use std::sync::Arc;

use sealpost_db::{
    models::{GeplanteNachrichtRecord, NachrichtRecord, NeueNachricht},
    MessageRepository, RecipientRepository,
};
use tracing::warn;
use uuid::Uuid;

use crate::error::{DeliveryError, DeliveryResult};
use crate::notify::{Benachrichtigung, Notifier};

/// Ziel des Dispatchers fuer faellige Nachrichten
#[allow(async_fn_in_trait)]
pub trait DeliverySink: Send + Sync {
    /// Legt die Nachricht dauerhaft im Posteingang ab
    async fn einliefern(&self, zeile: &GeplanteNachrichtRecord) -> DeliveryResult<()>;

    /// Benachrichtigt den Empfaenger. Schlaegt nie fehl.
    async fn benachrichtigen(&self, zeile: &GeplanteNachrichtRecord);
}

/// Posteingang in der Datenbank plus Benachrichtigung
pub struct InboxSink<R> {
    repo: Arc<R>,
    notifier: Arc<dyn Notifier>,
}

impl<R> InboxSink<R>
where
    R: MessageRepository + RecipientRepository,
{
    pub fn neu(repo: Arc<R>, notifier: Arc<dyn Notifier>) -> Self {
        Self { repo, notifier }
    }

    /// Fuegt eine Nachricht mit Status `unread` ein
    pub async fn zustellen(&self, nachricht: NeueNachricht<'_>) -> DeliveryResult<NachrichtRecord> {
        MessageRepository::create(self.repo.as_ref(), nachricht)
            .await
            .map_err(|e| DeliveryError::Zustellung(e.to_string()))
    }

    /// Best-Effort-Benachrichtigung; Fehler werden nur protokolliert
    pub async fn empfaenger_benachrichtigen(&self, recipient_id: Uuid, markiert: bool) {
        let empfaenger = match RecipientRepository::get_by_id(self.repo.as_ref(), recipient_id).await
        {
            Ok(Some(e)) => e,
            Ok(None) => {
                warn!(%recipient_id, "Empfaenger fuer Benachrichtigung nicht gefunden");
                return;
            }
            Err(e) => {
                warn!(%recipient_id, fehler = %e, "Empfaenger konnte nicht geladen werden");
                return;
            }
        };

        let hinweis = Benachrichtigung {
            username: &empfaenger.username,
            email: &empfaenger.email,
            markiert,
        };
        if let Err(e) = self.notifier.neue_nachricht(&hinweis).await {
            warn!(%recipient_id, fehler = %e, "Benachrichtigung fehlgeschlagen");
        }
    }
}

impl<R> DeliverySink for InboxSink<R>
where
    R: MessageRepository + RecipientRepository,
{
    async fn einliefern(&self, zeile: &GeplanteNachrichtRecord) -> DeliveryResult<()> {
        self.zustellen(zeile.als_neue_nachricht()).await.map(|_| ())
    }

    async fn benachrichtigen(&self, zeile: &GeplanteNachrichtRecord) {
        self.empfaenger_benachrichtigen(zeile.recipient_id, zeile.flag)
            .await
    }
}
