//! Einreichungs- und Empfaengerdienste

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sealpost_crypto::{struktur_gueltig, versiegeln_text, GeheimnisBox, OeffentlicherSchluessel};
use sealpost_db::{
    models::{
        EmpfaengerRecord, EmpfaengerUpdate, LinkRecord, NachrichtRecord, NachrichtenStatus,
        NeueGeplanteNachricht, NeueNachricht, NeuerEmpfaenger,
    },
    DbError, MessageRepository, RecipientRepository, ScheduledRepository, ShareLinkRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::error::{DeliveryError, DeliveryResult};
use crate::sink::InboxSink;
use crate::types::{Einreichung, EinreichungsErgebnis, EinreichungsGrenzen, LinkInfo, Nutzlast};

/// Begruendung fuer serverseitig versiegelte Nachrichten ohne Klassifikation
pub const BEGRUENDUNG_OHNE_KLASSIFIKATION: &str =
    "Classification not configured, delivered to main inbox";

/// Alle Repositories, die die Dienste benoetigen
pub trait Speicher:
    RecipientRepository + ShareLinkRepository + MessageRepository + ScheduledRepository
{
}

impl<T> Speicher for T where
    T: RecipientRepository + ShareLinkRepository + MessageRepository + ScheduledRepository
{
}

fn empfaenger_fehler(e: DbError) -> DeliveryError {
    match e {
        DbError::NichtGefunden(m) => DeliveryError::EmpfaengerNichtGefunden(m),
        e => e.into(),
    }
}

// ---------------------------------------------------------------------------
// Einreichung
// ---------------------------------------------------------------------------

/// Nimmt Nachrichten ueber Share-Links entgegen
pub struct EinreichungsService<R> {
    repo: Arc<R>,
    sink: Arc<InboxSink<R>>,
    grenzen: EinreichungsGrenzen,
}

impl<R: Speicher> EinreichungsService<R> {
    pub fn neu(repo: Arc<R>, sink: Arc<InboxSink<R>>, grenzen: EinreichungsGrenzen) -> Arc<Self> {
        Arc::new(Self {
            repo,
            sink,
            grenzen,
        })
    }

    async fn empfaenger_zum_link(&self, share_token: &str) -> DeliveryResult<EmpfaengerRecord> {
        let link = ShareLinkRepository::get_active_by_token(self.repo.as_ref(), share_token)
            .await?
            .ok_or(DeliveryError::LinkNichtGefunden)?;

        RecipientRepository::get_by_id(self.repo.as_ref(), link.recipient_id)
            .await?
            .ok_or_else(|| DeliveryError::EmpfaengerNichtGefunden(link.recipient_id.to_string()))
    }

    /// Loest einen Share-Link in die oeffentlichen Empfaengerangaben auf
    pub async fn link_aufloesen(&self, share_token: &str) -> DeliveryResult<LinkInfo> {
        let empfaenger = self.empfaenger_zum_link(share_token).await?;
        Ok(LinkInfo {
            username: empfaenger.username,
            public_key: empfaenger.public_key,
            filter_enabled: empfaenger.filter_enabled,
        })
    }

    pub async fn einreichen(&self, einreichung: Einreichung) -> DeliveryResult<EinreichungsErgebnis> {
        self.einreichen_um(einreichung, Utc::now()).await
    }

    /// Validiert, versiegelt bei Bedarf und stellt zu oder plant ein
    pub async fn einreichen_um(
        &self,
        einreichung: Einreichung,
        jetzt: DateTime<Utc>,
    ) -> DeliveryResult<EinreichungsErgebnis> {
        if einreichung.share_token.trim().is_empty() {
            return Err(DeliveryError::UngueltigeEingabe("share_token fehlt".into()));
        }
        if let Nutzlast::Plain { content } = &einreichung.nutzlast {
            self.klartext_pruefen(content)?;
        }

        let empfaenger = self.empfaenger_zum_link(&einreichung.share_token).await?;

        let (inhalt, begruendung) = match einreichung.nutzlast {
            Nutzlast::Sealed {
                envelope_content,
                envelope_reasoning,
            } => {
                self.umschlag_pruefen("envelope_content", &envelope_content)?;
                self.umschlag_pruefen("envelope_reasoning", &envelope_reasoning)?;
                (envelope_content, envelope_reasoning)
            }
            Nutzlast::Plain { content } => {
                if !empfaenger.filter_enabled {
                    return Err(DeliveryError::VersiegelungErforderlich);
                }
                let pem = empfaenger
                    .public_key
                    .as_deref()
                    .ok_or(DeliveryError::KeinSchluessel)?;
                let schluessel = OeffentlicherSchluessel::aus_pem(pem)?;
                (
                    versiegeln_text(&content, &schluessel)?,
                    versiegeln_text(BEGRUENDUNG_OHNE_KLASSIFIKATION, &schluessel)?,
                )
            }
        };

        let horizont = jetzt + Duration::days(self.grenzen.max_vorlauf_tage);
        let geplant = einreichung
            .deliver_at
            .filter(|t| *t > jetzt && *t <= horizont);

        match geplant {
            Some(deliver_at) => {
                let zeile = ScheduledRepository::create(
                    self.repo.as_ref(),
                    NeueGeplanteNachricht {
                        recipient_id: empfaenger.id,
                        envelope_content: &inhalt,
                        envelope_reasoning: &begruendung,
                        flag: false,
                        deliver_at,
                    },
                )
                .await?;
                info!(id = %zeile.id, deliver_at = %zeile.deliver_at, "Nachricht eingeplant");
                Ok(EinreichungsErgebnis::Geplant {
                    scheduled_at: zeile.deliver_at,
                })
            }
            None => {
                self.sink
                    .zustellen(NeueNachricht {
                        recipient_id: empfaenger.id,
                        envelope_content: &inhalt,
                        envelope_reasoning: &begruendung,
                        flag: false,
                    })
                    .await?;
                self.sink
                    .empfaenger_benachrichtigen(empfaenger.id, false)
                    .await;
                Ok(EinreichungsErgebnis::Zugestellt)
            }
        }
    }

    fn klartext_pruefen(&self, content: &str) -> DeliveryResult<()> {
        if content.trim().is_empty() {
            return Err(DeliveryError::UngueltigeEingabe(
                "Nachricht darf nicht leer sein".into(),
            ));
        }
        let laenge = content.chars().count();
        if laenge > self.grenzen.max_klartext_zeichen {
            return Err(DeliveryError::UngueltigeEingabe(format!(
                "Nachricht zu lang: {laenge} Zeichen (Maximum: {})",
                self.grenzen.max_klartext_zeichen
            )));
        }
        Ok(())
    }

    fn umschlag_pruefen(&self, feld: &'static str, wert: &str) -> DeliveryResult<()> {
        if wert.is_empty() {
            return Err(DeliveryError::UngueltigeEingabe(format!("{feld} fehlt")));
        }
        if wert.len() > self.grenzen.max_umschlag_zeichen {
            return Err(DeliveryError::ZuGross {
                feld,
                laenge: wert.len(),
                max: self.grenzen.max_umschlag_zeichen,
            });
        }
        if !struktur_gueltig(wert) {
            return Err(DeliveryError::UngueltigeEingabe(format!(
                "{feld} ist kein gueltiger Umschlag"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Empfaenger
// ---------------------------------------------------------------------------

/// Verwaltung von Empfaengern, Links, Posteingang und Zugangsdaten
pub struct EmpfaengerService<R> {
    repo: Arc<R>,
    geheimnisse: Option<Arc<GeheimnisBox>>,
}

impl<R: Speicher> EmpfaengerService<R> {
    pub fn neu(repo: Arc<R>, geheimnisse: Option<Arc<GeheimnisBox>>) -> Arc<Self> {
        Arc::new(Self { repo, geheimnisse })
    }

    /// Legt einen Empfaenger samt erstem Share-Link (Token = Benutzername) an
    pub async fn registrieren(
        &self,
        username: &str,
        email: &str,
        public_key: Option<&str>,
    ) -> DeliveryResult<EmpfaengerRecord> {
        benutzername_pruefen(username)?;
        if !email.contains('@') {
            return Err(DeliveryError::UngueltigeEingabe(format!(
                "Ungueltige E-Mail-Adresse: {email}"
            )));
        }
        if let Some(pem) = public_key {
            OeffentlicherSchluessel::aus_pem(pem)?;
        }

        let empfaenger = RecipientRepository::create(
            self.repo.as_ref(),
            NeuerEmpfaenger {
                username,
                email,
                public_key,
            },
        )
        .await
        .map_err(|e| {
            if e.ist_eindeutigkeit() {
                DeliveryError::NameVergeben(username.to_string())
            } else {
                e.into()
            }
        })?;

        ShareLinkRepository::create(self.repo.as_ref(), empfaenger.id, username).await?;

        info!(id = %empfaenger.id, %username, "Empfaenger registriert");
        Ok(empfaenger)
    }

    pub async fn laden(&self, id: Uuid) -> DeliveryResult<EmpfaengerRecord> {
        RecipientRepository::get_by_id(self.repo.as_ref(), id)
            .await?
            .ok_or_else(|| DeliveryError::EmpfaengerNichtGefunden(id.to_string()))
    }

    /// Setzt den oeffentlichen Schluessel (PEM wird geprueft)
    pub async fn schluessel_setzen(&self, id: Uuid, pem: &str) -> DeliveryResult<EmpfaengerRecord> {
        OeffentlicherSchluessel::aus_pem(pem)?;
        RecipientRepository::update(
            self.repo.as_ref(),
            id,
            EmpfaengerUpdate {
                public_key: Some(Some(pem.to_string())),
                ..Default::default()
            },
        )
        .await
        .map_err(empfaenger_fehler)
    }

    /// Schaltet serverseitig versiegelte Klartext-Einreichungen an oder aus
    pub async fn filter_setzen(&self, id: Uuid, aktiv: bool) -> DeliveryResult<EmpfaengerRecord> {
        RecipientRepository::update(
            self.repo.as_ref(),
            id,
            EmpfaengerUpdate {
                filter_enabled: Some(aktiv),
                ..Default::default()
            },
        )
        .await
        .map_err(empfaenger_fehler)
    }

    pub async fn links(&self, id: Uuid) -> DeliveryResult<Vec<LinkRecord>> {
        Ok(ShareLinkRepository::list_for_recipient(self.repo.as_ref(), id).await?)
    }

    /// Deaktiviert alle aktiven Links und erzeugt einen neuen mit Zufallstoken
    pub async fn link_erneuern(&self, id: Uuid) -> DeliveryResult<LinkRecord> {
        self.laden(id).await?;
        for link in self.links(id).await?.iter().filter(|l| l.is_active) {
            ShareLinkRepository::deactivate(self.repo.as_ref(), link.id, id).await?;
        }

        let token = Uuid::new_v4().to_string();
        Ok(ShareLinkRepository::create(self.repo.as_ref(), id, &token).await?)
    }

    pub async fn link_deaktivieren(&self, id: Uuid, link_id: Uuid) -> DeliveryResult<()> {
        if ShareLinkRepository::deactivate(self.repo.as_ref(), link_id, id).await? {
            Ok(())
        } else {
            Err(DeliveryError::LinkNichtGefunden)
        }
    }

    /// Posteingang, neueste zuerst
    pub async fn posteingang(&self, id: Uuid) -> DeliveryResult<Vec<NachrichtRecord>> {
        Ok(MessageRepository::list_for_recipient(self.repo.as_ref(), id).await?)
    }

    pub async fn als_gelesen_markieren(&self, id: Uuid, nachricht_id: Uuid) -> DeliveryResult<()> {
        self.status_setzen(id, nachricht_id, NachrichtenStatus::Read, Some(Utc::now()))
            .await
    }

    pub async fn archivieren(&self, id: Uuid, nachricht_id: Uuid) -> DeliveryResult<()> {
        self.status_setzen(id, nachricht_id, NachrichtenStatus::Archived, None)
            .await
    }

    pub async fn nachricht_loeschen(&self, id: Uuid, nachricht_id: Uuid) -> DeliveryResult<()> {
        if MessageRepository::delete(self.repo.as_ref(), nachricht_id, id).await? {
            Ok(())
        } else {
            Err(DeliveryError::NachrichtNichtGefunden(nachricht_id.to_string()))
        }
    }

    // Fremde Nachrichten sind von unbekannten nicht zu unterscheiden
    async fn status_setzen(
        &self,
        id: Uuid,
        nachricht_id: Uuid,
        status: NachrichtenStatus,
        read_at: Option<DateTime<Utc>>,
    ) -> DeliveryResult<()> {
        if MessageRepository::set_status(self.repo.as_ref(), nachricht_id, id, status, read_at).await? {
            Ok(())
        } else {
            Err(DeliveryError::NachrichtNichtGefunden(nachricht_id.to_string()))
        }
    }

    fn geheimnis_box(&self) -> DeliveryResult<&GeheimnisBox> {
        self.geheimnisse
            .as_deref()
            .ok_or(DeliveryError::KeinMasterKey)
    }

    /// Speichert Upstream-Zugangsdaten verschluesselt unter dem Master-Key
    pub async fn zugangsdaten_speichern(&self, id: Uuid, geheimnis: &str) -> DeliveryResult<()> {
        let token = self.geheimnis_box()?.schuetzen(geheimnis)?;
        RecipientRepository::update(
            self.repo.as_ref(),
            id,
            EmpfaengerUpdate {
                upstream_credential: Some(Some(token)),
                ..Default::default()
            },
        )
        .await
        .map_err(empfaenger_fehler)?;
        Ok(())
    }

    pub async fn zugangsdaten_entfernen(&self, id: Uuid) -> DeliveryResult<()> {
        RecipientRepository::update(
            self.repo.as_ref(),
            id,
            EmpfaengerUpdate {
                upstream_credential: Some(None),
                ..Default::default()
            },
        )
        .await
        .map_err(empfaenger_fehler)?;
        Ok(())
    }

    /// Entschluesselt gespeicherte Upstream-Zugangsdaten
    pub async fn zugangsdaten_aufdecken(&self, id: Uuid) -> DeliveryResult<Option<String>> {
        let empfaenger = self.laden(id).await?;
        match empfaenger.upstream_credential {
            Some(token) => Ok(Some(self.geheimnis_box()?.aufdecken(&token)?)),
            None => Ok(None),
        }
    }

    /// Loescht den Empfaenger mit allen Links und Nachrichten
    pub async fn entfernen(&self, id: Uuid) -> DeliveryResult<()> {
        if RecipientRepository::delete(self.repo.as_ref(), id).await? {
            info!(%id, "Empfaenger entfernt");
            Ok(())
        } else {
            Err(DeliveryError::EmpfaengerNichtGefunden(id.to_string()))
        }
    }
}

fn benutzername_pruefen(username: &str) -> DeliveryResult<()> {
    let gueltig = (3..=32).contains(&username.chars().count())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if gueltig {
        Ok(())
    } else {
        Err(DeliveryError::UngueltigeEingabe(format!(
            "Ungueltiger Benutzername '{username}' (3-32 Zeichen, a-z, 0-9, _ und -)"
        )))
    }
}
