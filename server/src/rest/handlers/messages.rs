//! Einreichung ueber einen Share-Link (`POST /v1/messages`)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use sealpost_delivery::{Einreichung, EinreichungsErgebnis, Nutzlast};
use serde::Deserialize;
use serde_json::json;

use crate::rest::middleware::{client_ip, dienst_fehler, fehler_antwort, rate_limit_antwort};
use crate::rest::AppState;

#[derive(Debug, Deserialize)]
pub struct EinreichungsBody {
    pub share_token: String,
    pub payload: Nutzlast,
    /// RFC 3339. Unlesbare Werte fuehren zur Sofortzustellung.
    pub deliver_at: Option<String>,
}

fn zeitpunkt_parsen(wert: Option<&str>) -> Option<DateTime<Utc>> {
    wert.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|t| t.with_timezone(&Utc))
}

pub async fn nachricht_einreichen(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<EinreichungsBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return fehler_antwort(StatusCode::BAD_REQUEST, &e.body_text()),
    };

    let schluessel = format!("{}:{}", client_ip(&headers), body.share_token);
    if let Err(retry_after) = state.begrenzer.pruefe(&schluessel) {
        tracing::debug!(%schluessel, retry_after, "Einreichung gedrosselt");
        return rate_limit_antwort(retry_after);
    }

    let einreichung = Einreichung {
        deliver_at: zeitpunkt_parsen(body.deliver_at.as_deref()),
        share_token: body.share_token,
        nutzlast: body.payload,
    };

    match state.einreichung.einreichen(einreichung).await {
        Ok(EinreichungsErgebnis::Zugestellt) => {
            (StatusCode::OK, Json(json!({ "success": true }))).into_response()
        }
        Ok(EinreichungsErgebnis::Geplant { scheduled_at }) => (
            StatusCode::OK,
            Json(json!({ "success": true, "scheduled_at": scheduled_at })),
        )
            .into_response(),
        Err(e) => dienst_fehler(e),
    }
}
