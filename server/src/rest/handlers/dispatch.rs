//! Trigger fuer den Dispatcher (`GET|POST /v1/dispatch`)
//!
//! Wird von einem externen Cron aufgerufen. Mehrere gleichzeitige Aufrufe
//! sind unkritisch, jede Zeile wird nur von einem Lauf beansprucht.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use sealpost_crypto::geheimnis_gleich;
use serde_json::json;

use crate::rest::middleware::{bearer_token, fehler_antwort};
use crate::rest::AppState;

pub async fn dispatch(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(secret) = state.cron_secret.as_deref() else {
        tracing::warn!("Dispatch-Aufruf abgelehnt: kein cron_secret konfiguriert");
        return fehler_antwort(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let autorisiert = bearer_token(&headers)
        .is_some_and(|token| geheimnis_gleich(token.as_bytes(), secret.as_bytes()));
    if !autorisiert {
        return fehler_antwort(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    match state.dispatcher.durchlauf().await {
        Ok(bericht) => (
            StatusCode::OK,
            Json(json!({ "delivered": bericht.zugestellt })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(fehler = %e, "Dispatch-Lauf fehlgeschlagen");
            fehler_antwort(StatusCode::INTERNAL_SERVER_ERROR, "Dispatch failed")
        }
    }
}
