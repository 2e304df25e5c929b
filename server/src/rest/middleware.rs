//! Hilfsfunktionen fuer Header und Fehlerantworten

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use sealpost_delivery::DeliveryError;
use serde_json::json;

/// Extrahiert den Client-IP aus den Request-Headern
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extrahiert Bearer-Token aus Authorization-Header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Fehlerantwort `{ "error": nachricht }`
pub fn fehler_antwort(status: StatusCode, nachricht: &str) -> Response {
    (status, Json(json!({ "error": nachricht }))).into_response()
}

/// Antwort bei ueberschrittenem Rate-Limit
pub fn rate_limit_antwort(retry_after_secs: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Too many requests. Please try again later.",
            "retry_after_secs": retry_after_secs
        })),
    )
        .into_response()
}

/// Bildet Dienstfehler auf HTTP ab. Interne Details bleiben im Log.
pub fn dienst_fehler(e: DeliveryError) -> Response {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(fehler = %e, "Anfrage fehlgeschlagen");
        return fehler_antwort(status, "Internal server error");
    }
    fehler_antwort(status, &e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_aus_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "192.168.1.1");
    }

    #[test]
    fn client_ip_ohne_header() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");
    }

    #[test]
    fn bearer_token_extrahieren() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer mein_token_123"),
        );
        assert_eq!(bearer_token(&headers), Some("mein_token_123"));
    }

    #[test]
    fn bearer_token_ohne_praefix() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("mein_token_123"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn dienst_fehler_status() {
        assert_eq!(
            dienst_fehler(DeliveryError::LinkNichtGefunden).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            dienst_fehler(DeliveryError::ZuGross {
                feld: "envelope_content",
                laenge: 20_000,
                max: 16_384
            })
            .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            dienst_fehler(DeliveryError::KeinMasterKey).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
