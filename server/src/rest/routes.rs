//! Route-Definitionen fuer die REST-API (/v1/...)

use axum::{
    routing::{get, post},
    Router,
};

use crate::rest::{handlers, AppState};

/// Erstellt den vollstaendigen /v1/-Router
pub fn v1_router() -> Router<AppState> {
    Router::new()
        // Dispatch-Trigger (Cron)
        .route(
            "/v1/dispatch",
            get(handlers::dispatch::dispatch).post(handlers::dispatch::dispatch),
        )
        // Share-Links
        .route("/v1/links/:token", get(handlers::links::link_info))
        // Einreichungen
        .route("/v1/messages", post(handlers::messages::nachricht_einreichen))
}
