//! Oeffentliche Angaben zu einem Share-Link (`GET /v1/links/:token`)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::rest::middleware::dienst_fehler;
use crate::rest::AppState;

pub async fn link_info(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.einreichung.link_aufloesen(&token).await {
        Ok(info) => (StatusCode::OK, Json(info)).into_response(),
        Err(e) => dienst_fehler(e),
    }
}
