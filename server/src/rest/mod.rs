//! REST-Interface fuer Sealpost

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;


use std::sync::Arc;

use sealpost_db::SqliteDb;
use sealpost_delivery::{Dispatcher, EinreichungsService, EmpfaengerService, InboxSink};

use crate::rate_limit::Begrenzer;

/// Dispatcher mit SQLite-Warteschlange und Posteingang
pub type SqliteDispatcher = Dispatcher<SqliteDb, InboxSink<SqliteDb>>;

/// Axum-State fuer den REST-Server
#[derive(Clone)]
pub struct AppState {
    pub einreichung: Arc<EinreichungsService<SqliteDb>>,
    pub empfaenger: Arc<EmpfaengerService<SqliteDb>>,
    pub dispatcher: Arc<SqliteDispatcher>,
    pub begrenzer: Arc<dyn Begrenzer>,
    /// Bearer-Geheimnis fuer `/v1/dispatch`
    pub cron_secret: Option<Arc<str>>,
}

pub use server::{app, RestServer, RestServerKonfig};
