//! sealpost-db – Datenbank-Schicht
//!
//! Repository-Traits fuer Empfaenger, Share-Links, Posteingang und die
//! Warteschlange zeitgesteuerter Nachrichten, implementiert fuer SQLite.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    DatabaseConfig, DbResult, MessageRepository, RecipientRepository, ScheduledRepository,
    ShareLinkRepository,
};
pub use sqlite::SqliteDb;
