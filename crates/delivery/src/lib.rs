//! sealpost-delivery – Zustellung zeitgesteuerter Nachrichten
//!
//! Dieses Crate implementiert:
//! - Dispatcher: beansprucht faellige Zeilen, liefert ein, raeumt auf
//! - DeliverySink + InboxSink: Posteingang und Best-Effort-Benachrichtigung
//! - Notifier: LogNotifier und PostmarkNotifier
//! - EinreichungsService: Einreichung ueber Share-Links (sofort oder geplant)
//! - EmpfaengerService: Schluessel, Links, Posteingang, Zugangsdaten
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use sealpost_db::SqliteDb;
//! use sealpost_delivery::{DispatchKonfig, Dispatcher, InboxSink, LogNotifier};
//!
//! #[tokio::main]
//! async fn main() {
//!     let db = Arc::new(SqliteDb::in_memory().await.unwrap());
//!     let sink = Arc::new(InboxSink::neu(db.clone(), Arc::new(LogNotifier)));
//!     let dispatcher = Dispatcher::neu(db, sink, DispatchKonfig::default());
//!
//!     let bericht = dispatcher.durchlauf().await.unwrap();
//!     println!("{} zugestellt", bericht.zugestellt);
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod notify;
pub mod service;
pub mod sink;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use dispatcher::{DispatchBericht, DispatchKonfig, Dispatcher, CLAIM_TTL_SEKUNDEN, MAX_LIMIT, STANDARD_LIMIT};
pub use error::{DeliveryError, DeliveryResult, NotifyError};
pub use notify::{Benachrichtigung, LogNotifier, Notifier, PostmarkKonfig, PostmarkNotifier};
pub use service::{EinreichungsService, EmpfaengerService, Speicher};
pub use sink::{DeliverySink, InboxSink};
pub use types::{Einreichung, EinreichungsErgebnis, EinreichungsGrenzen, LinkInfo, Nutzlast};
