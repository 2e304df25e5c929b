//! REST-Handler

pub mod dispatch;
pub mod links;
pub mod messages;
