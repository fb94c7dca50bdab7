//! Record API: entity kinds, typed records and the HTTP gateway.

pub mod client;
pub mod error;
pub mod kind;
pub mod types;

pub use client::ApiClient;
pub use error::GatewayError;
pub use kind::{EntityKind, ViewScope};
