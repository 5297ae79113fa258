//! Tencent Cloud API client
//!
//! Actions are posted as JSON to the product endpoint and answered with the
//! `{"Response": {...}}` envelope.

pub mod client;
pub mod common;
pub mod error;
pub mod transport;

#[cfg(test)]
pub mod test_helpers;

pub use client::Client;
pub use common::{Action, StatusLabel};
pub use error::ApiError;
pub use transport::{TransportConfig, TransportStats};
