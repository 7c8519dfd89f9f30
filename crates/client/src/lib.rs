//! Marketlane Client - async access to the marketplace API.
//!
//! This crate wires the rules in `marketlane-core` to the network:
//! - [`config`] - configuration from environment variables
//! - [`client`] - the REST client implementing the order-detail and refund
//!   gateway seams
//! - [`order_detail`] - order-detail loading with endpoint fallback
//! - [`submit`] - refund submission with a timeout
//!
//! No subscriber is installed here; embedding applications own logging
//! output.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod client;
pub mod config;
pub mod error;
pub mod order_detail;
pub mod submit;

pub use client::MarketClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, OrderFetchError, SubmitWorkflowError};
pub use order_detail::{OrderDetailSource, fetch_order, load_order_timeline};
pub use submit::submit_workflow;
