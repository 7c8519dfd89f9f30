//! Marketlane Core - order and refund rules for the marketplace client.
//!
//! This crate holds everything the client decides on its own, independent of
//! how the data was fetched or how it is rendered:
//!
//! - [`types`] - typed IDs, money helpers, and the status enums with the
//!   buyer-facing status table
//! - [`order`] - the order snapshot as reported by the API
//! - [`actions`] - which actions a viewer may take on an order
//! - [`timeline`] - adapters turning either order-detail response shape into
//!   one canonical view
//! - [`refund`] - the refund method matrix, amount calculation, and the
//!   request workflow
//!
//! # Architecture
//!
//! No I/O, no HTTP clients, no clocks: callers pass in `now` and drive
//! network calls themselves (see the `marketlane-client` crate).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod actions;
pub mod order;
pub mod refund;
pub mod timeline;
pub mod types;

pub use actions::{ItemActions, OrderActions, item_actions, order_actions, returnable_items};
pub use order::{Address, Order, OrderItem, Payment, Shipping};
pub use refund::{
    RefundBreakdown, RefundCategory, RefundError, RefundMethod, RefundPolicy, RefundStatus,
    RefundStep, RefundSubmission, RefundSummary, RefundWorkflow, SessionContext, SubmitError,
    SubmitOutcome,
};
pub use timeline::{NormalizeError, OrderTimelineView, ResponseShape};
pub use types::*;
