//! Core value types for Marketlane.
//!
//! This module provides type-safe wrappers for ids, money, and the status
//! enums shared by orders, timelines and refunds.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{CurrencyCode, MONEY_TOLERANCE, Money, amounts_match, non_negative, round_money};
pub use status::*;
