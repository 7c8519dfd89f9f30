//! Return/refund requests.
//!
//! - [`matrix`] - which methods go with which categories, and which detail
//!   fields each method needs.
//! - [`amount`] - the refund policy and the amount breakdown.
//! - [`workflow`] - the step-by-step request builder.
//! - [`submission`] - the wire payload and the gateway seam.

pub mod amount;
pub mod matrix;
pub mod submission;
pub mod workflow;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OrderId, OrderItemId, RefundId, Role, normalize_token};

pub use amount::{RefundBreakdown, RefundPolicy};
pub use submission::{RefundGateway, RefundSubmission, SubmitError, SubmitOutcome};
pub use workflow::{RefundStep, RefundWorkflow, SessionContext};

/// Most evidence images a request may carry.
pub const MAX_EVIDENCE: usize = 4;

/// Reason that requires a free-text explanation.
pub const OTHER_REASON: &str = "Other";

/// Reasons offered to the buyer, in display order.
pub const REFUND_REASONS: [&str; 7] = [
    "Damaged item",
    "Wrong item received",
    "Item not as described",
    "Missing parts or accessories",
    "Defective or not working",
    "Changed my mind",
    OTHER_REASON,
];

/// What the buyer wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundCategory {
    /// Send the item back for a full refund.
    ReturnItem,
    /// Keep the item for a partial refund.
    KeepItem,
    /// Send the item back for a replacement.
    Replacement,
}

impl RefundCategory {
    pub const ALL: [Self; 3] = [Self::ReturnItem, Self::KeepItem, Self::Replacement];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReturnItem => "return_item",
            Self::KeepItem => "keep_item",
            Self::Replacement => "replacement",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ReturnItem => "Return Item",
            Self::KeepItem => "Keep Item (Partial Refund)",
            Self::Replacement => "Replacement",
        }
    }
}

impl fmt::Display for RefundCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RefundCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "return_item" | "return" => Ok(Self::ReturnItem),
            "keep_item" | "keep" | "partial" => Ok(Self::KeepItem),
            "replacement" | "replace" => Ok(Self::Replacement),
            _ => Err(format!("invalid refund category: {s}")),
        }
    }
}

/// Channel through which money or value goes back to the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    /// E-wallet such as GCash or Maya.
    Wallet,
    /// Bank transfer.
    Bank,
    /// Store voucher.
    Voucher,
    /// Remittance centre pickup.
    Remittance,
    /// Cash handed over at the pickup point.
    CashOnHand,
    /// Replacement item instead of money.
    Replace,
}

impl RefundMethod {
    pub const ALL: [Self; 6] = [
        Self::Wallet,
        Self::Bank,
        Self::Voucher,
        Self::Remittance,
        Self::CashOnHand,
        Self::Replace,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Bank => "bank",
            Self::Voucher => "voucher",
            Self::Remittance => "remittance",
            Self::CashOnHand => "cash_on_hand",
            Self::Replace => "replace",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Wallet => "E-Wallet",
            Self::Bank => "Bank Transfer",
            Self::Voucher => "Store Voucher",
            Self::Remittance => "Remittance",
            Self::CashOnHand => "Cash on Hand",
            Self::Replace => "Replacement Item",
        }
    }
}

impl fmt::Display for RefundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RefundMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "wallet" | "e_wallet" | "ewallet" => Ok(Self::Wallet),
            "bank" | "bank_transfer" => Ok(Self::Bank),
            "voucher" => Ok(Self::Voucher),
            "remittance" => Ok(Self::Remittance),
            "cash_on_hand" | "cash" => Ok(Self::CashOnHand),
            "replace" | "replacement" => Ok(Self::Replace),
            _ => Err(format!("invalid refund method: {s}")),
        }
    }
}

/// A payout detail the buyer fills in for a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailField {
    Provider,
    BankName,
    AccountName,
    AccountNumber,
    AccountType,
    FirstName,
    LastName,
    ContactNumber,
    ValidIdType,
    ValidIdNumber,
}

impl DetailField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::BankName => "bank_name",
            Self::AccountName => "account_name",
            Self::AccountNumber => "account_number",
            Self::AccountType => "account_type",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::ContactNumber => "contact_number",
            Self::ValidIdType => "valid_id_type",
            Self::ValidIdNumber => "valid_id_number",
        }
    }
}

impl fmt::Display for DetailField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filled-in payout details, keyed by field.
///
/// Values are trimmed on insert; a blank value removes the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodDetails(BTreeMap<DetailField, String>);

impl MethodDetails {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, or clear it when `value` is blank.
    pub fn set(&mut self, field: DetailField, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.0.remove(&field);
        } else {
            self.0.insert(field, value.to_owned());
        }
    }

    #[must_use]
    pub fn get(&self, field: DetailField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Drop every field not in `keep`.
    pub fn retain_only(&mut self, keep: &[DetailField]) {
        self.0.retain(|field, _| keep.contains(field));
    }

    /// Which of `required` are not filled in.
    #[must_use]
    pub fn missing(&self, required: &[DetailField]) -> Vec<DetailField> {
        required
            .iter()
            .copied()
            .filter(|field| !self.0.contains_key(field))
            .collect()
    }
}

/// Server-side status of a refund request. The client only renders these.
///
/// Unrecognised values deserialize to [`RefundStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
    ReturnShipping,
    ReturnAccepted,
    Refunded,
    Unknown,
}

impl RefundStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending Review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Processing => "Processing",
            Self::ReturnShipping => "Return in Transit",
            Self::ReturnAccepted => "Return Accepted",
            Self::Refunded => "Refunded",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the request still blocks a new one on the same order.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Rejected | Self::Refunded)
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "pending" | "pending_review" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" | "declined" => Ok(Self::Rejected),
            "processing" => Ok(Self::Processing),
            "return_shipping" | "return_in_transit" => Ok(Self::ReturnShipping),
            "return_accepted" => Ok(Self::ReturnAccepted),
            "refunded" | "completed" => Ok(Self::Refunded),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("invalid refund status: {s}")),
        }
    }
}

impl<'de> Deserialize<'de> for RefundStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Self::Unknown))
    }
}

/// One entry of the buyer's refund list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundSummary {
    #[serde(alias = "id")]
    pub refund_id: RefundId,
    pub order_id: OrderId,
    pub status: RefundStatus,
    #[serde(default)]
    pub refund_category: Option<RefundCategory>,
    #[serde(default)]
    pub preferred_refund_method: Option<RefundMethod>,
    #[serde(default)]
    pub total_refund_amount: Option<Decimal>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Find a refund by ID in a my-refunds listing.
#[must_use]
pub fn find_refund<'a>(refunds: &'a [RefundSummary], id: &RefundId) -> Option<&'a RefundSummary> {
    refunds.iter().find(|refund| &refund.refund_id == id)
}

/// The active request on `order_id`, if any.
#[must_use]
pub fn active_refund_for<'a>(
    refunds: &'a [RefundSummary],
    order_id: &OrderId,
) -> Option<&'a RefundSummary> {
    refunds
        .iter()
        .find(|refund| &refund.order_id == order_id && refund.status.is_active())
}

/// Local validation and sequencing errors of a refund request.
///
/// None of these ever reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefundError {
    #[error("only the buyer can request a refund, not a {0}")]
    NotPermitted(Role),

    #[error("no item on this order can be returned")]
    NothingReturnable,

    #[error("select at least one item")]
    NoItemsSelected,

    #[error("item {0} cannot be returned")]
    ItemNotReturnable(OrderItemId),

    #[error("choose a refund type")]
    CategoryRequired,

    #[error("choose a refund method")]
    MethodRequired,

    #[error("{method} is not available for {category}")]
    MethodNotAllowed {
        method: RefundMethod,
        category: RefundCategory,
    },

    #[error("{field} is not used by {method}")]
    UnexpectedDetail {
        method: RefundMethod,
        field: DetailField,
    },

    #[error("incomplete {method} details, missing: {}", join_fields(.missing))]
    IncompleteMethodDetails {
        method: RefundMethod,
        missing: Vec<DetailField>,
    },

    #[error("requested amount {requested} exceeds the allowed {cap}")]
    AmountExceedsCap { requested: Decimal, cap: Decimal },

    #[error("a partial amount is only accepted for keep-item requests")]
    PartialAmountNotApplicable,

    #[error("choose a reason")]
    ReasonRequired,

    #[error("describe the reason")]
    CustomReasonRequired,

    #[error("at most {max} evidence images are allowed")]
    TooManyEvidence { max: usize },

    #[error("not allowed while at step {actual}")]
    StepOutOfOrder { actual: RefundStep },

    #[error("a submission is already in flight")]
    SubmissionInFlight,
}

fn join_fields(fields: &[DetailField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
