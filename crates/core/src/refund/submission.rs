//! Refund request payload and the gateway that accepts it.

use std::future::Future;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::{MethodDetails, RefundCategory, RefundMethod};
use crate::types::{OrderId, OrderItemId, RefundId, UserId};

/// Body of a refund-submit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundSubmission {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub selected_items: Vec<OrderItemId>,
    pub refund_category: RefundCategory,
    pub preferred_refund_method: RefundMethod,
    pub requested_refund_amount: Decimal,
    pub refund_fee: Decimal,
    pub total_refund_amount: Decimal,
    /// Chosen reason, or the buyer's own words when they picked "Other".
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_note: Option<String>,
    #[serde(skip_serializing_if = "MethodDetails::is_empty")]
    pub method_details: MethodDetails,
    /// Uploaded evidence image references.
    pub evidence: Vec<String>,
}

/// How a submission ended up on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "refund_id", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// A new request was created.
    Created(RefundId),
    /// The order already had an active request; this is its ID.
    AlreadyExists(RefundId),
    /// The server accepted the request but its ID could not be resolved.
    /// The buyer finds it under My Refunds.
    CreatedUnconfirmed,
}

impl SubmitOutcome {
    /// The request the caller should navigate to, when known.
    #[must_use]
    pub const fn refund_id(&self) -> Option<&RefundId> {
        match self {
            Self::Created(id) | Self::AlreadyExists(id) => Some(id),
            Self::CreatedUnconfirmed => None,
        }
    }
}

/// Why a refund-submit call did not create a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// 409: the order already has an active request.
    #[error("a refund request already exists: {refund_id}")]
    Conflict { refund_id: RefundId },

    /// The call did not complete in time; the request was not created.
    #[error("refund submission timed out")]
    Timeout,

    /// Transport failure or 5xx; the request was not created.
    #[error("network error: {0}")]
    Network(String),

    /// The server refused the payload.
    #[error("refund rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// 2xx without a usable refund ID. The request WAS created and must not
    /// be submitted again.
    #[error("refund created but its ID is unknown: {0}")]
    CreatedWithoutId(String),
}

impl SubmitError {
    /// Whether the server may hold a request from this call.
    #[must_use]
    pub const fn request_created(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::CreatedWithoutId(_))
    }
}

/// Something that accepts refund submissions.
pub trait RefundGateway {
    /// Submit a request, returning the new request ID.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Conflict`] when the order already has an
    /// active request, [`SubmitError::CreatedWithoutId`] when the request was
    /// created but its ID could not be resolved, and the other variants when
    /// nothing was created.
    fn submit_refund(
        &self,
        submission: &RefundSubmission,
    ) -> impl Future<Output = Result<RefundId, SubmitError>> + Send;
}
