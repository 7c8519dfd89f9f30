//! Step-by-step construction of a refund request.
//!
//! ```text
//! SelectItems -> ChooseType -> ChooseMethod -> EnterMethodDetails
//!     -> EnterReason -> Review -> Submitting -> Submitted | Failed
//! ```
//!
//! Each setter only works on its own step, and [`RefundWorkflow::advance`]
//! checks the current step's guard before moving on. [`RefundWorkflow::back`]
//! is always allowed until submission starts. Nothing here touches the
//! network: [`RefundWorkflow::begin_submission`] hands out the payload and
//! [`RefundWorkflow::record_outcome`] takes the gateway's answer.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::amount::{RefundBreakdown, RefundPolicy};
use super::matrix;
use super::submission::{RefundSubmission, SubmitError, SubmitOutcome};
use super::{
    DetailField, MAX_EVIDENCE, MethodDetails, OTHER_REASON, RefundCategory, RefundError,
    RefundMethod,
};
use crate::actions::returnable_items;
use crate::order::Order;
use crate::types::{OrderItemId, RefundId, Role, UserId, round_money};

/// Who is using the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: UserId,
    pub role: Role,
}

/// Where the workflow is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStep {
    SelectItems,
    ChooseType,
    ChooseMethod,
    EnterMethodDetails,
    EnterReason,
    Review,
    Submitting,
    Submitted,
    Failed,
}

impl RefundStep {
    /// Step reached by a successful [`RefundWorkflow::advance`].
    const fn following(self) -> Option<Self> {
        match self {
            Self::SelectItems => Some(Self::ChooseType),
            Self::ChooseType => Some(Self::ChooseMethod),
            Self::ChooseMethod => Some(Self::EnterMethodDetails),
            Self::EnterMethodDetails => Some(Self::EnterReason),
            Self::EnterReason => Some(Self::Review),
            Self::Review | Self::Submitting | Self::Submitted | Self::Failed => None,
        }
    }

    /// Step reached by [`RefundWorkflow::back`].
    const fn preceding(self) -> Option<Self> {
        match self {
            Self::ChooseType => Some(Self::SelectItems),
            Self::ChooseMethod => Some(Self::ChooseType),
            Self::EnterMethodDetails => Some(Self::ChooseMethod),
            Self::EnterReason => Some(Self::EnterMethodDetails),
            Self::Review | Self::Failed => Some(Self::EnterReason),
            Self::SelectItems | Self::Submitting | Self::Submitted => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelectItems => "select_items",
            Self::ChooseType => "choose_type",
            Self::ChooseMethod => "choose_method",
            Self::EnterMethodDetails => "enter_method_details",
            Self::EnterReason => "enter_reason",
            Self::Review => "review",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RefundStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-progress refund request against one order.
///
/// Dropping the workflow discards everything; nothing is persisted before a
/// successful submission.
#[derive(Debug, Clone)]
pub struct RefundWorkflow {
    context: SessionContext,
    order: Order,
    policy: RefundPolicy,
    returnable: Vec<OrderItemId>,
    step: RefundStep,
    selected: Vec<OrderItemId>,
    category: Option<RefundCategory>,
    method: Option<RefundMethod>,
    details: MethodDetails,
    partial_amount: Option<Decimal>,
    reason: Option<String>,
    custom_reason: Option<String>,
    customer_note: Option<String>,
    evidence: Vec<String>,
    outcome: Option<SubmitOutcome>,
    failure: Option<String>,
}

impl RefundWorkflow {
    /// Open a refund request on `order` for the signed-in buyer.
    ///
    /// The set of selectable items is fixed at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::NotPermitted`] for sellers and riders and
    /// [`RefundError::NothingReturnable`] if no item is inside its return
    /// window.
    pub fn start(
        order: Order,
        context: SessionContext,
        now: DateTime<Utc>,
        policy: RefundPolicy,
    ) -> Result<Self, RefundError> {
        if context.role != Role::Customer {
            return Err(RefundError::NotPermitted(context.role));
        }

        let returnable: Vec<OrderItemId> = returnable_items(&order, now)
            .into_iter()
            .map(|item| item.id.clone())
            .collect();
        if returnable.is_empty() {
            return Err(RefundError::NothingReturnable);
        }

        debug!(order_id = %order.id, items = returnable.len(), "Refund workflow started");

        Ok(Self {
            context,
            order,
            policy,
            returnable,
            step: RefundStep::SelectItems,
            selected: Vec::new(),
            category: None,
            method: None,
            details: MethodDetails::new(),
            partial_amount: None,
            reason: None,
            custom_reason: None,
            customer_note: None,
            evidence: Vec::new(),
            outcome: None,
            failure: None,
        })
    }

    #[must_use]
    pub const fn step(&self) -> RefundStep {
        self.step
    }

    #[must_use]
    pub const fn order(&self) -> &Order {
        &self.order
    }

    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    #[must_use]
    pub const fn policy(&self) -> &RefundPolicy {
        &self.policy
    }

    /// Items that may be selected.
    #[must_use]
    pub fn returnable_items(&self) -> &[OrderItemId] {
        &self.returnable
    }

    /// Selected items, in order-item order.
    #[must_use]
    pub fn selected_items(&self) -> &[OrderItemId] {
        &self.selected
    }

    #[must_use]
    pub const fn category(&self) -> Option<RefundCategory> {
        self.category
    }

    #[must_use]
    pub const fn method(&self) -> Option<RefundMethod> {
        self.method
    }

    #[must_use]
    pub const fn method_details(&self) -> &MethodDetails {
        &self.details
    }

    #[must_use]
    pub const fn partial_amount(&self) -> Option<Decimal> {
        self.partial_amount
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }

    /// Result of the last submission, once [`RefundStep::Submitted`].
    #[must_use]
    pub const fn outcome(&self) -> Option<&SubmitOutcome> {
        self.outcome.as_ref()
    }

    /// Readable message of the last failure, once [`RefundStep::Failed`].
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn expect_step(&self, expected: RefundStep) -> Result<(), RefundError> {
        match self.step {
            step if step == expected => Ok(()),
            RefundStep::Submitting => Err(RefundError::SubmissionInFlight),
            actual => Err(RefundError::StepOutOfOrder { actual }),
        }
    }

    // Select items

    /// Add an item to the request.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::ItemNotReturnable`] for items outside their
    /// return window or not on this order.
    pub fn select_item(&mut self, id: &OrderItemId) -> Result<(), RefundError> {
        self.expect_step(RefundStep::SelectItems)?;
        if !self.returnable.contains(id) {
            return Err(RefundError::ItemNotReturnable(id.clone()));
        }
        if !self.selected.contains(id) {
            self.selected.push(id.clone());
            let order = &self.returnable;
            self.selected
                .sort_by_key(|sel| order.iter().position(|r| r == sel));
        }
        Ok(())
    }

    /// Remove an item from the request.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::StepOutOfOrder`] outside the selection step.
    pub fn deselect_item(&mut self, id: &OrderItemId) -> Result<(), RefundError> {
        self.expect_step(RefundStep::SelectItems)?;
        self.selected.retain(|sel| sel != id);
        Ok(())
    }

    /// Sum of the selected items' line totals.
    #[must_use]
    pub fn selected_subtotal(&self) -> Decimal {
        round_money(
            self.order
                .items
                .iter()
                .filter(|item| self.selected.contains(&item.id))
                .map(|item| item.line_total())
                .sum(),
        )
    }

    // Choose type

    /// Choose the refund category.
    ///
    /// A previously chosen method that the new category does not allow is
    /// dropped along with its details, and a partial amount is dropped unless
    /// the category is keep-item.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::StepOutOfOrder`] outside the type step.
    pub fn set_category(&mut self, category: RefundCategory) -> Result<(), RefundError> {
        self.expect_step(RefundStep::ChooseType)?;
        self.category = Some(category);

        if let Some(method) = self.method
            && !matrix::is_available(method, category, self.order.shipping.method)
        {
            debug!(%method, %category, "Dropping method not allowed for new category");
            self.method = None;
            self.details.clear();
        }
        if category != RefundCategory::KeepItem {
            self.partial_amount = None;
        }
        Ok(())
    }

    /// Set (or clear) the keep-item partial amount.
    ///
    /// Accepted from the type step up to review.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::PartialAmountNotApplicable`] unless the category
    /// is keep-item, and [`RefundError::AmountExceedsCap`] if the amount is
    /// above the keep-item limit. A rejected amount is not stored.
    pub fn set_partial_amount(&mut self, amount: Option<Decimal>) -> Result<(), RefundError> {
        match self.step {
            RefundStep::ChooseType
            | RefundStep::ChooseMethod
            | RefundStep::EnterMethodDetails
            | RefundStep::EnterReason
            | RefundStep::Review => {}
            RefundStep::Submitting => return Err(RefundError::SubmissionInFlight),
            actual => return Err(RefundError::StepOutOfOrder { actual }),
        }
        if self.category != Some(RefundCategory::KeepItem) {
            return Err(RefundError::PartialAmountNotApplicable);
        }
        self.policy.calculate(
            self.selected_subtotal(),
            RefundCategory::KeepItem,
            self.method,
            amount,
        )?;
        self.partial_amount = amount.map(round_money);
        Ok(())
    }

    // Choose method

    /// Methods offered for the chosen category, empty until one is chosen.
    #[must_use]
    pub fn available_methods(&self) -> Vec<RefundMethod> {
        self.category
            .map(|category| matrix::available_methods(category, self.order.shipping.method))
            .unwrap_or_default()
    }

    /// Choose the payout method.
    ///
    /// Switching method keeps only the details the new method also uses.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::MethodNotAllowed`] for a method not in
    /// [`RefundWorkflow::available_methods`].
    pub fn set_method(&mut self, method: RefundMethod) -> Result<(), RefundError> {
        self.expect_step(RefundStep::ChooseMethod)?;
        let category = self.category.ok_or(RefundError::CategoryRequired)?;
        if !matrix::is_available(method, category, self.order.shipping.method) {
            return Err(RefundError::MethodNotAllowed { method, category });
        }
        if self.method != Some(method) {
            self.details.retain_only(matrix::required_fields(method));
        }
        self.method = Some(method);
        Ok(())
    }

    // Method details

    /// Fill in one payout detail. A blank value clears it.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::UnexpectedDetail`] for a field the chosen
    /// method does not use.
    pub fn set_detail(&mut self, field: DetailField, value: &str) -> Result<(), RefundError> {
        self.expect_step(RefundStep::EnterMethodDetails)?;
        let method = self.method.ok_or(RefundError::MethodRequired)?;
        if !matrix::required_fields(method).contains(&field) {
            return Err(RefundError::UnexpectedDetail { method, field });
        }
        self.details.set(field, value);
        Ok(())
    }

    // Reason and evidence

    /// Choose a reason, normally one of [`super::REFUND_REASONS`].
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::StepOutOfOrder`] outside the reason step.
    pub fn set_reason(&mut self, reason: &str) -> Result<(), RefundError> {
        self.expect_step(RefundStep::EnterReason)?;
        self.reason = non_blank(reason);
        Ok(())
    }

    /// Explain an "Other" reason.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::StepOutOfOrder`] outside the reason step.
    pub fn set_custom_reason(&mut self, text: &str) -> Result<(), RefundError> {
        self.expect_step(RefundStep::EnterReason)?;
        self.custom_reason = non_blank(text);
        Ok(())
    }

    /// Optional note for the seller.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::StepOutOfOrder`] outside the reason step.
    pub fn set_customer_note(&mut self, note: &str) -> Result<(), RefundError> {
        self.expect_step(RefundStep::EnterReason)?;
        self.customer_note = non_blank(note);
        Ok(())
    }

    /// Attach an uploaded evidence image.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::TooManyEvidence`] past [`MAX_EVIDENCE`] images.
    pub fn add_evidence(&mut self, reference: impl Into<String>) -> Result<(), RefundError> {
        self.expect_step(RefundStep::EnterReason)?;
        if self.evidence.len() >= MAX_EVIDENCE {
            return Err(RefundError::TooManyEvidence { max: MAX_EVIDENCE });
        }
        self.evidence.push(reference.into());
        Ok(())
    }

    /// Detach an evidence image by position. Out-of-range positions are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::StepOutOfOrder`] outside the reason step.
    pub fn remove_evidence(&mut self, index: usize) -> Result<(), RefundError> {
        self.expect_step(RefundStep::EnterReason)?;
        if index < self.evidence.len() {
            self.evidence.remove(index);
        }
        Ok(())
    }

    // Navigation

    /// Check the current step and move to the next one.
    ///
    /// # Errors
    ///
    /// Returns the current step's guard failure, or
    /// [`RefundError::StepOutOfOrder`] from review onwards (use
    /// [`RefundWorkflow::begin_submission`] to leave review).
    pub fn advance(&mut self) -> Result<RefundStep, RefundError> {
        if self.step == RefundStep::Submitting {
            return Err(RefundError::SubmissionInFlight);
        }
        let next = self
            .step
            .following()
            .ok_or(RefundError::StepOutOfOrder { actual: self.step })?;
        self.check_step(self.step)?;
        self.step = next;
        Ok(next)
    }

    /// Go back one step. Entered data is kept.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::SubmissionInFlight`] while submitting and
    /// [`RefundError::StepOutOfOrder`] on the first step or once submitted.
    pub fn back(&mut self) -> Result<RefundStep, RefundError> {
        if self.step == RefundStep::Submitting {
            return Err(RefundError::SubmissionInFlight);
        }
        let previous = self
            .step
            .preceding()
            .ok_or(RefundError::StepOutOfOrder { actual: self.step })?;
        self.failure = None;
        self.step = previous;
        Ok(previous)
    }

    fn check_step(&self, step: RefundStep) -> Result<(), RefundError> {
        match step {
            RefundStep::SelectItems => {
                if self.selected.is_empty() {
                    return Err(RefundError::NoItemsSelected);
                }
            }
            RefundStep::ChooseType => {
                let category = self.category.ok_or(RefundError::CategoryRequired)?;
                self.policy.calculate(
                    self.selected_subtotal(),
                    category,
                    self.method,
                    self.partial_amount,
                )?;
            }
            RefundStep::ChooseMethod => {
                let category = self.category.ok_or(RefundError::CategoryRequired)?;
                let method = self.method.ok_or(RefundError::MethodRequired)?;
                if !matrix::is_available(method, category, self.order.shipping.method) {
                    return Err(RefundError::MethodNotAllowed { method, category });
                }
            }
            RefundStep::EnterMethodDetails => {
                let method = self.method.ok_or(RefundError::MethodRequired)?;
                let missing = self.details.missing(matrix::required_fields(method));
                if !missing.is_empty() {
                    return Err(RefundError::IncompleteMethodDetails { method, missing });
                }
            }
            RefundStep::EnterReason => {
                self.effective_reason()?;
            }
            RefundStep::Review
            | RefundStep::Submitting
            | RefundStep::Submitted
            | RefundStep::Failed => {}
        }
        Ok(())
    }

    fn effective_reason(&self) -> Result<String, RefundError> {
        let reason = self.reason.as_deref().ok_or(RefundError::ReasonRequired)?;
        if reason.eq_ignore_ascii_case(OTHER_REASON) {
            return self
                .custom_reason
                .clone()
                .ok_or(RefundError::CustomReasonRequired);
        }
        Ok(reason.to_owned())
    }

    // Amounts and submission

    /// Current amount breakdown.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::CategoryRequired`] before a category is chosen,
    /// or [`RefundError::AmountExceedsCap`].
    pub fn breakdown(&self) -> Result<RefundBreakdown, RefundError> {
        let category = self.category.ok_or(RefundError::CategoryRequired)?;
        self.policy.calculate(
            self.selected_subtotal(),
            category,
            self.method,
            self.partial_amount,
        )
    }

    /// Re-check every guard, build the payload and enter
    /// [`RefundStep::Submitting`].
    ///
    /// Only callable from review; while the returned submission is in flight
    /// every mutating call fails with [`RefundError::SubmissionInFlight`].
    ///
    /// # Errors
    ///
    /// Returns the first failing guard. No payload is produced in that case.
    pub fn begin_submission(&mut self) -> Result<RefundSubmission, RefundError> {
        self.expect_step(RefundStep::Review)?;
        for step in [
            RefundStep::SelectItems,
            RefundStep::ChooseType,
            RefundStep::ChooseMethod,
            RefundStep::EnterMethodDetails,
            RefundStep::EnterReason,
        ] {
            self.check_step(step)?;
        }

        let category = self.category.ok_or(RefundError::CategoryRequired)?;
        let method = self.method.ok_or(RefundError::MethodRequired)?;
        let breakdown = self.breakdown()?;

        let submission = RefundSubmission {
            order_id: self.order.id.clone(),
            customer_id: self.context.user_id.clone(),
            selected_items: self.selected.clone(),
            refund_category: category,
            preferred_refund_method: method,
            requested_refund_amount: breakdown.requested_refund_amount,
            refund_fee: breakdown.refund_fee,
            total_refund_amount: breakdown.total_refund_amount,
            reason: self.effective_reason()?,
            customer_note: self.customer_note.clone(),
            method_details: self.details.clone(),
            evidence: self.evidence.clone(),
        };

        self.failure = None;
        self.step = RefundStep::Submitting;
        Ok(submission)
    }

    /// Record the gateway's answer to the in-flight submission.
    ///
    /// A conflict counts as submitted: the order already has a request and
    /// the caller should open it. So does a request created without a known
    /// ID, which must not be retried. Every other failure moves to
    /// [`RefundStep::Failed`], from which [`RefundWorkflow::retry`] returns to
    /// review.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::StepOutOfOrder`] if nothing is in flight.
    pub fn record_outcome(
        &mut self,
        result: Result<RefundId, SubmitError>,
    ) -> Result<RefundStep, RefundError> {
        if self.step != RefundStep::Submitting {
            return Err(RefundError::StepOutOfOrder { actual: self.step });
        }

        match result {
            Ok(refund_id) => {
                info!(order_id = %self.order.id, %refund_id, "Refund request created");
                self.outcome = Some(SubmitOutcome::Created(refund_id));
                self.step = RefundStep::Submitted;
            }
            Err(SubmitError::Conflict { refund_id }) => {
                info!(order_id = %self.order.id, %refund_id, "Refund request already exists");
                self.outcome = Some(SubmitOutcome::AlreadyExists(refund_id));
                self.step = RefundStep::Submitted;
            }
            Err(SubmitError::CreatedWithoutId(message)) => {
                warn!(order_id = %self.order.id, %message, "Refund request created without an ID");
                self.outcome = Some(SubmitOutcome::CreatedUnconfirmed);
                self.step = RefundStep::Submitted;
            }
            Err(err) => {
                warn!(order_id = %self.order.id, error = %err, "Refund submission failed");
                self.failure = Some(err.to_string());
                self.step = RefundStep::Failed;
            }
        }
        Ok(self.step)
    }

    /// Return to review after a failure so the buyer can submit again.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::StepOutOfOrder`] unless the workflow failed.
    pub fn retry(&mut self) -> Result<RefundStep, RefundError> {
        self.expect_step(RefundStep::Failed)?;
        self.failure = None;
        self.step = RefundStep::Review;
        Ok(self.step)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::order::tests::{dec, item, order};
    use crate::types::{DeliveryMethod, ItemStatus, OrderStatus};

    fn now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn buyer() -> SessionContext {
        SessionContext {
            user_id: UserId::new("u-1"),
            role: Role::Customer,
        }
    }

    fn returnable(id: &str, price: &str) -> crate::order::OrderItem {
        let mut it = item(id, price, 1, ItemStatus::Delivered);
        it.return_deadline = Some(now() + Duration::days(7));
        it
    }

    /// Two returnable items worth 1000.00 together, plus one expired item.
    fn completed_order() -> Order {
        let mut expired = item("c", "99", 1, ItemStatus::Delivered);
        expired.return_deadline = Some(now() - Duration::days(1));
        order(
            OrderStatus::Completed,
            vec![returnable("a", "600.00"), returnable("b", "400.00"), expired],
        )
    }

    fn workflow() -> RefundWorkflow {
        RefundWorkflow::start(completed_order(), buyer(), now(), RefundPolicy::default()).unwrap()
    }

    fn id(s: &str) -> OrderItemId {
        OrderItemId::new(s)
    }

    /// Drive a workflow to review as keep-item / bank.
    fn at_review() -> RefundWorkflow {
        let mut wf = workflow();
        wf.select_item(&id("a")).unwrap();
        wf.select_item(&id("b")).unwrap();
        wf.advance().unwrap();
        wf.set_category(RefundCategory::KeepItem).unwrap();
        wf.advance().unwrap();
        wf.set_method(RefundMethod::Bank).unwrap();
        wf.advance().unwrap();
        wf.set_detail(DetailField::BankName, "BDO").unwrap();
        wf.set_detail(DetailField::AccountName, "Juan Dela Cruz").unwrap();
        wf.set_detail(DetailField::AccountNumber, "001234567890").unwrap();
        wf.set_detail(DetailField::AccountType, "Savings").unwrap();
        wf.advance().unwrap();
        wf.set_reason("Damaged item").unwrap();
        assert_eq!(wf.advance().unwrap(), RefundStep::Review);
        wf
    }

    #[test]
    fn test_only_buyers_can_start() {
        let seller = SessionContext {
            user_id: UserId::new("s-1"),
            role: Role::Seller,
        };
        let err = RefundWorkflow::start(completed_order(), seller, now(), RefundPolicy::default())
            .unwrap_err();
        assert_eq!(err, RefundError::NotPermitted(Role::Seller));
    }

    #[test]
    fn test_start_requires_returnable_item() {
        let o = order(OrderStatus::ToReceive, vec![returnable("a", "10")]);
        let err = RefundWorkflow::start(o, buyer(), now(), RefundPolicy::default()).unwrap_err();
        assert_eq!(err, RefundError::NothingReturnable);
    }

    #[test]
    fn test_select_items_guard() {
        let mut wf = workflow();
        assert_eq!(wf.returnable_items(), &[id("a"), id("b")]);
        assert_eq!(wf.advance().unwrap_err(), RefundError::NoItemsSelected);

        assert_eq!(
            wf.select_item(&id("c")).unwrap_err(),
            RefundError::ItemNotReturnable(id("c"))
        );
        wf.select_item(&id("b")).unwrap();
        wf.select_item(&id("a")).unwrap();
        wf.select_item(&id("a")).unwrap();
        assert_eq!(wf.selected_items(), &[id("a"), id("b")]);
        assert_eq!(wf.selected_subtotal(), dec("1000.00"));

        wf.deselect_item(&id("a")).unwrap();
        assert_eq!(wf.selected_subtotal(), dec("400.00"));
        assert_eq!(wf.advance().unwrap(), RefundStep::ChooseType);
    }

    #[test]
    fn test_setters_are_bound_to_their_step() {
        let mut wf = workflow();
        assert_eq!(
            wf.set_category(RefundCategory::ReturnItem).unwrap_err(),
            RefundError::StepOutOfOrder {
                actual: RefundStep::SelectItems
            }
        );
        wf.select_item(&id("a")).unwrap();
        wf.advance().unwrap();
        assert!(wf.select_item(&id("b")).is_err());
        assert!(wf.set_method(RefundMethod::Wallet).is_err());
    }

    #[test]
    fn test_type_guard_and_method_filtering() {
        let mut wf = workflow();
        wf.select_item(&id("a")).unwrap();
        wf.advance().unwrap();
        assert!(wf.available_methods().is_empty());
        assert_eq!(wf.advance().unwrap_err(), RefundError::CategoryRequired);

        wf.set_category(RefundCategory::Replacement).unwrap();
        assert_eq!(wf.available_methods(), vec![RefundMethod::Replace]);
        wf.advance().unwrap();

        assert_eq!(
            wf.set_method(RefundMethod::Wallet).unwrap_err(),
            RefundError::MethodNotAllowed {
                method: RefundMethod::Wallet,
                category: RefundCategory::Replacement
            }
        );
        assert_eq!(wf.advance().unwrap_err(), RefundError::MethodRequired);
        wf.set_method(RefundMethod::Replace).unwrap();
        assert_eq!(wf.advance().unwrap(), RefundStep::EnterMethodDetails);
    }

    #[test]
    fn test_category_change_drops_incompatible_method() {
        let mut wf = workflow();
        wf.select_item(&id("a")).unwrap();
        wf.advance().unwrap();
        wf.set_category(RefundCategory::ReturnItem).unwrap();
        wf.advance().unwrap();
        wf.set_method(RefundMethod::Wallet).unwrap();
        wf.advance().unwrap();
        wf.set_detail(DetailField::Provider, "GCash").unwrap();

        wf.back().unwrap();
        wf.back().unwrap();
        assert_eq!(wf.step(), RefundStep::ChooseType);

        wf.set_category(RefundCategory::KeepItem).unwrap();
        assert_eq!(wf.method(), Some(RefundMethod::Wallet));
        assert_eq!(wf.method_details().get(DetailField::Provider), Some("GCash"));

        wf.set_category(RefundCategory::Replacement).unwrap();
        assert_eq!(wf.method(), None);
        assert!(wf.method_details().is_empty());
    }

    #[test]
    fn test_cash_on_hand_only_for_pickup() {
        let mut wf = workflow();
        wf.select_item(&id("a")).unwrap();
        wf.advance().unwrap();
        wf.set_category(RefundCategory::ReturnItem).unwrap();
        assert!(!wf.available_methods().contains(&RefundMethod::CashOnHand));

        let mut pickup = completed_order();
        pickup.shipping.method = DeliveryMethod::Pickup;
        let mut wf = RefundWorkflow::start(pickup, buyer(), now(), RefundPolicy::default()).unwrap();
        wf.select_item(&id("a")).unwrap();
        wf.advance().unwrap();
        wf.set_category(RefundCategory::ReturnItem).unwrap();
        wf.advance().unwrap();
        wf.set_method(RefundMethod::CashOnHand).unwrap();
        wf.advance().unwrap();
        assert_eq!(wf.advance().unwrap(), RefundStep::EnterReason);
    }

    #[test]
    fn test_incomplete_method_details() {
        let mut wf = workflow();
        wf.select_item(&id("a")).unwrap();
        wf.advance().unwrap();
        wf.set_category(RefundCategory::ReturnItem).unwrap();
        wf.advance().unwrap();
        wf.set_method(RefundMethod::Remittance).unwrap();
        wf.advance().unwrap();
        wf.set_detail(DetailField::Provider, "Palawan Express").unwrap();
        wf.set_detail(DetailField::FirstName, "Juan").unwrap();
        wf.set_detail(DetailField::ContactNumber, "  ").unwrap();

        assert_eq!(
            wf.set_detail(DetailField::BankName, "BDO").unwrap_err(),
            RefundError::UnexpectedDetail {
                method: RefundMethod::Remittance,
                field: DetailField::BankName
            }
        );
        assert_eq!(
            wf.advance().unwrap_err(),
            RefundError::IncompleteMethodDetails {
                method: RefundMethod::Remittance,
                missing: vec![
                    DetailField::LastName,
                    DetailField::ContactNumber,
                    DetailField::ValidIdType,
                    DetailField::ValidIdNumber,
                ],
            }
        );
        assert_eq!(wf.step(), RefundStep::EnterMethodDetails);
    }

    #[test]
    fn test_reason_guard() {
        let mut wf = at_review();
        wf.back().unwrap();
        wf.set_reason("").unwrap();
        assert_eq!(wf.advance().unwrap_err(), RefundError::ReasonRequired);

        wf.set_reason(OTHER_REASON).unwrap();
        assert_eq!(wf.advance().unwrap_err(), RefundError::CustomReasonRequired);
        wf.set_custom_reason("Arrived two weeks late").unwrap();
        assert_eq!(wf.advance().unwrap(), RefundStep::Review);

        let submission = wf.begin_submission().unwrap();
        assert_eq!(submission.reason, "Arrived two weeks late");
    }

    #[test]
    fn test_evidence_limit() {
        let mut wf = at_review();
        wf.back().unwrap();
        for i in 0..MAX_EVIDENCE {
            wf.add_evidence(format!("evidence/{i}.jpg")).unwrap();
        }
        assert_eq!(
            wf.add_evidence("evidence/extra.jpg").unwrap_err(),
            RefundError::TooManyEvidence { max: 4 }
        );
        wf.remove_evidence(0).unwrap();
        wf.remove_evidence(99).unwrap();
        assert_eq!(wf.evidence().len(), 3);
        wf.add_evidence("evidence/extra.jpg").unwrap();
    }

    #[test]
    fn test_keep_item_default_breakdown() {
        let wf = at_review();
        let breakdown = wf.breakdown().unwrap();
        assert_eq!(breakdown.selected_subtotal, dec("1000.00"));
        assert_eq!(breakdown.requested_refund_amount, dec("700.00"));
        assert_eq!(breakdown.refund_fee, dec("50.00"));
        assert_eq!(breakdown.total_refund_amount, dec("650.00"));
    }

    #[test]
    fn test_partial_amount_above_cap_is_rejected_locally() {
        let mut wf = at_review();
        assert_eq!(
            wf.set_partial_amount(Some(dec("700.01"))).unwrap_err(),
            RefundError::AmountExceedsCap {
                requested: dec("700.01"),
                cap: dec("700.00")
            }
        );
        assert_eq!(wf.partial_amount(), None);

        wf.set_partial_amount(Some(dec("500"))).unwrap();
        assert_eq!(wf.breakdown().unwrap().total_refund_amount, dec("450.00"));
    }

    #[test]
    fn test_partial_amount_needs_keep_item() {
        let mut wf = workflow();
        wf.select_item(&id("a")).unwrap();
        wf.advance().unwrap();
        wf.set_category(RefundCategory::ReturnItem).unwrap();
        assert_eq!(
            wf.set_partial_amount(Some(dec("10"))).unwrap_err(),
            RefundError::PartialAmountNotApplicable
        );
    }

    #[test]
    fn test_submission_payload_matches_breakdown() {
        let mut wf = at_review();
        let breakdown = wf.breakdown().unwrap();
        let submission = wf.begin_submission().unwrap();

        assert_eq!(wf.step(), RefundStep::Submitting);
        assert_eq!(submission.selected_items, vec![id("a"), id("b")]);
        assert_eq!(submission.refund_category, RefundCategory::KeepItem);
        assert_eq!(submission.preferred_refund_method, RefundMethod::Bank);
        assert_eq!(submission.requested_refund_amount, breakdown.requested_refund_amount);
        assert_eq!(submission.refund_fee, breakdown.refund_fee);
        assert_eq!(submission.total_refund_amount, breakdown.total_refund_amount);
        assert_eq!(submission.customer_id, UserId::new("u-1"));
        assert_eq!(
            submission.method_details.get(DetailField::AccountType),
            Some("Savings")
        );
    }

    #[test]
    fn test_no_double_submit() {
        let mut wf = at_review();
        wf.begin_submission().unwrap();
        assert_eq!(
            wf.begin_submission().unwrap_err(),
            RefundError::SubmissionInFlight
        );
        assert_eq!(wf.back().unwrap_err(), RefundError::SubmissionInFlight);
        assert_eq!(
            wf.set_partial_amount(None).unwrap_err(),
            RefundError::SubmissionInFlight
        );
    }

    #[test]
    fn test_success_surfaces_refund_id() {
        let mut wf = at_review();
        wf.begin_submission().unwrap();
        let step = wf.record_outcome(Ok(RefundId::new("R-42"))).unwrap();
        assert_eq!(step, RefundStep::Submitted);
        assert_eq!(
            wf.outcome(),
            Some(&SubmitOutcome::Created(RefundId::new("R-42")))
        );
        assert!(wf.begin_submission().is_err());
    }

    #[test]
    fn test_conflict_surfaces_existing_request() {
        let mut wf = at_review();
        wf.begin_submission().unwrap();
        let step = wf
            .record_outcome(Err(SubmitError::Conflict {
                refund_id: RefundId::new("R-7"),
            }))
            .unwrap();
        assert_eq!(step, RefundStep::Submitted);
        assert_eq!(
            wf.outcome(),
            Some(&SubmitOutcome::AlreadyExists(RefundId::new("R-7")))
        );
        assert_eq!(wf.failure_message(), None);
    }

    #[test]
    fn test_created_without_id_is_not_retryable() {
        let mut wf = at_review();
        wf.begin_submission().unwrap();
        let step = wf
            .record_outcome(Err(SubmitError::CreatedWithoutId("empty body".to_string())))
            .unwrap();
        assert_eq!(step, RefundStep::Submitted);
        assert_eq!(wf.outcome(), Some(&SubmitOutcome::CreatedUnconfirmed));
        assert!(wf.retry().is_err());
    }

    #[test]
    fn test_timeout_fails_and_can_retry() {
        let mut wf = at_review();
        wf.begin_submission().unwrap();
        assert_eq!(
            wf.record_outcome(Err(SubmitError::Timeout)).unwrap(),
            RefundStep::Failed
        );
        assert_eq!(wf.failure_message(), Some("refund submission timed out"));
        assert!(wf.outcome().is_none());

        assert_eq!(wf.retry().unwrap(), RefundStep::Review);
        assert!(wf.failure_message().is_none());
        wf.begin_submission().unwrap();
        wf.record_outcome(Ok(RefundId::new("R-1"))).unwrap();
        assert_eq!(wf.step(), RefundStep::Submitted);
    }

    #[test]
    fn test_record_outcome_requires_submission() {
        let mut wf = at_review();
        assert!(wf.record_outcome(Ok(RefundId::new("R-1"))).is_err());
    }

    #[test]
    fn test_back_navigation_keeps_data() {
        let mut wf = at_review();
        for expected in [
            RefundStep::EnterReason,
            RefundStep::EnterMethodDetails,
            RefundStep::ChooseMethod,
            RefundStep::ChooseType,
            RefundStep::SelectItems,
        ] {
            assert_eq!(wf.back().unwrap(), expected);
        }
        assert!(wf.back().is_err());
        assert_eq!(wf.selected_items().len(), 2);
        assert_eq!(wf.category(), Some(RefundCategory::KeepItem));
        assert_eq!(wf.reason(), Some("Damaged item"));
    }
}
