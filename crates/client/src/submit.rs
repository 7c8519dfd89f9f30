//! Driving a refund workflow through submission.

use std::time::Duration;

use marketlane_core::refund::{RefundGateway, RefundWorkflow, SubmitError, SubmitOutcome};
use tracing::{info, instrument, warn};

use crate::error::SubmitWorkflowError;

/// Submit the workflow's request through `gateway`.
///
/// The workflow must be at review. Local validation runs first and nothing is
/// sent if it fails. While the call is in flight the workflow refuses a second
/// submission. A call that does not finish within `timeout` counts as failed,
/// never as submitted; the buyer retries by calling
/// [`RefundWorkflow::retry`] and submitting again. Nothing is retried here.
///
/// A conflict resolves to [`SubmitOutcome::AlreadyExists`] so the caller can
/// open the existing request. A request the server created without returning
/// its ID resolves to [`SubmitOutcome::CreatedUnconfirmed`].
///
/// # Errors
///
/// Returns `SubmitWorkflowError::Invalid` if validation fails and
/// `SubmitWorkflowError::Failed` if the request was not created.
#[instrument(skip(workflow, gateway), fields(order_id = %workflow.order().id))]
pub async fn submit_workflow<G>(
    workflow: &mut RefundWorkflow,
    gateway: &G,
    timeout: Duration,
) -> Result<SubmitOutcome, SubmitWorkflowError>
where
    G: RefundGateway + Sync,
{
    let submission = workflow.begin_submission()?;

    let result = tokio::time::timeout(timeout, gateway.submit_refund(&submission))
        .await
        .unwrap_or_else(|_| {
            warn!(?timeout, "Refund submission timed out");
            Err(SubmitError::Timeout)
        });

    let failure = match &result {
        Err(err) if !err.request_created() => Some(err.clone()),
        Ok(_) | Err(_) => None,
    };

    workflow.record_outcome(result)?;

    if let Some(err) = failure {
        return Err(SubmitWorkflowError::Failed(err));
    }
    let outcome = workflow
        .outcome()
        .cloned()
        .ok_or_else(|| {
            SubmitWorkflowError::Failed(SubmitError::Network(
                "submission finished without an outcome".to_string(),
            ))
        })?;
    info!(refund_id = ?outcome.refund_id(), "Refund submission finished");
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use marketlane_core::refund::{
        DetailField, RefundCategory, RefundMethod, RefundPolicy, RefundStep, SessionContext,
    };
    use marketlane_core::{
        ItemStatus, Order, OrderItem, OrderItemId, OrderStatus, RefundError, RefundId, Role,
        UserId, order::Payment, order::Shipping,
    };
    use rust_decimal::Decimal;

    use super::*;

    enum Reply {
        Created(&'static str),
        Conflict(&'static str),
        ServerError,
        CreatedWithoutId,
        Hang,
    }

    struct FakeGateway {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl FakeGateway {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RefundGateway for FakeGateway {
        async fn submit_refund(
            &self,
            _submission: &marketlane_core::RefundSubmission,
        ) -> Result<RefundId, SubmitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Created(id) => Ok(RefundId::new(id)),
                Reply::Conflict(id) => Err(SubmitError::Conflict {
                    refund_id: RefundId::new(id),
                }),
                Reply::ServerError => Err(SubmitError::Network("API error: 503".to_string())),
                Reply::CreatedWithoutId => {
                    Err(SubmitError::CreatedWithoutId("no refund ID in response".to_string()))
                }
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn order() -> Order {
        let item = OrderItem {
            id: OrderItemId::new("a"),
            shop_id: None,
            name: "Rattan Lamp".to_string(),
            variant: None,
            image_url: None,
            quantity: 1,
            unit_price: Decimal::from(1000),
            subtotal: Decimal::from(1000),
            status: ItemStatus::Delivered,
            has_review: false,
            return_deadline: Some(now() + ChronoDuration::days(7)),
        };
        Order {
            id: "1001".into(),
            status: OrderStatus::Completed,
            subtotal: Decimal::from(1000),
            shipping_fee: Decimal::ZERO,
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            total_amount: Decimal::from(1000),
            payment: Payment::default(),
            shipping: Shipping::default(),
            items: vec![item],
            buyer_note: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn workflow_at_review() -> RefundWorkflow {
        let context = SessionContext {
            user_id: UserId::new("u-1"),
            role: Role::Customer,
        };
        let mut wf = RefundWorkflow::start(order(), context, now(), RefundPolicy::default()).unwrap();
        wf.select_item(&OrderItemId::new("a")).unwrap();
        wf.advance().unwrap();
        wf.set_category(RefundCategory::ReturnItem).unwrap();
        wf.advance().unwrap();
        wf.set_method(RefundMethod::Wallet).unwrap();
        wf.advance().unwrap();
        for (field, value) in [
            (DetailField::Provider, "GCash"),
            (DetailField::AccountName, "Juan Dela Cruz"),
            (DetailField::AccountNumber, "09171234567"),
            (DetailField::ContactNumber, "09171234567"),
        ] {
            wf.set_detail(field, value).unwrap();
        }
        wf.advance().unwrap();
        wf.set_reason("Damaged item").unwrap();
        wf.advance().unwrap();
        wf
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_created() {
        let mut wf = workflow_at_review();
        let gateway = FakeGateway::new(Reply::Created("R-100"));
        let outcome = submit_workflow(&mut wf, &gateway, TIMEOUT).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Created(RefundId::new("R-100")));
        assert_eq!(wf.step(), RefundStep::Submitted);
    }

    #[tokio::test]
    async fn test_conflict_is_not_an_error() {
        let mut wf = workflow_at_review();
        let gateway = FakeGateway::new(Reply::Conflict("R-55"));
        let outcome = submit_workflow(&mut wf, &gateway, TIMEOUT).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::AlreadyExists(RefundId::new("R-55")));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_fails_without_retry() {
        let mut wf = workflow_at_review();
        let gateway = FakeGateway::new(Reply::ServerError);
        let err = submit_workflow(&mut wf, &gateway, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, SubmitWorkflowError::Failed(SubmitError::Network(_))));
        assert_eq!(wf.step(), RefundStep::Failed);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_created_without_id_is_not_a_failure() {
        let mut wf = workflow_at_review();
        let gateway = FakeGateway::new(Reply::CreatedWithoutId);
        let outcome = submit_workflow(&mut wf, &gateway, TIMEOUT).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::CreatedUnconfirmed);
        assert_eq!(outcome.refund_id(), None);
        assert_eq!(wf.step(), RefundStep::Submitted);
        assert!(wf.retry().is_err());
    }

    #[tokio::test]
    async fn test_timeout_is_failed_and_retryable() {
        let mut wf = workflow_at_review();
        let hanging = FakeGateway::new(Reply::Hang);
        let err = submit_workflow(&mut wf, &hanging, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitWorkflowError::Failed(SubmitError::Timeout)));
        assert_eq!(wf.step(), RefundStep::Failed);

        wf.retry().unwrap();
        let gateway = FakeGateway::new(Reply::Created("R-101"));
        let outcome = submit_workflow(&mut wf, &gateway, TIMEOUT).await.unwrap();
        assert_eq!(outcome.refund_id(), Some(&RefundId::new("R-101")));
    }

    #[tokio::test]
    async fn test_invalid_workflow_never_reaches_gateway() {
        let mut wf = workflow_at_review();
        wf.back().unwrap();
        wf.set_reason("Other").unwrap();
        wf.advance().unwrap_err();
        let gateway = FakeGateway::new(Reply::Created("R-1"));

        let err = submit_workflow(&mut wf, &gateway, TIMEOUT).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitWorkflowError::Invalid(RefundError::StepOutOfOrder { .. })
        ));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }
}
