//! Integration tests for Marketlane.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marketlane-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `order_timeline` - both order-detail shapes, endpoint fallback, action gate
//! - `refund_flow` - refund workflow end to end against the fake marketplace
//!
//! No network is involved: [`FakeMarketplace`] stands in for the API behind
//! the same traits the real client implements.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use marketlane_client::{ApiError, OrderDetailSource};
use marketlane_core::refund::{RefundGateway, RefundSubmission, RefundSummary, active_refund_for};
use marketlane_core::timeline::ResponseShape;
use marketlane_core::{OrderId, RefundId, RefundStatus, SubmitError};
use serde_json::{Value, json};

/// Fixed "now" shared by the fixtures.
#[must_use]
pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Order 1001 in the legacy `view-order` shape.
///
/// Completed, two delivered items worth 1000.00 together, both inside their
/// return window; standard delivery.
#[must_use]
pub fn legacy_order_body() -> Value {
    json!({
        "order": {
            "id": 1001,
            "status": "completed",
            "subtotal": "1000.00",
            "shipping_fee": "150.00",
            "tax": "120.00",
            "discount": "50.00",
            "total_amount": "1220.00",
            "delivery_method": "standard",
            "created_at": "2026-02-01 09:15:00"
        },
        "items": [
            {
                "id": "a", "shop_id": 7, "product_name": "Rattan Lamp", "quantity": 1,
                "price": "600.00", "status": "delivered",
                "return_deadline": "2026-03-08T23:59:59+08:00"
            },
            {
                "id": "b", "shop_id": 7, "product_name": "Abaca Coaster Set", "quantity": 2,
                "price": "200.00", "status": "delivered", "has_review": true,
                "return_deadline": "2026-03-08T23:59:59+08:00"
            }
        ],
        "shipping": {"method": "standard", "carrier": "J&T Express", "tracking_number": "JT0001"},
        "delivery_address": {
            "recipient_name": "Juan Dela Cruz", "phone": "09171234567",
            "street": "12 Mabini St.", "city": "Quezon City", "province": "Metro Manila",
            "postal_code": "1100"
        },
        "payment": {"method": "GCash", "status": "paid", "amount": "1220.00"},
        "timeline": [
            {"event": "placed", "label": "Order Placed", "status": "completed", "timestamp": "2026-02-01 09:15:00"},
            {"event": "shipped", "label": "Shipped", "completed": true, "icon": "truck"},
            {"event": "delivered", "label": "Delivered", "status": "completed", "icon": "sparkles"}
        ]
    })
}

/// The same order 1001 in the newer `shipping-timeline` shape.
#[must_use]
pub fn shipping_timeline_body() -> Value {
    json!({
        "order": {"id": "1001", "status": "Completed", "created_at": "2026-02-01T09:15:00Z"},
        "tracking": {"tracking_number": "JT0001"},
        "shipping_info": {
            "carrier": {"name": "J&T Express", "code": "jnt"},
            "delivery_method": "standard",
            "delivery_address": {
                "recipient": "Juan Dela Cruz",
                "phone": "09171234567",
                "address": "12 Mabini St., Quezon City, Metro Manila, 1100"
            }
        },
        "package_contents": [
            {"name": "Rattan Lamp", "quantity": 1, "value": "600.00"},
            {"name": "Abaca Coaster Set", "quantity": 2, "value": "400.00"}
        ],
        "order_summary": {
            "subtotal": "1000.00", "shipping_fee": "150.00", "tax": "120.00",
            "discount": "50.00", "total": "1220.00"
        },
        "timeline": [
            {"key": "placed", "title": "Order Placed", "status": "completed", "date": "2026-02-01T09:15:00Z"},
            {"key": "shipped", "title": "Shipped", "status": "completed"},
            {"key": "delivered", "title": "Delivered", "completed": true}
        ]
    })
}

/// In-memory marketplace API.
///
/// Serves canned order-detail bodies per shape and keeps refund requests,
/// answering a second request on an order with an active one with a
/// conflict, the way the real API does.
#[derive(Default)]
pub struct FakeMarketplace {
    bodies: HashMap<(OrderId, ResponseShape), Value>,
    failing: HashSet<ResponseShape>,
    refunds: Mutex<Vec<RefundSummary>>,
    submissions: Mutex<Vec<RefundSubmission>>,
    detail_calls: Mutex<Vec<ResponseShape>>,
    next_refund: AtomicU64,
}

impl FakeMarketplace {
    /// Marketplace serving order 1001 in both shapes.
    #[must_use]
    pub fn with_order_1001() -> Self {
        Self::default()
            .with_body(
                OrderId::new("1001"),
                ResponseShape::ShippingTimeline,
                shipping_timeline_body(),
            )
            .with_body(OrderId::new("1001"), ResponseShape::ViewOrder, legacy_order_body())
    }

    #[must_use]
    pub fn with_body(mut self, order_id: OrderId, shape: ResponseShape, body: Value) -> Self {
        self.bodies.insert((order_id, shape), body);
        self
    }

    /// Make the endpoint for `shape` answer 503.
    #[must_use]
    pub fn failing(mut self, shape: ResponseShape) -> Self {
        self.failing.insert(shape);
        self
    }

    /// Submissions received so far.
    #[must_use]
    pub fn submissions(&self) -> Vec<RefundSubmission> {
        lock(&self.submissions).clone()
    }

    /// Refund listing as my-refunds would return it.
    #[must_use]
    pub fn refunds(&self) -> Vec<RefundSummary> {
        lock(&self.refunds).clone()
    }

    /// Order-detail endpoints hit so far, in order.
    #[must_use]
    pub fn detail_calls(&self) -> Vec<ResponseShape> {
        lock(&self.detail_calls).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OrderDetailSource for FakeMarketplace {
    async fn fetch_order_detail(
        &self,
        shape: ResponseShape,
        order_id: &OrderId,
    ) -> Result<Value, ApiError> {
        lock(&self.detail_calls).push(shape);
        if self.failing.contains(&shape) {
            return Err(ApiError::Api {
                status: 503,
                message: format!("{shape} unavailable"),
            });
        }
        self.bodies
            .get(&(order_id.clone(), shape))
            .cloned()
            .ok_or_else(|| ApiError::Api {
                status: 404,
                message: format!("order {order_id} not found"),
            })
    }
}

impl RefundGateway for FakeMarketplace {
    async fn submit_refund(&self, submission: &RefundSubmission) -> Result<RefundId, SubmitError> {
        let mut refunds = lock(&self.refunds);
        if let Some(existing) = active_refund_for(&refunds, &submission.order_id) {
            return Err(SubmitError::Conflict {
                refund_id: existing.refund_id.clone(),
            });
        }

        let refund_id = RefundId::new(format!(
            "R-{}",
            self.next_refund.fetch_add(1, Ordering::SeqCst) + 1
        ));
        refunds.push(RefundSummary {
            refund_id: refund_id.clone(),
            order_id: submission.order_id.clone(),
            status: RefundStatus::Pending,
            refund_category: Some(submission.refund_category),
            preferred_refund_method: Some(submission.preferred_refund_method),
            total_refund_amount: Some(submission.total_refund_amount),
            created_at: Some(now()),
        });
        lock(&self.submissions).push(submission.clone());
        Ok(refund_id)
    }
}
