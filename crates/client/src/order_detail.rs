//! Order detail loading with endpoint fallback.
//!
//! The newer `shipping-timeline` endpoint is tried first. Any failure there
//! (transport error, non-2xx, or a body that does not fit the shape) falls
//! back to the legacy `view-order` endpoint. Only when both fail does the
//! caller see an error, carrying the last failure's message.

use std::future::Future;

use marketlane_core::timeline::{self, NormalizeError, OrderTimelineView, ResponseShape, view_order};
use marketlane_core::{Order, OrderId};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{ApiError, OrderFetchError};

/// Something that can fetch a raw order-detail body in a given shape.
pub trait OrderDetailSource {
    /// Fetch the body served by the endpoint for `shape`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or a non-2xx response.
    fn fetch_order_detail(
        &self,
        shape: ResponseShape,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// Load the canonical timeline view of an order.
///
/// # Errors
///
/// Returns `OrderFetchError::Unavailable` when both endpoints fail, or
/// `OrderFetchError::UnknownStatus` when an endpoint answered with a status
/// this client does not know (the other endpoint would report the same).
#[instrument(skip(source), fields(order_id = %order_id))]
pub async fn load_order_timeline<S>(
    source: &S,
    order_id: &OrderId,
) -> Result<OrderTimelineView, OrderFetchError>
where
    S: OrderDetailSource + Sync,
{
    let mut last_error = String::from("no endpoint attempted");

    for shape in ResponseShape::PREFERENCE {
        let body = match source.fetch_order_detail(shape, order_id).await {
            Ok(body) => body,
            Err(e) => {
                warn!(endpoint = %shape, error = %e, "Order detail fetch failed");
                last_error = e.to_string();
                continue;
            }
        };

        match timeline::normalize_as(shape, &body) {
            Ok(view) => {
                debug!(endpoint = %shape, events = view.timeline.len(), "Order detail loaded");
                return Ok(view);
            }
            Err(NormalizeError::UnknownStatus(e)) => return Err(e.into()),
            Err(e) => {
                warn!(endpoint = %shape, error = %e, "Order detail did not match shape");
                last_error = e.to_string();
            }
        }
    }

    Err(OrderFetchError::Unavailable {
        order_id: order_id.clone(),
        message: last_error,
    })
}

/// Load the full order model, for running the action gate.
///
/// Only the legacy shape carries every field of [`Order`].
///
/// # Errors
///
/// Returns `OrderFetchError` if the fetch or parse fails.
#[instrument(skip(source), fields(order_id = %order_id))]
pub async fn fetch_order<S>(source: &S, order_id: &OrderId) -> Result<Order, OrderFetchError>
where
    S: OrderDetailSource + Sync,
{
    let unavailable = |message: String| OrderFetchError::Unavailable {
        order_id: order_id.clone(),
        message,
    };

    let body = source
        .fetch_order_detail(ResponseShape::ViewOrder, order_id)
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    view_order::parse_order(&body).map_err(|e| match e {
        NormalizeError::UnknownStatus(e) => OrderFetchError::UnknownStatus(e),
        other => unavailable(other.to_string()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use marketlane_core::OrderStatus;
    use serde_json::json;

    use super::*;

    /// Canned responses per endpoint; records which endpoints were hit.
    struct FakeSource {
        responses: HashMap<ResponseShape, Result<Value, (u16, String)>>,
        calls: Mutex<Vec<ResponseShape>>,
    }

    impl FakeSource {
        fn new(
            shipping_timeline: Result<Value, (u16, String)>,
            view_order: Result<Value, (u16, String)>,
        ) -> Self {
            Self {
                responses: HashMap::from([
                    (ResponseShape::ShippingTimeline, shipping_timeline),
                    (ResponseShape::ViewOrder, view_order),
                ]),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<ResponseShape> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl OrderDetailSource for FakeSource {
        async fn fetch_order_detail(
            &self,
            shape: ResponseShape,
            _order_id: &OrderId,
        ) -> Result<Value, ApiError> {
            self.calls.lock().unwrap().push(shape);
            match &self.responses[&shape] {
                Ok(body) => Ok(body.clone()),
                Err((status, message)) => Err(ApiError::Api {
                    status: *status,
                    message: message.clone(),
                }),
            }
        }
    }

    fn new_shape() -> Value {
        json!({
            "order": {"id": "1001", "status": "to_ship"},
            "tracking": {"tracking_number": "JT0001"},
            "timeline": [{"key": "placed", "status": "completed"}]
        })
    }

    fn legacy_shape() -> Value {
        json!({
            "order": {"id": "1001", "status": "to_ship", "total_amount": "100.00"},
            "items": [{"id": "a", "name": "Rattan Lamp", "quantity": 1, "price": "100.00"}],
            "timeline": [{"event": "placed", "status": "completed"}]
        })
    }

    fn server_error() -> Result<Value, (u16, String)> {
        Err((502, "bad gateway".to_string()))
    }

    #[tokio::test]
    async fn test_prefers_new_endpoint() {
        let source = FakeSource::new(Ok(new_shape()), Ok(legacy_shape()));
        let view = load_order_timeline(&source, &OrderId::new("1001")).await.unwrap();
        assert_eq!(view.source, ResponseShape::ShippingTimeline);
        assert_eq!(source.calls(), vec![ResponseShape::ShippingTimeline]);
    }

    #[tokio::test]
    async fn test_falls_back_on_non_2xx() {
        let source = FakeSource::new(server_error(), Ok(legacy_shape()));
        let view = load_order_timeline(&source, &OrderId::new("1001")).await.unwrap();
        assert_eq!(view.source, ResponseShape::ViewOrder);
        assert_eq!(view.order.status, OrderStatus::ToShip);
        assert_eq!(
            source.calls(),
            vec![ResponseShape::ShippingTimeline, ResponseShape::ViewOrder]
        );
    }

    #[tokio::test]
    async fn test_falls_back_on_shape_mismatch() {
        let source = FakeSource::new(Ok(json!({"detail": "moved"})), Ok(legacy_shape()));
        let view = load_order_timeline(&source, &OrderId::new("1001")).await.unwrap();
        assert_eq!(view.source, ResponseShape::ViewOrder);
    }

    #[tokio::test]
    async fn test_both_failing_reports_last_error() {
        let source = FakeSource::new(server_error(), Err((404, "order not found".to_string())));
        let err = load_order_timeline(&source, &OrderId::new("1001"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not load order 1001: API error: 404 - order not found"
        );
    }

    #[tokio::test]
    async fn test_unknown_status_does_not_fall_back() {
        let mut body = new_shape();
        body["order"]["status"] = json!("teleported");
        let source = FakeSource::new(Ok(body), Ok(legacy_shape()));
        let err = load_order_timeline(&source, &OrderId::new("1001"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderFetchError::UnknownStatus(e) if e.raw == "teleported"));
        assert_eq!(source.calls(), vec![ResponseShape::ShippingTimeline]);
    }

    #[tokio::test]
    async fn test_fetch_order_uses_legacy_shape() {
        let source = FakeSource::new(server_error(), Ok(legacy_shape()));
        let order = fetch_order(&source, &OrderId::new("1001")).await.unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(source.calls(), vec![ResponseShape::ViewOrder]);
    }
}
