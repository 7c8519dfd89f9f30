//! Canonical order timeline view and the adapters that produce it.
//!
//! The marketplace API serves order detail in two shapes:
//!
//! - **view-order** (legacy): flat `order`, `items`, `shipping`,
//!   `delivery_address`, `payment` and `timeline` objects.
//! - **shipping-timeline**: nested `tracking`, `shipping_info.carrier`,
//!   `package_contents` and a server-computed `order_summary`.
//!
//! Each shape has its own adapter module; both converge on
//! [`OrderTimelineView`]. Display strings for the status always come from the
//! local status table, never from the response, so the two shapes render the
//! same order identically.

pub mod shipping_timeline;
pub mod view_order;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{OrderId, OrderStatus, UnknownStatusError, amounts_match, non_negative};

/// The two order-detail response shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseShape {
    /// Newer `shipping-timeline` endpoint.
    ShippingTimeline,
    /// Legacy `view-order` endpoint.
    ViewOrder,
}

impl ResponseShape {
    /// Endpoint preference order: newest first.
    pub const PREFERENCE: [Self; 2] = [Self::ShippingTimeline, Self::ViewOrder];

    /// Endpoint name as used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShippingTimeline => "shipping-timeline",
            Self::ViewOrder => "view-order",
        }
    }

    /// Guess the shape of a response body.
    ///
    /// An explicit `version` (or `api_version`) field wins; otherwise the
    /// presence of shape-specific keys decides.
    #[must_use]
    pub fn detect(body: &Value) -> Option<Self> {
        let body = unwrap_envelope(body);
        let obj = body.as_object()?;

        let explicit = obj
            .get("version")
            .or_else(|| obj.get("api_version"))
            .and_then(Value::as_str);
        if let Some(version) = explicit {
            match version.trim().to_ascii_lowercase().as_str() {
                "shipping-timeline" | "shipping_timeline" | "v2" | "2" => {
                    return Some(Self::ShippingTimeline);
                }
                "view-order" | "view_order" | "v1" | "1" => return Some(Self::ViewOrder),
                other => debug!(version = other, "Ignoring unrecognised version field"),
            }
        }

        if ["tracking", "shipping_info", "package_contents"]
            .iter()
            .any(|key| obj.contains_key(*key))
        {
            return Some(Self::ShippingTimeline);
        }
        if obj.contains_key("order") && (obj.contains_key("items") || obj.contains_key("shipping"))
        {
            return Some(Self::ViewOrder);
        }
        None
    }
}

impl std::fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while normalising an order-detail response.
#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
    /// The body does not have the fields the adapter needs.
    #[error("response does not match the {shape} shape: {reason}")]
    ShapeMismatch {
        /// Shape the adapter expected.
        shape: ResponseShape,
        /// Deserialization failure.
        reason: String,
    },

    /// Neither shape could be recognised.
    #[error("unrecognised order-detail response shape")]
    UnrecognizedShape,

    /// The order carries a status this client does not know.
    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatusError),
}

impl NormalizeError {
    /// Whether trying the other endpoint could help.
    #[must_use]
    pub const fn is_shape_problem(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. } | Self::UnrecognizedShape)
    }
}

/// Canonical order-detail view, independent of the source endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTimelineView {
    /// Which response shape this was built from.
    pub source: ResponseShape,
    /// Order header.
    pub order: TimelineOrder,
    /// Courier details.
    pub shipping_info: ShippingInfo,
    /// Destination, if the response carried one.
    pub delivery_address: Option<DeliveryAddress>,
    /// Package contents.
    pub items: Vec<PackageItem>,
    /// Money breakdown.
    pub order_summary: OrderSummary,
    /// Milestones in order.
    pub timeline: Vec<TimelineEvent>,
}

/// Order header in the canonical view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineOrder {
    /// Order ID.
    pub id: OrderId,
    /// Parsed status.
    pub status: OrderStatus,
    /// Label from the status table.
    pub status_display: &'static str,
    /// Colour token from the status table.
    pub status_color: &'static str,
    /// When the order was placed.
    pub created_at: Option<DateTime<Utc>>,
    /// When the order was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

impl TimelineOrder {
    pub(crate) fn new(
        id: OrderId,
        raw_status: &str,
        created_at: Option<&str>,
        updated_at: Option<&str>,
    ) -> Result<Self, UnknownStatusError> {
        let status = OrderStatus::parse(raw_status).inspect_err(|err| {
            warn!(order_id = %id, raw = %err.raw, "Order has unknown status");
        })?;
        let meta = status.metadata();
        Ok(Self {
            id,
            status,
            status_display: meta.label,
            status_color: meta.color,
            created_at: created_at.and_then(parse_timestamp),
            updated_at: updated_at.and_then(parse_timestamp),
        })
    }
}

/// Courier details; every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ShippingInfo {
    /// Courier name.
    pub carrier: Option<String>,
    /// Tracking number.
    pub tracking_number: Option<String>,
    /// Delivery method label.
    pub delivery_method: Option<String>,
    /// Estimated delivery date as reported.
    pub estimated_delivery: Option<String>,
}

/// Destination in display form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryAddress {
    /// Recipient name.
    pub recipient: Option<String>,
    /// Recipient phone.
    pub phone: Option<String>,
    /// Single formatted address line.
    pub address: String,
}

/// One entry of the package contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageItem {
    /// Product name.
    pub name: String,
    /// Quantity.
    pub quantity: u32,
    /// Line value.
    pub value: Decimal,
}

/// Money breakdown as computed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    /// Items subtotal.
    pub subtotal: Decimal,
    /// Shipping fee.
    pub shipping_fee: Decimal,
    /// Tax.
    pub tax: Decimal,
    /// Discount.
    pub discount: Decimal,
    /// Grand total.
    pub total: Decimal,
    /// Whether `total` came from the server rather than [`OrderSummary::computed_total`].
    pub total_from_server: bool,
}

impl OrderSummary {
    /// Build a summary, recomputing the total when the server omitted it.
    #[must_use]
    pub fn new(
        subtotal: Option<Decimal>,
        shipping_fee: Option<Decimal>,
        tax: Option<Decimal>,
        discount: Option<Decimal>,
        total: Option<Decimal>,
    ) -> Self {
        let mut summary = Self {
            subtotal: subtotal.unwrap_or_default(),
            shipping_fee: shipping_fee.unwrap_or_default(),
            tax: tax.unwrap_or_default(),
            discount: discount.unwrap_or_default(),
            total: Decimal::ZERO,
            total_from_server: total.is_some(),
        };
        summary.total = total.unwrap_or_else(|| summary.computed_total());
        summary
    }

    /// `max(0, subtotal + shipping_fee - discount + tax)`.
    #[must_use]
    pub fn computed_total(&self) -> Decimal {
        non_negative(self.subtotal + self.shipping_fee - self.discount + self.tax)
    }

    /// Whether the server total agrees with the client computation.
    #[must_use]
    pub fn total_consistent(&self) -> bool {
        amounts_match(self.total, self.computed_total())
    }
}

/// Icons the timeline knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimelineIcon {
    #[default]
    Pending,
    Placed,
    Confirmed,
    Packed,
    Shipped,
    InTransit,
    Delivered,
    Cancelled,
    Refund,
}

impl TimelineIcon {
    /// Map an API icon token (or milestone key) to an icon.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let icon = match token.as_str() {
            "pending" | "clock" | "hourglass" => Self::Pending,
            "placed" | "order_placed" | "receipt" | "cart" | "shopping_cart" => Self::Placed,
            "confirmed" | "check" | "check_mark" | "thumbs_up" => Self::Confirmed,
            "packed" | "package" | "box" | "inventory" => Self::Packed,
            "shipped" | "truck" | "local_shipping" | "handed_to_courier" => Self::Shipped,
            "in_transit" | "map" | "map_pin" | "out_for_delivery" | "navigation" => {
                Self::InTransit
            }
            "delivered" | "home" | "check_circle" | "done" => Self::Delivered,
            "cancelled" | "canceled" | "x" | "x_circle" | "close" => Self::Cancelled,
            "refund" | "return" | "return_refund" | "rotate_ccw" | "undo" => Self::Refund,
            _ => return None,
        };
        Some(icon)
    }

    /// Resolve an event's icon: explicit token, then milestone key, then pending.
    #[must_use]
    pub fn resolve(icon: Option<&str>, key: Option<&str>) -> Self {
        if let Some(token) = icon {
            if let Some(resolved) = Self::from_token(token) {
                return resolved;
            }
            warn!(icon = token, "Unknown timeline icon, using pending");
            return Self::Pending;
        }
        key.and_then(Self::from_token).unwrap_or_default()
    }
}

/// One milestone of the canonical timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    /// Milestone key, e.g. "shipped".
    pub key: String,
    /// Title shown on the timeline.
    pub title: String,
    /// Longer description.
    pub description: Option<String>,
    /// Whether the milestone has been reached.
    pub completed: bool,
    /// When the milestone was reached.
    pub timestamp: Option<DateTime<Utc>>,
    /// Icon to draw.
    pub icon: TimelineIcon,
}

/// Fields shared by both shapes' raw timeline events, after renaming.
pub(crate) struct RawEvent<'a> {
    pub key: Option<&'a str>,
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub status: Option<&'a str>,
    pub completed: Option<bool>,
    pub timestamp: Option<&'a str>,
    pub icon: Option<&'a str>,
}

impl RawEvent<'_> {
    fn into_event(self, index: usize) -> TimelineEvent {
        let completed = self.completed.unwrap_or(false)
            || self
                .status
                .is_some_and(|s| s.trim().eq_ignore_ascii_case("completed"));
        let key = self
            .key
            .map_or_else(|| format!("step_{}", index + 1), str::to_owned);
        let title = self
            .title
            .map_or_else(|| humanize(&key), str::to_owned);

        TimelineEvent {
            icon: TimelineIcon::resolve(self.icon, Some(key.as_str())),
            title,
            description: self.description.map(str::to_owned),
            completed,
            timestamp: self.timestamp.and_then(parse_timestamp),
            key,
        }
    }
}

/// Coerce raw events into an ordered, monotonic timeline.
///
/// If a later milestone is completed, every earlier one is marked completed
/// too: a delivered parcel was necessarily shipped.
pub(crate) fn build_timeline<'a>(raw: impl IntoIterator<Item = RawEvent<'a>>) -> Vec<TimelineEvent> {
    let mut events: Vec<TimelineEvent> = raw
        .into_iter()
        .enumerate()
        .map(|(i, event)| event.into_event(i))
        .collect();

    if let Some(last_done) = events.iter().rposition(|e| e.completed) {
        for event in events.iter_mut().take(last_done) {
            if !event.completed {
                debug!(key = %event.key, "Backfilling completion of earlier milestone");
                event.completed = true;
            }
        }
    }
    events
}

/// Parse the timestamp formats seen in API responses.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (taken as UTC) and bare dates.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    debug!(raw, "Unparseable timestamp ignored");
    None
}

fn humanize(key: &str) -> String {
    key.split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip a `{"success": ..., "data": {...}}` envelope if present.
fn unwrap_envelope(body: &Value) -> &Value {
    match body.get("data") {
        Some(inner) if inner.is_object() && body.get("order").is_none() => inner,
        _ => body,
    }
}

/// Normalise a response whose shape is known from the endpoint it came from.
///
/// # Errors
///
/// Returns [`NormalizeError::ShapeMismatch`] if the body does not fit
/// `shape`, or [`NormalizeError::UnknownStatus`] for an unrecognised status.
pub fn normalize_as(shape: ResponseShape, body: &Value) -> Result<OrderTimelineView, NormalizeError> {
    let body = unwrap_envelope(body);
    match shape {
        ResponseShape::ShippingTimeline => shipping_timeline::normalize(body),
        ResponseShape::ViewOrder => view_order::normalize(body),
    }
}

/// Normalise a response of either shape, detecting which one it is.
///
/// # Errors
///
/// Returns [`NormalizeError::UnrecognizedShape`] if neither shape matches,
/// plus any error of [`normalize_as`].
pub fn normalize(body: &Value) -> Result<OrderTimelineView, NormalizeError> {
    let shape = ResponseShape::detect(body).ok_or(NormalizeError::UnrecognizedShape)?;
    normalize_as(shape, body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw<'a>(key: &'a str, status: Option<&'a str>, completed: Option<bool>) -> RawEvent<'a> {
        RawEvent {
            key: Some(key),
            title: None,
            description: None,
            status,
            completed,
            timestamp: None,
            icon: None,
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_detect_by_version_field() {
        let body = json!({"version": "v1", "tracking": {}});
        assert_eq!(ResponseShape::detect(&body), Some(ResponseShape::ViewOrder));
        let body = json!({"api_version": "shipping-timeline"});
        assert_eq!(
            ResponseShape::detect(&body),
            Some(ResponseShape::ShippingTimeline)
        );
    }

    #[test]
    fn test_detect_by_keys() {
        let new = json!({"order": {}, "tracking": {}, "timeline": []});
        assert_eq!(ResponseShape::detect(&new), Some(ResponseShape::ShippingTimeline));
        let legacy = json!({"order": {}, "items": [], "timeline": []});
        assert_eq!(ResponseShape::detect(&legacy), Some(ResponseShape::ViewOrder));
        let wrapped = json!({"success": true, "data": {"order": {}, "items": []}});
        assert_eq!(ResponseShape::detect(&wrapped), Some(ResponseShape::ViewOrder));
        assert_eq!(ResponseShape::detect(&json!({"foo": 1})), None);
        assert_eq!(ResponseShape::detect(&json!([1, 2])), None);
    }

    #[test]
    fn test_completed_from_status_or_flag() {
        let events = build_timeline([
            raw("placed", Some("Completed"), None),
            raw("confirmed", None, Some(true)),
            raw("shipped", Some("pending"), Some(false)),
        ]);
        assert!(events[0].completed);
        assert!(events[1].completed);
        assert!(!events[2].completed);
    }

    #[test]
    fn test_timeline_is_made_monotonic() {
        let events = build_timeline([
            raw("placed", Some("completed"), None),
            raw("packed", None, Some(false)),
            raw("shipped", None, Some(true)),
            raw("delivered", None, None),
        ]);
        let flags: Vec<bool> = events.iter().map(|e| e.completed).collect();
        assert_eq!(flags, vec![true, true, true, false]);
    }

    #[test]
    fn test_unknown_icon_defaults_to_pending() {
        assert_eq!(
            TimelineIcon::resolve(Some("sparkle-unicorn"), Some("shipped")),
            TimelineIcon::Pending
        );
        assert_eq!(TimelineIcon::resolve(None, Some("shipped")), TimelineIcon::Shipped);
        assert_eq!(TimelineIcon::resolve(None, Some("mystery")), TimelineIcon::Pending);
        assert_eq!(TimelineIcon::resolve(Some("Truck"), None), TimelineIcon::Shipped);
    }

    #[test]
    fn test_missing_key_and_title_are_filled() {
        let events = build_timeline([RawEvent {
            key: None,
            title: None,
            description: None,
            status: None,
            completed: None,
            timestamp: None,
            icon: None,
        }]);
        assert_eq!(events[0].key, "step_1");
        assert_eq!(events[0].title, "Step 1");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected: DateTime<Utc> = "2026-02-10T08:30:00Z".parse().unwrap();
        assert_eq!(parse_timestamp("2026-02-10T16:30:00+08:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-02-10 08:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2026-02-10"),
            Some("2026-02-10T00:00:00Z".parse().unwrap())
        );
        assert_eq!(parse_timestamp("next tuesday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_summary_recomputes_missing_total() {
        let summary = OrderSummary::new(
            Some(dec("4567.89")),
            Some(dec("150.00")),
            Some(dec("547.55")),
            Some(dec("200.00")),
            None,
        );
        assert_eq!(summary.total, dec("5065.44"));
        assert!(!summary.total_from_server);
    }

    #[test]
    fn test_summary_total_clamped_at_zero() {
        let summary = OrderSummary::new(Some(dec("100")), None, None, Some(dec("250")), None);
        assert_eq!(summary.total, Decimal::ZERO);
    }

    #[test]
    fn test_summary_matches_server_total() {
        let summary = OrderSummary::new(
            Some(dec("4567.89")),
            Some(dec("150.00")),
            Some(dec("547.55")),
            Some(dec("200.00")),
            Some(dec("5065.44")),
        );
        assert!(summary.total_from_server);
        assert!(summary.total_consistent());
    }

    #[test]
    fn test_normalize_unrecognized_shape() {
        let err = normalize(&json!({"hello": "world"})).unwrap_err();
        assert!(matches!(err, NormalizeError::UnrecognizedShape));
        assert!(err.is_shape_problem());
    }
}
