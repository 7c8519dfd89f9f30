//! Adapter for the `shipping-timeline` response shape.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::{
    DeliveryAddress, NormalizeError, OrderSummary, OrderTimelineView, PackageItem, RawEvent,
    ResponseShape, ShippingInfo, TimelineOrder, build_timeline,
};
use crate::order::Address;
use crate::types::{DeliveryMethod, OrderId, round_money};

/// Raw `shipping-timeline` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ShippingTimelineResponse {
    /// Order header.
    pub order: ShippingTimelineOrder,
    /// Courier tracking block.
    #[serde(default)]
    pub tracking: Option<Tracking>,
    /// Carrier, method and destination.
    #[serde(default)]
    pub shipping_info: Option<ShippingInfoBlock>,
    /// What is in the parcel.
    #[serde(default)]
    pub package_contents: Option<Vec<PackageContent>>,
    /// Server-computed money breakdown.
    #[serde(default)]
    pub order_summary: Option<Summary>,
    /// Milestones.
    #[serde(default)]
    pub timeline: Vec<ShippingTimelineEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingTimelineOrder {
    pub id: OrderId,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tracking {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<String>,
}

/// The carrier is sent either as a bare name or as an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Carrier {
    Name(String),
    Detailed {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
}

impl Carrier {
    fn display_name(&self) -> Option<String> {
        match self {
            Self::Name(name) => Some(name.clone()),
            Self::Detailed { name, code } => name.clone().or_else(|| code.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingInfoBlock {
    #[serde(default)]
    pub carrier: Option<Carrier>,
    #[serde(default)]
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<DestinationBlock>,
}

/// Destination, either preformatted or as components.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DestinationBlock {
    #[serde(default, alias = "recipient_name")]
    pub recipient: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, rename = "address", alias = "full_address")]
    pub formatted: Option<String>,
    #[serde(flatten)]
    pub parts: Address,
}

impl DestinationBlock {
    fn to_delivery_address(&self) -> DeliveryAddress {
        let address = self
            .formatted
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map_or_else(|| self.parts.formatted(), str::to_owned);
        DeliveryAddress {
            recipient: self.recipient.clone(),
            phone: self.phone.clone(),
            address,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageContent {
    pub name: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub value: Option<Decimal>,
}

const fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default, alias = "shipping")]
    pub shipping_fee: Option<Decimal>,
    #[serde(default)]
    pub tax: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub total: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingTimelineEvent {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl ShippingTimelineResponse {
    /// Deserialize a `shipping-timeline` body.
    ///
    /// A body with none of `tracking`, `shipping_info` or `package_contents`
    /// is rejected even if it otherwise deserializes; that is what a legacy
    /// body looks like, and the caller needs to fall back.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::ShapeMismatch`].
    pub fn parse(body: &Value) -> Result<Self, NormalizeError> {
        let mismatch = |reason: String| NormalizeError::ShapeMismatch {
            shape: ResponseShape::ShippingTimeline,
            reason,
        };
        let parsed = Self::deserialize(body).map_err(|e| mismatch(e.to_string()))?;
        if parsed.tracking.is_none()
            && parsed.shipping_info.is_none()
            && parsed.package_contents.is_none()
        {
            return Err(mismatch(
                "missing tracking, shipping_info and package_contents".to_string(),
            ));
        }
        Ok(parsed)
    }

    /// Build the canonical timeline view.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::UnknownStatus`] for an unrecognised status.
    pub fn to_view(&self) -> Result<OrderTimelineView, NormalizeError> {
        let order = TimelineOrder::new(
            self.order.id.clone(),
            &self.order.status,
            self.order.created_at.as_deref(),
            self.order.updated_at.as_deref(),
        )?;

        let tracking = self.tracking.clone().unwrap_or_default();
        let info = self.shipping_info.clone().unwrap_or_default();
        let shipping_info = ShippingInfo {
            carrier: info.carrier.as_ref().and_then(Carrier::display_name),
            tracking_number: tracking.tracking_number,
            delivery_method: info
                .delivery_method
                .as_deref()
                .map(|m| DeliveryMethod::from_api(m).label().to_owned()),
            estimated_delivery: tracking.estimated_delivery,
        };

        let delivery_address = info
            .delivery_address
            .as_ref()
            .map(DestinationBlock::to_delivery_address);

        let items: Vec<PackageItem> = self
            .package_contents
            .iter()
            .flatten()
            .map(|content| PackageItem {
                name: content.name.clone(),
                quantity: content.quantity,
                value: round_money(content.value.unwrap_or_default()),
            })
            .collect();

        let summary = self.order_summary.clone().unwrap_or_default();
        let subtotal = summary
            .subtotal
            .unwrap_or_else(|| round_money(items.iter().map(|i| i.value).sum::<Decimal>()));
        let order_summary = OrderSummary::new(
            Some(subtotal),
            summary.shipping_fee,
            summary.tax,
            summary.discount,
            summary.total,
        );

        let timeline = build_timeline(self.timeline.iter().map(|e| RawEvent {
            key: e.key.as_deref(),
            title: e.title.as_deref(),
            description: e.description.as_deref(),
            status: e.status.as_deref(),
            completed: e.completed,
            timestamp: e.date.as_deref(),
            icon: e.icon.as_deref(),
        }));

        Ok(OrderTimelineView {
            source: ResponseShape::ShippingTimeline,
            order,
            shipping_info,
            delivery_address,
            items,
            order_summary,
            timeline,
        })
    }
}

/// Normalise a `shipping-timeline` body into the canonical view.
///
/// # Errors
///
/// See [`ShippingTimelineResponse::parse`] and
/// [`ShippingTimelineResponse::to_view`].
pub fn normalize(body: &Value) -> Result<OrderTimelineView, NormalizeError> {
    ShippingTimelineResponse::parse(body)?.to_view()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::timeline::TimelineIcon;
    use crate::types::OrderStatus;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn body() -> Value {
        json!({
            "order": {"id": "1001", "status": "To Receive", "created_at": "2026-02-01T09:15:00Z"},
            "tracking": {"tracking_number": "JT0001", "estimated_delivery": "2026-02-05"},
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
                {"name": "Rattan Lamp", "quantity": 1, "value": "4067.89"},
                {"name": "Abaca Coaster Set", "quantity": 2, "value": 500}
            ],
            "order_summary": {
                "subtotal": "4567.89",
                "shipping": "150.00",
                "tax": "547.55",
                "discount": "200.00",
                "total": "5065.44"
            },
            "timeline": [
                {"key": "placed", "title": "Order Placed", "status": "completed", "date": "2026-02-01T09:15:00Z", "icon": "shopping-cart"},
                {"key": "confirmed", "title": "Confirmed", "status": "completed"},
                {"key": "shipped", "title": "Shipped", "completed": true, "icon": "local_shipping"},
                {"key": "delivered", "title": "Delivered", "status": "pending"}
            ]
        })
    }

    #[test]
    fn test_to_view() {
        let view = normalize(&body()).unwrap();

        assert_eq!(view.source, ResponseShape::ShippingTimeline);
        assert_eq!(view.order.status, OrderStatus::ToReceive);
        assert_eq!(view.order.status_display, "To Receive");
        assert_eq!(view.order.status_color, "violet");
        assert_eq!(view.shipping_info.carrier.as_deref(), Some("J&T Express"));
        assert_eq!(view.shipping_info.tracking_number.as_deref(), Some("JT0001"));
        assert_eq!(
            view.delivery_address.unwrap().address,
            "12 Mabini St., Quezon City, Metro Manila, 1100"
        );
        assert_eq!(view.items[1].value, dec("500"));
        assert_eq!(view.order_summary.shipping_fee, dec("150"));
        assert!(view.order_summary.total_consistent());
        assert_eq!(view.timeline.len(), 4);
        assert_eq!(view.timeline[0].icon, TimelineIcon::Placed);
        assert_eq!(view.timeline[2].icon, TimelineIcon::Shipped);
        assert_eq!(view.timeline[3].icon, TimelineIcon::Delivered);
        assert!(!view.timeline[3].completed);
    }

    #[test]
    fn test_carrier_as_plain_string() {
        let mut body = body();
        body["shipping_info"]["carrier"] = json!("Ninja Van");
        let view = normalize(&body).unwrap();
        assert_eq!(view.shipping_info.carrier.as_deref(), Some("Ninja Van"));
    }

    #[test]
    fn test_address_from_components() {
        let mut body = body();
        body["shipping_info"]["delivery_address"] = json!({
            "recipient_name": "Maria Clara",
            "street": "1 Rizal Ave.",
            "city": "Manila"
        });
        let address = normalize(&body).unwrap().delivery_address.unwrap();
        assert_eq!(address.recipient.as_deref(), Some("Maria Clara"));
        assert_eq!(address.address, "1 Rizal Ave., Manila");
    }

    #[test]
    fn test_missing_summary_falls_back_to_contents() {
        let mut body = body();
        body.as_object_mut().unwrap().remove("order_summary");
        let view = normalize(&body).unwrap();
        assert_eq!(view.order_summary.subtotal, dec("4567.89"));
        assert_eq!(view.order_summary.total, dec("4567.89"));
        assert!(!view.order_summary.total_from_server);
    }

    #[test]
    fn test_legacy_body_is_a_shape_mismatch() {
        let legacy = json!({
            "order": {"id": 1, "status": "pending"},
            "items": [],
            "timeline": []
        });
        let err = normalize(&legacy).unwrap_err();
        assert!(err.is_shape_problem());
    }
}
