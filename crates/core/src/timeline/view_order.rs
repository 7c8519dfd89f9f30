//! Adapter for the legacy `view-order` response shape.
//!
//! This is also the only shape that carries per-item status, review and
//! return-deadline data, so it doubles as the source of the full [`Order`]
//! model the action gate runs on.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{
    DeliveryAddress, NormalizeError, OrderSummary, OrderTimelineView, PackageItem, RawEvent,
    ResponseShape, ShippingInfo, TimelineOrder, build_timeline, parse_timestamp,
};
use crate::order::{Address, Order, OrderItem, Payment, Shipping};
use crate::types::{
    DeliveryMethod, ItemStatus, OrderId, OrderItemId, OrderStatus, PaymentStatus, ShopId,
    round_money,
};

/// Raw `view-order` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewOrderResponse {
    /// Order header with money fields.
    pub order: ViewOrderHeader,
    /// Line items.
    #[serde(default)]
    pub items: Vec<ViewOrderItem>,
    /// Shipping block.
    #[serde(default)]
    pub shipping: Option<ViewOrderShipping>,
    /// Destination.
    #[serde(default)]
    pub delivery_address: Option<Address>,
    /// Payment block.
    #[serde(default)]
    pub payment: Option<ViewOrderPayment>,
    /// Milestones.
    #[serde(default)]
    pub timeline: Vec<ViewOrderEvent>,
}

/// `order` object of the legacy shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewOrderHeader {
    pub id: OrderId,
    pub status: String,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub shipping_fee: Option<Decimal>,
    #[serde(default)]
    pub tax: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default, alias = "total")]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub buyer_note: Option<String>,
    #[serde(default)]
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Entry of the legacy `items` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewOrderItem {
    pub id: OrderItemId,
    #[serde(default)]
    pub shop_id: Option<ShopId>,
    #[serde(alias = "product_name")]
    pub name: String,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    pub quantity: u32,
    #[serde(alias = "unit_price")]
    pub price: Decimal,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub has_review: bool,
    #[serde(default)]
    pub return_deadline: Option<String>,
}

impl ViewOrderItem {
    fn line_value(&self) -> Decimal {
        round_money(
            self.subtotal
                .unwrap_or_else(|| self.price * Decimal::from(self.quantity)),
        )
    }
}

/// `shipping` object of the legacy shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewOrderShipping {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<String>,
}

/// `payment` object of the legacy shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewOrderPayment {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Entry of the legacy `timeline` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewOrderEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl ViewOrderResponse {
    /// Deserialize a legacy body.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::ShapeMismatch`] if required fields are
    /// missing or mistyped.
    pub fn parse(body: &Value) -> Result<Self, NormalizeError> {
        Self::deserialize(body).map_err(|e| NormalizeError::ShapeMismatch {
            shape: ResponseShape::ViewOrder,
            reason: e.to_string(),
        })
    }

    fn delivery_method(&self) -> Option<&str> {
        self.shipping
            .as_ref()
            .and_then(|s| s.method.as_deref())
            .or(self.order.delivery_method.as_deref())
    }

    fn subtotal(&self) -> Decimal {
        self.order.subtotal.unwrap_or_else(|| {
            round_money(self.items.iter().map(ViewOrderItem::line_value).sum())
        })
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

        let shipping = self.shipping.clone().unwrap_or_default();
        let shipping_info = ShippingInfo {
            carrier: shipping.carrier,
            tracking_number: shipping.tracking_number,
            delivery_method: self
                .delivery_method()
                .map(|m| DeliveryMethod::from_api(m).label().to_owned()),
            estimated_delivery: shipping.estimated_delivery,
        };

        let delivery_address = self.delivery_address.as_ref().map(|a| DeliveryAddress {
            recipient: a.recipient_name.clone(),
            phone: a.phone.clone(),
            address: a.formatted(),
        });

        let items = self
            .items
            .iter()
            .map(|item| PackageItem {
                name: item.name.clone(),
                quantity: item.quantity,
                value: item.line_value(),
            })
            .collect();

        let order_summary = OrderSummary::new(
            Some(self.subtotal()),
            self.order.shipping_fee,
            self.order.tax,
            self.order.discount,
            self.order.total_amount,
        );

        let timeline = build_timeline(self.timeline.iter().map(|e| RawEvent {
            key: e.event.as_deref(),
            title: e.label.as_deref(),
            description: e.description.as_deref(),
            status: e.status.as_deref(),
            completed: e.completed,
            timestamp: e.timestamp.as_deref(),
            icon: e.icon.as_deref(),
        }));

        Ok(OrderTimelineView {
            source: ResponseShape::ViewOrder,
            order,
            shipping_info,
            delivery_address,
            items,
            order_summary,
            timeline,
        })
    }

    /// Build the full [`Order`] model.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::UnknownStatus`] for an unrecognised status.
    pub fn into_order(self) -> Result<Order, NormalizeError> {
        let status = OrderStatus::parse(&self.order.status).inspect_err(|err| {
            warn!(order_id = %self.order.id, raw = %err.raw, "Order has unknown status");
        })?;
        let subtotal = self.subtotal();
        let method = self
            .delivery_method()
            .map(DeliveryMethod::from_api)
            .unwrap_or_default();

        let shipping_fee = self.order.shipping_fee.unwrap_or_default();
        let tax = self.order.tax.unwrap_or_default();
        let discount = self.order.discount.unwrap_or_default();
        let total_amount = self
            .order
            .total_amount
            .unwrap_or_else(|| round_money(subtotal + shipping_fee + tax - discount));

        let shipping_block = self.shipping.unwrap_or_default();
        let payment_block = self.payment.unwrap_or_default();

        let items = self
            .items
            .into_iter()
            .map(|item| OrderItem {
                subtotal: item.line_value(),
                return_deadline: item.return_deadline.as_deref().and_then(parse_timestamp),
                id: item.id,
                shop_id: item.shop_id,
                name: item.name,
                variant: item.variant,
                image_url: item.image_url,
                quantity: item.quantity,
                unit_price: item.price,
                status: item.status,
                has_review: item.has_review,
            })
            .collect();

        Ok(Order {
            id: self.order.id,
            status,
            subtotal,
            shipping_fee,
            tax,
            discount,
            total_amount,
            payment: Payment {
                method: payment_block.method.unwrap_or_default(),
                status: payment_block.status,
                amount: payment_block.amount.unwrap_or(total_amount),
                transaction_id: payment_block.transaction_id,
            },
            shipping: Shipping {
                method,
                carrier: shipping_block.carrier,
                tracking_number: shipping_block.tracking_number,
                estimated_delivery: shipping_block.estimated_delivery,
                address: self.delivery_address,
            },
            items,
            buyer_note: self.order.buyer_note,
            created_at: self.order.created_at.as_deref().and_then(parse_timestamp),
            updated_at: self.order.updated_at.as_deref().and_then(parse_timestamp),
        })
    }
}

/// Normalise a legacy body into the canonical view.
///
/// # Errors
///
/// See [`ViewOrderResponse::parse`] and [`ViewOrderResponse::to_view`].
pub fn normalize(body: &Value) -> Result<OrderTimelineView, NormalizeError> {
    ViewOrderResponse::parse(body)?.to_view()
}

/// Parse a legacy body into the full [`Order`] model.
///
/// # Errors
///
/// See [`ViewOrderResponse::parse`] and [`ViewOrderResponse::into_order`].
pub fn parse_order(body: &Value) -> Result<Order, NormalizeError> {
    ViewOrderResponse::parse(super::unwrap_envelope(body))?.into_order()
}
