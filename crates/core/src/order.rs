//! Order domain model.
//!
//! An [`Order`] is a snapshot of what the marketplace API reported. The
//! client never mutates one locally; a status change means fetching a new
//! snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    DeliveryMethod, ItemStatus, OrderId, OrderItemId, OrderStatus, PaymentStatus, ShopId,
    amounts_match, round_money,
};

/// A buyer's order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID.
    pub id: OrderId,
    /// Buyer-facing status.
    pub status: OrderStatus,
    /// Sum of item subtotals.
    pub subtotal: Decimal,
    /// Shipping fee charged to the buyer.
    pub shipping_fee: Decimal,
    /// Tax.
    pub tax: Decimal,
    /// Discount applied to the order.
    pub discount: Decimal,
    /// Amount charged: `subtotal + shipping_fee + tax - discount`.
    pub total_amount: Decimal,
    /// Payment details.
    pub payment: Payment,
    /// Shipping details.
    pub shipping: Shipping,
    /// Line items, in display order.
    pub items: Vec<OrderItem>,
    /// Note left by the buyer at checkout.
    pub buyer_note: Option<String>,
    /// When the order was placed.
    pub created_at: Option<DateTime<Utc>>,
    /// When the order was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Total implied by the monetary fields.
    #[must_use]
    pub fn expected_total(&self) -> Decimal {
        round_money(self.subtotal + self.shipping_fee + self.tax - self.discount)
    }

    /// Whether `total_amount` matches [`Order::expected_total`] within a cent.
    #[must_use]
    pub fn totals_consistent(&self) -> bool {
        amounts_match(self.total_amount, self.expected_total())
    }

    /// Sum of the line totals of all items.
    #[must_use]
    pub fn items_subtotal(&self) -> Decimal {
        round_money(self.items.iter().map(OrderItem::line_total).sum())
    }

    /// Look up an item by ID.
    #[must_use]
    pub fn item(&self, id: &OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Tracking number, if one has been assigned.
    #[must_use]
    pub fn tracking_number(&self) -> Option<&str> {
        self.shipping
            .tracking_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Whether any item has begun shipping.
    #[must_use]
    pub fn any_item_shipped(&self) -> bool {
        self.items.iter().any(|item| item.status.has_begun_shipping())
    }
}

/// A line item. Owned by exactly one order and sold by one shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Line item ID.
    pub id: OrderItemId,
    /// Shop selling this item.
    pub shop_id: Option<ShopId>,
    /// Product name.
    pub name: String,
    /// Variant description (size, colour, ...).
    pub variant: Option<String>,
    /// Product image URL.
    pub image_url: Option<String>,
    /// Quantity ordered (at least 1).
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Decimal,
    /// `unit_price * quantity` as reported by the API.
    pub subtotal: Decimal,
    /// Item status, independent of the order header.
    #[serde(default)]
    pub status: ItemStatus,
    /// Whether the buyer already reviewed this item (server-reported).
    #[serde(default)]
    pub has_review: bool,
    /// Last moment a return may be requested. Absent means no returns.
    pub return_deadline: Option<DateTime<Utc>>,
}

impl OrderItem {
    /// `unit_price * quantity`, rounded to the cent.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_money(self.unit_price * Decimal::from(self.quantity))
    }
}

/// How the order was paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Payment {
    /// Payment method label, e.g. "GCash" or "Cash on Delivery".
    pub method: String,
    /// Payment status.
    #[serde(default)]
    pub status: PaymentStatus,
    /// Amount paid.
    pub amount: Decimal,
    /// Processor transaction ID.
    pub transaction_id: Option<String>,
}

/// Shipping details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Shipping {
    /// Delivery method.
    #[serde(default)]
    pub method: DeliveryMethod,
    /// Courier name.
    pub carrier: Option<String>,
    /// Courier tracking number.
    pub tracking_number: Option<String>,
    /// Estimated delivery date as reported by the API.
    pub estimated_delivery: Option<String>,
    /// Destination address.
    pub address: Option<Address>,
}

/// A delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Address {
    /// Recipient name.
    #[serde(alias = "recipient")]
    pub recipient_name: Option<String>,
    /// Recipient phone number.
    pub phone: Option<String>,
    /// Street, building, unit.
    pub street: Option<String>,
    /// Barangay or district.
    pub barangay: Option<String>,
    /// City or municipality.
    pub city: Option<String>,
    /// Province or state.
    pub province: Option<String>,
    /// Postal code.
    #[serde(alias = "zip_code")]
    pub postal_code: Option<String>,
    /// Country.
    pub country: Option<String>,
}

impl Address {
    /// Single-line address with empty parts skipped.
    #[must_use]
    pub fn formatted(&self) -> String {
        [
            &self.street,
            &self.barangay,
            &self.city,
            &self.province,
            &self.postal_code,
            &self.country,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref().map(str::trim))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}
