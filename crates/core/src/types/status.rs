//! Status enums and the buyer-facing order status table.
//!
//! Order statuses arrive from the marketplace API as free-form strings. They
//! are parsed into [`OrderStatus`] once, at the edge, and every screen then
//! keys off the enum and its [`StatusMetadata`] instead of comparing strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An order status string the client does not recognise.
///
/// The view layer renders a generic error panel for this; it is never a
/// reason to crash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {raw:?}")]
pub struct UnknownStatusError {
    /// The status string exactly as received.
    pub raw: String,
}

/// Lowercase, trim, and fold spaces, hyphens and slashes into underscores.
pub(crate) fn normalize_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '/' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Buyer-facing lifecycle stage of an order.
///
/// `pending → in_progress → to_ship → to_receive → completed`, with
/// `cancelled` and `return_refund` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum OrderStatus {
    Pending,
    InProgress,
    ToShip,
    ToReceive,
    Completed,
    Cancelled,
    ReturnRefund,
}

/// Display metadata bound to an [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusMetadata {
    /// Short label, e.g. "To Receive".
    pub label: &'static str,
    /// Colour token understood by the design system.
    pub color: &'static str,
    /// Icon identifier.
    pub icon: &'static str,
    /// One-line description of the stage.
    pub description: &'static str,
    /// "What's happening now" sentence shown to the buyer.
    pub now_happening: &'static str,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::InProgress,
        Self::ToShip,
        Self::ToReceive,
        Self::Completed,
        Self::Cancelled,
        Self::ReturnRefund,
    ];

    /// Parse an API status string.
    ///
    /// Matching ignores case, surrounding whitespace, and treats spaces,
    /// hyphens and slashes as underscores (`"To Ship"`, `"to-ship"` and
    /// `"to_ship"` are all [`OrderStatus::ToShip`]).
    ///
    /// # Errors
    ///
    /// Returns [`UnknownStatusError`] for anything else.
    pub fn parse(raw: &str) -> Result<Self, UnknownStatusError> {
        match normalize_token(raw).as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "processing" => Ok(Self::InProgress),
            "to_ship" => Ok(Self::ToShip),
            "to_receive" => Ok(Self::ToReceive),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "return_refund" | "return_and_refund" => Ok(Self::ReturnRefund),
            _ => Err(UnknownStatusError {
                raw: raw.to_owned(),
            }),
        }
    }

    /// Canonical wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::ToShip => "to_ship",
            Self::ToReceive => "to_receive",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::ReturnRefund => "return_refund",
        }
    }

    /// Whether the buyer can no longer move this order forward.
    ///
    /// A return/refund may still be filed against a completed order.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Static display metadata for this status.
    #[must_use]
    pub const fn metadata(self) -> StatusMetadata {
        match self {
            Self::Pending => StatusMetadata {
                label: "Pending",
                color: "amber",
                icon: "clock",
                description: "Order placed and awaiting seller confirmation.",
                now_happening: "The seller has received your order and will confirm it shortly.",
            },
            Self::InProgress => StatusMetadata {
                label: "In Progress",
                color: "blue",
                icon: "loader",
                description: "Seller confirmed the order and is preparing it.",
                now_happening: "Your items are being prepared by the seller.",
            },
            Self::ToShip => StatusMetadata {
                label: "To Ship",
                color: "indigo",
                icon: "package",
                description: "Packed and waiting to be handed to the courier.",
                now_happening: "Your package is packed and waiting for pickup by the courier.",
            },
            Self::ToReceive => StatusMetadata {
                label: "To Receive",
                color: "violet",
                icon: "truck",
                description: "On the way to the delivery address.",
                now_happening: "Your package is on its way to you.",
            },
            Self::Completed => StatusMetadata {
                label: "Completed",
                color: "green",
                icon: "check-circle",
                description: "Delivered and received by the buyer.",
                now_happening: "Your order has been delivered. Enjoy your purchase!",
            },
            Self::Cancelled => StatusMetadata {
                label: "Cancelled",
                color: "red",
                icon: "x-circle",
                description: "The order was cancelled.",
                now_happening: "This order was cancelled and will not be shipped.",
            },
            Self::ReturnRefund => StatusMetadata {
                label: "Return/Refund",
                color: "orange",
                icon: "rotate-ccw",
                description: "A return or refund request is open for this order.",
                now_happening: "Your return/refund request is being reviewed.",
            },
        }
    }

    /// Display label, e.g. "To Ship".
    #[must_use]
    pub const fn label(self) -> &'static str {
        self.metadata().label
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = UnknownStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Per-item status, tracked independently of the order header.
///
/// Parsed with the same case and separator tolerance as [`OrderStatus`];
/// unrecognised values become [`ItemStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Processing,
    Packed,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Cancelled,
    ReturnRequested,
    Returned,
    Refunded,
    Unknown,
}

impl ItemStatus {
    /// Parse an API item status string.
    #[must_use]
    pub fn from_api(raw: &str) -> Self {
        match normalize_token(raw).as_str() {
            "pending" => Self::Pending,
            "processing" | "in_progress" => Self::Processing,
            "packed" | "to_ship" | "ready_to_ship" => Self::Packed,
            "shipped" => Self::Shipped,
            "in_transit" | "to_receive" => Self::InTransit,
            "out_for_delivery" => Self::OutForDelivery,
            "delivered" | "completed" => Self::Delivered,
            "cancelled" | "canceled" => Self::Cancelled,
            "return_requested" => Self::ReturnRequested,
            "returned" => Self::Returned,
            "refunded" => Self::Refunded,
            _ => Self::Unknown,
        }
    }

    /// Whether the item has left the seller.
    ///
    /// [`ItemStatus::Unknown`] counts as shipped so that cancellation fails
    /// closed.
    #[must_use]
    pub const fn has_begun_shipping(self) -> bool {
        matches!(
            self,
            Self::Shipped
                | Self::InTransit
                | Self::OutForDelivery
                | Self::Delivered
                | Self::ReturnRequested
                | Self::Returned
                | Self::Refunded
                | Self::Unknown
        )
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_api(&raw))
    }
}

/// Payment status reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
    PartiallyRefunded,
    Unknown,
}

impl PaymentStatus {
    /// Parse an API payment status string.
    #[must_use]
    pub fn from_api(raw: &str) -> Self {
        match normalize_token(raw).as_str() {
            "pending" | "unpaid" => Self::Pending,
            "paid" | "completed" => Self::Paid,
            "failed" => Self::Failed,
            "refunded" => Self::Refunded,
            "partially_refunded" => Self::PartiallyRefunded,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_api(&raw))
    }
}

/// How the order reaches the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    #[default]
    Standard,
    Express,
    SameDay,
    /// Buyer collects the order; the only method that allows cash-on-hand refunds.
    Pickup,
}

impl DeliveryMethod {
    /// Parse a delivery method string, defaulting to standard shipping.
    #[must_use]
    pub fn from_api(raw: &str) -> Self {
        match normalize_token(raw).as_str() {
            "express" => Self::Express,
            "same_day" | "sameday" => Self::SameDay,
            "pickup" | "pick_up" | "store_pickup" | "self_pickup" => Self::Pickup,
            _ => Self::Standard,
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard Delivery",
            Self::Express => "Express Delivery",
            Self::SameDay => "Same-Day Delivery",
            Self::Pickup => "Store Pickup",
        }
    }
}

impl<'de> Deserialize<'de> for DeliveryMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_api(&raw))
    }
}

/// Who is looking at the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The buyer who placed the order.
    Customer,
    /// The shop fulfilling the order.
    Seller,
    /// The courier delivering the order.
    Rider,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Seller => write!(f, "seller"),
            Self::Rider => write!(f, "rider"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "customer" | "buyer" => Ok(Self::Customer),
            "seller" | "shop" => Ok(Self::Seller),
            "rider" | "courier" => Ok(Self::Rider),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}
