//! Which actions a viewer may take on an order.
//!
//! Everything here is a pure projection of an [`Order`] snapshot. Callers
//! recompute it after every fetch instead of caching it, so a status change
//! can never leave a stale "Cancel" button behind.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::order::{Order, OrderItem};
use crate::types::{ItemStatus, OrderStatus, Role};

/// Order-level permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct OrderActions {
    /// Cancel the order.
    pub can_cancel: bool,
    /// Open courier tracking.
    pub can_track: bool,
    /// At least one item can be reviewed.
    pub can_review: bool,
    /// At least one item can be returned.
    pub can_return: bool,
    /// Message the seller.
    pub can_contact_seller: bool,
    /// Put the same items back in the cart.
    pub can_buy_again: bool,
}

/// Item-level permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ItemActions {
    /// Write a review for this item.
    pub can_review: bool,
    /// Request a return/refund for this item.
    pub can_return: bool,
}

/// Compute the permitted actions on `order` for `viewer` at `now`.
///
/// Cancel, review, return, contact-seller and buy-again are buyer actions and
/// are only granted to [`Role::Customer`]. Tracking is open to every role.
#[must_use]
pub fn order_actions(order: &Order, viewer: Role, now: DateTime<Utc>) -> OrderActions {
    let status = order.status;
    let is_customer = viewer == Role::Customer;

    let item_actions = order
        .items
        .iter()
        .map(|item| item_actions(order, item, viewer, now));
    let (any_review, any_return) = item_actions.fold((false, false), |(review, ret), a| {
        (review || a.can_review, ret || a.can_return)
    });

    OrderActions {
        can_cancel: is_customer
            && matches!(status, OrderStatus::Pending | OrderStatus::InProgress)
            && !order.any_item_shipped(),
        can_track: matches!(status, OrderStatus::ToShip | OrderStatus::ToReceive)
            && order.tracking_number().is_some(),
        can_review: any_review,
        can_return: any_return,
        can_contact_seller: is_customer && status != OrderStatus::Cancelled,
        can_buy_again: is_customer
            && matches!(status, OrderStatus::Completed | OrderStatus::Cancelled),
    }
}

/// Compute the permitted actions on one item of `order`.
///
/// A missing `return_deadline` means returns are not allowed.
#[must_use]
pub fn item_actions(
    order: &Order,
    item: &OrderItem,
    viewer: Role,
    now: DateTime<Utc>,
) -> ItemActions {
    if viewer != Role::Customer || order.status != OrderStatus::Completed {
        return ItemActions::default();
    }

    ItemActions {
        can_review: item.status == ItemStatus::Delivered && !item.has_review,
        can_return: item.return_deadline.is_some_and(|deadline| now <= deadline),
    }
}

/// Items of `order` the customer may include in a return/refund request.
#[must_use]
pub fn returnable_items(order: &Order, now: DateTime<Utc>) -> Vec<&OrderItem> {
    order
        .items
        .iter()
        .filter(|item| item_actions(order, item, Role::Customer, now).can_return)
        .collect()
}
