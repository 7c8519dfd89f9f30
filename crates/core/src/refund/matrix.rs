//! Refund method compatibility table.
//!
//! Two lookups drive the workflow guards:
//!
//! | Method         | Categories                | Detail fields |
//! |----------------|---------------------------|---------------|
//! | `wallet`       | return_item, keep_item    | provider, account name, account number, contact number |
//! | `bank`         | return_item, keep_item    | bank name, account name, account number, account type |
//! | `voucher`      | return_item, keep_item    | none |
//! | `remittance`   | return_item, keep_item    | provider, first name, last name, contact number, valid ID type, valid ID number |
//! | `cash_on_hand` | return_item, keep_item *  | none |
//! | `replace`      | replacement               | none |
//!
//! \* only when the order is picked up by the buyer.

use super::{DetailField, RefundCategory, RefundMethod};
use crate::types::DeliveryMethod;

const MONEY_BACK: &[RefundCategory] = &[RefundCategory::ReturnItem, RefundCategory::KeepItem];
const REPLACEMENT_ONLY: &[RefundCategory] = &[RefundCategory::Replacement];

/// Categories a method may be used with.
#[must_use]
pub const fn allowed_categories(method: RefundMethod) -> &'static [RefundCategory] {
    match method {
        RefundMethod::Wallet
        | RefundMethod::Bank
        | RefundMethod::Voucher
        | RefundMethod::Remittance
        | RefundMethod::CashOnHand => MONEY_BACK,
        RefundMethod::Replace => REPLACEMENT_ONLY,
    }
}

/// Detail fields the buyer must fill in for a method.
#[must_use]
pub const fn required_fields(method: RefundMethod) -> &'static [DetailField] {
    match method {
        RefundMethod::Wallet => &[
            DetailField::Provider,
            DetailField::AccountName,
            DetailField::AccountNumber,
            DetailField::ContactNumber,
        ],
        RefundMethod::Bank => &[
            DetailField::BankName,
            DetailField::AccountName,
            DetailField::AccountNumber,
            DetailField::AccountType,
        ],
        RefundMethod::Remittance => &[
            DetailField::Provider,
            DetailField::FirstName,
            DetailField::LastName,
            DetailField::ContactNumber,
            DetailField::ValidIdType,
            DetailField::ValidIdNumber,
        ],
        RefundMethod::Voucher | RefundMethod::CashOnHand | RefundMethod::Replace => &[],
    }
}

/// Whether `method` can be offered for `category` on an order delivered by `delivery`.
#[must_use]
pub fn is_available(method: RefundMethod, category: RefundCategory, delivery: DeliveryMethod) -> bool {
    if method == RefundMethod::CashOnHand && delivery != DeliveryMethod::Pickup {
        return false;
    }
    allowed_categories(method).contains(&category)
}

/// Methods to offer once `category` is chosen, in display order.
#[must_use]
pub fn available_methods(category: RefundCategory, delivery: DeliveryMethod) -> Vec<RefundMethod> {
    RefundMethod::ALL
        .into_iter()
        .filter(|method| is_available(*method, category, delivery))
        .collect()
}
