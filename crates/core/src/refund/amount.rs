//! Refund amount calculation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{RefundCategory, RefundError, RefundMethod};
use crate::types::{CurrencyCode, Money, non_negative, round_money};

/// Cap and fee schedule applied to refund requests.
///
/// [`RefundPolicy::default`] carries the marketplace's current values; the
/// client can override them from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicy {
    /// Largest fraction of the selected subtotal a keep-item request may ask for.
    pub keep_item_cap: Decimal,
    /// Flat fee for bank transfers.
    pub bank_fee: Decimal,
    /// Flat fee for remittance payouts.
    pub remittance_fee: Decimal,
    /// Flat fee for e-wallet payouts.
    pub wallet_fee: Decimal,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            keep_item_cap: Decimal::from_parts(70, 0, 0, false, 2),
            bank_fee: Decimal::from(50),
            remittance_fee: Decimal::from(50),
            wallet_fee: Decimal::from(10),
        }
    }
}

impl RefundPolicy {
    /// Fee charged for a payout method. Does not depend on the amount.
    #[must_use]
    pub fn fee(&self, method: RefundMethod) -> Decimal {
        let fee = match method {
            RefundMethod::Bank => self.bank_fee,
            RefundMethod::Remittance => self.remittance_fee,
            RefundMethod::Wallet => self.wallet_fee,
            RefundMethod::Voucher | RefundMethod::CashOnHand | RefundMethod::Replace => {
                Decimal::ZERO
            }
        };
        round_money(fee)
    }

    /// Most a keep-item request may ask for on `selected_subtotal`.
    #[must_use]
    pub fn keep_item_limit(&self, selected_subtotal: Decimal) -> Decimal {
        non_negative(selected_subtotal * self.keep_item_cap)
    }

    /// Compute the breakdown for a request.
    ///
    /// `partial_amount` only matters for [`RefundCategory::KeepItem`]. A
    /// missing, zero or negative partial amount means "use the limit". A
    /// missing `method` is charged no fee.
    ///
    /// # Errors
    ///
    /// Returns [`RefundError::AmountExceedsCap`] if a keep-item partial amount
    /// is above [`RefundPolicy::keep_item_limit`].
    pub fn calculate(
        &self,
        selected_subtotal: Decimal,
        category: RefundCategory,
        method: Option<RefundMethod>,
        partial_amount: Option<Decimal>,
    ) -> Result<RefundBreakdown, RefundError> {
        let selected_subtotal = non_negative(selected_subtotal);

        let requested_refund_amount = match category {
            RefundCategory::ReturnItem | RefundCategory::Replacement => selected_subtotal,
            RefundCategory::KeepItem => {
                let cap = self.keep_item_limit(selected_subtotal);
                match partial_amount.map(round_money) {
                    Some(requested) if requested > cap => {
                        return Err(RefundError::AmountExceedsCap { requested, cap });
                    }
                    Some(requested) if requested > Decimal::ZERO => requested,
                    _ => cap,
                }
            }
        };

        let refund_fee = method.map_or(Decimal::ZERO, |m| self.fee(m));

        Ok(RefundBreakdown {
            selected_subtotal,
            requested_refund_amount,
            refund_fee,
            total_refund_amount: non_negative(requested_refund_amount - refund_fee),
        })
    }
}

/// Amounts shown on the review screen and sent with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefundBreakdown {
    /// Sum of the selected items' line totals.
    pub selected_subtotal: Decimal,
    /// Amount before fees.
    pub requested_refund_amount: Decimal,
    /// Payout fee.
    pub refund_fee: Decimal,
    /// What the buyer receives.
    pub total_refund_amount: Decimal,
}

impl RefundBreakdown {
    /// Labelled review-screen lines in `currency`, top to bottom.
    #[must_use]
    pub fn review_lines(&self, currency: CurrencyCode) -> [(&'static str, Money); 4] {
        [
            ("Selected items", Money::new(self.selected_subtotal, currency)),
            ("Refund amount", Money::new(self.requested_refund_amount, currency)),
            ("Refund fee", Money::new(self.refund_fee, currency)),
            ("You will receive", Money::new(self.total_refund_amount, currency)),
        ]
    }
}
