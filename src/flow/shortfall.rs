use crate::Amount;
use crate::config::ConversionRate;
use crate::ledger::CurrencyLedger;
use crate::model::{CurrencyKind, TransactionRequest};

/// What the player is missing for a request, given current balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shortfall {
    pub missing_primary: Amount,
    /// Part of the request the player can pay with the requested currency.
    pub final_amount: Amount,
    /// Premium needed to exchange for `missing_primary`.
    pub premium_cost: Amount,
    pub missing_premium: Amount,
}

/// Recomputes the shortfall from the ledger. Never relies on earlier results.
pub fn evaluate(
    request: &TransactionRequest,
    ledger: &dyn CurrencyLedger,
    conversion: Option<ConversionRate>,
) -> Shortfall {
    let missing_primary = request
        .original_amount
        .saturating_sub(ledger.balance(request.currency));
    let final_amount = request.original_amount.saturating_sub(missing_primary);

    let premium_cost = match (request.currency, conversion) {
        (CurrencyKind::Primary, Some(rate)) if !missing_primary.is_zero() => {
            rate.premium_for(missing_primary)
        }
        _ => Amount::ZERO,
    };
    let missing_premium = premium_cost.saturating_sub(ledger.balance(CurrencyKind::Premium));

    Shortfall {
        missing_primary,
        final_amount,
        premium_cost,
        missing_premium,
    }
}
