use tracing::{info, warn};

use super::CommitError;
use super::shortfall::Shortfall;
use crate::ledger::CurrencyLedger;
use crate::model::{CurrencyKind, EconomyGroup, TransactionRequest};
use crate::tracking::{ExchangeEvent, PurchaseEvent, Tracker};

/// Debit the request from the ledger, all or nothing.
///
/// - Re-validate balances, the shortfall may be stale by now
/// - Debit `final_amount` from the requested currency
/// - Debit `premium_cost` from premium and report the exchange
/// - Report the purchase, after the exchange that funded it
pub fn commit(
    request: &TransactionRequest,
    shortfall: &Shortfall,
    ledger: &mut dyn CurrencyLedger,
    tracker: &mut dyn Tracker,
) -> Result<(), CommitError> {
    validate(request, shortfall, ledger)?;

    if !shortfall.final_amount.is_zero() {
        ledger.debit(request.currency, shortfall.final_amount)?;
    }

    if !shortfall.premium_cost.is_zero() {
        if let Err(e) = ledger.debit(CurrencyKind::Premium, shortfall.premium_cost) {
            // undo the first debit so nothing is half spent
            if !shortfall.final_amount.is_zero() {
                ledger.credit(request.currency, shortfall.final_amount, false, None);
            }
            warn!(reason = %e, "premium debit refused, commit rolled back");
            return Err(e.into());
        }

        tracker.notify_exchange(ExchangeEvent {
            group: EconomyGroup::not_enough_resources(),
            origin: request.economy_group.clone(),
            currency: CurrencyKind::Premium,
            amount: shortfall.premium_cost,
            resulting_balance: ledger.balance(CurrencyKind::Premium),
        });
    }

    if let Some(group) = &request.economy_group {
        if !request.original_amount.is_zero() {
            tracker.notify_purchase(PurchaseEvent {
                group: group.clone(),
                item_ref: request.item_ref.clone(),
                currency: request.currency,
                amount: request.original_amount,
                resulting_balance: ledger.balance(request.currency),
            });
        }
    }

    info!(
        currency = %request.currency,
        amount = %shortfall.final_amount,
        premium = %shortfall.premium_cost,
        "transaction committed"
    );
    Ok(())
}

fn validate(
    request: &TransactionRequest,
    shortfall: &Shortfall,
    ledger: &dyn CurrencyLedger,
) -> Result<(), CommitError> {
    let mut required = vec![(request.currency, shortfall.final_amount)];
    match required.iter_mut().find(|(c, _)| *c == CurrencyKind::Premium) {
        Some((_, amount)) => *amount += shortfall.premium_cost,
        None => required.push((CurrencyKind::Premium, shortfall.premium_cost)),
    }

    for (currency, required) in required {
        let available = ledger.balance(currency);
        if required > available {
            return Err(CommitError::InsufficientFunds {
                currency,
                required,
                available,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;
    use crate::ledger::{LedgerError, Wallet};
    use crate::tracking::{TrackedEvent, TrackingLog};

    fn shortfall(final_amount: u64, missing: u64, premium_cost: u64) -> Shortfall {
        Shortfall {
            missing_primary: Amount::new(missing),
            final_amount: Amount::new(final_amount),
            premium_cost: Amount::new(premium_cost),
            missing_premium: Amount::ZERO,
        }
    }

    #[test]
    fn commit_debits_requested_currency() {
        let mut wallet = Wallet::new().with_balance(CurrencyKind::Premium, 50);
        let mut tracker = TrackingLog::new();
        let request = TransactionRequest::new(Amount::new(30), CurrencyKind::Premium);

        commit(&request, &shortfall(30, 0, 0), &mut wallet, &mut tracker).unwrap();

        assert_eq!(wallet.balance(CurrencyKind::Premium), Amount::new(20));
        // no group, no purchase event
        assert!(tracker.events().is_empty());
    }

    #[test]
    fn commit_with_exchange_reports_exchange_before_purchase() {
        let mut wallet = Wallet::new()
            .with_balance(CurrencyKind::Primary, 80)
            .with_balance(CurrencyKind::Premium, 10);
        let mut tracker = TrackingLog::new();
        let request = TransactionRequest::new(Amount::new(100), CurrencyKind::Primary)
            .with_group(EconomyGroup::new("upgrade"));

        commit(&request, &shortfall(80, 20, 2), &mut wallet, &mut tracker).unwrap();

        assert_eq!(wallet.balance(CurrencyKind::Primary), Amount::ZERO);
        assert_eq!(wallet.balance(CurrencyKind::Premium), Amount::new(8));
        match tracker.events() {
            [TrackedEvent::Exchange(exchange), TrackedEvent::Purchase(purchase)] => {
                assert_eq!(exchange.group, EconomyGroup::not_enough_resources());
                assert_eq!(exchange.origin, Some(EconomyGroup::new("upgrade")));
                assert_eq!(exchange.amount, Amount::new(2));
                assert_eq!(exchange.resulting_balance, Amount::new(8));
                assert_eq!(purchase.amount, Amount::new(100));
                assert_eq!(purchase.currency, CurrencyKind::Primary);
            }
            events => panic!("unexpected events {events:?}"),
        }
    }

    #[test]
    fn failed_validation_leaves_balances_untouched() {
        let mut wallet = Wallet::new()
            .with_balance(CurrencyKind::Primary, 80)
            .with_balance(CurrencyKind::Premium, 1);
        let mut tracker = TrackingLog::new();
        let request = TransactionRequest::new(Amount::new(100), CurrencyKind::Primary)
            .with_group(EconomyGroup::new("upgrade"));

        let err = commit(&request, &shortfall(80, 20, 2), &mut wallet, &mut tracker).unwrap_err();

        assert_eq!(
            err,
            CommitError::InsufficientFunds {
                currency: CurrencyKind::Premium,
                required: Amount::new(2),
                available: Amount::new(1),
            }
        );
        assert_eq!(wallet.balance(CurrencyKind::Primary), Amount::new(80));
        assert_eq!(wallet.balance(CurrencyKind::Premium), Amount::new(1));
        assert!(tracker.events().is_empty());
    }

    #[test]
    fn stale_final_amount_is_refused() {
        let mut wallet = Wallet::new().with_balance(CurrencyKind::Primary, 10);
        let mut tracker = TrackingLog::new();
        let request = TransactionRequest::new(Amount::new(50), CurrencyKind::Primary);

        let err = commit(&request, &shortfall(50, 0, 0), &mut wallet, &mut tracker).unwrap_err();
        assert!(matches!(
            err,
            CommitError::InsufficientFunds {
                currency: CurrencyKind::Primary,
                ..
            }
        ));
        assert_eq!(wallet.balance(CurrencyKind::Primary), Amount::new(10));
    }

    /// Accepts one debit, refuses the next.
    struct FlakyLedger {
        inner: Wallet,
        debits_left: usize,
    }

    impl CurrencyLedger for FlakyLedger {
        fn balance(&self, currency: CurrencyKind) -> Amount {
            self.inner.balance(currency)
        }

        fn debit(&mut self, currency: CurrencyKind, amount: Amount) -> Result<(), LedgerError> {
            if self.debits_left == 0 {
                return Err(LedgerError::InsufficientFunds {
                    currency,
                    balance: self.inner.balance(currency),
                    requested: amount,
                });
            }
            self.debits_left -= 1;
            self.inner.debit(currency, amount)
        }

        fn credit(
            &mut self,
            currency: CurrencyKind,
            amount: Amount,
            tracked: bool,
            group: Option<&EconomyGroup>,
        ) {
            self.inner.credit(currency, amount, tracked, group)
        }
    }

    #[test]
    fn refused_premium_debit_rolls_back() {
        let mut ledger = FlakyLedger {
            inner: Wallet::new()
                .with_balance(CurrencyKind::Primary, 80)
                .with_balance(CurrencyKind::Premium, 10),
            debits_left: 1,
        };
        let mut tracker = TrackingLog::new();
        let request = TransactionRequest::new(Amount::new(100), CurrencyKind::Primary);

        let err = commit(&request, &shortfall(80, 20, 2), &mut ledger, &mut tracker).unwrap_err();

        assert!(matches!(err, CommitError::Ledger(_)));
        assert_eq!(ledger.balance(CurrencyKind::Primary), Amount::new(80));
        assert_eq!(ledger.balance(CurrencyKind::Premium), Amount::new(10));
        assert!(ledger.inner.earnings().is_empty());
        assert!(tracker.events().is_empty());
    }

    #[test]
    fn zero_amount_request_commits_without_events() {
        let mut wallet = Wallet::new();
        let mut tracker = TrackingLog::new();
        let request = TransactionRequest::new(Amount::ZERO, CurrencyKind::Primary)
            .with_group(EconomyGroup::new("free"));

        commit(&request, &shortfall(0, 0, 0), &mut wallet, &mut tracker).unwrap();
        assert!(tracker.events().is_empty());
    }
}
