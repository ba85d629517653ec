//! Player currency balances.
//!
//! The flow only talks to balances through [`CurrencyLedger`]; [`Wallet`] is
//! the in-memory implementation used by the session and the tests.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::Amount;
use crate::model::{CurrencyKind, EconomyGroup};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient {currency}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        currency: CurrencyKind,
        balance: Amount,
        requested: Amount,
    },
}

/// Read/debit/credit access to the player's balances.
pub trait CurrencyLedger {
    fn balance(&self, currency: CurrencyKind) -> Amount;

    /// Remove `amount` from `currency`. Must not change anything on error.
    fn debit(&mut self, currency: CurrencyKind, amount: Amount) -> Result<(), LedgerError>;

    /// Add `amount` to `currency`. `tracked` credits are attributed to `group`.
    fn credit(
        &mut self,
        currency: CurrencyKind,
        amount: Amount,
        tracked: bool,
        group: Option<&EconomyGroup>,
    );
}

/// A tracked credit as recorded by [`Wallet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Earning {
    pub currency: CurrencyKind,
    pub amount: Amount,
    pub group: Option<EconomyGroup>,
}

/// In-memory balances.
#[derive(Debug, Default)]
pub struct Wallet {
    balances: BTreeMap<CurrencyKind, Amount>,
    earnings: Vec<Earning>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, currency: CurrencyKind, amount: u64) -> Self {
        self.balances.insert(currency, Amount::new(amount));
        self
    }

    /// Overwrite a balance, bypassing tracking.
    pub fn set_balance(&mut self, currency: CurrencyKind, amount: Amount) {
        self.balances.insert(currency, amount);
    }

    /// Every balance, including currencies never touched (as zero).
    pub fn balances(&self) -> impl Iterator<Item = (CurrencyKind, Amount)> + '_ {
        CurrencyKind::ALL
            .into_iter()
            .map(|currency| (currency, self.balance(currency)))
    }

    /// Tracked credits in the order they happened.
    pub fn earnings(&self) -> &[Earning] {
        &self.earnings
    }
}

impl CurrencyLedger for Wallet {
    fn balance(&self, currency: CurrencyKind) -> Amount {
        self.balances.get(&currency).copied().unwrap_or_default()
    }

    fn debit(&mut self, currency: CurrencyKind, amount: Amount) -> Result<(), LedgerError> {
        let balance = self.balance(currency);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                currency,
                balance,
                requested: amount,
            })?;
        self.balances.insert(currency, remaining);
        debug!(%currency, %amount, balance = %remaining, "debited");
        Ok(())
    }

    fn credit(
        &mut self,
        currency: CurrencyKind,
        amount: Amount,
        tracked: bool,
        group: Option<&EconomyGroup>,
    ) {
        let entry = self.balances.entry(currency).or_default();
        *entry += amount;
        let balance = *entry;
        debug!(%currency, %amount, %balance, tracked, "credited");
        if tracked {
            self.earnings.push(Earning {
                currency,
                amount,
                group: group.cloned(),
            });
        }
    }
}
