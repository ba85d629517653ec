//! Error types for the resources flow.

use thiserror::Error;

use super::FlowState;
use crate::Amount;
use crate::ledger::LedgerError;
use crate::model::CurrencyKind;

/// Misuse of the flow API.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("flow already begun (state {0:?}), start a new flow instead")]
    AlreadyBegun(FlowState),
}

/// Commit refused. Balances are untouched when this is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error("insufficient {currency} at commit: balance {available}, required {required}")]
    InsufficientFunds {
        currency: CurrencyKind,
        required: Amount,
        available: Amount,
    },

    #[error("ledger refused debit: {0}")]
    Ledger(#[from] LedgerError),
}
