//! Contract between the flow and the UI surfaces it opens.

use std::fmt;

use crate::Amount;
use crate::model::CurrencyPack;

/// Opaque reference to an open UI step, issued by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupHandle(pub u64);

impl fmt::Display for PopupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    MissingPrimary,
    MissingPremium,
    /// Informational, the missing resource can't be bought.
    MissingSecondary,
    PremiumShop,
    BigAmountConfirmation,
}

/// Data a step is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInit {
    /// Offer to cover the missing primary currency with premium.
    /// `premium_cost` is `None` when no conversion exists.
    MissingPrimary {
        missing: Amount,
        premium_cost: Option<Amount>,
    },
    MissingPremium {
        missing: Amount,
        recommended: Option<CurrencyPack>,
    },
    MissingSecondary {
        missing: Amount,
    },
    PremiumShop,
    BigAmountConfirmation {
        amount: Amount,
        /// Whether the "don't ask again" control is shown.
        allow_opt_out: bool,
    },
}

impl StepInit {
    pub fn kind(&self) -> StepKind {
        match self {
            StepInit::MissingPrimary { .. } => StepKind::MissingPrimary,
            StepInit::MissingPremium { .. } => StepKind::MissingPremium,
            StepInit::MissingSecondary { .. } => StepKind::MissingSecondary,
            StepInit::PremiumShop => StepKind::PremiumShop,
            StepInit::BigAmountConfirmation { .. } => StepKind::BigAmountConfirmation,
        }
    }
}

/// Signals a step reports back. Which ones are meaningful depends on the step kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Accept,
    Cancel,
    /// The recommended pack was bought (the ledger is already credited).
    PackPurchased { sku: String },
    GoToShop,
    /// The shop closed after `packs_purchased` purchases.
    Closed { packs_purchased: u32 },
}

/// User-visible feedback the flow may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorNotice {
    UnknownError,
}

/// Opens and closes the UI steps of a flow.
pub trait PopupOrchestrator {
    fn open(&mut self, init: StepInit) -> PopupHandle;

    /// Closing a handle that is already closed is a no-op.
    fn close(&mut self, handle: PopupHandle);

    fn show_error(&mut self, notice: ErrorNotice);
}
