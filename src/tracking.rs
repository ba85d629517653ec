//! Economy tracking events emitted on commit.

use tracing::info;

use crate::Amount;
use crate::model::{CurrencyKind, EconomyGroup, ItemRef};

/// Premium spent to cover a primary shortfall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeEvent {
    pub group: EconomyGroup,
    /// Group of the purchase the exchange funded, if any.
    pub origin: Option<EconomyGroup>,
    pub currency: CurrencyKind,
    pub amount: Amount,
    pub resulting_balance: Amount,
}

/// A completed purchase paid with in-game currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseEvent {
    pub group: EconomyGroup,
    pub item_ref: Option<ItemRef>,
    pub currency: CurrencyKind,
    pub amount: Amount,
    pub resulting_balance: Amount,
}

pub trait Tracker {
    fn notify_exchange(&mut self, event: ExchangeEvent);

    fn notify_purchase(&mut self, event: PurchaseEvent);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackedEvent {
    Exchange(ExchangeEvent),
    Purchase(PurchaseEvent),
}

/// Keeps every event in order and logs it.
#[derive(Debug, Default)]
pub struct TrackingLog {
    events: Vec<TrackedEvent>,
}

impl TrackingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TrackedEvent] {
        &self.events
    }
}

impl Tracker for TrackingLog {
    fn notify_exchange(&mut self, event: ExchangeEvent) {
        info!(
            group = %event.group,
            currency = %event.currency,
            amount = %event.amount,
            balance = %event.resulting_balance,
            "currency exchanged"
        );
        self.events.push(TrackedEvent::Exchange(event));
    }

    fn notify_purchase(&mut self, event: PurchaseEvent) {
        info!(
            group = %event.group,
            currency = %event.currency,
            amount = %event.amount,
            balance = %event.resulting_balance,
            "purchase completed"
        );
        self.events.push(TrackedEvent::Purchase(event));
    }
}
