//! Core domain types for the resources flow.

use std::fmt;

use serde::Deserialize;

use crate::Amount;

/// Currencies a flow can be asked to spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyKind {
    /// Soft currency (coins). Shortfalls can be exchanged for premium.
    Primary,
    /// Hard currency (gems). Shortfalls are covered by buying packs.
    Premium,
    /// Premium-only resource that can't be bought.
    Secondary,
}

impl CurrencyKind {
    pub const ALL: [CurrencyKind; 3] = [
        CurrencyKind::Primary,
        CurrencyKind::Premium,
        CurrencyKind::Secondary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencyKind::Primary => "primary",
            CurrencyKind::Premium => "premium",
            CurrencyKind::Secondary => "secondary",
        }
    }
}

impl fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracking tag grouping purchases for analytics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EconomyGroup(String);

impl EconomyGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Group used for premium spent to cover a shortfall.
    pub fn not_enough_resources() -> Self {
        Self::new("not_enough_resources")
    }

    /// Group used for packs bought while a flow is running.
    pub fn premium_shop() -> Self {
        Self::new("premium_shop")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EconomyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to the item being bought. Only forwarded to UI and tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemRef(pub String);

/// One purchase attempt. Immutable once handed to a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub original_amount: Amount,
    pub currency: CurrencyKind,
    pub item_ref: Option<ItemRef>,
    pub economy_group: Option<EconomyGroup>,
    /// When false the flow stops once resources are available, without debiting.
    pub commit_on_success: bool,
}

impl TransactionRequest {
    pub fn new(original_amount: Amount, currency: CurrencyKind) -> Self {
        Self {
            original_amount,
            currency,
            item_ref: None,
            economy_group: None,
            commit_on_success: true,
        }
    }

    pub fn with_group(mut self, group: EconomyGroup) -> Self {
        self.economy_group = Some(group);
        self
    }

    pub fn with_item(mut self, item: ItemRef) -> Self {
        self.item_ref = Some(item);
        self
    }

    pub fn without_commit(mut self) -> Self {
        self.commit_on_success = false;
        self
    }
}

/// A purchasable bundle of premium currency.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CurrencyPack {
    pub sku: String,
    /// Premium currency granted by the pack.
    pub amount: Amount,
}

impl CurrencyPack {
    pub fn new(sku: impl Into<String>, amount: u64) -> Self {
        Self {
            sku: sku.into(),
            amount: Amount::new(amount),
        }
    }
}
