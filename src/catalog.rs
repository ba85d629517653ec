//! Premium pack catalog and pack recommendation.

use tracing::debug;

use crate::Amount;
use crate::model::CurrencyPack;

/// Source of purchasable premium packs.
pub trait PackCatalog {
    /// Premium packs, in any order.
    fn packs(&self) -> Vec<CurrencyPack>;
}

/// Fixed list of packs, e.g. loaded from a csv file.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    packs: Vec<CurrencyPack>,
}

impl StaticCatalog {
    pub fn new(packs: Vec<CurrencyPack>) -> Self {
        Self { packs }
    }

    pub fn find_sku(&self, sku: &str) -> Option<&CurrencyPack> {
        self.packs.iter().find(|pack| pack.sku == sku)
    }
}

impl PackCatalog for StaticCatalog {
    fn packs(&self) -> Vec<CurrencyPack> {
        self.packs.clone()
    }
}

/// First pack granting at least `target`, or the biggest one when none does.
///
/// `sorted` must be ordered by ascending amount. Returns `None` only for an
/// empty catalog.
pub fn find_pack(sorted: &[CurrencyPack], target: Amount) -> Option<&CurrencyPack> {
    sorted
        .iter()
        .find(|pack| pack.amount >= target)
        .or_else(|| sorted.last())
}

/// Recommends packs from a catalog sorted once, on first use.
#[derive(Debug, Default)]
pub struct Recommender {
    sorted: Option<Vec<CurrencyPack>>,
}

impl Recommender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recommend(&mut self, catalog: &dyn PackCatalog, target: Amount) -> Option<CurrencyPack> {
        let sorted = self.sorted.get_or_insert_with(|| {
            let mut packs = catalog.packs();
            packs.sort_by_key(|pack| pack.amount);
            debug!(packs = packs.len(), "pack catalog loaded");
            packs
        });
        find_pack(sorted, target).cloned()
    }
}
