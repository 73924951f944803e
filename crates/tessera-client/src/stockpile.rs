//! Per-resource stockpile totals.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tessera_types::ResourceType;

/// The local player's resource totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stockpile {
    totals: BTreeMap<ResourceType, Decimal>,
}

impl Stockpile {
    /// All totals at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signed `amount` and return the new total.
    pub fn credit(&mut self, resource: ResourceType, amount: Decimal) -> Decimal {
        let total = self.totals.entry(resource).or_default();
        *total = total.saturating_add(amount);
        *total
    }

    /// Overwrite one total.
    pub fn set(&mut self, resource: ResourceType, amount: Decimal) {
        self.totals.insert(resource, amount);
    }

    /// Current total for `resource`.
    pub fn amount(&self, resource: ResourceType) -> Decimal {
        self.totals.get(&resource).copied().unwrap_or_default()
    }

    /// Replace every total.
    pub fn hydrate<I>(&mut self, totals: I)
    where
        I: IntoIterator<Item = (ResourceType, Decimal)>,
    {
        self.totals = totals.into_iter().collect();
    }

    /// Every resource type with its total, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceType, Decimal)> + '_ {
        ResourceType::ALL
            .into_iter()
            .map(|resource| (resource, self.amount(resource)))
    }

    /// Zero every total.
    pub fn clear(&mut self) {
        self.totals.clear();
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn credits_accumulate_and_can_be_negative() {
        let mut stockpile = Stockpile::new();
        assert_eq!(stockpile.credit(ResourceType::Wood, dec!(5)), dec!(5));
        assert_eq!(stockpile.credit(ResourceType::Wood, dec!(2.5)), dec!(7.5));
        assert_eq!(stockpile.credit(ResourceType::Wood, dec!(-10)), dec!(-2.5));
        assert_eq!(stockpile.amount(ResourceType::Gold), Decimal::ZERO);
    }

    #[test]
    fn hydrate_replaces_everything() {
        let mut stockpile = Stockpile::new();
        stockpile.credit(ResourceType::Aether, dec!(1));
        stockpile.hydrate([(ResourceType::Food, dec!(100)), (ResourceType::Gold, dec!(50))]);
        assert_eq!(stockpile.amount(ResourceType::Aether), Decimal::ZERO);
        assert_eq!(stockpile.amount(ResourceType::Food), dec!(100));
        let listed: Vec<ResourceType> = stockpile.iter().map(|(r, _)| r).collect();
        assert_eq!(listed, ResourceType::ALL.to_vec());
    }

    #[test]
    fn clear_zeroes() {
        let mut stockpile = Stockpile::new();
        stockpile.set(ResourceType::Stone, dec!(3));
        stockpile.clear();
        assert_eq!(stockpile, Stockpile::default());
    }
}
