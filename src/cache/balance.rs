use crate::models::AssetBalance;
use dashmap::DashMap;

/// Per-coin available/frozen amounts. A write replaces the coin's record whole.
#[derive(Default)]
pub struct BalanceCache {
    entries: DashMap<u64, AssetBalance>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coin_id: u64) -> Option<AssetBalance> {
        self.entries.get(&coin_id).map(|entry| entry.value().clone())
    }

    pub fn set(&self, balance: AssetBalance) {
        self.entries.insert(balance.coin.id, balance);
    }

    pub fn remove(&self, coin_id: u64) -> Option<AssetBalance> {
        self.entries.remove(&coin_id).map(|(_, value)| value)
    }

    pub fn list(&self) -> Vec<AssetBalance> {
        let mut items: Vec<AssetBalance> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by_key(|item| item.coin.id);
        items
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
