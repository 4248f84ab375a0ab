use crate::models::{Coin, Pair};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide canonical coin and pair identities.
///
/// Adapters resolve upstream codes through here so every exchange refers to
/// the same numeric ids. Codes are matched case-insensitively.
pub struct Registry {
    coins: DashMap<String, Coin>,
    coins_by_id: DashMap<u64, Coin>,
    pairs: DashMap<(u64, u64), Pair>,
    next_coin_id: AtomicU64,
    next_pair_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            coins: DashMap::new(),
            coins_by_id: DashMap::new(),
            pairs: DashMap::new(),
            next_coin_id: AtomicU64::new(1),
            next_pair_id: AtomicU64::new(1),
        }
    }
}

fn canonical_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the coin for `code`, registering it on first sight.
    pub fn coin(&self, code: &str) -> Coin {
        let code = canonical_code(code);
        let coin = self
            .coins
            .entry(code.clone())
            .or_insert_with(|| Coin {
                id: self.next_coin_id.fetch_add(1, Ordering::SeqCst),
                name: code.clone(),
                code,
                website: None,
                explorer: None,
            })
            .clone();
        self.coins_by_id.entry(coin.id).or_insert_with(|| coin.clone());
        coin
    }

    /// Registers or updates descriptive metadata, keeping the coin's id.
    pub fn describe_coin(
        &self,
        code: &str,
        name: &str,
        website: Option<&str>,
        explorer: Option<&str>,
    ) -> Coin {
        let id = self.coin(code).id;
        let mut updated = None;
        if let Some(mut entry) = self.coins.get_mut(&canonical_code(code)) {
            entry.name = name.to_string();
            entry.website = website.map(str::to_string);
            entry.explorer = explorer.map(str::to_string);
            updated = Some(entry.clone());
        }
        match updated {
            Some(coin) => {
                self.coins_by_id.insert(id, coin.clone());
                coin
            }
            None => self.coin(code),
        }
    }

    pub fn find_coin(&self, code: &str) -> Option<Coin> {
        self.coins
            .get(&canonical_code(code))
            .map(|entry| entry.value().clone())
    }

    pub fn coin_by_id(&self, id: u64) -> Option<Coin> {
        self.coins_by_id.get(&id).map(|entry| entry.value().clone())
    }

    /// Returns the pair for (`base`, `target`), registering coins and pair as needed.
    pub fn pair(&self, base: &str, target: &str) -> Pair {
        let base = self.coin(base);
        let target = self.coin(target);
        self.pairs
            .entry((base.id, target.id))
            .or_insert_with(|| Pair {
                id: self.next_pair_id.fetch_add(1, Ordering::SeqCst),
                base,
                target,
            })
            .clone()
    }

    pub fn find_pair(&self, base: &str, target: &str) -> Option<Pair> {
        let base = self.find_coin(base)?;
        let target = self.find_coin(target)?;
        self.pairs
            .get(&(base.id, target.id))
            .map(|entry| entry.value().clone())
    }

    pub fn coins(&self) -> Vec<Coin> {
        let mut coins: Vec<Coin> = self
            .coins
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        coins.sort_by_key(|coin| coin.id);
        coins
    }
}
