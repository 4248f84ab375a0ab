use crate::models::{CoinConstraint, PairConstraint};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;

/// A record keyed by a canonical numeric id that knows how to absorb a refresh.
pub trait Constraint: Clone + Send + Sync {
    fn id(&self) -> u64;

    fn ex_symbol(&self) -> &str;

    fn is_listed(&self) -> bool;

    fn set_listed(&mut self, listed: bool);

    /// Folds a freshly fetched record into `self`. Fields the fetch did not
    /// report keep their current value.
    fn merge(&mut self, update: Self);
}

impl Constraint for CoinConstraint {
    fn id(&self) -> u64 {
        self.coin.id
    }

    fn ex_symbol(&self) -> &str {
        &self.ex_symbol
    }

    fn is_listed(&self) -> bool {
        self.listed
    }

    fn set_listed(&mut self, listed: bool) {
        self.listed = listed;
    }

    fn merge(&mut self, update: Self) {
        self.coin = update.coin;
        self.ex_symbol = update.ex_symbol;
        self.listed = update.listed;
        if update.withdraw_fee.is_some() {
            self.withdraw_fee = update.withdraw_fee;
        }
        if update.deposit_enabled.is_some() {
            self.deposit_enabled = update.deposit_enabled;
        }
        if update.withdraw_enabled.is_some() {
            self.withdraw_enabled = update.withdraw_enabled;
        }
        if update.min_confirmations.is_some() {
            self.min_confirmations = update.min_confirmations;
        }
    }
}

impl Constraint for PairConstraint {
    fn id(&self) -> u64 {
        self.pair.id
    }

    fn ex_symbol(&self) -> &str {
        &self.ex_symbol
    }

    fn is_listed(&self) -> bool {
        self.listed
    }

    fn set_listed(&mut self, listed: bool) {
        self.listed = listed;
    }

    fn merge(&mut self, update: Self) {
        self.pair = update.pair;
        self.ex_symbol = update.ex_symbol;
        self.listed = update.listed;
        if update.maker_fee.is_some() {
            self.maker_fee = update.maker_fee;
        }
        if update.taker_fee.is_some() {
            self.taker_fee = update.taker_fee;
        }
        if update.lot_size.is_some() {
            self.lot_size = update.lot_size;
        }
        if update.price_filter.is_some() {
            self.price_filter = update.price_filter;
        }
    }
}

/// Concurrent store of constraints keyed by canonical id.
///
/// Every write happens under the key's shard lock, so a reader observes either
/// the previous complete record or the merged one.
pub struct ConstraintCache<C: Constraint> {
    entries: DashMap<u64, C>,
}

impl<C: Constraint> Default for ConstraintCache<C> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<C: Constraint> ConstraintCache<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<C> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    /// Upsert: inserts new ids, merges into existing ones.
    pub fn set(&self, constraint: C) {
        match self.entries.entry(constraint.id()) {
            Entry::Occupied(mut entry) => entry.get_mut().merge(constraint),
            Entry::Vacant(entry) => {
                entry.insert(constraint);
            }
        }
    }

    pub fn remove(&self, id: u64) -> Option<C> {
        self.entries.remove(&id).map(|(_, value)| value)
    }

    /// All records ordered by id.
    pub fn list(&self) -> Vec<C> {
        let mut items: Vec<C> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by_key(|item| item.id());
        items
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find_by_symbol(&self, ex_symbol: &str) -> Option<C> {
        self.entries
            .iter()
            .find(|entry| entry.value().ex_symbol() == ex_symbol)
            .map(|entry| entry.value().clone())
    }

    /// Flags every record whose id is not in `present` as unlisted.
    pub fn mark_unlisted_except(&self, present: &HashSet<u64>) -> usize {
        let mut delisted = 0;
        for mut entry in self.entries.iter_mut() {
            if !present.contains(entry.key()) && entry.value().is_listed() {
                entry.value_mut().set_listed(false);
                delisted += 1;
            }
        }
        delisted
    }
}
