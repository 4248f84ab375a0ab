use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Canonical asset identity owned by the coin registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Coin {
    pub id: u64,
    pub code: String,
    pub name: String,
    pub website: Option<String>,
    pub explorer: Option<String>,
}

/// Canonical (base, target) tuple. `target` is the quote side.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pair {
    pub id: u64,
    pub base: Coin,
    pub target: Coin,
}

impl Pair {
    pub fn code(&self) -> String {
        format!("{}/{}", self.base.code, self.target.code)
    }
}

/// Per-exchange coin metadata, addressed by the canonical coin id.
///
/// Optional fields are `None` when the upstream did not report them; a merge
/// never clears a previously known value.
#[derive(Clone, Debug, PartialEq)]
pub struct CoinConstraint {
    pub coin: Coin,
    pub ex_symbol: String,
    pub withdraw_fee: Option<Decimal>,
    pub deposit_enabled: Option<bool>,
    pub withdraw_enabled: Option<bool>,
    pub min_confirmations: Option<u32>,
    pub listed: bool,
}

impl CoinConstraint {
    pub fn new(coin: Coin, ex_symbol: impl Into<String>) -> Self {
        Self {
            coin,
            ex_symbol: ex_symbol.into(),
            withdraw_fee: None,
            deposit_enabled: None,
            withdraw_enabled: None,
            min_confirmations: None,
            listed: true,
        }
    }
}

/// Per-exchange pair metadata, addressed by the canonical pair id.
#[derive(Clone, Debug, PartialEq)]
pub struct PairConstraint {
    pub pair: Pair,
    pub ex_symbol: String,
    pub maker_fee: Option<Decimal>,
    pub taker_fee: Option<Decimal>,
    pub lot_size: Option<Decimal>,
    pub price_filter: Option<Decimal>,
    pub listed: bool,
}

impl PairConstraint {
    pub fn new(pair: Pair, ex_symbol: impl Into<String>) -> Self {
        Self {
            pair,
            ex_symbol: ex_symbol.into(),
            maker_fee: None,
            taker_fee: None,
            lot_size: None,
            price_filter: None,
            listed: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// Canonical order lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    New,
    Partial,
    Filled,
    Cancelling,
    Cancelled,
    Rejected,
    Expired,
    /// Upstream reported something outside the adapter's known vocabulary.
    Other,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::New,
        OrderStatus::Partial,
        OrderStatus::Filled,
        OrderStatus::Cancelling,
        OrderStatus::Cancelled,
        OrderStatus::Rejected,
        OrderStatus::Expired,
        OrderStatus::Other,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::Other
        )
    }

    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Partial)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub pair: Pair,
    pub id: String,
    pub side: Side,
    pub rate: Decimal,
    pub quantity: Decimal,
    pub status: OrderStatus,
    pub deal_rate: Decimal,
    pub deal_quantity: Decimal,
    /// Last upstream response for this order, verbatim.
    pub raw: String,
    /// Upstream response to the cancel request, verbatim.
    pub cancel_echo: Option<String>,
}

impl Order {
    pub fn placed(
        pair: Pair,
        id: impl Into<String>,
        side: Side,
        rate: Decimal,
        quantity: Decimal,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            pair,
            id: id.into(),
            side,
            rate,
            quantity,
            status: OrderStatus::New,
            deal_rate: Decimal::ZERO,
            deal_quantity: Decimal::ZERO,
            raw: raw.into(),
            cancel_echo: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookLevel {
    pub rate: Decimal,
    pub quantity: Decimal,
}

/// Bid/ask ladder captured between `before` and `after`.
///
/// Bids are sorted best (highest) first, asks best (lowest) first.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub before: DateTime<Utc>,
    pub after: DateTime<Utc>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn latency_ms(&self) -> i64 {
        (self.after - self.before).num_milliseconds()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetBalance {
    pub coin: Coin,
    pub available: Decimal,
    pub frozen: Decimal,
}

impl AssetBalance {
    pub fn total(&self) -> Decimal {
        self.available + self.frozen
    }
}
