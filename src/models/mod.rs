pub mod numeric;
pub mod precision;
pub mod types;

pub use numeric::RawNumber;
pub use types::{
    AssetBalance, BookLevel, Coin, CoinConstraint, Order, OrderBookSnapshot, OrderStatus, Pair,
    PairConstraint, Side,
};
