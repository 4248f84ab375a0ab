//! Order book snapshot building.
//!
//! Upstream ladders are decoded into [`RawLevel`]s first, then every level is
//! converted to decimals. A single bad level fails the whole snapshot.

use crate::clock::Clock;
use crate::models::{BookLevel, OrderBookSnapshot, RawNumber};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// One ladder level in any of the shapes upstreams use: `["p", "q", ...]`,
/// `[p, q]`, or `{"price": .., "quantity": ..}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawLevel {
    Tuple(Vec<RawNumber>),
    Object {
        #[serde(alias = "rate")]
        price: RawNumber,
        #[serde(alias = "amount", alias = "size")]
        quantity: RawNumber,
    },
}

impl RawLevel {
    pub fn parse(&self) -> Result<BookLevel> {
        let (rate, quantity) = match self {
            RawLevel::Tuple(values) => {
                if values.len() < 2 {
                    return Err(Error::InvalidInput(format!(
                        "level has {} fields, expected at least 2",
                        values.len()
                    )));
                }
                (values[0].to_decimal()?, values[1].to_decimal()?)
            }
            RawLevel::Object { price, quantity } => (price.to_decimal()?, quantity.to_decimal()?),
        };
        if rate <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!("non-positive rate {rate}")));
        }
        if quantity < Decimal::ZERO {
            return Err(Error::InvalidInput(format!("negative quantity {quantity}")));
        }
        Ok(BookLevel { rate, quantity })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookSide {
    Bids,
    Asks,
}

impl BookSide {
    fn label(self) -> &'static str {
        match self {
            BookSide::Bids => "bid",
            BookSide::Asks => "ask",
        }
    }
}

/// Parses every level, then sorts best price first.
pub fn build_side(levels: &[RawLevel], side: BookSide) -> Result<Vec<BookLevel>> {
    let mut parsed = Vec::with_capacity(levels.len());
    for (index, level) in levels.iter().enumerate() {
        let level = level.parse().map_err(|err| Error::Decode {
            message: format!("{} level {index}: {err}", side.label()),
            raw: format!("{level:?}"),
        })?;
        parsed.push(level);
    }
    match side {
        BookSide::Bids => parsed.sort_by(|a, b| b.rate.cmp(&a.rate)),
        BookSide::Asks => parsed.sort_by(|a, b| a.rate.cmp(&b.rate)),
    }
    Ok(parsed)
}

pub fn build(
    bids: &[RawLevel],
    asks: &[RawLevel],
    before: DateTime<Utc>,
    after: DateTime<Utc>,
) -> Result<OrderBookSnapshot> {
    Ok(OrderBookSnapshot {
        bids: build_side(bids, BookSide::Bids)?,
        asks: build_side(asks, BookSide::Asks)?,
        before,
        after,
    })
}

/// Runs `fetch` bracketed by clock readings taken right before and after it.
pub fn timed<T>(
    clock: &dyn Clock,
    fetch: impl FnOnce() -> Result<T>,
) -> Result<(T, DateTime<Utc>, DateTime<Utc>)> {
    let before = clock.now();
    let value = fetch()?;
    let after = clock.now();
    Ok((value, before, after))
}
