//! Order status normalization.
//!
//! Each adapter declares a [`StatusTable`] describing its upstream vocabulary.
//! Polls are folded into an [`Order`] through [`apply`], which enforces the
//! canonical lifecycle:
//!
//! - terminal states (`Filled`, `Cancelled`, `Rejected`, `Expired`, `Other`) never change;
//! - `Cancelling` never goes back to `New` or `Partial`;
//! - `Partial` never goes back to `New`;
//! - `deal_quantity` never decreases.

use crate::models::{Order, OrderStatus};
use rust_decimal::Decimal;
use tracing::warn;

/// Upstream status vocabulary for one adapter.
#[derive(Clone, Copy, Debug)]
pub enum StatusTable {
    Codes(&'static [(i64, OrderStatus)]),
    Names(&'static [(&'static str, OrderStatus)]),
}

impl StatusTable {
    pub fn by_code(&self, code: i64) -> OrderStatus {
        let found = match self {
            StatusTable::Codes(entries) => entries
                .iter()
                .find(|(key, _)| *key == code)
                .map(|(_, status)| *status),
            StatusTable::Names(_) => None,
        };
        found.unwrap_or_else(|| {
            warn!(code, "unknown upstream order status");
            OrderStatus::Other
        })
    }

    pub fn by_name(&self, name: &str) -> OrderStatus {
        let found = match self {
            StatusTable::Names(entries) => entries
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, status)| *status),
            StatusTable::Codes(entries) => name.trim().parse::<i64>().ok().and_then(|code| {
                entries
                    .iter()
                    .find(|(key, _)| *key == code)
                    .map(|(_, status)| *status)
            }),
        };
        found.unwrap_or_else(|| {
            warn!(status = %name, "unknown upstream order status");
            OrderStatus::Other
        })
    }

    /// Documented upstream values, rendered as strings.
    pub fn keys(&self) -> Vec<String> {
        match self {
            StatusTable::Codes(entries) => entries.iter().map(|(key, _)| key.to_string()).collect(),
            StatusTable::Names(entries) => entries.iter().map(|(key, _)| key.to_string()).collect(),
        }
    }

    pub fn has_unique_keys(&self) -> bool {
        let mut keys = self.keys();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        keys.len() == total
    }
}

/// What a single status poll reported.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub status: OrderStatus,
    pub deal_quantity: Option<Decimal>,
    pub deal_rate: Option<Decimal>,
}

impl Observation {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status,
            deal_quantity: None,
            deal_rate: None,
        }
    }
}

/// Status for upstreams that only say "open" or "closed": progress comes from the fill.
pub fn infer_from_fill(amount: Decimal, filled: Decimal) -> OrderStatus {
    if filled <= Decimal::ZERO {
        OrderStatus::New
    } else if filled >= amount {
        OrderStatus::Filled
    } else {
        OrderStatus::Partial
    }
}

/// Average fill rate from cumulative quote and base volumes.
pub fn average_rate(quote_volume: Decimal, base_volume: Decimal) -> Option<Decimal> {
    if base_volume <= Decimal::ZERO {
        return None;
    }
    quote_volume.checked_div(base_volume)
}

pub fn transition(current: OrderStatus, observed: OrderStatus) -> OrderStatus {
    if current.is_terminal() {
        return current;
    }
    match (current, observed) {
        (OrderStatus::Cancelling, OrderStatus::New | OrderStatus::Partial) => current,
        (OrderStatus::Partial, OrderStatus::New) => current,
        _ => observed,
    }
}

pub fn apply(order: &mut Order, observation: Observation, raw: impl Into<String>) {
    order.status = transition(order.status, observation.status);

    if let Some(quantity) = observation.deal_quantity {
        if quantity >= order.deal_quantity {
            order.deal_quantity = quantity;
        } else {
            warn!(
                order_id = %order.id,
                previous = %order.deal_quantity,
                reported = %quantity,
                "ignoring decreasing deal quantity"
            );
        }
    }
    if let Some(rate) = observation.deal_rate {
        if rate > Decimal::ZERO {
            order.deal_rate = rate;
        }
    }
    order.raw = raw.into();
}

/// Local transition taken the moment a cancel request is accepted for sending.
pub fn mark_cancelling(order: &mut Order) {
    if order.status.is_open() {
        order.status = OrderStatus::Cancelling;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_sticky() {
        for terminal in [
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
            OrderStatus::Expired,
            OrderStatus::Other,
        ] {
            for observed in OrderStatus::ALL {
                assert_eq!(transition(terminal, observed), terminal);
            }
        }
    }

    #[test]
    fn open_states_follow_upstream_forward() {
        assert_eq!(
            transition(OrderStatus::New, OrderStatus::Partial),
            OrderStatus::Partial
        );
        assert_eq!(
            transition(OrderStatus::Partial, OrderStatus::Filled),
            OrderStatus::Filled
        );
        assert_eq!(
            transition(OrderStatus::Partial, OrderStatus::New),
            OrderStatus::Partial
        );
        assert_eq!(
            transition(OrderStatus::Cancelling, OrderStatus::Cancelled),
            OrderStatus::Cancelled
        );
        assert_eq!(
            transition(OrderStatus::Cancelling, OrderStatus::Filled),
            OrderStatus::Filled
        );
    }

    #[test]
    fn infers_progress_from_fill() {
        let amount = Decimal::new(2, 0);
        assert_eq!(infer_from_fill(amount, Decimal::ZERO), OrderStatus::New);
        assert_eq!(infer_from_fill(amount, Decimal::ONE), OrderStatus::Partial);
        assert_eq!(infer_from_fill(amount, amount), OrderStatus::Filled);
    }

    #[test]
    fn average_rate_needs_volume() {
        assert_eq!(average_rate(Decimal::new(50, 0), Decimal::ZERO), None);
        assert_eq!(
            average_rate(Decimal::new(50, 0), Decimal::new(2, 0)),
            Some(Decimal::new(25, 0))
        );
    }
}
