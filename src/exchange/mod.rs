pub mod bigone;
pub mod binance;
pub mod coinex;
pub mod context;
pub mod lbank;
pub mod okx;
pub mod set;

pub use context::{Collaborators, ExchangeContext, Fees, RejectionCheck};
pub use set::ExchangeSet;

use crate::config::ExchangeConfig;
use crate::models::{
    AssetBalance, Coin, CoinConstraint, Order, OrderBookSnapshot, Pair, PairConstraint, Side,
};
use crate::status::{self, Observation};
use crate::{Error, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Upstream acknowledgement of a placed order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placed {
    pub id: String,
    pub raw: String,
}

/// Uniform contract every exchange adapter exposes to the trading engine.
///
/// Adapters implement the upstream-facing methods (`refresh_*`, `order_book`,
/// `submit_*`, `query_order`, `fetch_balances`). The engine-facing order
/// operations are provided here so the credential check, quantization and
/// status bookkeeping are the same for every exchange.
pub trait Exchange: Send + Sync {
    fn context(&self) -> &ExchangeContext;

    /// Full refresh of the coin constraints. Returns the number of coins seen.
    fn refresh_coins(&self) -> Result<usize>;

    /// Full refresh of the pair constraints. Returns the number of pairs seen.
    fn refresh_pairs(&self) -> Result<usize>;

    fn order_book(&self, pair: &Pair) -> Result<OrderBookSnapshot>;

    fn submit_limit(
        &self,
        constraint: &PairConstraint,
        side: Side,
        quantity: Decimal,
        rate: Decimal,
    ) -> Result<Placed>;

    /// Polls one order. Returns what upstream reported and the raw body.
    fn query_order(&self, order: &Order) -> Result<(Observation, String)>;

    /// Sends a cancel request and returns the raw upstream answer.
    fn submit_cancel(&self, order: &Order) -> Result<String>;

    fn fetch_balances(&self) -> Result<Vec<AssetBalance>>;

    fn name(&self) -> &'static str {
        self.context().name()
    }

    fn limit_buy(&self, pair: &Pair, quantity: Decimal, rate: Decimal) -> Result<Order> {
        self.place_limit(pair, Side::Buy, quantity, rate)
    }

    fn limit_sell(&self, pair: &Pair, quantity: Decimal, rate: Decimal) -> Result<Order> {
        self.place_limit(pair, Side::Sell, quantity, rate)
    }

    fn place_limit(
        &self,
        pair: &Pair,
        side: Side,
        quantity: Decimal,
        rate: Decimal,
    ) -> Result<Order> {
        let context = self.context();
        context.ensure_auth()?;
        let constraint = context.require_pair(pair)?;
        let (quantity, rate) = context.quantize(&constraint, side, quantity, rate)?;
        let placed = self.submit_limit(&constraint, side, quantity, rate)?;
        info!(
            exchange = context.name(),
            pair = %pair.code(),
            order_id = %placed.id,
            ?side,
            %quantity,
            %rate,
            "limit order placed"
        );
        Ok(Order::placed(
            pair.clone(),
            placed.id,
            side,
            rate,
            quantity,
            placed.raw,
        ))
    }

    fn order_status(&self, order: &mut Order) -> Result<()> {
        self.context().ensure_auth()?;
        let (observation, raw) = self.query_order(order)?;
        status::apply(order, observation, raw);
        Ok(())
    }

    /// Issues the cancel and moves the order to `Cancelling` without waiting
    /// for upstream confirmation. A failed request leaves the order untouched.
    fn cancel_order(&self, order: &mut Order) -> Result<()> {
        self.context().ensure_auth()?;
        let echo = self.submit_cancel(order)?;
        order.cancel_echo = Some(echo);
        status::mark_cancelling(order);
        Ok(())
    }

    /// Best-effort balance refresh. Failures are logged and yield `0`.
    fn refresh_balances(&self) -> usize {
        let context = self.context();
        match self.fetch_balances() {
            Ok(balances) => {
                let count = balances.len();
                for balance in balances {
                    context.balances().set(balance);
                }
                count
            }
            Err(err) => {
                warn!(exchange = context.name(), error = %err, "balance refresh failed");
                0
            }
        }
    }

    fn balance(&self, coin: &Coin) -> Option<AssetBalance> {
        self.context().balances().get(coin.id)
    }

    fn coin_constraint(&self, coin: &Coin) -> Option<CoinConstraint> {
        self.context().coin_constraint(coin)
    }

    fn pair_constraint(&self, pair: &Pair) -> Option<PairConstraint> {
        self.context().pair_constraint(pair)
    }

    fn symbol_for_coin(&self, coin: &Coin) -> Option<String> {
        self.context().symbol_for_coin(coin)
    }

    fn symbol_for_pair(&self, pair: &Pair) -> Option<String> {
        self.context().symbol_for_pair(pair)
    }

    fn coin_for_symbol(&self, ex_symbol: &str) -> Option<Coin> {
        self.context().coin_for_symbol(ex_symbol)
    }

    fn pair_for_symbol(&self, ex_symbol: &str) -> Option<Pair> {
        self.context().pair_for_symbol(ex_symbol)
    }

    fn lot_size(&self, pair: &Pair) -> Result<Decimal> {
        self.context().lot_size(pair)
    }

    fn price_filter(&self, pair: &Pair) -> Result<Decimal> {
        self.context().price_filter(pair)
    }

    fn fee(&self, pair: &Pair) -> Result<Fees> {
        self.context().fee(pair)
    }
}

/// Builds the adapter for `config.name`.
pub fn build(config: &ExchangeConfig, collaborators: Collaborators) -> Result<Arc<dyn Exchange>> {
    let exchange: Arc<dyn Exchange> = match config.name.as_str() {
        "binance" => Arc::new(binance::BinanceExchange::new(config.clone(), collaborators)?),
        "okx" => Arc::new(okx::OkxExchange::new(config.clone(), collaborators)?),
        "bigone" => Arc::new(bigone::BigoneExchange::new(config.clone(), collaborators)?),
        "coinex" => Arc::new(coinex::CoinexExchange::new(config.clone(), collaborators)?),
        "lbank" => Arc::new(lbank::LbankExchange::new(config.clone(), collaborators)?),
        other => return Err(Error::Config(format!("unsupported exchange {other:?}"))),
    };
    Ok(exchange)
}

/// Upstream side label used by most exchanges.
pub(crate) fn side_label(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

pub(crate) fn param(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}
