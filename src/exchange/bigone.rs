use crate::book::RawLevel;
use crate::config::ExchangeConfig;
use crate::exchange::{param, Collaborators, Exchange, ExchangeContext, Placed};
use crate::models::numeric::{optional_decimal, RawNumber};
use crate::models::precision::step_from_digits;
use crate::models::{
    AssetBalance, CoinConstraint, Order, OrderBookSnapshot, OrderStatus, Pair, PairConstraint,
    Side,
};
use crate::signing::TokenSigner;
use crate::status::{infer_from_fill, Observation, StatusTable};
use crate::{Error, Result};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

/// `PENDING` covers both untouched and partially filled orders; progress is
/// read from `filled_amount`.
pub const STATUS_TABLE: StatusTable = StatusTable::Names(&[
    ("PENDING", OrderStatus::New),
    ("FIRED", OrderStatus::New),
    ("FILLED", OrderStatus::Filled),
    ("CANCELLED", OrderStatus::Cancelled),
    ("REJECTED", OrderStatus::Rejected),
]);

pub fn signer() -> TokenSigner {
    TokenSigner {
        token_type: "OpenAPIV2",
        header: "Authorization",
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
}

pub fn rejection(body: &[u8]) -> Option<Error> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    (envelope.code != 0).then(|| Error::rejected(envelope.code, envelope.message))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct AssetPair {
    name: String,
    base_scale: u32,
    quote_scale: u32,
    base_asset: Asset,
    quote_asset: Asset,
}

#[derive(Debug, Deserialize)]
struct Asset {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Depth {
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

#[derive(Debug, Deserialize)]
struct OrderState {
    id: u64,
    state: String,
    amount: RawNumber,
    #[serde(default)]
    filled_amount: Option<RawNumber>,
    #[serde(default)]
    avg_deal_price: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
struct Account {
    asset_symbol: String,
    balance: RawNumber,
    locked_balance: RawNumber,
}

pub struct BigoneExchange {
    context: ExchangeContext,
}

impl BigoneExchange {
    pub fn new(config: ExchangeConfig, collaborators: Collaborators) -> Result<Self> {
        let context =
            ExchangeContext::new("bigone", config, Box::new(signer()), rejection, collaborators)?;
        Ok(Self { context })
    }

    fn data<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T> {
        let envelope: Envelope<T> = self.context.decode(body)?;
        Ok(envelope.data)
    }

    fn asset_pairs(&self) -> Result<Vec<AssetPair>> {
        let body = self
            .context
            .public(Method::GET, "/api/v3/asset_pairs", &[])?;
        self.data(&body)
    }
}

fn observe(state: &OrderState, body: &[u8]) -> Result<Observation> {
    let decimal = |value: Option<&RawNumber>| {
        optional_decimal(value).map_err(|err| Error::decode(err.to_string(), body))
    };
    let amount = decimal(Some(&state.amount))?.unwrap_or_default();
    let filled = decimal(state.filled_amount.as_ref())?.unwrap_or_default();
    let status = match STATUS_TABLE.by_name(&state.state) {
        OrderStatus::New => infer_from_fill(amount, filled),
        other => other,
    };
    Ok(Observation {
        status,
        deal_quantity: Some(filled),
        deal_rate: decimal(state.avg_deal_price.as_ref())?,
    })
}

fn side_param(side: Side) -> &'static str {
    match side {
        Side::Buy => "BID",
        Side::Sell => "ASK",
    }
}

impl Exchange for BigoneExchange {
    fn context(&self) -> &ExchangeContext {
        &self.context
    }

    fn refresh_coins(&self) -> Result<usize> {
        let mut assets: BTreeMap<String, Option<String>> = BTreeMap::new();
        for pair in self.asset_pairs()? {
            for asset in [pair.base_asset, pair.quote_asset] {
                assets.entry(asset.symbol).or_insert(asset.name);
            }
        }
        let registry = self.context.registry();
        let coins = assets
            .into_iter()
            .map(|(symbol, name)| {
                let coin = match name {
                    Some(name) => registry.describe_coin(&symbol, &name, None, None),
                    None => registry.coin(&symbol),
                };
                CoinConstraint::new(coin, symbol)
            })
            .collect();
        Ok(self.context.store_coins(coins))
    }

    fn refresh_pairs(&self) -> Result<usize> {
        let registry = self.context.registry();
        let mut pairs = Vec::new();
        for item in self.asset_pairs()? {
            let pair = registry.pair(&item.base_asset.symbol, &item.quote_asset.symbol);
            let mut constraint = PairConstraint::new(pair, item.name);
            constraint.lot_size = Some(step_from_digits(item.base_scale)?);
            constraint.price_filter = Some(step_from_digits(item.quote_scale)?);
            pairs.push(constraint);
        }
        Ok(self.context.store_pairs(pairs))
    }

    fn order_book(&self, pair: &Pair) -> Result<OrderBookSnapshot> {
        let symbol = self.context.require_pair(pair)?.ex_symbol;
        let path = format!("/api/v3/asset_pairs/{symbol}/depth");
        let params = vec![param("limit", self.context.config().book_depth)];
        let (body, before, after) = self
            .context
            .timed(|| self.context.public(Method::GET, &path, &params))?;
        let depth: Depth = self.data(&body)?;
        self.context.snapshot(&depth.bids, &depth.asks, before, after)
    }

    fn submit_limit(
        &self,
        constraint: &PairConstraint,
        side: Side,
        quantity: Decimal,
        rate: Decimal,
    ) -> Result<Placed> {
        let request = json!({
            "asset_pair_name": constraint.ex_symbol,
            "side": side_param(side),
            "price": rate.to_string(),
            "amount": quantity.to_string(),
            "type": "LIMIT",
        });
        let body = self.context.signed(
            Method::POST,
            "/api/v3/viewer/orders",
            &[],
            Some(request.to_string()),
        )?;
        let state: OrderState = self.data(&body)?;
        Ok(Placed {
            id: state.id.to_string(),
            raw: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    fn query_order(&self, order: &Order) -> Result<(Observation, String)> {
        let path = format!("/api/v3/viewer/orders/{}", order.id);
        let body = self.context.signed(Method::GET, &path, &[], None)?;
        let state: OrderState = self.data(&body)?;
        let observation = observe(&state, &body)?;
        Ok((observation, String::from_utf8_lossy(&body).into_owned()))
    }

    fn submit_cancel(&self, order: &Order) -> Result<String> {
        let path = format!("/api/v3/viewer/orders/{}/cancel", order.id);
        let body = self.context.signed(Method::POST, &path, &[], None)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn fetch_balances(&self) -> Result<Vec<AssetBalance>> {
        let body = self
            .context
            .signed(Method::GET, "/api/v3/viewer/accounts", &[], None)?;
        let accounts: Vec<Account> = self.data(&body)?;
        let registry = self.context.registry();
        accounts
            .iter()
            .map(|account| {
                let total = account.balance.to_decimal()?;
                let frozen = account.locked_balance.to_decimal()?;
                Ok(AssetBalance {
                    coin: registry.coin(&account.asset_symbol),
                    available: total - frozen,
                    frozen,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map_err(|err| Error::decode(err.to_string(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_orders_report_progress_from_filled_amount() {
        let state = OrderState {
            id: 7,
            state: "PENDING".to_string(),
            amount: RawNumber::from("2"),
            filled_amount: Some(RawNumber::from("0.5")),
            avg_deal_price: None,
        };
        let observation = observe(&state, b"{}").expect("observation");
        assert_eq!(observation.status, OrderStatus::Partial);
        assert_eq!(observation.deal_quantity, Some(Decimal::new(5, 1)));
    }
}
