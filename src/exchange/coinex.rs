use crate::book::RawLevel;
use crate::config::ExchangeConfig;
use crate::exchange::{param, side_label, Collaborators, Exchange, ExchangeContext, Placed};
use crate::models::numeric::{optional_decimal, RawNumber};
use crate::models::precision::step_from_digits;
use crate::models::{
    AssetBalance, CoinConstraint, Order, OrderBookSnapshot, OrderStatus, Pair, PairConstraint,
    Side,
};
use crate::signing::{Md5Layout, Md5Signer, SignatureTarget};
use crate::status::{Observation, StatusTable};
use crate::{Error, Result};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const STATUS_TABLE: StatusTable = StatusTable::Names(&[
    ("not_deal", OrderStatus::New),
    ("part_deal", OrderStatus::Partial),
    ("done", OrderStatus::Filled),
    ("cancel", OrderStatus::Cancelled),
]);

pub fn signer() -> Md5Signer {
    Md5Signer {
        layout: Md5Layout::KeyValuePairs {
            secret_field: "secret_key",
        },
        uppercase: true,
        signature: SignatureTarget::Header("authorization"),
        key_param: Some("access_id"),
        timestamp_param: Some("tonce"),
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
struct AssetConfig {
    asset_name: String,
    #[serde(default)]
    can_deposit: Option<bool>,
    #[serde(default)]
    can_withdraw: Option<bool>,
    #[serde(default)]
    withdraw_tx_fee: Option<RawNumber>,
    #[serde(default)]
    deposit_least_confirmations: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MarketInfo {
    name: String,
    trading_name: String,
    pricing_name: String,
    trading_decimal: u32,
    pricing_decimal: u32,
    maker_fee_rate: RawNumber,
    taker_fee_rate: RawNumber,
}

#[derive(Debug, Deserialize)]
struct Depth {
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

#[derive(Debug, Deserialize)]
struct OrderState {
    id: u64,
    status: String,
    #[serde(default)]
    deal_amount: Option<RawNumber>,
    #[serde(default)]
    avg_price: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    available: RawNumber,
    frozen: RawNumber,
}

pub struct CoinexExchange {
    context: ExchangeContext,
}

impl CoinexExchange {
    pub fn new(config: ExchangeConfig, collaborators: Collaborators) -> Result<Self> {
        let context =
            ExchangeContext::new("coinex", config, Box::new(signer()), rejection, collaborators)?;
        Ok(Self { context })
    }

    fn data<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T> {
        let envelope: Envelope<T> = self.context.decode(body)?;
        Ok(envelope.data)
    }

    fn symbol(&self, pair: &Pair) -> Result<String> {
        Ok(self.context.require_pair(pair)?.ex_symbol)
    }

    fn coin_constraint(&self, ex_symbol: String, config: AssetConfig) -> Result<CoinConstraint> {
        let coin = self.context.registry().coin(&config.asset_name);
        let mut constraint = CoinConstraint::new(coin, ex_symbol);
        constraint.deposit_enabled = config.can_deposit;
        constraint.withdraw_enabled = config.can_withdraw;
        constraint.withdraw_fee = optional_decimal(config.withdraw_tx_fee.as_ref())?;
        constraint.min_confirmations = config.deposit_least_confirmations;
        Ok(constraint)
    }
}

impl Exchange for CoinexExchange {
    fn context(&self) -> &ExchangeContext {
        &self.context
    }

    /// Asset configs are keyed by upstream symbol. Multi-chain assets appear
    /// once per chain (`USDT-ERC20`); the chainless key wins when present.
    fn refresh_coins(&self) -> Result<usize> {
        let body = self
            .context
            .public(Method::GET, "/v1/common/asset/config", &[])?;
        let configs: BTreeMap<String, AssetConfig> = self.data(&body)?;

        let mut chosen: BTreeMap<String, (String, AssetConfig)> = BTreeMap::new();
        for (key, config) in configs {
            let asset = config.asset_name.clone();
            let chainless = key == asset;
            if chainless || !chosen.contains_key(&asset) {
                chosen.insert(asset, (key, config));
            }
        }

        let coins = chosen
            .into_values()
            .map(|(key, config)| self.coin_constraint(key, config))
            .collect::<Result<Vec<_>>>()
            .map_err(|err| Error::decode(err.to_string(), &body))?;
        Ok(self.context.store_coins(coins))
    }

    fn refresh_pairs(&self) -> Result<usize> {
        let body = self.context.public(Method::GET, "/v1/market/info", &[])?;
        let markets: BTreeMap<String, MarketInfo> = self.data(&body)?;
        let registry = self.context.registry();
        let mut pairs = Vec::with_capacity(markets.len());
        for market in markets.into_values() {
            let pair = registry.pair(&market.trading_name, &market.pricing_name);
            let mut constraint = PairConstraint::new(pair, market.name);
            constraint.lot_size = Some(step_from_digits(market.trading_decimal)?);
            constraint.price_filter = Some(step_from_digits(market.pricing_decimal)?);
            constraint.maker_fee = Some(market.maker_fee_rate.to_decimal()?);
            constraint.taker_fee = Some(market.taker_fee_rate.to_decimal()?);
            pairs.push(constraint);
        }
        Ok(self.context.store_pairs(pairs))
    }

    fn order_book(&self, pair: &Pair) -> Result<OrderBookSnapshot> {
        let params = vec![
            param("market", self.symbol(pair)?),
            param("limit", self.context.config().book_depth),
            param("merge", "0"),
        ];
        let (body, before, after) = self
            .context
            .timed(|| self.context.public(Method::GET, "/v1/market/depth", &params))?;
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
        let params = vec![
            param("market", &constraint.ex_symbol),
            param("type", side_label(side)),
            param("amount", quantity),
            param("price", rate),
        ];
        let body = self
            .context
            .signed_json(Method::POST, "/v1/order/limit", &params)?;
        let state: OrderState = self.data(&body)?;
        Ok(Placed {
            id: state.id.to_string(),
            raw: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    fn query_order(&self, order: &Order) -> Result<(Observation, String)> {
        let params = vec![
            param("id", &order.id),
            param("market", self.symbol(&order.pair)?),
        ];
        let body = self
            .context
            .signed(Method::GET, "/v1/order/status", &params, None)?;
        let state: OrderState = self.data(&body)?;
        let decimal = |value: Option<&RawNumber>| {
            optional_decimal(value).map_err(|err| Error::decode(err.to_string(), &body))
        };
        let observation = Observation {
            status: STATUS_TABLE.by_name(&state.status),
            deal_quantity: decimal(state.deal_amount.as_ref())?,
            deal_rate: decimal(state.avg_price.as_ref())?,
        };
        Ok((observation, String::from_utf8_lossy(&body).into_owned()))
    }

    fn submit_cancel(&self, order: &Order) -> Result<String> {
        let params = vec![
            param("id", &order.id),
            param("market", self.symbol(&order.pair)?),
        ];
        let body = self
            .context
            .signed(Method::DELETE, "/v1/order/pending", &params, None)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn fetch_balances(&self) -> Result<Vec<AssetBalance>> {
        let body = self
            .context
            .signed(Method::GET, "/v1/balance/info", &[], None)?;
        let entries: BTreeMap<String, BalanceEntry> = self.data(&body)?;
        let registry = self.context.registry();
        entries
            .iter()
            .map(|(code, entry)| {
                Ok(AssetBalance {
                    coin: registry.coin(code),
                    available: entry.available.to_decimal()?,
                    frozen: entry.frozen.to_decimal()?,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map_err(|err| Error::decode(err.to_string(), &body))
    }
}
