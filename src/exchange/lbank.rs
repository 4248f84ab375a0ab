use crate::book::RawLevel;
use crate::config::ExchangeConfig;
use crate::exchange::{param, side_label, Collaborators, Exchange, ExchangeContext, Placed};
use crate::models::numeric::{optional_decimal, RawNumber};
use crate::models::precision::step_from_digits;
use crate::models::{
    AssetBalance, CoinConstraint, Order, OrderBookSnapshot, OrderStatus, Pair, PairConstraint,
    Side,
};
use crate::signing::{RsaSigner, SignatureTarget};
use crate::status::{Observation, StatusTable};
use crate::{Error, Result};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

pub const STATUS_TABLE: StatusTable = StatusTable::Codes(&[
    (-1, OrderStatus::Cancelled),
    (0, OrderStatus::New),
    (1, OrderStatus::Partial),
    (2, OrderStatus::Filled),
    (3, OrderStatus::Cancelled),
    (4, OrderStatus::Cancelling),
]);

pub fn signer() -> RsaSigner {
    RsaSigner {
        signature: SignatureTarget::Param("sign"),
        key_param: Some("api_key"),
        timestamp_param: Some("timestamp"),
        nonce_param: None,
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error_code: i64,
    #[serde(default)]
    msg: String,
}

pub fn rejection(body: &[u8]) -> Option<Error> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    (envelope.error_code != 0).then(|| Error::rejected(envelope.error_code, envelope.msg))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawConfig {
    asset_code: String,
    #[serde(default)]
    can_with_draw: Option<bool>,
    #[serde(default)]
    fee: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Accuracy {
    symbol: String,
    quantity_accuracy: String,
    price_accuracy: String,
}

#[derive(Debug, Deserialize)]
struct Depth {
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

#[derive(Debug, Deserialize)]
struct OrderAck {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct OrderState {
    status: i64,
    #[serde(default)]
    deal_amount: Option<RawNumber>,
    #[serde(default)]
    avg_price: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    free: BTreeMap<String, RawNumber>,
    freeze: BTreeMap<String, RawNumber>,
}

/// `eth_btc` -> (`eth`, `btc`).
pub fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    let (base, target) = symbol.split_once('_')?;
    if base.is_empty() || target.is_empty() {
        return None;
    }
    Some((base, target))
}

fn digits(text: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|err| Error::InvalidInput(format!("invalid precision {text:?}: {err}")))
}

pub struct LbankExchange {
    context: ExchangeContext,
}

impl LbankExchange {
    pub fn new(config: ExchangeConfig, collaborators: Collaborators) -> Result<Self> {
        let context =
            ExchangeContext::new("lbank", config, Box::new(signer()), rejection, collaborators)?;
        Ok(Self { context })
    }

    fn data<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T> {
        let envelope: Envelope<T> = self.context.decode(body)?;
        Ok(envelope.data)
    }

    fn symbol(&self, pair: &Pair) -> Result<String> {
        Ok(self.context.require_pair(pair)?.ex_symbol)
    }

    fn pair_constraint(&self, accuracy: &Accuracy) -> Result<Option<PairConstraint>> {
        let Some((base, target)) = split_symbol(&accuracy.symbol) else {
            return Ok(None);
        };
        let pair = self.context.registry().pair(base, target);
        let mut constraint = PairConstraint::new(pair, accuracy.symbol.as_str());
        constraint.lot_size = Some(step_from_digits(digits(&accuracy.quantity_accuracy)?)?);
        constraint.price_filter = Some(step_from_digits(digits(&accuracy.price_accuracy)?)?);
        Ok(Some(constraint))
    }
}

impl Exchange for LbankExchange {
    fn context(&self) -> &ExchangeContext {
        &self.context
    }

    fn refresh_coins(&self) -> Result<usize> {
        let body = self
            .context
            .public(Method::GET, "/v2/withdrawConfigs.do", &[])?;
        let configs: Vec<WithdrawConfig> = self.data(&body)?;
        let registry = self.context.registry();

        let mut seen = BTreeSet::new();
        let mut coins = Vec::new();
        for config in configs {
            if !seen.insert(config.asset_code.clone()) {
                continue;
            }
            let mut constraint =
                CoinConstraint::new(registry.coin(&config.asset_code), config.asset_code.as_str());
            constraint.withdraw_enabled = config.can_with_draw;
            constraint.withdraw_fee = optional_decimal(config.fee.as_ref())
                .map_err(|err| Error::decode(err.to_string(), &body))?;
            coins.push(constraint);
        }
        Ok(self.context.store_coins(coins))
    }

    fn refresh_pairs(&self) -> Result<usize> {
        let body = self.context.public(Method::GET, "/v2/accuracy.do", &[])?;
        let accuracies: Vec<Accuracy> = self.data(&body)?;
        let mut pairs = Vec::with_capacity(accuracies.len());
        for accuracy in &accuracies {
            if let Some(constraint) = self.pair_constraint(accuracy)? {
                pairs.push(constraint);
            }
        }
        Ok(self.context.store_pairs(pairs))
    }

    fn order_book(&self, pair: &Pair) -> Result<OrderBookSnapshot> {
        let params = vec![
            param("symbol", self.symbol(pair)?),
            param("size", self.context.config().book_depth),
        ];
        let (body, before, after) = self
            .context
            .timed(|| self.context.public(Method::GET, "/v2/depth.do", &params))?;
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
            param("symbol", &constraint.ex_symbol),
            param("type", side_label(side)),
            param("price", rate),
            param("amount", quantity),
        ];
        let body = self
            .context
            .signed(Method::POST, "/v2/create_order.do", &params, None)?;
        let ack: OrderAck = self.data(&body)?;
        Ok(Placed {
            id: ack.order_id,
            raw: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    fn query_order(&self, order: &Order) -> Result<(Observation, String)> {
        let params = vec![
            param("symbol", self.symbol(&order.pair)?),
            param("order_id", &order.id),
        ];
        let body = self
            .context
            .signed(Method::POST, "/v2/orders_info.do", &params, None)?;
        let states: Vec<OrderState> = self.data(&body)?;
        let state = states
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("lbank order {}", order.id)))?;
        let decimal = |value: Option<&RawNumber>| {
            optional_decimal(value).map_err(|err| Error::decode(err.to_string(), &body))
        };
        let observation = Observation {
            status: STATUS_TABLE.by_code(state.status),
            deal_quantity: decimal(state.deal_amount.as_ref())?,
            deal_rate: decimal(state.avg_price.as_ref())?,
        };
        Ok((observation, String::from_utf8_lossy(&body).into_owned()))
    }

    fn submit_cancel(&self, order: &Order) -> Result<String> {
        let params = vec![
            param("symbol", self.symbol(&order.pair)?),
            param("order_id", &order.id),
        ];
        let body = self
            .context
            .signed(Method::POST, "/v2/cancel_order.do", &params, None)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn fetch_balances(&self) -> Result<Vec<AssetBalance>> {
        let body = self
            .context
            .signed(Method::POST, "/v2/user_info.do", &[], None)?;
        let info: UserInfo = self.data(&body)?;
        let registry = self.context.registry();
        info.free
            .iter()
            .map(|(code, free)| {
                let frozen = match info.freeze.get(code) {
                    Some(value) => value.to_decimal()?,
                    None => Decimal::ZERO,
                };
                Ok(AssetBalance {
                    coin: registry.coin(code),
                    available: free.to_decimal()?,
                    frozen,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map_err(|err| Error::decode(err.to_string(), &body))
    }
}
