use crate::book::RawLevel;
use crate::config::ExchangeConfig;
use crate::exchange::{param, Collaborators, Exchange, ExchangeContext, Placed};
use crate::models::numeric::parse_decimal;
use crate::models::precision::step_from_increment;
use crate::models::{
    AssetBalance, CoinConstraint, Order, OrderBookSnapshot, OrderStatus, Pair, PairConstraint,
    Side,
};
use crate::signing::{
    HmacDigest, HmacPayload, HmacSigner, OutputEncoding, Placement, SecretEncoding,
};
use crate::status::{average_rate, Observation, StatusTable};
use crate::{Error, Result};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeSet;

pub const STATUS_TABLE: StatusTable = StatusTable::Names(&[
    ("NEW", OrderStatus::New),
    ("PENDING_NEW", OrderStatus::New),
    ("PARTIALLY_FILLED", OrderStatus::Partial),
    ("FILLED", OrderStatus::Filled),
    ("PENDING_CANCEL", OrderStatus::Cancelling),
    ("CANCELED", OrderStatus::Cancelled),
    ("REJECTED", OrderStatus::Rejected),
    ("EXPIRED", OrderStatus::Expired),
    ("EXPIRED_IN_MATCH", OrderStatus::Expired),
]);

/// Binance does not publish account fee tiers on public endpoints.
const DEFAULT_FEE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

pub fn signer() -> HmacSigner {
    HmacSigner {
        digest: HmacDigest::Sha256,
        output: OutputEncoding::Hex,
        secret: SecretEncoding::Raw,
        payload: HmacPayload::Query {
            sorted: false,
            timestamp_param: Some("timestamp"),
        },
        placement: Placement::Param {
            name: "signature",
            key_header: Some("X-MBX-APIKEY"),
        },
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    code: i64,
    msg: String,
}

/// Binance errors carry `{"code": <negative>, "msg": ..}`.
pub fn rejection(body: &[u8]) -> Option<Error> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    (envelope.code != 0).then(|| Error::rejected(envelope.code, envelope.msg))
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
    #[serde(default)]
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilter {
    filter_type: String,
    tick_size: Option<String>,
    step_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Depth {
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderAck {
    order_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderState {
    status: String,
    executed_qty: String,
    cummulative_quote_qty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    free: String,
    locked: String,
}

pub struct BinanceExchange {
    context: ExchangeContext,
}

impl BinanceExchange {
    pub fn new(config: ExchangeConfig, collaborators: Collaborators) -> Result<Self> {
        let context = ExchangeContext::new(
            "binance",
            config,
            Box::new(signer()),
            rejection,
            collaborators,
        )?;
        Ok(Self { context })
    }

    fn exchange_info(&self) -> Result<ExchangeInfo> {
        let body = self
            .context
            .public(Method::GET, "/api/v3/exchangeInfo", &[])?;
        self.context.decode(&body)
    }

    fn pair_constraint(&self, info: &SymbolInfo) -> Result<PairConstraint> {
        let pair = self
            .context
            .registry()
            .pair(&info.base_asset, &info.quote_asset);
        let mut constraint = PairConstraint::new(pair, info.symbol.as_str());
        constraint.listed = info.status == "TRADING";
        constraint.maker_fee = Some(DEFAULT_FEE);
        constraint.taker_fee = Some(DEFAULT_FEE);
        for filter in &info.filters {
            match (filter.filter_type.as_str(), &filter.step_size, &filter.tick_size) {
                ("LOT_SIZE", Some(step), _) => {
                    constraint.lot_size = Some(step_from_increment(step)?)
                }
                ("PRICE_FILTER", _, Some(tick)) => {
                    constraint.price_filter = Some(step_from_increment(tick)?)
                }
                _ => {}
            }
        }
        Ok(constraint)
    }

    fn symbol(&self, pair: &Pair) -> Result<String> {
        Ok(self.context.require_pair(pair)?.ex_symbol)
    }
}

fn side_param(side: Side) -> &'static str {
    match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

impl Exchange for BinanceExchange {
    fn context(&self) -> &ExchangeContext {
        &self.context
    }

    fn refresh_coins(&self) -> Result<usize> {
        let info = self.exchange_info()?;
        let assets: BTreeSet<&str> = info
            .symbols
            .iter()
            .flat_map(|symbol| [symbol.base_asset.as_str(), symbol.quote_asset.as_str()])
            .collect();
        let registry = self.context.registry();
        let coins = assets
            .into_iter()
            .map(|asset| CoinConstraint::new(registry.coin(asset), asset))
            .collect();
        Ok(self.context.store_coins(coins))
    }

    fn refresh_pairs(&self) -> Result<usize> {
        let info = self.exchange_info()?;
        let pairs = info
            .symbols
            .iter()
            .map(|symbol| self.pair_constraint(symbol))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.context.store_pairs(pairs))
    }

    fn order_book(&self, pair: &Pair) -> Result<OrderBookSnapshot> {
        let params = vec![
            param("symbol", self.symbol(pair)?),
            param("limit", self.context.config().book_depth),
        ];
        let (body, before, after) = self
            .context
            .timed(|| self.context.public(Method::GET, "/api/v3/depth", &params))?;
        let depth: Depth = self.context.decode(&body)?;
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
            param("side", side_param(side)),
            param("type", "LIMIT"),
            param("timeInForce", "GTC"),
            param("quantity", quantity),
            param("price", rate),
        ];
        let body = self
            .context
            .signed(Method::POST, "/api/v3/order", &params, None)?;
        let ack: OrderAck = self.context.decode(&body)?;
        Ok(Placed {
            id: ack.order_id.to_string(),
            raw: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    fn query_order(&self, order: &Order) -> Result<(Observation, String)> {
        let params = vec![
            param("symbol", self.symbol(&order.pair)?),
            param("orderId", &order.id),
        ];
        let body = self
            .context
            .signed(Method::GET, "/api/v3/order", &params, None)?;
        let state: OrderState = self.context.decode(&body)?;
        let raw = String::from_utf8_lossy(&body).into_owned();

        let executed = parse_decimal(&state.executed_qty)
            .map_err(|err| Error::decode(err.to_string(), &body))?;
        let quote = state
            .cummulative_quote_qty
            .as_deref()
            .map(parse_decimal)
            .transpose()
            .map_err(|err| Error::decode(err.to_string(), &body))?;
        let observation = Observation {
            status: STATUS_TABLE.by_name(&state.status),
            deal_quantity: Some(executed),
            deal_rate: quote.and_then(|quote| average_rate(quote, executed)),
        };
        Ok((observation, raw))
    }

    fn submit_cancel(&self, order: &Order) -> Result<String> {
        let params = vec![
            param("symbol", self.symbol(&order.pair)?),
            param("orderId", &order.id),
        ];
        let body = self
            .context
            .signed(Method::DELETE, "/api/v3/order", &params, None)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn fetch_balances(&self) -> Result<Vec<AssetBalance>> {
        let body = self
            .context
            .signed(Method::GET, "/api/v3/account", &[], None)?;
        let account: Account = self.context.decode(&body)?;
        let registry = self.context.registry();
        account
            .balances
            .iter()
            .map(|entry| {
                Ok(AssetBalance {
                    coin: registry.coin(&entry.asset),
                    available: parse_decimal(&entry.free)?,
                    frozen: parse_decimal(&entry.locked)?,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map_err(|err| Error::decode(err.to_string(), &body))
    }
}
