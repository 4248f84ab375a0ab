use crate::book;
use crate::cache::{BalanceCache, ConstraintCache};
use crate::clock::{Clock, NonceCounter, SystemClock};
use crate::config::ExchangeConfig;
use crate::models::precision::{ceil_to_step, floor_to_step};
use crate::models::{Coin, CoinConstraint, OrderBookSnapshot, Pair, PairConstraint, Side};
use crate::registry::Registry;
use crate::signing::{Credentials, SignRequest, Signer};
use crate::transport::{BlockingTransport, HttpRequest, HttpResponse, Transport};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Recognizes an exchange's structured error envelope in a response body.
pub type RejectionCheck = fn(&[u8]) -> Option<Error>;

/// Shared collaborators handed to every adapter.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    pub registry: Arc<Registry>,
}

impl Collaborators {
    pub fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            transport,
            clock,
            registry,
        }
    }

    pub fn live(timeout_secs: u64, registry: Arc<Registry>) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(BlockingTransport::new(timeout_secs)?),
            clock: Arc::new(SystemClock),
            registry,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fees {
    pub maker: Decimal,
    pub taker: Decimal,
}

/// Per-exchange handle owning that exchange's caches, signer and transport.
pub struct ExchangeContext {
    name: &'static str,
    config: ExchangeConfig,
    credentials: Credentials,
    signer: Box<dyn Signer>,
    reject: RejectionCheck,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    registry: Arc<Registry>,
    nonces: NonceCounter,
    coins: ConstraintCache<CoinConstraint>,
    pairs: ConstraintCache<PairConstraint>,
    balances: BalanceCache,
}

impl ExchangeContext {
    pub fn new(
        name: &'static str,
        config: ExchangeConfig,
        signer: Box<dyn Signer>,
        reject: RejectionCheck,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name,
            credentials: config.credentials(),
            config,
            signer,
            reject,
            transport: collaborators.transport,
            clock: collaborators.clock,
            registry: collaborators.registry,
            nonces: NonceCounter::new(),
            coins: ConstraintCache::new(),
            pairs: ConstraintCache::new(),
            balances: BalanceCache::new(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn coins(&self) -> &ConstraintCache<CoinConstraint> {
        &self.coins
    }

    pub fn pairs(&self) -> &ConstraintCache<PairConstraint> {
        &self.pairs
    }

    pub fn balances(&self) -> &BalanceCache {
        &self.balances
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_present()
    }

    pub fn ensure_auth(&self) -> Result<()> {
        self.credentials.ensure_present()
    }

    /// Request URL with form-encoded params. Signers see the unencoded text.
    fn url(&self, path: &str, params: &[(String, String)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}{}", self.config.base_url, path))
            .map_err(|err| Error::InvalidInput(format!("{} url for {path}: {err}", self.name)))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url.into())
    }

    pub fn public(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Vec<u8>> {
        let request = HttpRequest {
            method,
            url: self.url(path, params)?,
            headers: Vec::new(),
            body: None,
        };
        self.execute(&request)
    }

    pub fn signed(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<String>,
    ) -> Result<Vec<u8>> {
        self.ensure_auth()?;
        let timestamp_ms = self.clock.now_ms();
        let nonce = self.nonces.next(timestamp_ms);
        let artifact = self.signer.sign(
            &SignRequest {
                method: &method,
                path,
                params,
                body: body.as_deref(),
                timestamp_ms,
                nonce,
            },
            &self.credentials,
        )?;

        let request = HttpRequest {
            url: self.url(path, &artifact.params)?,
            method,
            headers: artifact.headers,
            body: artifact.body.or(body),
        };
        self.execute(&request)
    }

    /// Signs `params` like [`Self::signed`] but sends the signed set as a JSON
    /// object body instead of a query string.
    pub fn signed_json(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Vec<u8>> {
        self.ensure_auth()?;
        let timestamp_ms = self.clock.now_ms();
        let nonce = self.nonces.next(timestamp_ms);
        let artifact = self.signer.sign(
            &SignRequest {
                method: &method,
                path,
                params,
                body: None,
                timestamp_ms,
                nonce,
            },
            &self.credentials,
        )?;

        let fields: serde_json::Map<String, serde_json::Value> = artifact
            .params
            .into_iter()
            .map(|(key, value)| (key, serde_json::Value::String(value)))
            .collect();
        let request = HttpRequest {
            url: self.url(path, &[])?,
            method,
            headers: artifact.headers,
            body: Some(serde_json::Value::Object(fields).to_string()),
        };
        self.execute(&request)
    }

    fn execute(&self, request: &HttpRequest) -> Result<Vec<u8>> {
        debug!(exchange = self.name, method = %request.method, url = %request.url, "request");
        let response: HttpResponse = self.transport.send(request)?;
        if let Some(err) = (self.reject)(&response.body) {
            return Err(err);
        }
        if !response.is_success() {
            return Err(Error::Transport(format!(
                "{} response status: {}",
                self.name, response.status
            )));
        }
        Ok(response.body)
    }

    pub fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T> {
        serde_json::from_slice(body)
            .map_err(|err| Error::decode(format!("{} json decode failed: {err}", self.name), body))
    }

    pub fn timed<T>(
        &self,
        fetch: impl FnOnce() -> Result<T>,
    ) -> Result<(T, DateTime<Utc>, DateTime<Utc>)> {
        book::timed(self.clock.as_ref(), fetch)
    }

    pub fn snapshot(
        &self,
        bids: &[book::RawLevel],
        asks: &[book::RawLevel],
        before: DateTime<Utc>,
        after: DateTime<Utc>,
    ) -> Result<OrderBookSnapshot> {
        book::build(bids, asks, before, after)
    }

    /// Upserts a full coin refresh and flags coins missing from it as unlisted.
    pub fn store_coins(&self, fetched: Vec<CoinConstraint>) -> usize {
        let present: HashSet<u64> = fetched.iter().map(|item| item.coin.id).collect();
        let count = fetched.len();
        for constraint in fetched {
            self.coins.set(constraint);
        }
        let delisted = self.coins.mark_unlisted_except(&present);
        debug!(exchange = self.name, count, delisted, "coins refreshed");
        count
    }

    pub fn store_pairs(&self, fetched: Vec<PairConstraint>) -> usize {
        let present: HashSet<u64> = fetched.iter().map(|item| item.pair.id).collect();
        let count = fetched.len();
        for constraint in fetched {
            self.pairs.set(constraint);
        }
        let delisted = self.pairs.mark_unlisted_except(&present);
        debug!(exchange = self.name, count, delisted, "pairs refreshed");
        count
    }

    pub fn coin_constraint(&self, coin: &Coin) -> Option<CoinConstraint> {
        self.coins.get(coin.id)
    }

    pub fn pair_constraint(&self, pair: &Pair) -> Option<PairConstraint> {
        self.pairs.get(pair.id)
    }

    pub fn require_pair(&self, pair: &Pair) -> Result<PairConstraint> {
        self.pair_constraint(pair).ok_or_else(|| {
            Error::NotFound(format!("{} has no constraint for {}", self.name, pair.code()))
        })
    }

    pub fn symbol_for_coin(&self, coin: &Coin) -> Option<String> {
        self.coins.get(coin.id).map(|item| item.ex_symbol)
    }

    pub fn symbol_for_pair(&self, pair: &Pair) -> Option<String> {
        self.pairs.get(pair.id).map(|item| item.ex_symbol)
    }

    pub fn coin_for_symbol(&self, ex_symbol: &str) -> Option<Coin> {
        self.coins.find_by_symbol(ex_symbol).map(|item| item.coin)
    }

    pub fn pair_for_symbol(&self, ex_symbol: &str) -> Option<Pair> {
        self.pairs.find_by_symbol(ex_symbol).map(|item| item.pair)
    }

    pub fn lot_size(&self, pair: &Pair) -> Result<Decimal> {
        self.require_pair(pair)?
            .lot_size
            .ok_or_else(|| Error::NotFound(format!("lot size for {}", pair.code())))
    }

    pub fn price_filter(&self, pair: &Pair) -> Result<Decimal> {
        self.require_pair(pair)?
            .price_filter
            .ok_or_else(|| Error::NotFound(format!("price filter for {}", pair.code())))
    }

    pub fn fee(&self, pair: &Pair) -> Result<Fees> {
        let constraint = self.require_pair(pair)?;
        match (constraint.maker_fee, constraint.taker_fee) {
            (Some(maker), Some(taker)) => Ok(Fees { maker, taker }),
            _ => Err(Error::NotFound(format!("fees for {}", pair.code()))),
        }
    }

    /// Snaps quantity down to the lot size and the rate onto the price filter,
    /// rounding in the direction that never worsens the order for the caller.
    pub fn quantize(
        &self,
        constraint: &PairConstraint,
        side: Side,
        quantity: Decimal,
        rate: Decimal,
    ) -> Result<(Decimal, Decimal)> {
        if rate <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!("rate must be positive, got {rate}")));
        }
        let quantity = match constraint.lot_size {
            Some(step) => floor_to_step(quantity, step)?,
            None => quantity,
        };
        if quantity <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "quantity rounds to zero for {}",
                constraint.pair.code()
            )));
        }
        let rate = match (constraint.price_filter, side) {
            (Some(step), Side::Buy) => floor_to_step(rate, step)?,
            (Some(step), Side::Sell) => ceil_to_step(rate, step)?,
            (None, _) => rate,
        };
        if rate <= Decimal::ZERO {
            return Err(Error::InvalidInput(format!(
                "rate rounds to zero for {}",
                constraint.pair.code()
            )));
        }
        Ok((quantity, rate))
    }
}
