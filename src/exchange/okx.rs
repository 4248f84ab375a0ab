use crate::book::RawLevel;
use crate::config::ExchangeConfig;
use crate::exchange::{param, side_label, Collaborators, Exchange, ExchangeContext, Placed};
use crate::models::numeric::parse_decimal;
use crate::models::precision::step_from_increment;
use crate::models::{
    AssetBalance, CoinConstraint, Order, OrderBookSnapshot, OrderStatus, Pair, PairConstraint,
    Side,
};
use crate::signing::{
    HeaderNames, HmacDigest, HmacPayload, HmacSigner, OutputEncoding, Placement, SecretEncoding,
    TimestampFormat,
};
use crate::status::{Observation, StatusTable};
use crate::{Error, Result};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

pub const STATUS_TABLE: StatusTable = StatusTable::Names(&[
    ("live", OrderStatus::New),
    ("partially_filled", OrderStatus::Partial),
    ("filled", OrderStatus::Filled),
    ("canceled", OrderStatus::Cancelled),
    ("mmp_canceled", OrderStatus::Cancelled),
]);

/// Regular-tier spot fees. Account-specific tiers need a private call.
const MAKER_FEE: Decimal = Decimal::from_parts(8, 0, 0, false, 4);
const TAKER_FEE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

pub fn signer() -> HmacSigner {
    HmacSigner {
        digest: HmacDigest::Sha256,
        output: OutputEncoding::Base64,
        secret: SecretEncoding::Raw,
        payload: HmacPayload::Prehash {
            timestamp: TimestampFormat::Iso8601,
        },
        placement: Placement::Headers(HeaderNames {
            key: "OK-ACCESS-KEY",
            signature: "OK-ACCESS-SIGN",
            timestamp: "OK-ACCESS-TIMESTAMP",
            passphrase: Some("OK-ACCESS-PASSPHRASE"),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    code: String,
    #[serde(default)]
    msg: String,
}

/// Every OKX response is wrapped in `{"code": "0", "msg": "", "data": [..]}`.
pub fn rejection(body: &[u8]) -> Option<Error> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    (envelope.code != "0").then(|| Error::rejected(envelope.code, envelope.msg))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instrument {
    inst_id: String,
    base_ccy: String,
    quote_ccy: String,
    lot_sz: String,
    tick_sz: String,
    state: String,
}

#[derive(Debug, Deserialize)]
struct Book {
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderAck {
    ord_id: String,
    s_code: String,
    #[serde(default)]
    s_msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderState {
    state: String,
    acc_fill_sz: String,
    #[serde(default)]
    avg_px: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    details: Vec<BalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceDetail {
    ccy: String,
    avail_bal: String,
    frozen_bal: String,
}

pub struct OkxExchange {
    context: ExchangeContext,
}

impl OkxExchange {
    pub fn new(config: ExchangeConfig, collaborators: Collaborators) -> Result<Self> {
        let context =
            ExchangeContext::new("okx", config, Box::new(signer()), rejection, collaborators)?;
        Ok(Self { context })
    }

    fn first<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T> {
        let envelope: Envelope<T> = self.context.decode(body)?;
        envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::decode("okx response data is empty", body))
    }

    fn instruments(&self) -> Result<Vec<Instrument>> {
        let params = vec![param("instType", "SPOT")];
        let body = self
            .context
            .public(Method::GET, "/api/v5/public/instruments", &params)?;
        let envelope: Envelope<Instrument> = self.context.decode(&body)?;
        Ok(envelope.data)
    }

    fn symbol(&self, pair: &Pair) -> Result<String> {
        Ok(self.context.require_pair(pair)?.ex_symbol)
    }
}

impl Exchange for OkxExchange {
    fn context(&self) -> &ExchangeContext {
        &self.context
    }

    fn refresh_coins(&self) -> Result<usize> {
        let instruments = self.instruments()?;
        let codes: BTreeSet<&str> = instruments
            .iter()
            .flat_map(|item| [item.base_ccy.as_str(), item.quote_ccy.as_str()])
            .collect();
        let registry = self.context.registry();
        let coins = codes
            .into_iter()
            .map(|code| CoinConstraint::new(registry.coin(code), code))
            .collect();
        Ok(self.context.store_coins(coins))
    }

    fn refresh_pairs(&self) -> Result<usize> {
        let registry = self.context.registry();
        let mut pairs = Vec::new();
        for item in self.instruments()? {
            let pair = registry.pair(&item.base_ccy, &item.quote_ccy);
            let mut constraint = PairConstraint::new(pair, item.inst_id);
            constraint.listed = item.state == "live";
            constraint.lot_size = Some(step_from_increment(&item.lot_sz)?);
            constraint.price_filter = Some(step_from_increment(&item.tick_sz)?);
            constraint.maker_fee = Some(MAKER_FEE);
            constraint.taker_fee = Some(TAKER_FEE);
            pairs.push(constraint);
        }
        Ok(self.context.store_pairs(pairs))
    }

    fn order_book(&self, pair: &Pair) -> Result<OrderBookSnapshot> {
        let params = vec![
            param("instId", self.symbol(pair)?),
            param("sz", self.context.config().book_depth),
        ];
        let (body, before, after) = self
            .context
            .timed(|| self.context.public(Method::GET, "/api/v5/market/books", &params))?;
        let book: Book = self.first(&body)?;
        self.context.snapshot(&book.bids, &book.asks, before, after)
    }

    fn submit_limit(
        &self,
        constraint: &PairConstraint,
        side: Side,
        quantity: Decimal,
        rate: Decimal,
    ) -> Result<Placed> {
        let request = json!({
            "instId": constraint.ex_symbol,
            "tdMode": "cash",
            "side": side_label(side),
            "ordType": "limit",
            "px": rate.to_string(),
            "sz": quantity.to_string(),
        });
        let body = self.context.signed(
            Method::POST,
            "/api/v5/trade/order",
            &[],
            Some(request.to_string()),
        )?;
        let ack: OrderAck = self.first(&body)?;
        if ack.s_code != "0" {
            return Err(Error::rejected(ack.s_code, ack.s_msg));
        }
        Ok(Placed {
            id: ack.ord_id,
            raw: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    fn query_order(&self, order: &Order) -> Result<(Observation, String)> {
        let params = vec![
            param("instId", self.symbol(&order.pair)?),
            param("ordId", &order.id),
        ];
        let body = self
            .context
            .signed(Method::GET, "/api/v5/trade/order", &params, None)?;
        let state: OrderState = self.first(&body)?;
        let filled =
            parse_decimal(&state.acc_fill_sz).map_err(|err| Error::decode(err.to_string(), &body))?;
        let average = if state.avg_px.trim().is_empty() {
            None
        } else {
            Some(parse_decimal(&state.avg_px).map_err(|err| Error::decode(err.to_string(), &body))?)
        };
        let observation = Observation {
            status: STATUS_TABLE.by_name(&state.state),
            deal_quantity: Some(filled),
            deal_rate: average,
        };
        Ok((observation, String::from_utf8_lossy(&body).into_owned()))
    }

    fn submit_cancel(&self, order: &Order) -> Result<String> {
        let symbol = self.symbol(&order.pair)?;
        let request = json!({
            "instId": symbol,
            "ordId": order.id,
        });
        let body = self.context.signed(
            Method::POST,
            "/api/v5/trade/cancel-order",
            &[],
            Some(request.to_string()),
        )?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn fetch_balances(&self) -> Result<Vec<AssetBalance>> {
        let body = self
            .context
            .signed(Method::GET, "/api/v5/account/balance", &[], None)?;
        let account: Account = self.first(&body)?;
        let registry = self.context.registry();
        account
            .details
            .iter()
            .map(|detail| {
                Ok(AssetBalance {
                    coin: registry.coin(&detail.ccy),
                    available: parse_decimal(&detail.avail_bal)?,
                    frozen: parse_decimal(&detail.frozen_bal)?,
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
    fn zero_code_is_success() {
        assert!(rejection(br#"{"code":"0","msg":"","data":[]}"#).is_none());
        let err = rejection(br#"{"code":"51001","msg":"Instrument ID does not exist"}"#)
            .expect("rejection");
        assert!(matches!(err, Error::ExchangeRejected { code, .. } if code == "51001"));
    }
}
