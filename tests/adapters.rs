mod support;

use reqwest::Method;
use rust_decimal::Decimal;
use std::str::FromStr;
use support::{private_key_pem, query_value, Harness, START_MS};
use tradebridge::exchange::{lbank, Exchange};
use tradebridge::models::{OrderStatus, Pair, Side};
use tradebridge::signing::{Credentials, SignRequest, Signer};
use tradebridge::Error;

fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).expect("decimal")
}

fn binance_with_pairs(harness: &Harness, private: bool) -> (std::sync::Arc<dyn Exchange>, Pair) {
    harness.transport.respond_fixture(
        Method::GET,
        "/api/v3/exchangeInfo",
        "binance_exchange_info.json",
    );
    let exchange = if private {
        harness.private("binance")
    } else {
        harness.public("binance")
    };
    assert_eq!(exchange.refresh_pairs().expect("pairs"), 2);
    let pair = harness.registry.find_pair("ETH", "BTC").expect("pair");
    (exchange, pair)
}

#[test]
fn coin_refresh_keys_constraints_by_upstream_symbol() {
    let harness = Harness::new();
    harness.transport.respond_fixture(
        Method::GET,
        "/v1/common/asset/config",
        "coinex_asset_config.json",
    );
    let exchange = harness.public("coinex");

    assert_eq!(exchange.refresh_coins().expect("coins"), 2);

    let btc = harness.registry.find_coin("BTC").expect("btc");
    let eth = harness.registry.find_coin("ETH").expect("eth");
    let btc_constraint = exchange.coin_constraint(&btc).expect("btc constraint");
    let eth_constraint = exchange.coin_constraint(&eth).expect("eth constraint");
    assert_eq!(btc_constraint.ex_symbol, "BTC");
    assert_eq!(eth_constraint.ex_symbol, "ETH");
    assert!(btc_constraint.listed && eth_constraint.listed);
    assert_eq!(btc_constraint.withdraw_fee, Some(dec("0.0005")));
    assert_eq!(btc_constraint.min_confirmations, Some(2));
    assert_eq!(eth_constraint.withdraw_enabled, Some(false));
    assert_eq!(exchange.context().coins().len(), 2);
}

#[test]
fn digit_count_precision_becomes_decimal_step() {
    let harness = Harness::new();
    harness
        .transport
        .respond_fixture(Method::GET, "/v2/accuracy.do", "lbank_accuracy.json");
    let exchange = harness.public("lbank");

    assert_eq!(exchange.refresh_pairs().expect("pairs"), 2);

    let pair = harness.registry.find_pair("ETH", "BTC").expect("pair");
    assert_eq!(exchange.lot_size(&pair).expect("lot"), dec("0.0001"));
    assert_eq!(exchange.price_filter(&pair).expect("tick"), dec("0.000001"));
    assert_eq!(exchange.symbol_for_pair(&pair).as_deref(), Some("eth_btc"));

    let lbk = harness.registry.find_pair("LBK", "USDT").expect("lbk pair");
    assert_eq!(exchange.lot_size(&lbk).expect("lot"), Decimal::ONE);
}

#[test]
fn binance_pairs_read_filters_status_and_symbols() {
    let harness = Harness::new();
    let (exchange, pair) = binance_with_pairs(&harness, false);

    assert_eq!(exchange.lot_size(&pair).expect("lot"), dec("0.0001"));
    assert_eq!(exchange.price_filter(&pair).expect("tick"), dec("0.000001"));
    let fees = exchange.fee(&pair).expect("fees");
    assert_eq!(fees.maker, dec("0.001"));
    assert_eq!(exchange.pair_for_symbol("ETHBTC"), Some(pair.clone()));
    assert_eq!(exchange.symbol_for_pair(&pair).as_deref(), Some("ETHBTC"));

    let halted = harness.registry.find_pair("BNB", "BTC").expect("bnb pair");
    assert!(!exchange.pair_constraint(&halted).expect("constraint").listed);
}

#[test]
fn refresh_merges_and_flags_missing_entries_unlisted() {
    let harness = Harness::new();
    harness.transport.respond_fixture(
        Method::GET,
        "/v1/common/asset/config",
        "coinex_asset_config.json",
    );
    let exchange = harness.public("coinex");
    exchange.refresh_coins().expect("first refresh");

    harness.transport.respond_ok(
        Method::GET,
        "/v1/common/asset/config",
        r#"{"code":0,"data":{"BTC":{"asset_name":"BTC","withdraw_tx_fee":"0.0004"}},"message":"OK"}"#,
    );
    assert_eq!(exchange.refresh_coins().expect("second refresh"), 1);

    let btc = harness.registry.find_coin("BTC").expect("btc");
    let eth = harness.registry.find_coin("ETH").expect("eth");
    let btc_constraint = exchange.coin_constraint(&btc).expect("btc");
    assert_eq!(btc_constraint.withdraw_fee, Some(dec("0.0004")));
    assert_eq!(btc_constraint.min_confirmations, Some(2));
    assert!(btc_constraint.listed);

    let eth_constraint = exchange.coin_constraint(&eth).expect("eth kept");
    assert!(!eth_constraint.listed);
    assert_eq!(eth_constraint.min_confirmations, Some(12));
}

#[test]
fn repeated_refresh_is_idempotent() {
    let harness = Harness::new();
    let (exchange, _) = binance_with_pairs(&harness, false);
    let first = exchange.context().pairs().list();
    exchange.refresh_pairs().expect("again");
    assert_eq!(exchange.context().pairs().list(), first);
}

#[test]
fn orders_without_credentials_fail_before_any_request() {
    let harness = Harness::new();
    let (exchange, pair) = binance_with_pairs(&harness, false);
    let before = harness.transport.requests().len();

    let err = exchange
        .limit_buy(&pair, dec("1"), dec("0.05"))
        .expect_err("no credentials");
    assert!(matches!(err, Error::AuthMissing(_)));
    assert!(matches!(
        exchange.fetch_balances(),
        Err(Error::AuthMissing(_))
    ));
    assert_eq!(harness.transport.requests().len(), before);
}

#[test]
fn limit_orders_are_quantized_and_start_new() {
    let harness = Harness::new();
    let (exchange, pair) = binance_with_pairs(&harness, true);
    harness.transport.respond_ok(
        Method::POST,
        "/api/v3/order",
        r#"{"symbol":"ETHBTC","orderId":28,"clientOrderId":"abc","transactTime":1700000000000}"#,
    );

    let buy = exchange
        .limit_buy(&pair, dec("1.23456"), dec("0.0500019"))
        .expect("buy");
    assert_eq!(buy.status, OrderStatus::New);
    assert_eq!(buy.id, "28");
    assert_eq!(buy.side, Side::Buy);
    assert_eq!(buy.quantity, dec("1.2345"));
    assert_eq!(buy.rate, dec("0.050001"));
    assert!(buy.raw.contains("\"orderId\":28"));

    let request = harness.transport.last();
    assert_eq!(query_value(&request, "quantity").as_deref(), Some("1.2345"));
    assert_eq!(query_value(&request, "price").as_deref(), Some("0.050001"));
    assert_eq!(query_value(&request, "side").as_deref(), Some("BUY"));
    assert!(query_value(&request, "signature").is_some());
    assert_eq!(request.header("X-MBX-APIKEY"), Some("key"));

    let sell = exchange
        .limit_sell(&pair, dec("1.23456"), dec("0.0500011"))
        .expect("sell");
    assert_eq!(sell.rate, dec("0.050002"));
}

#[test]
fn quantities_below_one_lot_are_rejected_locally() {
    let harness = Harness::new();
    let (exchange, pair) = binance_with_pairs(&harness, true);

    let err = exchange
        .limit_buy(&pair, dec("0.00001"), dec("0.05"))
        .expect_err("too small");
    assert!(matches!(err, Error::InvalidInput(_)));
    let err = exchange
        .limit_sell(&pair, dec("1"), Decimal::ZERO)
        .expect_err("zero rate");
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(harness.transport.count("/api/v3/order"), 0);
}

#[test]
fn unknown_pairs_are_not_found() {
    let harness = Harness::new();
    let (exchange, _) = binance_with_pairs(&harness, true);
    let unknown = harness.registry.pair("DOGE", "BTC");

    let err = exchange
        .limit_buy(&unknown, dec("1"), dec("0.000001"))
        .expect_err("unknown pair");
    assert!(matches!(err, Error::NotFound(_)));
    assert!(exchange.fee(&unknown).is_err());
}

#[test]
fn upstream_error_payloads_are_exchange_rejections() {
    let harness = Harness::new();
    let (exchange, pair) = binance_with_pairs(&harness, true);
    harness.transport.respond(
        Method::POST,
        "/api/v3/order",
        400,
        r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#,
    );

    let err = exchange
        .limit_buy(&pair, dec("1"), dec("0.05"))
        .expect_err("rejected");
    match err {
        Error::ExchangeRejected { code, message } => {
            assert_eq!(code, "-2010");
            assert!(message.contains("insufficient balance"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn http_failures_without_envelope_are_transport_errors() {
    let harness = Harness::new();
    harness.transport.respond(
        Method::GET,
        "/api/v3/exchangeInfo",
        503,
        "<html>Service Unavailable</html>",
    );
    let exchange = harness.public("binance");

    let err = exchange.refresh_pairs().expect_err("503");
    assert!(matches!(err, Error::Transport(_)));
    assert!(exchange.context().pairs().is_empty());
}

#[test]
fn schema_mismatch_is_a_decode_error_with_raw_payload() {
    let harness = Harness::new();
    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/exchangeInfo",
        r#"{"symbols":"unexpected"}"#,
    );
    let exchange = harness.public("binance");

    match exchange.refresh_pairs() {
        Err(Error::Decode { raw, .. }) => assert!(raw.contains("unexpected")),
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn numeric_status_codes_report_partial_fills_exactly() {
    let harness = Harness::new();
    harness
        .transport
        .respond_fixture(Method::GET, "/v2/accuracy.do", "lbank_accuracy.json");
    let exchange = harness.private("lbank");
    exchange.refresh_pairs().expect("pairs");
    let pair = harness.registry.find_pair("ETH", "BTC").expect("pair");

    harness.transport.respond_ok(
        Method::POST,
        "/v2/create_order.do",
        r#"{"result":"true","data":{"order_id":"24f7ce27-af1d-4dca-a8c1-ef1cbeec1b23"},"error_code":0}"#,
    );
    let mut order = exchange
        .limit_buy(&pair, dec("1"), dec("0.05"))
        .expect("order");
    assert!(query_value(&harness.transport.last(), "sign").is_some());

    harness.transport.respond_ok(
        Method::POST,
        "/v2/orders_info.do",
        r#"{"result":"true","data":[{"order_id":"24f7ce27","status":1,"deal_amount":"0.5","avg_price":"0.0499","amount":"1"}],"error_code":0}"#,
    );
    exchange.order_status(&mut order).expect("status");
    assert_eq!(order.status, OrderStatus::Partial);
    assert_eq!(order.deal_quantity, dec("0.5"));
    assert_eq!(order.deal_rate, dec("0.0499"));
    assert!(order.raw.contains("\"status\":1"));
}

#[test]
fn cancel_is_local_first_and_confirmed_by_polling() {
    let harness = Harness::new();
    let (exchange, pair) = binance_with_pairs(&harness, true);
    harness.transport.respond_ok(
        Method::POST,
        "/api/v3/order",
        r#"{"symbol":"ETHBTC","orderId":31}"#,
    );
    let mut order = exchange
        .limit_sell(&pair, dec("2"), dec("0.06"))
        .expect("order");

    harness.transport.respond_ok(
        Method::DELETE,
        "/api/v3/order",
        r#"{"symbol":"ETHBTC","orderId":31,"status":"PENDING_CANCEL"}"#,
    );
    exchange.cancel_order(&mut order).expect("cancel");
    assert_eq!(order.status, OrderStatus::Cancelling);
    assert!(order
        .cancel_echo
        .as_deref()
        .expect("echo")
        .contains("PENDING_CANCEL"));

    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/order",
        r#"{"symbol":"ETHBTC","orderId":31,"status":"NEW","executedQty":"0","cummulativeQuoteQty":"0"}"#,
    );
    exchange.order_status(&mut order).expect("poll");
    assert_eq!(order.status, OrderStatus::Cancelling);

    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/order",
        r#"{"symbol":"ETHBTC","orderId":31,"status":"CANCELED","executedQty":"0","cummulativeQuoteQty":"0"}"#,
    );
    exchange.order_status(&mut order).expect("poll");
    assert_eq!(order.status, OrderStatus::Cancelled);

    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/order",
        r#"{"symbol":"ETHBTC","orderId":31,"status":"NEW","executedQty":"0","cummulativeQuoteQty":"0"}"#,
    );
    exchange.order_status(&mut order).expect("poll");
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[test]
fn failed_cancel_leaves_order_untouched() {
    let harness = Harness::new();
    let (exchange, pair) = binance_with_pairs(&harness, true);
    harness.transport.respond_ok(
        Method::POST,
        "/api/v3/order",
        r#"{"symbol":"ETHBTC","orderId":32}"#,
    );
    let mut order = exchange
        .limit_buy(&pair, dec("1"), dec("0.05"))
        .expect("order");
    harness.transport.respond(
        Method::DELETE,
        "/api/v3/order",
        400,
        r#"{"code":-2011,"msg":"Unknown order sent."}"#,
    );

    assert!(exchange.cancel_order(&mut order).is_err());
    assert_eq!(order.status, OrderStatus::New);
    assert!(order.cancel_echo.is_none());
}

#[test]
fn deal_quantity_never_decreases_and_rate_is_averaged() {
    let harness = Harness::new();
    let (exchange, pair) = binance_with_pairs(&harness, true);
    harness.transport.respond_ok(
        Method::POST,
        "/api/v3/order",
        r#"{"symbol":"ETHBTC","orderId":33}"#,
    );
    let mut order = exchange
        .limit_buy(&pair, dec("2"), dec("0.05"))
        .expect("order");

    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/order",
        r#"{"status":"PARTIALLY_FILLED","executedQty":"0.5","cummulativeQuoteQty":"0.025"}"#,
    );
    exchange.order_status(&mut order).expect("poll");
    assert_eq!(order.status, OrderStatus::Partial);
    assert_eq!(order.deal_quantity, dec("0.5"));
    assert_eq!(order.deal_rate, dec("0.05"));

    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/order",
        r#"{"status":"PARTIALLY_FILLED","executedQty":"0.4","cummulativeQuoteQty":"0.02"}"#,
    );
    exchange.order_status(&mut order).expect("poll");
    assert_eq!(order.deal_quantity, dec("0.5"));

    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/order",
        r#"{"status":"SOMETHING_NEW","executedQty":"0.5","cummulativeQuoteQty":"0.025"}"#,
    );
    exchange.order_status(&mut order).expect("unknown status is not an error");
    assert_eq!(order.status, OrderStatus::Other);
}

#[test]
fn balance_refresh_is_best_effort() {
    let harness = Harness::new();
    let exchange = harness.private("binance");

    assert_eq!(exchange.refresh_balances(), 0);
    assert!(exchange.context().balances().is_empty());

    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/account",
        r#"{"balances":[{"asset":"BTC","free":"0.5","locked":"0.1"},{"asset":"ETH","free":"3","locked":"0"}]}"#,
    );
    assert_eq!(exchange.refresh_balances(), 2);
    let btc = harness.registry.find_coin("BTC").expect("btc");
    let balance = exchange.balance(&btc).expect("btc balance");
    assert_eq!(balance.available, dec("0.5"));
    assert_eq!(balance.frozen, dec("0.1"));
    assert_eq!(balance.total(), dec("0.6"));

    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/account",
        r#"{"balances":[{"asset":"BTC","free":"0.2","locked":"0"}]}"#,
    );
    exchange.refresh_balances();
    let balance = exchange.balance(&btc).expect("btc balance");
    assert_eq!(balance.available, dec("0.2"));
    assert_eq!(balance.frozen, Decimal::ZERO);
}

#[test]
fn bigone_balances_split_locked_from_total() {
    let harness = Harness::new();
    let exchange = harness.private("bigone");
    harness.transport.respond_ok(
        Method::GET,
        "/api/v3/viewer/accounts",
        r#"{"code":0,"data":[{"asset_symbol":"BTC","balance":"1.5","locked_balance":"0.5"}]}"#,
    );

    assert_eq!(exchange.refresh_balances(), 1);
    let btc = harness.registry.find_coin("BTC").expect("btc");
    let balance = exchange.balance(&btc).expect("balance");
    assert_eq!(balance.available, Decimal::ONE);
    assert_eq!(balance.frozen, dec("0.5"));
    let request = harness.transport.last();
    assert!(request
        .header("Authorization")
        .expect("token")
        .starts_with("Bearer "));
}

#[test]
fn okx_orders_send_signed_json_bodies() {
    let harness = Harness::new();
    harness
        .transport
        .respond_fixture(Method::GET, "/api/v5/public/instruments", "okx_instruments.json");
    let exchange = harness.private("okx");
    exchange.refresh_pairs().expect("pairs");
    let pair = harness.registry.find_pair("BTC", "USDT").expect("pair");

    harness.transport.respond_ok(
        Method::POST,
        "/api/v5/trade/order",
        r#"{"code":"0","msg":"","data":[{"ordId":"312269865356374016","clOrdId":"","sCode":"0","sMsg":""}]}"#,
    );
    let order = exchange
        .limit_buy(&pair, dec("0.01"), dec("41000.05"))
        .expect("order");
    assert_eq!(order.id, "312269865356374016");
    assert_eq!(order.rate, dec("41000"));

    let request = harness.transport.last();
    let body: serde_json::Value =
        serde_json::from_str(request.body.as_deref().expect("body")).expect("json body");
    assert_eq!(body["instId"], "BTC-USDT");
    assert_eq!(body["side"], "buy");
    assert_eq!(body["px"], "41000");
    assert_eq!(request.header("OK-ACCESS-PASSPHRASE"), Some("phrase"));
    assert_eq!(
        request.header("OK-ACCESS-TIMESTAMP"),
        Some("2023-11-14T22:13:20.000Z")
    );

    harness.transport.respond_ok(
        Method::POST,
        "/api/v5/trade/order",
        r#"{"code":"1","msg":"All operations failed","data":[{"ordId":"","sCode":"51008","sMsg":"Order failed. Insufficient balance"}]}"#,
    );
    let err = exchange
        .limit_buy(&pair, dec("0.01"), dec("41000"))
        .expect_err("rejected");
    assert!(matches!(err, Error::ExchangeRejected { .. }));
}

#[test]
fn coinex_orders_post_signed_fields_as_json() {
    let harness = Harness::new();
    harness
        .transport
        .respond_fixture(Method::GET, "/v1/market/info", "coinex_market_info.json");
    let exchange = harness.private("coinex");
    exchange.refresh_pairs().expect("pairs");
    let pair = harness.registry.find_pair("ETH", "BTC").expect("pair");
    assert_eq!(exchange.lot_size(&pair).expect("lot"), dec("0.0001"));
    assert_eq!(exchange.fee(&pair).expect("fee").taker, dec("0.002"));

    harness.transport.respond_ok(
        Method::POST,
        "/v1/order/limit",
        r#"{"code":0,"data":{"id":13,"status":"not_deal","amount":"1","deal_amount":"0"},"message":"OK"}"#,
    );
    let order = exchange
        .limit_sell(&pair, dec("1"), dec("0.05"))
        .expect("order");
    assert_eq!(order.id, "13");

    let request = harness.transport.last();
    assert!(!request.url.contains('?'));
    let body: serde_json::Value =
        serde_json::from_str(request.body.as_deref().expect("body")).expect("json body");
    assert_eq!(body["access_id"], "key");
    assert_eq!(body["market"], "ETHBTC");
    assert_eq!(body["type"], "sell");
    assert_eq!(body["tonce"], "1700000000000");
    let signature = request.header("authorization").expect("signature");
    assert_eq!(signature.len(), 32);
    assert_eq!(signature, signature.to_uppercase());
}

#[test]
fn signature_params_are_form_encoded_in_the_url() {
    let harness = Harness::new();
    let exchange = harness.private("lbank");
    harness.transport.respond_ok(
        Method::POST,
        "/v2/user_info.do",
        r#"{"result":"true","data":{"free":{"btc":"1"},"freeze":{"btc":"0"}},"error_code":0}"#,
    );
    assert_eq!(exchange.refresh_balances(), 1);

    let expected = lbank::signer()
        .sign(
            &SignRequest {
                method: &Method::POST,
                path: "/v2/user_info.do",
                params: &[],
                body: None,
                timestamp_ms: START_MS,
                nonce: 0,
            },
            &Credentials::new("key", private_key_pem()),
        )
        .expect("sign");
    let signature = expected
        .params
        .iter()
        .find(|(key, _)| key == "sign")
        .map(|(_, value)| value.clone())
        .expect("sign param");
    assert!(signature.contains(['+', '/', '=']));

    let request = harness.transport.last();
    assert_eq!(query_value(&request, "sign"), Some(signature));
    let (_, query) = request.url.split_once('?').expect("query");
    assert!(!query.contains('+') && !query.contains('/'));
}

#[test]
fn extreme_precision_rejects_orders_instead_of_overflowing() {
    let harness = Harness::new();
    harness.transport.respond_ok(
        Method::GET,
        "/v2/accuracy.do",
        r#"{"result":"true","data":[{"symbol":"eth_btc","quantityAccuracy":"28","priceAccuracy":"6"}],"error_code":0}"#,
    );
    let exchange = harness.private("lbank");
    exchange.refresh_pairs().expect("pairs");
    let pair = harness.registry.find_pair("ETH", "BTC").expect("pair");

    let err = exchange
        .limit_buy(&pair, dec("10"), dec("0.05"))
        .expect_err("quotient overflows");
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(harness.transport.count("/v2/create_order.do"), 0);
}
