mod support;

use reqwest::Method;
use std::sync::Arc;
use std::thread;
use support::{Harness, BASE_URL};
use tradebridge::config::Config;
use tradebridge::exchange::ExchangeSet;
use tradebridge::Error;

fn mock_config() -> Config {
    let mut config = Config::default();
    for exchange in config.exchanges.values_mut() {
        exchange.base_url = BASE_URL.to_string();
    }
    config
}

#[test]
fn concurrent_first_use_initializes_once() {
    let harness = Harness::new();
    harness.transport.respond_fixture(
        Method::GET,
        "/api/v3/exchangeInfo",
        "binance_exchange_info.json",
    );
    let set = ExchangeSet::with_collaborators(mock_config(), harness.collaborators());

    let adapters = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| set.get("binance").expect("adapter")))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect::<Vec<_>>()
    });

    assert!(adapters
        .windows(2)
        .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    // One metadata call for coins and one for pairs.
    assert_eq!(harness.transport.count("/api/v3/exchangeInfo"), 2);
    assert_eq!(adapters[0].context().pairs().len(), 2);
    assert_eq!(adapters[0].context().coins().len(), 3);

    set.get("BINANCE").expect("case-insensitive");
    assert_eq!(harness.transport.count("/api/v3/exchangeInfo"), 2);
}

#[test]
fn refresh_failures_still_yield_an_adapter() {
    let harness = Harness::new();
    let set = ExchangeSet::with_collaborators(mock_config(), harness.collaborators());

    let exchange = set.get("coinex").expect("adapter");
    assert!(exchange.context().coins().is_empty());
    assert!(exchange.context().pairs().is_empty());
    assert_eq!(harness.transport.requests().len(), 2);
}

#[test]
fn construction_failure_is_cached() {
    let harness = Harness::new();
    let mut config = mock_config();
    if let Some(okx) = config.exchanges.get_mut("okx") {
        okx.book_depth = 0;
    }
    let set = ExchangeSet::with_collaborators(config, harness.collaborators());

    assert!(matches!(set.get("okx"), Err(Error::Config(_))));
    assert!(matches!(set.get("okx"), Err(Error::Config(_))));
    assert!(harness.transport.requests().is_empty());
}

#[test]
fn unknown_exchange_is_a_config_error() {
    let harness = Harness::new();
    let set = ExchangeSet::with_collaborators(mock_config(), harness.collaborators());

    assert!(matches!(set.get("kraken"), Err(Error::Config(_))));
    assert_eq!(
        set.names(),
        vec!["bigone", "binance", "coinex", "lbank", "okx"]
    );
}
