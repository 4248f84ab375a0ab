use rust_decimal::Decimal;
use tradebridge::exchange::{bigone, binance, coinex, lbank, okx};
use tradebridge::models::{Order, OrderStatus, Side};
use tradebridge::registry::Registry;
use tradebridge::status::{self, Observation, StatusTable};

const TABLES: [(&str, StatusTable); 5] = [
    ("binance", binance::STATUS_TABLE),
    ("okx", okx::STATUS_TABLE),
    ("bigone", bigone::STATUS_TABLE),
    ("coinex", coinex::STATUS_TABLE),
    ("lbank", lbank::STATUS_TABLE),
];

fn open_order() -> Order {
    let registry = Registry::new();
    Order::placed(
        registry.pair("ETH", "BTC"),
        "1",
        Side::Buy,
        Decimal::new(5, 2),
        Decimal::ONE,
        "{}",
    )
}

#[test]
fn every_documented_status_has_a_canonical_mapping() {
    for (name, table) in TABLES {
        assert!(table.has_unique_keys(), "{name} has duplicate keys");
        let keys = table.keys();
        assert!(!keys.is_empty(), "{name} table is empty");
        for key in keys {
            assert_ne!(
                table.by_name(&key),
                OrderStatus::Other,
                "{name} maps {key} to Other"
            );
        }
    }
}

#[test]
fn undocumented_values_normalize_to_other() {
    for (_, table) in TABLES {
        assert_eq!(table.by_name("definitely-not-a-status"), OrderStatus::Other);
        assert_eq!(table.by_code(99), OrderStatus::Other);
    }
}

#[test]
fn numeric_codes_resolve_from_text_and_integers() {
    assert_eq!(lbank::STATUS_TABLE.by_code(-1), OrderStatus::Cancelled);
    assert_eq!(lbank::STATUS_TABLE.by_name("2"), OrderStatus::Filled);
    assert_eq!(lbank::STATUS_TABLE.by_code(4), OrderStatus::Cancelling);
}

#[test]
fn partial_code_with_matched_amount_sets_exact_deal_quantity() {
    const TABLE: StatusTable = StatusTable::Codes(&[
        (0, OrderStatus::New),
        (2, OrderStatus::Partial),
        (3, OrderStatus::Filled),
    ]);
    let mut order = open_order();
    let observation = Observation {
        status: TABLE.by_code(2),
        deal_quantity: Some(Decimal::new(5, 1)),
        deal_rate: None,
    };

    status::apply(&mut order, observation, r#"{"status":2,"matched_amount":"0.5"}"#);

    assert_eq!(order.status, OrderStatus::Partial);
    assert_eq!(order.deal_quantity, Decimal::new(5, 1));
    assert_eq!(order.deal_rate, Decimal::ZERO);
    assert!(order.raw.contains("matched_amount"));
}

#[test]
fn cancelling_survives_stale_open_polls() {
    let mut order = open_order();
    status::mark_cancelling(&mut order);
    assert_eq!(order.status, OrderStatus::Cancelling);

    status::apply(&mut order, Observation::status(OrderStatus::New), "{}");
    assert_eq!(order.status, OrderStatus::Cancelling);
    status::apply(&mut order, Observation::status(OrderStatus::Partial), "{}");
    assert_eq!(order.status, OrderStatus::Cancelling);
    status::apply(&mut order, Observation::status(OrderStatus::Cancelled), "{}");
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[test]
fn cancelling_a_finished_order_keeps_its_state() {
    let mut order = open_order();
    status::apply(&mut order, Observation::status(OrderStatus::Filled), "{}");
    status::mark_cancelling(&mut order);
    assert_eq!(order.status, OrderStatus::Filled);
}

#[test]
fn zero_rate_reports_do_not_erase_a_known_average() {
    let mut order = open_order();
    status::apply(
        &mut order,
        Observation {
            status: OrderStatus::Partial,
            deal_quantity: Some(Decimal::new(25, 2)),
            deal_rate: Some(Decimal::new(49, 3)),
        },
        "{}",
    );
    status::apply(
        &mut order,
        Observation {
            status: OrderStatus::Partial,
            deal_quantity: Some(Decimal::new(25, 2)),
            deal_rate: Some(Decimal::ZERO),
        },
        "{}",
    );
    assert_eq!(order.deal_rate, Decimal::new(49, 3));
}
