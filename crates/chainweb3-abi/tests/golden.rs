//! Golden fixture integration tests.
//!
//! Loads the ERC-20 ABI and a recorded Transfer log from `fixtures/`, maps
//! the ABI and checks selectors, call encoding and log decoding against
//! known-good values.

use std::sync::Arc;

use chainweb3_abi::{
    decode_method_return, encode_event_filter, encode_method, AbiModel, AbiValue,
    AllEventsLogDecoder, EventLogDecoder, LogDecoder, RawLog, Topic,
};
use indexmap::IndexMap;

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// The fixtures live two levels above the crate root.
fn fixture_path(rel: &str) -> std::path::PathBuf {
    let mut p = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("../../fixtures");
    p.push(rel);
    p
}

fn erc20() -> AbiModel {
    let json = std::fs::read_to_string(fixture_path("abi/erc20.json")).expect("fixture not found");
    AbiModel::from_json(&json).expect("ERC-20 ABI maps")
}

fn transfer_fixture() -> serde_json::Value {
    let json =
        std::fs::read_to_string(fixture_path("logs/erc20-transfer.json")).expect("fixture not found");
    serde_json::from_str(&json).unwrap()
}

// ─── Signatures ───────────────────────────────────────────────────────────────

#[test]
fn erc20_selectors() {
    let model = erc20();
    let expected = [
        ("name()", "0x06fdde03"),
        ("decimals()", "0x313ce567"),
        ("totalSupply()", "0x18160ddd"),
        ("balanceOf(address)", "0x70a08231"),
        ("allowance(address,address)", "0xdd62ed3e"),
        ("transfer(address,uint256)", "0xa9059cbb"),
        ("transfer(address,uint256,bytes)", "0xbe45fd62"),
        ("approve(address,uint256)", "0x095ea7b3"),
        ("transferFrom(address,address,uint256)", "0x23b872dd"),
    ];
    for (full_name, selector) in expected {
        let item = model
            .get_method(full_name)
            .unwrap_or_else(|| panic!("{full_name} not mapped"));
        assert_eq!(item.signature, selector, "{full_name}");
    }
}

#[test]
fn erc20_event_topics() {
    let model = erc20();
    assert_eq!(
        model.get_event("Transfer").unwrap().signature,
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
    );
    assert_eq!(
        model.get_event("Approval").unwrap().signature,
        "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925"
    );
}

#[test]
fn overloads_are_individually_reachable() {
    let model = erc20();
    let bare = model.get_method("transfer").unwrap();
    let two = model.get_method("0xa9059cbb").unwrap();
    let three = model.get_method("0xbe45fd62").unwrap();
    assert!(Arc::ptr_eq(bare, two));
    assert!(!Arc::ptr_eq(two, three));

    let data = encode_method(
        three,
        &[
            "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".into(),
            AbiValue::Uint(1),
            AbiValue::Bytes(vec![0xca, 0xfe]),
        ],
    )
    .unwrap();
    assert!(data.starts_with("0xbe45fd62"));
}

// ─── balanceOf call round trip ────────────────────────────────────────────────

#[test]
fn balance_of_request_and_response() {
    let model = erc20();
    let item = model.get_method("balanceOf").unwrap();
    let data = encode_method(item, &["0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".into()]).unwrap();
    assert_eq!(
        data,
        "0x70a08231000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045"
    );

    let response = "0x000000000000000000000000000000000000000000000000000000000000002a";
    assert_eq!(
        decode_method_return(item, response).unwrap(),
        Some(AbiValue::Uint(42))
    );
}

// ─── Transfer log ─────────────────────────────────────────────────────────────

#[test]
fn erc20_transfer_golden() {
    let fixture = transfer_fixture();
    let log: RawLog = serde_json::from_value(fixture["log"].clone()).unwrap();
    let expected = &fixture["expected"];

    let model = erc20();
    let decoder = EventLogDecoder::new(Arc::clone(model.get_event("Transfer").unwrap()));
    let decoded = decoder.decode(&log).unwrap();

    assert_eq!(decoded.event.as_deref(), expected["event"].as_str());
    assert_eq!(decoded.address, expected["address"].as_str().unwrap());
    assert_eq!(decoded.block_number, expected["blockNumber"].as_u64());
    assert_eq!(decoded.log_index, expected["logIndex"].as_u64());

    let values = expected["returnValues"].as_object().unwrap();
    assert_eq!(decoded.return_values.len(), values.len());
    for (key, want) in values {
        let got = decoded.value(key).unwrap_or_else(|| panic!("missing {key}"));
        assert_eq!(&got.to_json(), want, "{key}");
    }
    assert_eq!(decoded.raw.topics, log.topics);
    assert_eq!(decoded.raw.data, log.data);
}

#[test]
fn all_events_decoder_picks_transfer() {
    let fixture = transfer_fixture();
    let log: RawLog = serde_json::from_value(fixture["log"].clone()).unwrap();

    let decoder = AllEventsLogDecoder::new(Arc::new(erc20()));
    let decoded = decoder.decode(&log).unwrap();
    assert_eq!(decoded.event.as_deref(), Some("Transfer"));
    assert_eq!(decoded.signature.as_deref(), log.topics.first().map(String::as_str));
}

#[test]
fn filter_matches_the_recorded_log() {
    let fixture = transfer_fixture();
    let log: RawLog = serde_json::from_value(fixture["log"].clone()).unwrap();

    let model = erc20();
    let mut filter = IndexMap::new();
    filter.insert(
        "from".to_string(),
        AbiValue::Str("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".into()),
    );
    let topics = encode_event_filter(model.get_event("Transfer").unwrap(), &filter).unwrap();

    assert_eq!(topics[0], Topic::Single(log.topics[0].clone()));
    assert_eq!(topics[1], Topic::Single(log.topics[1].clone()));
    assert_eq!(topics[2], Topic::Any);
}
