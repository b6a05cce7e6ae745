mod common;

use common::Harness;
use connect_core::{ConnectError, ConnectionState, ProviderError};
use serde_json::{json, Value};

const SWITCH: &str = "wallet_switchEthereumChain";
const ADD: &str = "wallet_addEthereumChain";

async fn connected() -> Harness {
    let h = Harness::new().with_wallet();
    h.orchestrator.connect_metamask().await.unwrap();
    h
}

#[tokio::test]
async fn test_switch_success() {
    let h = connected().await;
    h.provider.respond_with(SWITCH, Value::Null);

    assert!(h.orchestrator.change_chain("0x89").await.unwrap());
    assert_eq!(h.provider.calls_to(SWITCH), vec![json!([{ "chainId": "0x89" }])]);
    assert!(h.provider.calls_to(ADD).is_empty());
}

#[tokio::test]
async fn test_switch_normalizes_decimal_chain_id() {
    let h = connected().await;
    h.provider.respond_with(SWITCH, Value::Null);

    assert!(h.orchestrator.change_chain("137").await.unwrap());
    assert_eq!(h.provider.calls_to(SWITCH), vec![json!([{ "chainId": "0x89" }])]);
}

#[tokio::test]
async fn test_unknown_chain_is_added_from_registry() {
    let h = connected().await;
    h.provider
        .push_error(SWITCH, ProviderError::unrecognized_chain("0x89"))
        .respond_with(ADD, Value::Null);

    let switched = h.orchestrator.change_chain("0x89").await.unwrap();

    assert!(switched);
    assert_eq!(
        h.provider.calls_to(ADD),
        vec![json!([{
            "chainId": "0x89",
            "chainName": "Polygon",
            "rpcUrls": ["https://polygon-rpc.com"]
        }])]
    );
    // Adding does not trigger a second switch request.
    assert_eq!(h.provider.calls_to(SWITCH).len(), 1);
}

#[tokio::test]
async fn test_add_chain_failure_returns_false() {
    let h = connected().await;
    h.provider
        .push_error(SWITCH, ProviderError::unrecognized_chain("0x89"))
        .push_error(ADD, ProviderError::user_rejected());

    assert!(!h.orchestrator.change_chain("0x89").await.unwrap());
    assert_eq!(h.provider.calls_to(ADD).len(), 1);
    assert_eq!(h.notifier.count(), 0);
    // Rejecting the add dialog is not a connection rejection.
    assert!(h.orchestrator.is_bound());
}

#[tokio::test]
async fn test_unregistered_chain_is_not_added() {
    let h = connected().await;
    h.provider
        .push_error(SWITCH, ProviderError::unrecognized_chain("0x2a"));

    assert!(!h.orchestrator.change_chain("0x2a").await.unwrap());
    assert!(h.provider.calls_to(ADD).is_empty());
}

#[tokio::test]
async fn test_pending_switch_notifies_once() {
    let h = connected().await;
    let before = h.account();
    h.provider
        .push_error(SWITCH, ProviderError::request_pending(SWITCH));

    let switched = h.orchestrator.change_chain("0x1").await.unwrap();

    assert!(!switched);
    let notices = h.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Request pending");
    assert_eq!(notices[0].action_label, "OK");
    assert!(h.provider.calls_to(ADD).is_empty());
    assert_eq!(h.account(), before);
    assert_eq!(h.orchestrator.state(), ConnectionState::Active);
    assert_eq!(h.orchestrator.connect_mode(), "metamask");
}

#[tokio::test]
async fn test_other_switch_errors_are_logged_only() {
    let h = connected().await;
    h.provider
        .push_error(SWITCH, ProviderError::user_rejected())
        .push_error(SWITCH, ProviderError::internal("wallet crashed"));

    assert!(!h.orchestrator.change_chain("0x1").await.unwrap());
    assert!(!h.orchestrator.change_chain("0x1").await.unwrap());

    assert_eq!(h.notifier.count(), 0);
    assert!(h.provider.calls_to(ADD).is_empty());
    assert!(h.orchestrator.is_bound());
}

#[tokio::test]
async fn test_change_chain_without_provider() {
    let h = Harness::new();

    let err = h.orchestrator.change_chain("0x89").await.unwrap_err();

    assert!(matches!(err, ConnectError::NoProvider));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_change_chain_rejects_malformed_id() {
    let h = connected().await;

    let err = h.orchestrator.change_chain("polygon").await.unwrap_err();

    assert!(matches!(err, ConnectError::InvalidChainId { .. }));
    assert!(h.provider.calls_to(SWITCH).is_empty());
}
