mod common;

use common::{wait_for, Harness, ACCOUNT, TWO_ETH_HEX};
use connect_core::{
    AccountRecord, ConnectError, OrchestratorConfig, ProviderError, RefreshPolicy,
};
use serde_json::json;

const GET_BALANCE: &str = "eth_getBalance";

async fn connected(policy: RefreshPolicy) -> Harness {
    let config = OrchestratorConfig {
        refresh_policy: policy,
        ..Default::default()
    };
    let h = Harness::with_config(config).with_wallet();
    h.orchestrator.connect_metamask().await.unwrap();
    h
}

#[tokio::test]
async fn test_record_is_published_whole() {
    let h = connected(RefreshPolicy::LastWriteWins).await;
    h.orchestrator.update_account_data("0xDEF").await.unwrap();
    h.orchestrator.on_disconnect().await;

    let history = h.accounts.history();
    assert_eq!(history.len(), 3);
    for record in &history {
        let complete = !record.account.is_empty() && record.chain_id != 0;
        assert!(
            record.is_empty() || complete,
            "partial record published: {:?}",
            record
        );
    }
    assert!(history[2].is_empty());
}

#[tokio::test]
async fn test_update_account_data_publishes_record() {
    let h = connected(RefreshPolicy::LastWriteWins).await;
    h.provider.push_response(GET_BALANCE, json!(TWO_ETH_HEX));

    let record = h.orchestrator.update_account_data("0xDEF").await.unwrap();

    let expected = AccountRecord::new("0xDEF", 2.0, 137);
    assert_eq!(record, Some(expected.clone()));
    assert_eq!(h.account(), expected);
}

#[tokio::test]
async fn test_update_account_data_without_provider() {
    let h = Harness::new().with_wallet();

    let err = h.orchestrator.update_account_data(ACCOUNT).await.unwrap_err();

    assert!(matches!(err, ConnectError::NoProvider));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_record() {
    let h = connected(RefreshPolicy::LastWriteWins).await;
    h.provider
        .push_error(GET_BALANCE, ProviderError::internal("node unavailable"));

    let published = h.accounts.history().len();

    let record = h.orchestrator.update_account_data("0xDEF").await.unwrap();

    assert_eq!(record, None);
    assert_eq!(h.accounts.history().len(), published);
    assert_eq!(h.account(), AccountRecord::new(ACCOUNT, 1.0, 137));
    // Balance failed, so the chain id was never asked for.
    assert_eq!(h.provider.calls_to("eth_chainId").len(), 1);
}

#[tokio::test]
async fn test_malformed_balance_is_not_published() {
    let h = connected(RefreshPolicy::LastWriteWins).await;
    h.provider.push_response(GET_BALANCE, json!("0xnope"));

    let record = h.orchestrator.update_account_data("0xDEF").await.unwrap();

    assert_eq!(record, None);
    assert_eq!(h.account(), AccountRecord::new(ACCOUNT, 1.0, 137));
}

#[tokio::test]
async fn test_late_response_after_disconnect_is_dropped() {
    let h = connected(RefreshPolicy::LastWriteWins).await;
    let release = h.provider.hold_next(GET_BALANCE);

    let orchestrator = h.orchestrator.clone();
    let pending = tokio::spawn(async move { orchestrator.update_account_data("0xDEF").await });
    wait_for("held balance call", || {
        h.provider.calls_to(GET_BALANCE).len() == 2
    })
    .await;

    h.orchestrator.on_disconnect().await;
    release.send(()).unwrap();

    let result = pending.await.unwrap().unwrap();
    assert_eq!(result, None);
    assert!(h.account().is_empty());
    assert!(h.accounts.history().last().unwrap().is_empty());
}

#[tokio::test]
async fn test_late_response_after_rebind_is_dropped() {
    let h = connected(RefreshPolicy::LastWriteWins).await;
    let release = h.provider.hold_next(GET_BALANCE);

    let orchestrator = h.orchestrator.clone();
    let pending = tokio::spawn(async move { orchestrator.update_account_data("0xDEF").await });
    wait_for("held balance call", || {
        h.provider.calls_to(GET_BALANCE).len() == 2
    })
    .await;

    // Same wallet supplied again after a disconnect starts a new binding.
    h.orchestrator.on_disconnect().await;
    h.orchestrator.bind(h.handle.clone()).await.unwrap();
    release.send(()).unwrap();

    assert_eq!(pending.await.unwrap().unwrap(), None);
    assert_eq!(h.account(), AccountRecord::new(ACCOUNT, 1.0, 137));
}

/// Start a refresh for `0xAAA` that stalls on its balance call, then let a
/// refresh for `0xBBB` complete before releasing the first one.
async fn overlapping_refreshes(h: &Harness) -> Option<AccountRecord> {
    let release = h.provider.hold_next(GET_BALANCE);
    let orchestrator = h.orchestrator.clone();
    let slow = tokio::spawn(async move { orchestrator.update_account_data("0xAAA").await });
    wait_for("held balance call", || {
        h.provider.calls_to(GET_BALANCE).len() == 2
    })
    .await;

    let fast = h.orchestrator.update_account_data("0xBBB").await.unwrap();
    assert_eq!(fast.map(|r| r.account), Some("0xBBB".to_string()));

    release.send(()).unwrap();
    slow.await.unwrap().unwrap()
}

#[tokio::test]
async fn test_last_write_wins_publishes_stale_refresh() {
    let h = connected(RefreshPolicy::LastWriteWins).await;

    let slow = overlapping_refreshes(&h).await;

    assert_eq!(slow.map(|r| r.account), Some("0xAAA".to_string()));
    assert_eq!(h.account().account, "0xAAA");
}

#[tokio::test]
async fn test_latest_only_drops_superseded_refresh() {
    let h = connected(RefreshPolicy::LatestOnly).await;

    let slow = overlapping_refreshes(&h).await;

    assert_eq!(slow, None);
    assert_eq!(h.account().account, "0xBBB");
    assert_eq!(
        h.accounts
            .history()
            .iter()
            .filter(|r| r.account == "0xAAA")
            .count(),
        0
    );
}
