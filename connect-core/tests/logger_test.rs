use connect_core::setup_logger_with_file;
use tracing::{info, warn};

#[test]
fn test_file_logger_writes_structured_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.log");

    let guard = setup_logger_with_file(path.to_str().unwrap()).unwrap();
    info!(target: "wallet_event", account = "0xABC", chain_id = 137u64, "Wallet CONNECTED");
    warn!(method = "eth_requestAccounts", code = -32603i64, "Account request failed");
    // Dropping the guard flushes the background writer.
    drop(guard);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("[INFO] wallet_event: Wallet CONNECTED [account=0xABC chain_id=137]"));
    assert!(lines[1].contains("[WARN]"));
    assert!(lines[1].contains("code=-32603"));
    // No ANSI escapes in files.
    assert!(!contents.contains('\u{1b}'));
}
