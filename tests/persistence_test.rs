#![cfg(feature = "storage-rocksdb")]

mod common;

use assert_cmd::cargo_bin;
use paylink::application::engine::PayLinkEngine;
use paylink::domain::identity::LinkKey;
use paylink::infrastructure::in_memory::InMemoryDirectory;
use paylink::infrastructure::rocksdb::RocksDBStore;
use rust_decimal_macros::dec;
use std::process::Command;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: link and credit
    let script1 = dir.path().join("first.csv");
    common::write_script(
        &script1,
        &[
            "register_merchant,M1,,,,",
            "register_user,,U1,,,",
            "link,M1,U1,,1234,",
            "credit,M1,U1,100,,",
        ],
    )
    .unwrap();

    let mut cmd1 = Command::new(cargo_bin!("paylink"));
    cmd1.arg(&script1)
        .arg("--db-path")
        .arg(&db_path)
        .arg("--hash-cost")
        .arg("4");

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("M1,U1,100.00"));

    // 2. Second run: the link and its PIN come back from disk
    let script2 = dir.path().join("second.csv");
    common::write_script(
        &script2,
        &[
            "register_merchant,M1,,,,",
            "register_user,,U1,,,",
            "purchase,M1,U1,30,1234,",
        ],
    )
    .unwrap();

    let mut cmd2 = Command::new(cargo_bin!("paylink"));
    cmd2.arg(&script2).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout2.contains("M1,U1,70.00"));
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let dir = tempdir().unwrap();
    let key = LinkKey::new("M1", "U1");

    let directory = InMemoryDirectory::new();
    directory.register_merchant("M1").await;
    directory.register_user("U1").await;

    {
        let store = RocksDBStore::open(dir.path()).unwrap();
        let engine = PayLinkEngine::new(
            Arc::new(store),
            Arc::new(directory.clone()),
            common::test_config(),
        );
        engine.create_link(&key, &common::pin("1234")).await.unwrap();
        engine
            .apply_credit(&key, common::amount(dec!(40)), "first")
            .await
            .unwrap();
        engine
            .apply_debit(&key, common::amount(dec!(15)), "second")
            .await
            .unwrap();
        engine.delink(&key, &common::pin("1234")).await.unwrap();
    }

    let store = RocksDBStore::open(dir.path()).unwrap();
    let engine = PayLinkEngine::new(Arc::new(store), Arc::new(directory), common::test_config());
    let history = engine.list_transactions(&key, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].description, "second");
    assert_eq!(history[0].balance_after.value(), dec!(25));

    // Re-linking after removal starts a fresh balance.
    let relinked = engine.create_link(&key, &common::pin("5678")).await.unwrap();
    assert!(relinked.balance.value().is_zero());
}
