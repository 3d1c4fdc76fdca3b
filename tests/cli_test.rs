use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("tests/fixtures/script.csv").arg("--hash-cost").arg("4");

    cmd.assert()
        .success()
        .stdout("merchant,user,balance\nM1,U1,74.50\nM2,U1,5.75\n")
        // Every identity the script links is registered first.
        .stderr(predicate::str::contains("not found").not())
        // The first purchase at M2 runs against an empty balance.
        .stderr(predicate::str::contains("insufficient balance: 0.00 available"));

    Ok(())
}

#[test]
fn test_cli_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("tests/fixtures/does_not_exist.csv");

    cmd.assert().failure();
}

#[test]
fn test_cli_rejects_invalid_env_config() {
    let mut cmd = Command::new(cargo_bin!("paylink"));
    cmd.arg("tests/fixtures/script.csv")
        .env("PAYLINK_MAX_RETRIES", "many");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("PAYLINK_MAX_RETRIES"));
}
