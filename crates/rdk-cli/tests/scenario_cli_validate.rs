use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use rdk_schemas::Timeframe;
use rdk_testkit::trending_candles;

fn write_csv(dir: &Path, symbol: &str, tf: Timeframe, seed: u64) {
    let mut text = String::from("ts,open,high,low,close,volume\n");
    for c in trending_candles(600, tf, 100.0, 0.002, 0.004, seed) {
        writeln!(text, "{},{},{},{},{},{}", c.ts, c.open, c.high, c.low, c.close, c.volume).unwrap();
    }
    fs::write(dir.join(format!("{}_{}.csv", symbol, tf.as_str())), text).unwrap();
}

fn rdk() -> std::process::Command {
    let mut cmd = std::process::Command::cargo_bin("rdk").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn strategies_lists_reference_registry() {
    rdk()
        .arg("strategies")
        .assert()
        .success()
        .stdout(predicate::str::contains("sma_cross").and(predicate::str::contains("breakout")));
}

#[test]
fn config_hash_ignores_key_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    fs::write(&a, "preset: conservative\npool:\n  workers: 2\n")?;
    fs::write(&b, "pool:\n  workers: 2\npreset: conservative\n")?;

    let out_a = rdk().args(["config-hash", a.to_str().unwrap()]).output()?;
    let out_b = rdk().args(["config-hash", b.to_str().unwrap()]).output()?;
    assert!(out_a.status.success());
    let first_line = |o: &std::process::Output| String::from_utf8_lossy(&o.stdout).lines().next().unwrap_or("").to_string();
    assert!(first_line(&out_a).starts_with("config_hash="));
    assert_eq!(first_line(&out_a), first_line(&out_b));
    Ok(())
}

#[test]
fn validate_writes_store_and_assessment() -> anyhow::Result<()> {
    let data = tempfile::tempdir()?;
    write_csv(data.path(), "UP1", Timeframe::H1, 11);
    write_csv(data.path(), "UP2", Timeframe::H1, 12);
    let store = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;

    rdk()
        .args([
            "validate",
            "--data-dir",
            data.path().to_str().unwrap(),
            "--strategy",
            "sma_cross",
            "--symbols",
            "UP1,UP2",
            "--timeframes",
            "1h",
            "--simulations",
            "100",
            "--store-dir",
            store.path().to_str().unwrap(),
            "--out",
            out.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("status="))
        .stdout(predicate::str::contains("phase=multi_market state=completed"))
        .stdout(predicate::str::contains("phase=readiness state=completed"))
        .stdout(predicate::str::contains("stored=true strategy_id=sma_cross"));

    assert!(out.path().join("readiness_assessment.json").is_file());

    rdk()
        .args(["results", "list", "--store-dir", store.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("count=1"));

    rdk()
        .args([
            "results",
            "latest",
            "--store-dir",
            store.path().to_str().unwrap(),
            "--strategy",
            "sma_cross",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"strategy_id\": \"sma_cross\""));
    Ok(())
}

#[test]
fn validate_rejects_unknown_config_key_before_running() -> anyhow::Result<()> {
    let data = tempfile::tempdir()?;
    let cfg = data.path().join("bad.yaml");
    fs::write(&cfg, "walk_forward:\n  windoes: 3\n")?;

    rdk()
        .args([
            "validate",
            "--data-dir",
            data.path().to_str().unwrap(),
            "--config",
            cfg.to_str().unwrap(),
            "--strategy",
            "sma_cross",
            "--symbols",
            "UP1",
            "--timeframes",
            "1h",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_INVALID"))
        .stderr(predicate::str::contains("windoes"));
    Ok(())
}

#[test]
fn validate_rejects_unknown_strategy() {
    let data = tempfile::tempdir().unwrap();
    rdk()
        .args([
            "validate",
            "--data-dir",
            data.path().to_str().unwrap(),
            "--strategy",
            "nope",
            "--symbols",
            "UP1",
            "--timeframes",
            "1h",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown strategy_id 'nope'"));
}
