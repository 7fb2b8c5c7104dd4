//! `rdk results`: read back stored validation runs.

use anyhow::{Context, Result};
use rdk_pipeline::{JsonDirStore, ResultStore};

pub fn list(store_dir: &str, strategy: Option<&str>) -> Result<()> {
    let store = JsonDirStore::new(store_dir);
    let keys = store.list(strategy)?;
    for k in &keys {
        println!(
            "strategy_id={} run_timestamp={} run_id={}",
            k.strategy_id,
            k.run_timestamp.to_rfc3339(),
            k.run_id
        );
    }
    println!("count={}", keys.len());
    Ok(())
}

pub fn latest(store_dir: &str, strategy: &str) -> Result<()> {
    let store = JsonDirStore::new(store_dir);
    let response = store
        .latest(strategy)?
        .with_context(|| format!("no stored results for strategy '{strategy}'"))?;
    let json = serde_json::to_string_pretty(&response).context("serialize validation response failed")?;
    println!("{json}");
    Ok(())
}
