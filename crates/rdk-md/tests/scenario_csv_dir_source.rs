//! CSV directory source.
//!
//! GREEN when:
//! - A well-formed file loads in order with the lookback applied.
//! - A missing file is NotFound, a malformed row is Parse, an unordered file is Invalid.
//! - Trailing notional volume prefers the daily file.

use std::fs;

use rdk_md::{CsvDirSource, DataError, MarketDataSource};
use rdk_schemas::Timeframe;

const DAY: i64 = 86_400;

fn write_daily(dir: &std::path::Path, symbol: &str, days: i64, volume: f64) {
    let mut body = String::from("ts,open,high,low,close,volume\n");
    for d in 0..days {
        body.push_str(&format!("{},100,101,99,100,{}\n", d * DAY, volume));
    }
    fs::write(dir.join(format!("{}_1d.csv", symbol)), body).unwrap();
}

#[test]
fn loads_ordered_candles_with_lookback() {
    let dir = tempfile::tempdir().unwrap();
    write_daily(dir.path(), "BTCUSDT", 100, 10.0);

    let src = CsvDirSource::new(dir.path());
    let all = src.candles("BTCUSDT", Timeframe::D1, 365).unwrap();
    assert_eq!(all.len(), 100);

    let recent = src.candles("BTCUSDT", Timeframe::D1, 10).unwrap();
    assert_eq!(recent.len(), 11);
    assert_eq!(recent.last().unwrap().ts, 99 * DAY);
    assert!(recent.windows(2).all(|w| w[0].ts < w[1].ts));
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let src = CsvDirSource::new(dir.path());
    let err = src.candles("ETHUSDT", Timeframe::H1, 30).unwrap_err();
    assert!(matches!(err, DataError::NotFound { .. }), "{:?}", err);
}

#[test]
fn malformed_row_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("SOLUSDT_1h.csv"),
        "ts,open,high,low,close,volume\n0,1,1,1,1,1\n3600,abc,1,1,1,1\n",
    )
    .unwrap();
    let src = CsvDirSource::new(dir.path());
    let err = src.candles("SOLUSDT", Timeframe::H1, 30).unwrap_err();
    assert!(matches!(err, DataError::Parse { .. }), "{:?}", err);
}

#[test]
fn unordered_rows_are_invalid() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("SOLUSDT_1h.csv"),
        "ts,open,high,low,close,volume\n3600,1,1,1,1,1\n0,1,1,1,1,1\n",
    )
    .unwrap();
    let src = CsvDirSource::new(dir.path());
    let err = src.candles("SOLUSDT", Timeframe::H1, 30).unwrap_err();
    assert!(matches!(err, DataError::Invalid { .. }), "{:?}", err);
}

#[test]
fn trailing_volume_uses_daily_file() {
    let dir = tempfile::tempdir().unwrap();
    // 100 close × 50 volume = 5_000 notional per day.
    write_daily(dir.path(), "BTCUSDT", 60, 50.0);

    let src = CsvDirSource::new(dir.path());
    let v = src.trailing_notional_volume("BTCUSDT").unwrap();
    assert!(v > 4_500.0 && v < 5_500.0, "v={}", v);

    assert!(matches!(
        src.trailing_notional_volume("NOPE"),
        Err(DataError::NotFound { .. })
    ));
}
