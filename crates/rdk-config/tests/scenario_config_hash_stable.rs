//! Config hash stability.
//!
//! GREEN when:
//! - Loading the same documents twice yields the same hash.
//! - Reordering keys inside a document does not change the hash.
//! - Different values produce different hashes.
//! - Later layers override earlier ones and the merged hash is stable.

use rdk_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
preset: standard
markets:
  min_markets_passed: 4
  min_pass_rate: 0.6
monte_carlo:
  bootstrap:
    runs: 1000
    ruin_threshold: 0.5
"#;

const BASE_YAML_REORDERED: &str = r#"
monte_carlo:
  bootstrap:
    ruin_threshold: 0.5
    runs: 1000
markets:
  min_pass_rate: 0.6
  min_markets_passed: 4
preset: standard
"#;

const OVERLAY_YAML: &str = r#"
preset: conservative
markets:
  min_pass_rate: 0.75
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let modified = BASE_YAML.replace("runs: 1000", "runs: 2000");
    let b = load_layered_yaml_from_strings(&[modified.as_str()]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let preset = a
        .config_json
        .pointer("/preset")
        .and_then(|v| v.as_str())
        .unwrap();
    assert_eq!(preset, "conservative");

    let rate = a
        .config_json
        .pointer("/markets/min_pass_rate")
        .and_then(|v| v.as_f64())
        .unwrap();
    assert!((rate - 0.75).abs() < 1e-12);

    // Untouched sibling survives the merge.
    let min_passed = a
        .config_json
        .pointer("/markets/min_markets_passed")
        .and_then(|v| v.as_u64())
        .unwrap();
    assert_eq!(min_passed, 4);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn non_mapping_document_is_rejected() {
    assert!(load_layered_yaml_from_strings(&["- 1\n- 2\n"]).is_err());
    assert!(load_layered_yaml_from_strings(&["markets: [unclosed"]).is_err());
}
