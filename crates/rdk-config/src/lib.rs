//! rdk-config
//!
//! Layered YAML configuration with a stable content hash.
//!
//! - Documents merge in order: earlier docs are base, later docs override.
//! - The merged document is canonicalized (recursively sorted keys, compact
//!   JSON) and hashed with SHA-256. The hash is part of the results-cache key.
//! - Typed configs are produced with [`apply_overrides`]: a preset value is
//!   serialized, the document is deep-merged on top, and the result is
//!   deserialized back. Config structs use `#[serde(deny_unknown_fields)]`, so
//!   a misspelled or unknown key fails the load instead of being ignored.

mod validate;

pub use validate::{ConfigError, Violations};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// An empty document (all defaults).
    pub fn empty() -> Self {
        let config_json = Value::Object(Map::new());
        let canonical_json = canonicalize_json(&config_json);
        Self {
            config_hash: sha256_hex(canonical_json.as_bytes()),
            canonical_json,
            config_json,
        }
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for raw in yaml_docs {
        // An empty YAML document parses as null; treat it as "no overrides".
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        if !v_json.is_object() {
            anyhow::bail!("config document must be a mapping at the top level");
        }
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged);
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Merge `b` on top of `a`. Objects merge key-wise; any other value in `b`
/// replaces the value in `a`.
pub fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Serialize `base`, merge `overrides` on top and deserialize the result.
///
/// Unknown keys in `overrides` surface as deserialization errors when the
/// target type denies unknown fields.
pub fn apply_overrides<T>(base: &T, overrides: &Value) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let base_json = serde_json::to_value(base).context("serialize base config failed")?;
    let merged = deep_merge(base_json, overrides.clone());
    serde_json::from_value(merged).context("config override rejected")
}

/// Compact JSON with object keys sorted at every level.
///
/// Sorting is explicit so the hash does not depend on whether serde_json's
/// `preserve_order` feature is enabled somewhere in the dependency graph.
pub fn canonicalize_json(v: &Value) -> String {
    let mut out = String::new();
    write_canonical(v, &mut out);
    out
}

fn write_canonical(v: &Value, out: &mut String) {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*k).clone()).to_string());
                out.push(':');
                write_canonical(&map[k.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash any serializable value through its canonical JSON form.
pub fn hash_value<T: Serialize>(value: &T) -> Result<String> {
    let v = serde_json::to_value(value).context("serialize for hashing failed")?;
    Ok(sha256_hex(canonicalize_json(&v).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_form_sorts_nested_keys() {
        let v = json!({"b": {"y": 1, "x": [2, {"d": 0, "c": 1}]}, "a": true});
        assert_eq!(
            canonicalize_json(&v),
            r#"{"a":true,"b":{"x":[2,{"c":1,"d":0}],"y":1}}"#
        );
    }

    #[test]
    fn empty_docs_hash_like_empty_config() {
        let a = load_layered_yaml_from_strings(&[""]).unwrap();
        assert_eq!(a.config_hash, LoadedConfig::empty().config_hash);
    }
}
