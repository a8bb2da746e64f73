//! Tile request query parameters.
//!
//! Every source sends the scenario's base parameters merged with its own
//! `extra_params`; on a key collision the source value wins. Lists expand to
//! one repeated `key=value` pair per element.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single query parameter value as written in a scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    fn push_encoded(&self, key: &str, out: &mut Vec<(String, String)>) {
        match self {
            ParamValue::List(items) => {
                for item in items {
                    item.push_encoded(key, out);
                }
            }
            scalar => out.push((key.to_string(), scalar.to_string())),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::List(items) => {
                let joined: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

pub type ParamMap = BTreeMap<String, ParamValue>;

/// Merge `extra` over `base`.
pub fn merge_params(base: &ParamMap, extra: &ParamMap) -> ParamMap {
    let mut merged = base.clone();
    merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Flatten a parameter map into query pairs, sorted by key.
pub fn encode_query(params: &ParamMap) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params {
        value.push_encoded(key, &mut pairs);
    }
    pairs
}
