use serde::Deserialize;

use crate::sim::config::Config;

/// Synthetic access streams, replayed in order when the frontend is `traffic`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficConfig {
    pub base: u64,
    pub within_bytes: u64,
    pub patterns: Vec<TrafficPatternSpec>,
}

impl Config for TrafficConfig {}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            base: 0x8000_0000,
            within_bytes: 1 << 20,
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficPatternSpec {
    pub name: String,
    pub kind: String,
    pub op: String,
    pub req_bytes: u64,
    pub count: u64,
    pub stride: u64,
    pub seed: u64,
    /// Fraction of stores when `op` is `mixed`.
    pub store_ratio: f64,
    pub hot_bytes: u64,
    /// Fraction of `hot_set` accesses that land in the first `hot_bytes`.
    pub hot_ratio: f64,
    pub within_bytes: Option<u64>,
}

impl Default for TrafficPatternSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: String::new(),
            op: "read".to_string(),
            req_bytes: 8,
            count: 4096,
            stride: 64,
            seed: 0,
            store_ratio: 0.25,
            hot_bytes: 16 << 10,
            hot_ratio: 0.9,
            within_bytes: None,
        }
    }
}
