use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::base::mem::MainMemory;
use crate::cache::{CacheHierarchy, CacheStats, HandlerId, Organization};

#[derive(Debug, Clone, Serialize)]
pub struct LevelSummary {
    pub name: String,
    pub geometry: String,
    pub organization: Organization,
    pub capacity_bytes: u64,
    pub miss_handler: Option<String>,
    pub stats: CacheStats,
    pub miss_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub records: u64,
    pub levels: Vec<LevelSummary>,
    pub total: CacheStats,
    pub memory: MainMemory,
}

impl RunSummary {
    pub fn collect(hierarchy: &CacheHierarchy, records: u64) -> Self {
        let mut total = CacheStats::default();
        let levels = hierarchy
            .levels()
            .map(|(id, cache)| {
                total += cache.stats();
                let miss_handler = hierarchy.miss_handler(id).map(|handler| match handler {
                    HandlerId::Level(next) => hierarchy.level(next).name().to_string(),
                    HandlerId::Memory => "memory".to_string(),
                });
                LevelSummary {
                    name: cache.name().to_string(),
                    geometry: cache.geometry().to_string(),
                    organization: cache.organization(),
                    capacity_bytes: cache.geometry().capacity_bytes(),
                    miss_handler,
                    stats: *cache.stats(),
                    miss_rate: cache.stats().miss_rate(),
                }
            })
            .collect();
        Self {
            records,
            levels,
            total,
            memory: *hierarchy.memory(),
        }
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let payload = serde_json::to_string_pretty(self).context("cannot serialize run summary")?;
        fs::write(path, payload).with_context(|| format!("cannot write {}", path.display()))
    }
}

/// Classic per-cache reports, upstream levels first.
impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in &self.levels {
            write!(f, "{}", level.stats.report(&level.name))?;
        }
        Ok(())
    }
}
