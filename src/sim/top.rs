use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context};
use log::{debug, info};

use crate::cache::{AccessOutcome, CacheHierarchy, HandlerId, LevelId};
use crate::sim::config::{FrontendMode, HierarchyConfig, LevelConfig, SimConfig};
use crate::sim::perf_log::RunSummary;
use crate::sim::trace::{AccessKind, TraceReader, TraceRecord};
use crate::traffic::{PatternEngine, TrafficConfig};

/// Split I$/D$ over an optional shared L2, driven by a trace or by synthetic
/// traffic.
pub struct Sim {
    config: SimConfig,
    traffic: TrafficConfig,
    hierarchy: CacheHierarchy,
    icache: Option<LevelId>,
    dcache: Option<LevelId>,
    l2: Option<LevelId>,
    records: u64,
}

impl Sim {
    pub fn new(
        config: SimConfig,
        hierarchy_config: HierarchyConfig,
        traffic: TrafficConfig,
    ) -> anyhow::Result<Self> {
        let mut hierarchy = CacheHierarchy::new();
        let mut add = |level: &Option<LevelConfig>, name: &str| -> anyhow::Result<Option<LevelId>> {
            let Some(level) = level else {
                return Ok(None);
            };
            let cache = level
                .build(name)
                .with_context(|| format!("invalid {} configuration '{}'", name, level.geometry))?;
            Ok(Some(hierarchy.add_level(cache)))
        };
        let icache = add(&hierarchy_config.icache, "I$")?;
        let dcache = add(&hierarchy_config.dcache, "D$")?;
        let l2 = add(&hierarchy_config.l2, "L2$")?;

        let below_l1 = match l2 {
            Some(l2) => {
                hierarchy.set_miss_handler(l2, Some(HandlerId::Memory))?;
                HandlerId::Level(l2)
            }
            None => HandlerId::Memory,
        };
        for l1 in [icache, dcache].into_iter().flatten() {
            hierarchy.set_miss_handler(l1, Some(below_l1))?;
        }
        hierarchy.set_log(config.log);
        debug!("sim: {} cache levels", hierarchy.len());

        Ok(Self {
            config,
            traffic,
            hierarchy,
            icache,
            dcache,
            l2,
            records: 0,
        })
    }

    pub fn hierarchy(&self) -> &CacheHierarchy {
        &self.hierarchy
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Entry level for a record: fetches go to the I$, everything else to
    /// the D$. Without an L1 for the kind, the shared L2 (or memory) takes it.
    fn entry_level(&self, kind: AccessKind) -> Option<LevelId> {
        let l1 = match kind {
            AccessKind::Fetch => self.icache,
            AccessKind::Load | AccessKind::Store => self.dcache,
        };
        l1.or(self.l2)
    }

    /// Runs one record through the hierarchy. Returns `None` when it went
    /// straight to memory.
    pub fn issue(&mut self, record: &TraceRecord) -> Option<AccessOutcome> {
        self.records += 1;
        let store = record.kind.is_store();
        match self.entry_level(record.kind) {
            Some(level) => Some(self.hierarchy.access(level, record.addr, record.bytes, store)),
            None => {
                self.hierarchy.access_memory(record.addr, record.bytes, store);
                None
            }
        }
    }

    pub fn run_records<I: IntoIterator<Item = TraceRecord>>(&mut self, records: I) {
        for record in records {
            self.issue(&record);
        }
    }

    pub fn run_trace(&mut self, path: &Path) -> anyhow::Result<()> {
        let file = File::open(path).with_context(|| format!("cannot open trace {}", path.display()))?;
        for record in TraceReader::new(BufReader::new(file)) {
            let record = record.with_context(|| format!("in trace {}", path.display()))?;
            self.issue(&record);
        }
        Ok(())
    }

    pub fn run_traffic(&mut self) -> anyhow::Result<()> {
        let engine = PatternEngine::new(&self.traffic)?;
        if engine.is_empty() {
            bail!("traffic frontend selected but no [[traffic.patterns]] configured");
        }
        info!("traffic: {} patterns, {} requests", engine.len(), engine.total_requests());
        self.run_records(engine.records());
        Ok(())
    }

    /// Runs the configured frontend to completion and summarizes the result.
    pub fn simulate(&mut self) -> anyhow::Result<RunSummary> {
        match self.config.frontend_mode {
            FrontendMode::Trace => {
                let Some(path) = self.config.trace.clone() else {
                    bail!("trace frontend selected but no trace file given");
                };
                self.run_trace(&path)?;
            }
            FrontendMode::Traffic => self.run_traffic()?,
        }
        info!("sim: replayed {} records", self.records);
        let summary = self.summary();
        if let Some(path) = &self.config.json {
            summary.write_json(path)?;
        }
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::collect(&self.hierarchy, self.records)
    }

    pub fn reset(&mut self) {
        self.hierarchy.reset();
        self.records = 0;
    }
}
