use anyhow::bail;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::sim::trace::{AccessKind, TraceRecord};
use crate::traffic::config::{TrafficConfig, TrafficPatternSpec};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternOp {
    Read,
    Write,
    Fetch,
    Mixed { store_ratio: f64 },
}

impl PatternOp {
    fn short(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::Fetch => "i",
            Self::Mixed { .. } => "rw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternKind {
    Strided { stride: u64 },
    Random,
    HotSet { hot_bytes: u64, hot_ratio: f64 },
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub name: String,
    pub op: PatternOp,
    pub req_bytes: u64,
    pub count: u64,
    seed: u64,
    within_bytes: u64,
    kind: PatternKind,
}

impl CompiledPattern {
    /// Number of request-sized slots in `bytes`, at least one.
    fn slots(&self, bytes: u64) -> u64 {
        (bytes / self.req_bytes).max(1)
    }

    fn offset_bytes(&self, req_idx: u64, rng: &mut StdRng) -> u64 {
        let offset = match self.kind {
            PatternKind::Strided { stride } => req_idx.saturating_mul(stride),
            PatternKind::Random => rng.gen_range(0..self.slots(self.within_bytes)) * self.req_bytes,
            PatternKind::HotSet {
                hot_bytes,
                hot_ratio,
            } => {
                let span = if rng.gen_bool(hot_ratio) {
                    hot_bytes
                } else {
                    self.within_bytes
                };
                rng.gen_range(0..self.slots(span)) * self.req_bytes
            }
        };
        offset % self.within_bytes
    }

    fn access_kind(&self, rng: &mut StdRng) -> AccessKind {
        match self.op {
            PatternOp::Read => AccessKind::Load,
            PatternOp::Write => AccessKind::Store,
            PatternOp::Fetch => AccessKind::Fetch,
            PatternOp::Mixed { store_ratio } => {
                if rng.gen_bool(store_ratio) {
                    AccessKind::Store
                } else {
                    AccessKind::Load
                }
            }
        }
    }
}

/// Compiled traffic patterns, replayed one after another.
#[derive(Debug, Clone, Default)]
pub struct PatternEngine {
    patterns: Vec<CompiledPattern>,
    base: u64,
}

impl PatternEngine {
    pub fn new(config: &TrafficConfig) -> anyhow::Result<Self> {
        let patterns = config
            .patterns
            .iter()
            .enumerate()
            .map(|(idx, spec)| compile_pattern(spec, idx, config))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            patterns,
            base: config.base,
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn pattern(&self, idx: usize) -> Option<&CompiledPattern> {
        self.patterns.get(idx)
    }

    pub fn total_requests(&self) -> u64 {
        self.patterns.iter().map(|p| p.count).sum()
    }

    /// Every request of every pattern, in order. Each pattern draws from its
    /// own RNG seeded with the pattern's seed, so replays are identical.
    pub fn records(&self) -> impl Iterator<Item = TraceRecord> + '_ {
        self.patterns.iter().flat_map(move |pattern| {
            let mut rng = StdRng::seed_from_u64(pattern.seed);
            let base = self.base;
            (0..pattern.count).map(move |req_idx| {
                let addr = base.saturating_add(pattern.offset_bytes(req_idx, &mut rng));
                let kind = pattern.access_kind(&mut rng);
                TraceRecord::new(kind, addr, pattern.req_bytes)
            })
        })
    }
}

fn compile_pattern(
    spec: &TrafficPatternSpec,
    index: usize,
    config: &TrafficConfig,
) -> anyhow::Result<CompiledPattern> {
    let req_bytes = spec.req_bytes.max(1);
    let within_bytes = spec
        .within_bytes
        .unwrap_or(config.within_bytes)
        .max(req_bytes);
    let op = parse_op(&spec.op, spec.store_ratio)?;

    let kind = match spec.kind.trim().to_ascii_lowercase().as_str() {
        "strided" | "stream" => PatternKind::Strided {
            stride: spec.stride,
        },
        "random" => PatternKind::Random,
        "hot_set" | "hotset" => PatternKind::HotSet {
            hot_bytes: spec.hot_bytes.clamp(req_bytes, within_bytes),
            hot_ratio: ratio("hot_ratio", spec.hot_ratio)?,
        },
        other => bail!(
            "unsupported traffic pattern kind '{}' at index {} (expected strided|random|hot_set)",
            other,
            index
        ),
    };

    let name = if spec.name.is_empty() {
        default_pattern_name(&kind, req_bytes, op)
    } else {
        spec.name.clone()
    };

    Ok(CompiledPattern {
        name,
        op,
        req_bytes,
        count: spec.count,
        seed: spec.seed,
        within_bytes,
        kind,
    })
}

fn parse_op(op: &str, store_ratio: f64) -> anyhow::Result<PatternOp> {
    Ok(match op.trim().to_ascii_lowercase().as_str() {
        "read" | "r" | "load" => PatternOp::Read,
        "write" | "w" | "store" => PatternOp::Write,
        "fetch" | "i" => PatternOp::Fetch,
        "mixed" | "rw" => PatternOp::Mixed {
            store_ratio: ratio("store_ratio", store_ratio)?,
        },
        other => bail!("unsupported traffic op '{}'; expected read/write/fetch/mixed", other),
    })
}

/// Clamps a probability into `[0, 1]`; NaN and infinities are config errors.
fn ratio(field: &str, value: f64) -> anyhow::Result<f64> {
    if !value.is_finite() {
        bail!("traffic {} must be a finite number, got {}", field, value);
    }
    Ok(value.clamp(0.0, 1.0))
}

fn default_pattern_name(kind: &PatternKind, req_bytes: u64, op: PatternOp) -> String {
    let base = match kind {
        PatternKind::Strided { stride } => format!("strided({})@{}", stride, req_bytes),
        PatternKind::Random => format!("random@{}", req_bytes),
        PatternKind::HotSet { hot_bytes, .. } => format!("hot_set({})@{}", hot_bytes, req_bytes),
    };
    format!("{}_{}", base, op.short())
}
