use log::{debug, info};

use crate::base::mem::MissHandler;
use crate::cache::geometry::{CacheGeometry, GeometryError, Organization};
use crate::cache::stats::CacheStats;
use crate::cache::tag_array::{self, TagArray};

/// What a single access did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit,
    /// The line was filled; `writeback` is the line address of the dirty
    /// victim that was written back, if any.
    Miss { writeback: Option<u64> },
}

impl AccessOutcome {
    pub fn is_hit(self) -> bool {
        matches!(self, Self::Hit)
    }
}

/// Occupancy model of one cache: which lines are resident and dirty, in
/// what recency order, and the counters that fall out of that. No data is
/// stored.
#[derive(Debug)]
pub struct CacheSim {
    name: String,
    tags: Box<dyn TagArray>,
    stats: CacheStats,
    log: bool,
}

impl CacheSim {
    /// Builds a cache, choosing the organization from the geometry.
    pub fn new(name: impl Into<String>, geometry: CacheGeometry) -> Self {
        let organization = Organization::infer(&geometry);
        Self::build(name.into(), geometry, organization)
    }

    pub fn with_organization(
        name: impl Into<String>,
        geometry: CacheGeometry,
        organization: Organization,
    ) -> Result<Self, GeometryError> {
        organization.check(&geometry)?;
        Ok(Self::build(name.into(), geometry, organization))
    }

    /// Builds a cache from a `sets:ways:blocksize` string.
    pub fn construct(config: &str, name: impl Into<String>) -> Result<Self, GeometryError> {
        let geometry = config.parse::<CacheGeometry>()?;
        Ok(Self::new(name, geometry))
    }

    fn build(name: String, geometry: CacheGeometry, organization: Organization) -> Self {
        debug!("{name}: {geometry} {organization}, {} bytes", geometry.capacity_bytes());
        Self {
            name,
            tags: tag_array::build(geometry, organization),
            stats: CacheStats::default(),
            log: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &CacheGeometry {
        self.tags.geometry()
    }

    pub fn organization(&self) -> Organization {
        self.tags.organization()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn tags(&self) -> &dyn TagArray {
        self.tags.as_ref()
    }

    pub fn log(&self) -> bool {
        self.log
    }

    /// Enables the per-miss trace.
    pub fn set_log(&mut self, log: bool) {
        self.log = log;
    }

    pub fn is_resident(&self, addr: u64) -> bool {
        self.tags.probe(addr).is_some()
    }

    pub fn is_dirty(&self, addr: u64) -> bool {
        self.tags.probe(addr).is_some_and(|entry| entry.is_dirty())
    }

    /// Drops every line without writing anything back and zeroes the counters.
    pub fn reset(&mut self) {
        self.tags.invalidate_all();
        self.stats = CacheStats::default();
    }

    /// Access with nothing downstream: writebacks are counted, not forwarded.
    pub fn access(&mut self, addr: u64, bytes: u64, store: bool) -> AccessOutcome {
        self.access_inner(addr, bytes, store, None)
    }

    /// Access that forwards writebacks and fills to `handler`.
    pub fn access_through(
        &mut self,
        addr: u64,
        bytes: u64,
        store: bool,
        handler: &mut dyn MissHandler,
    ) -> AccessOutcome {
        self.access_inner(addr, bytes, store, Some(handler))
    }

    fn access_inner(
        &mut self,
        addr: u64,
        bytes: u64,
        store: bool,
        mut handler: Option<&mut dyn MissHandler>,
    ) -> AccessOutcome {
        self.stats.record_access(bytes, store);

        if let Some(slot) = self.tags.check_tag(addr) {
            if store {
                slot.mark_dirty();
            }
            return AccessOutcome::Hit;
        }

        self.stats.record_miss(store);
        if self.log {
            info!(
                "{} {} miss {:#x}",
                self.name,
                if store { "write" } else { "read" },
                addr
            );
        }

        let geometry = *self.tags.geometry();
        let line_size = geometry.line_size();
        let victim = self.tags.victimize(addr);

        let mut writeback = None;
        if victim.needs_writeback() {
            let dirty_addr = victim.line_addr() << geometry.index_shift();
            if let Some(handler) = handler.as_deref_mut() {
                handler.access(dirty_addr, line_size, true);
            }
            self.stats.record_writeback();
            writeback = Some(dirty_addr);
        }

        if let Some(handler) = handler.as_deref_mut() {
            handler.access(geometry.align(addr), line_size, false);
        }

        if store {
            match self.tags.check_tag(addr) {
                Some(slot) => slot.mark_dirty(),
                None => debug_assert!(false, "{:#x} not resident after fill", addr),
            }
        }

        AccessOutcome::Miss { writeback }
    }
}

/// A copy starts from the same resident lines and recency order, with fresh
/// counters and the miss trace off.
impl Clone for CacheSim {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tags: self.tags.box_clone(),
            stats: CacheStats::default(),
            log: false,
        }
    }
}

impl MissHandler for CacheSim {
    fn access(&mut self, addr: u64, bytes: u64, store: bool) {
        CacheSim::access(self, addr, bytes, store);
    }
}
