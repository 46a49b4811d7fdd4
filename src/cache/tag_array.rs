use std::fmt::Debug;

use crate::cache::geometry::{CacheGeometry, Organization};
use crate::cache::tags::TagEntry;

/// Tag and replacement state of a cache. The two organizations differ only
/// in how they find a way and pick a victim; everything else in a cache is
/// written once against this trait.
pub trait TagArray: Debug {
    fn geometry(&self) -> &CacheGeometry;

    fn organization(&self) -> Organization;

    /// Returns the resident slot for `addr` and promotes its way to
    /// most-recently-used, or `None` on a miss.
    fn check_tag(&mut self, addr: u64) -> Option<&mut TagEntry>;

    /// Evicts the least-recently-used way of `addr`'s set, refills it with a
    /// clean line for `addr` at the front of the recency order, and returns
    /// what the slot held before.
    fn victimize(&mut self, addr: u64) -> TagEntry;

    /// Recency order of `set`, most-recently-used first.
    fn lru_order(&self, set: usize) -> &[usize];

    /// Tag slots of `set`, indexed by way.
    fn entries(&self, set: usize) -> &[TagEntry];

    fn invalidate_all(&mut self);

    /// Copy of the tags and recency order.
    fn box_clone(&self) -> Box<dyn TagArray>;

    /// Residency check that leaves the recency order alone.
    fn probe(&self, addr: u64) -> Option<TagEntry> {
        let geometry = self.geometry();
        let line = geometry.line_addr(addr);
        self.entries(geometry.set_index(addr))
            .iter()
            .copied()
            .find(|entry| entry.matches(line))
    }
}

/// Flat `sets * ways` storage shared by both organizations.
#[derive(Debug, Clone)]
struct TagStore {
    geometry: CacheGeometry,
    tags: Vec<TagEntry>,
    lru: Vec<usize>,
}

impl TagStore {
    fn new(geometry: CacheGeometry) -> Self {
        let mut store = Self {
            geometry,
            tags: Vec::new(),
            lru: Vec::new(),
        };
        store.invalidate_all();
        store
    }

    fn invalidate_all(&mut self) {
        let ways = self.geometry.ways();
        self.tags = vec![TagEntry::INVALID; self.geometry.lines()];
        self.lru = (0..self.geometry.sets())
            .flat_map(|_| (0..ways).map(move |j| ways - j - 1))
            .collect();
    }

    fn set_range(&self, set: usize) -> std::ops::Range<usize> {
        let ways = self.geometry.ways();
        set * ways..(set + 1) * ways
    }

    /// Searches the `ways` slots starting at `base` and promotes a hit.
    fn lookup(&mut self, base: usize, line: u64) -> Option<&mut TagEntry> {
        let ways = self.geometry.ways();
        let way = self.tags[base..base + ways]
            .iter()
            .position(|entry| entry.matches(line))?;
        let order = &mut self.lru[base..base + ways];
        if let Some(pos) = order.iter().position(|&w| w == way) {
            // everything ahead of the hit way slides back by one
            order[..=pos].rotate_right(1);
        }
        debug_assert!(is_permutation(order));
        Some(&mut self.tags[base + way])
    }
}

#[derive(Debug, Clone)]
pub struct SetAssocTags {
    store: TagStore,
}

impl SetAssocTags {
    pub fn new(geometry: CacheGeometry) -> Self {
        Self {
            store: TagStore::new(geometry),
        }
    }
}

impl TagArray for SetAssocTags {
    fn geometry(&self) -> &CacheGeometry {
        &self.store.geometry
    }

    fn organization(&self) -> Organization {
        Organization::SetAssociative
    }

    fn check_tag(&mut self, addr: u64) -> Option<&mut TagEntry> {
        let geometry = self.store.geometry;
        let base = geometry.set_index(addr) * geometry.ways();
        self.store.lookup(base, geometry.line_addr(addr))
    }

    fn victimize(&mut self, addr: u64) -> TagEntry {
        let geometry = self.store.geometry;
        let base = geometry.set_index(addr) * geometry.ways();
        let order = &mut self.store.lru[base..base + geometry.ways()];
        // the LRU way sits at the back; it becomes the MRU
        order.rotate_right(1);
        debug_assert!(is_permutation(order));
        let way = order[0];
        std::mem::replace(
            &mut self.store.tags[base + way],
            TagEntry::fill(geometry.line_addr(addr)),
        )
    }

    fn lru_order(&self, set: usize) -> &[usize] {
        &self.store.lru[self.store.set_range(set)]
    }

    fn entries(&self, set: usize) -> &[TagEntry] {
        &self.store.tags[self.store.set_range(set)]
    }

    fn invalidate_all(&mut self) {
        self.store.invalidate_all();
    }

    fn box_clone(&self) -> Box<dyn TagArray> {
        Box::new(self.clone())
    }
}

/// Single set spanning every way. Lookups and victims work on the whole
/// array without computing a set index.
#[derive(Debug, Clone)]
pub struct FullyAssocTags {
    store: TagStore,
}

impl FullyAssocTags {
    pub fn new(geometry: CacheGeometry) -> Self {
        debug_assert_eq!(geometry.sets(), 1, "fully associative caches have one set");
        Self {
            store: TagStore::new(geometry),
        }
    }
}

impl TagArray for FullyAssocTags {
    fn geometry(&self) -> &CacheGeometry {
        &self.store.geometry
    }

    fn organization(&self) -> Organization {
        Organization::FullyAssociative
    }

    fn check_tag(&mut self, addr: u64) -> Option<&mut TagEntry> {
        let line = self.store.geometry.line_addr(addr);
        self.store.lookup(0, line)
    }

    fn victimize(&mut self, addr: u64) -> TagEntry {
        let line = self.store.geometry.line_addr(addr);
        self.store.lru.rotate_right(1);
        debug_assert!(is_permutation(&self.store.lru));
        let way = self.store.lru[0];
        std::mem::replace(&mut self.store.tags[way], TagEntry::fill(line))
    }

    fn lru_order(&self, set: usize) -> &[usize] {
        debug_assert_eq!(set, 0);
        &self.store.lru
    }

    fn entries(&self, set: usize) -> &[TagEntry] {
        debug_assert_eq!(set, 0);
        &self.store.tags
    }

    fn invalidate_all(&mut self) {
        self.store.invalidate_all();
    }

    fn box_clone(&self) -> Box<dyn TagArray> {
        Box::new(self.clone())
    }
}

/// Builds the tag array for `organization`, which must already have been
/// checked against `geometry`.
pub fn build(geometry: CacheGeometry, organization: Organization) -> Box<dyn TagArray> {
    match organization {
        Organization::SetAssociative => Box::new(SetAssocTags::new(geometry)),
        Organization::FullyAssociative => Box::new(FullyAssocTags::new(geometry)),
    }
}

/// True when `order` holds each way index below its length exactly once.
pub(crate) fn is_permutation(order: &[usize]) -> bool {
    let mut seen = vec![false; order.len()];
    for &way in order {
        if way >= seen.len() || seen[way] {
            return false;
        }
        seen[way] = true;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(sets: usize, ways: usize) -> CacheGeometry {
        CacheGeometry::new(sets, ways, 64).unwrap()
    }

    #[test]
    fn initial_lru_is_descending_way_order() {
        let tags = SetAssocTags::new(geometry(4, 4));
        for set in 0..4 {
            assert_eq!(tags.lru_order(set), &[3, 2, 1, 0]);
            assert!(tags.entries(set).iter().all(|e| !e.is_valid()));
        }
    }

    #[test]
    fn empty_array_misses_everywhere() {
        let mut tags = SetAssocTags::new(geometry(4, 2));
        for addr in [0u64, 0x40, 0x1234, u64::MAX] {
            assert!(tags.check_tag(addr).is_none());
        }
    }

    #[test]
    fn victimize_fills_way_zero_first() {
        let mut tags = SetAssocTags::new(geometry(4, 4));
        let old = tags.victimize(0x100);
        assert_eq!(old, TagEntry::INVALID);
        assert_eq!(tags.lru_order(0), &[0, 3, 2, 1]);
        assert!(tags.entries(0)[0].matches(0x100 >> 6));
    }

    #[test]
    fn hit_promotes_way_to_front() {
        let mut tags = SetAssocTags::new(geometry(1, 4));
        for line in 0..4u64 {
            tags.victimize(line * 64);
        }
        assert_eq!(tags.lru_order(0), &[3, 2, 1, 0]);
        assert!(tags.check_tag(64).is_some());
        assert_eq!(tags.lru_order(0), &[1, 3, 2, 0]);
        assert!(is_permutation(tags.lru_order(0)));
    }

    #[test]
    fn victimize_returns_previous_contents() {
        let mut tags = SetAssocTags::new(geometry(1, 1));
        tags.victimize(0);
        tags.check_tag(0).unwrap().mark_dirty();
        let old = tags.victimize(64);
        assert!(old.needs_writeback());
        assert_eq!(old.line_addr(), 0);
        assert!(tags.check_tag(0).is_none());
        assert!(tags.check_tag(64).is_some());
    }

    #[test]
    fn sets_are_independent() {
        let mut tags = SetAssocTags::new(geometry(2, 1));
        tags.victimize(0);
        tags.victimize(64);
        assert!(tags.check_tag(0).is_some());
        assert!(tags.check_tag(64).is_some());
        assert_eq!(tags.lru_order(0), &[0]);
        assert_eq!(tags.lru_order(1), &[0]);
    }

    #[test]
    fn probe_does_not_touch_lru() {
        let mut tags = SetAssocTags::new(geometry(1, 2));
        tags.victimize(0);
        tags.victimize(64);
        let before = tags.lru_order(0).to_vec();
        assert!(tags.probe(0).is_some());
        assert!(tags.probe(128).is_none());
        assert_eq!(tags.lru_order(0), before.as_slice());
    }

    #[test]
    fn invalidate_all_restores_initial_state() {
        let mut tags = SetAssocTags::new(geometry(2, 3));
        tags.victimize(0);
        tags.victimize(64);
        tags.invalidate_all();
        assert!(tags.check_tag(0).is_none());
        assert_eq!(tags.lru_order(0), &[2, 1, 0]);
        assert_eq!(tags.lru_order(1), &[2, 1, 0]);
    }

    #[test]
    fn fully_associative_matches_single_set() {
        let mut fa = FullyAssocTags::new(geometry(1, 8));
        let mut sa = SetAssocTags::new(geometry(1, 8));
        let trace = [0u64, 64, 128, 0, 512, 1024, 64, 4096, 8192, 16384, 0, 128, 99999];
        for addr in trace {
            let fa_hit = fa.check_tag(addr).is_some();
            let sa_hit = sa.check_tag(addr).is_some();
            assert_eq!(fa_hit, sa_hit, "addr {addr:#x}");
            if !fa_hit {
                assert_eq!(fa.victimize(addr), sa.victimize(addr));
            }
            assert_eq!(fa.lru_order(0), sa.lru_order(0));
        }
    }

    #[test]
    fn build_respects_organization() {
        let g = geometry(1, 16);
        assert_eq!(
            build(g, Organization::FullyAssociative).organization(),
            Organization::FullyAssociative
        );
        assert_eq!(
            build(g, Organization::SetAssociative).organization(),
            Organization::SetAssociative
        );
    }
}
