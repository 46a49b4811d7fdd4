use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::base::mem::{MainMemory, MissHandler};
use crate::cache::sim::{AccessOutcome, CacheSim};

/// Handle to a level inside a [`CacheHierarchy`]. Only the hierarchy hands
/// these out, and levels are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LevelId(usize);

impl LevelId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a level sends its writebacks and fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandlerId {
    Level(LevelId),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("no cache level with index {0}")]
    UnknownLevel(usize),
    #[error("level {from} may only hand misses to a level added after it, not {to}")]
    NotDownstream { from: usize, to: usize },
}

#[derive(Debug)]
struct Level {
    cache: CacheSim,
    miss_handler: Option<HandlerId>,
}

/// Arena of cache levels plus the memory sink they drain into. Levels refer
/// to their handler by id, so no cache owns another and links can be
/// rewired or cleared at any time. A link always points at a level added
/// later, which keeps the chain acyclic.
#[derive(Debug, Default)]
pub struct CacheHierarchy {
    levels: Vec<Level>,
    memory: MainMemory,
}

impl CacheHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a level with no miss handler.
    pub fn add_level(&mut self, cache: CacheSim) -> LevelId {
        let id = LevelId(self.levels.len());
        debug!("hierarchy: level {} is {}", id.0, cache.name());
        self.levels.push(Level {
            cache,
            miss_handler: None,
        });
        id
    }

    pub fn set_miss_handler(
        &mut self,
        level: LevelId,
        handler: Option<HandlerId>,
    ) -> Result<(), HierarchyError> {
        if level.0 >= self.levels.len() {
            return Err(HierarchyError::UnknownLevel(level.0));
        }
        if let Some(HandlerId::Level(target)) = handler {
            if target.0 >= self.levels.len() {
                return Err(HierarchyError::UnknownLevel(target.0));
            }
            if target.0 <= level.0 {
                return Err(HierarchyError::NotDownstream {
                    from: level.0,
                    to: target.0,
                });
            }
        }
        debug!(
            "hierarchy: {} -> {:?}",
            self.levels[level.0].cache.name(),
            handler
        );
        self.levels[level.0].miss_handler = handler;
        Ok(())
    }

    /// # Panics
    ///
    /// If `level` was not handed out by this hierarchy.
    pub fn miss_handler(&self, level: LevelId) -> Option<HandlerId> {
        self.levels[level.0].miss_handler
    }

    /// # Panics
    ///
    /// If `level` was not handed out by this hierarchy; see [`Self::get`].
    pub fn level(&self, level: LevelId) -> &CacheSim {
        &self.levels[level.0].cache
    }

    /// # Panics
    ///
    /// If `level` was not handed out by this hierarchy.
    pub fn level_mut(&mut self, level: LevelId) -> &mut CacheSim {
        &mut self.levels[level.0].cache
    }

    /// The level behind `level`, or `None` for an id from another hierarchy.
    pub fn get(&self, level: LevelId) -> Option<&CacheSim> {
        self.levels.get(level.0).map(|level| &level.cache)
    }

    pub fn find(&self, name: &str) -> Option<LevelId> {
        self.levels
            .iter()
            .position(|level| level.cache.name() == name)
            .map(LevelId)
    }

    pub fn levels(&self) -> impl Iterator<Item = (LevelId, &CacheSim)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .map(|(idx, level)| (LevelId(idx), &level.cache))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn memory(&self) -> &MainMemory {
        &self.memory
    }

    pub fn set_log(&mut self, log: bool) {
        self.levels
            .iter_mut()
            .for_each(|level| level.cache.set_log(log));
    }

    /// Issues an access at `level`; misses recurse down the chain of
    /// handlers before this returns.
    ///
    /// # Panics
    ///
    /// If `level` was not handed out by this hierarchy.
    pub fn access(&mut self, level: LevelId, addr: u64, bytes: u64, store: bool) -> AccessOutcome {
        issue(&mut self.levels, 0, &mut self.memory, level.0, addr, bytes, store)
    }

    /// Sends an access straight to memory, bypassing every cache.
    pub fn access_memory(&mut self, addr: u64, bytes: u64, store: bool) {
        self.memory.access(addr, bytes, store);
    }

    pub fn reset(&mut self) {
        self.levels.iter_mut().for_each(|level| level.cache.reset());
        self.memory.reset();
    }
}

/// `levels[0]` is global level `offset`.
fn issue(
    levels: &mut [Level],
    offset: usize,
    memory: &mut MainMemory,
    index: usize,
    addr: u64,
    bytes: u64,
    store: bool,
) -> AccessOutcome {
    let (head, tail) = levels.split_at_mut(index - offset + 1);
    let level = &mut head[index - offset];
    match level.miss_handler {
        Some(target) => {
            let mut downstream = Downstream {
                levels: tail,
                offset: index + 1,
                memory,
                target,
            };
            level
                .cache
                .access_through(addr, bytes, store, &mut downstream)
        }
        None => level.cache.access(addr, bytes, store),
    }
}

/// Borrowed view of everything below one level.
struct Downstream<'a> {
    levels: &'a mut [Level],
    offset: usize,
    memory: &'a mut MainMemory,
    target: HandlerId,
}

impl MissHandler for Downstream<'_> {
    fn access(&mut self, addr: u64, bytes: u64, store: bool) {
        match self.target {
            HandlerId::Memory => self.memory.access(addr, bytes, store),
            HandlerId::Level(LevelId(index)) => {
                issue(
                    self.levels,
                    self.offset,
                    self.memory,
                    index,
                    addr,
                    bytes,
                    store,
                );
            }
        }
    }
}
