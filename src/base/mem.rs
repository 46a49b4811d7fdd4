use serde::Serialize;

/// Downstream side of a cache: the next level, or the end of the hierarchy.
///
/// A cache forwards a line-sized write for every dirty victim and a
/// line-sized read for every fill. Handlers have the same total-success
/// contract as the caches that call them, so there is no error return.
pub trait MissHandler {
    fn access(&mut self, addr: u64, bytes: u64, store: bool);
}

impl<H: MissHandler + ?Sized> MissHandler for &mut H {
    fn access(&mut self, addr: u64, bytes: u64, store: bool) {
        (**self).access(addr, bytes, store);
    }
}

/// Terminal sink at the bottom of a hierarchy. Holds no data, only counts
/// the traffic that reached it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MainMemory {
    reads: u64,
    writes: u64,
    bytes_read: u64,
    bytes_written: u64,
}

impl MainMemory {
    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl MissHandler for MainMemory {
    fn access(&mut self, _addr: u64, bytes: u64, store: bool) {
        if store {
            self.writes = self.writes.saturating_add(1);
            self.bytes_written = self.bytes_written.saturating_add(bytes);
        } else {
            self.reads = self.reads.saturating_add(1);
            self.bytes_read = self.bytes_read.saturating_add(bytes);
        }
    }
}

/// Handler that remembers every forwarded access, in order.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub accesses: Vec<(u64, u64, bool)>,
}

#[cfg(test)]
impl Recorder {
    pub fn writes(&self) -> Vec<(u64, u64)> {
        self.accesses
            .iter()
            .filter(|(_, _, store)| *store)
            .map(|&(addr, bytes, _)| (addr, bytes))
            .collect()
    }

    pub fn reads(&self) -> Vec<(u64, u64)> {
        self.accesses
            .iter()
            .filter(|(_, _, store)| !*store)
            .map(|&(addr, bytes, _)| (addr, bytes))
            .collect()
    }
}

#[cfg(test)]
impl MissHandler for Recorder {
    fn access(&mut self, addr: u64, bytes: u64, store: bool) {
        self.accesses.push((addr, bytes, store));
    }
}
