use serde::Serialize;
use std::fmt;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    read_accesses: u64,
    write_accesses: u64,
    read_misses: u64,
    write_misses: u64,
    bytes_read: u64,
    bytes_written: u64,
    writebacks: u64,
}

impl CacheStats {
    pub fn read_accesses(&self) -> u64 {
        self.read_accesses
    }

    pub fn write_accesses(&self) -> u64 {
        self.write_accesses
    }

    pub fn read_misses(&self) -> u64 {
        self.read_misses
    }

    pub fn write_misses(&self) -> u64 {
        self.write_misses
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn writebacks(&self) -> u64 {
        self.writebacks
    }

    pub fn accesses(&self) -> u64 {
        self.read_accesses.saturating_add(self.write_accesses)
    }

    pub fn misses(&self) -> u64 {
        self.read_misses.saturating_add(self.write_misses)
    }

    pub fn hits(&self) -> u64 {
        self.accesses() - self.misses()
    }

    /// Misses as a percentage of all accesses; `None` before the first access.
    pub fn miss_rate(&self) -> Option<f64> {
        match self.accesses() {
            0 => None,
            total => Some(100.0 * self.misses() as f64 / total as f64),
        }
    }

    pub fn record_access(&mut self, bytes: u64, store: bool) {
        if store {
            self.write_accesses = self.write_accesses.saturating_add(1);
            self.bytes_written = self.bytes_written.saturating_add(bytes);
        } else {
            self.read_accesses = self.read_accesses.saturating_add(1);
            self.bytes_read = self.bytes_read.saturating_add(bytes);
        }
    }

    pub fn record_miss(&mut self, store: bool) {
        if store {
            self.write_misses = self.write_misses.saturating_add(1);
        } else {
            self.read_misses = self.read_misses.saturating_add(1);
        }
    }

    pub fn record_writeback(&mut self) {
        self.writebacks = self.writebacks.saturating_add(1);
    }

    /// Counters accumulated after `earlier` was taken.
    pub fn since(&self, earlier: &CacheStats) -> CacheStats {
        CacheStats {
            read_accesses: self.read_accesses.saturating_sub(earlier.read_accesses),
            write_accesses: self.write_accesses.saturating_sub(earlier.write_accesses),
            read_misses: self.read_misses.saturating_sub(earlier.read_misses),
            write_misses: self.write_misses.saturating_sub(earlier.write_misses),
            bytes_read: self.bytes_read.saturating_sub(earlier.bytes_read),
            bytes_written: self.bytes_written.saturating_sub(earlier.bytes_written),
            writebacks: self.writebacks.saturating_sub(earlier.writebacks),
        }
    }

    pub fn report<'a>(&'a self, name: &'a str) -> StatsReport<'a> {
        StatsReport { name, stats: self }
    }
}

impl AddAssign<&CacheStats> for CacheStats {
    fn add_assign(&mut self, other: &CacheStats) {
        self.read_accesses = self.read_accesses.saturating_add(other.read_accesses);
        self.write_accesses = self.write_accesses.saturating_add(other.write_accesses);
        self.read_misses = self.read_misses.saturating_add(other.read_misses);
        self.write_misses = self.write_misses.saturating_add(other.write_misses);
        self.bytes_read = self.bytes_read.saturating_add(other.bytes_read);
        self.bytes_written = self.bytes_written.saturating_add(other.bytes_written);
        self.writebacks = self.writebacks.saturating_add(other.writebacks);
    }
}

impl AddAssign<CacheStats> for CacheStats {
    fn add_assign(&mut self, other: CacheStats) {
        *self += &other;
    }
}

/// Per-cache text report, one counter per line prefixed with the cache name.
/// Renders nothing for a cache that was never accessed.
pub struct StatsReport<'a> {
    name: &'a str,
    stats: &'a CacheStats,
}

impl fmt::Display for StatsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(miss_rate) = self.stats.miss_rate() else {
            return Ok(());
        };
        let s = self.stats;
        let rows: [(&str, u64); 7] = [
            ("Bytes Read:", s.bytes_read),
            ("Bytes Written:", s.bytes_written),
            ("Read Accesses:", s.read_accesses),
            ("Write Accesses:", s.write_accesses),
            ("Read Misses:", s.read_misses),
            ("Write Misses:", s.write_misses),
            ("Writebacks:", s.writebacks),
        ];
        for (label, value) in rows {
            writeln!(f, "{} {:<22} {}", self.name, label, value)?;
        }
        writeln!(f, "{} {:<22} {:.3}%", self.name, "Miss Rate:", miss_rate)
    }
}
