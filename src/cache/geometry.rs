use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest line size a cache may be configured with, in bytes.
pub const MIN_LINE_SIZE: u64 = 8;

/// Single-set geometries with more ways than this default to the fully
/// associative organization.
pub const FA_WAYS_THRESHOLD: usize = 4;

pub const USAGE: &str = "cache configurations must be of the form
  sets:ways:blocksize
where sets, ways, and blocksize are positive integers, with
sets and blocksize both powers of two and blocksize at least 8.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("set count must be positive")]
    ZeroSets,
    #[error("set count {0} is not a power of two")]
    SetsNotPowerOfTwo(usize),
    #[error("way count must be positive")]
    ZeroWays,
    #[error("line size {0} is below the 8 byte minimum")]
    LineTooSmall(u64),
    #[error("line size {0} is not a power of two")]
    LineNotPowerOfTwo(u64),
    #[error("fully associative caches have exactly one set, got {0}")]
    FullyAssociativeSets(usize),
    #[error("{sets} sets of {ways} ways with {line_size} byte lines do not fit in memory")]
    TooLarge {
        sets: usize,
        ways: usize,
        line_size: u64,
    },
    #[error("malformed cache configuration '{0}'")]
    Malformed(String),
}

/// Fixed shape of a cache: `sets` x `ways` lines of `line_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CacheGeometry {
    sets: usize,
    ways: usize,
    line_size: u64,
}

impl CacheGeometry {
    pub fn new(sets: usize, ways: usize, line_size: u64) -> Result<Self, GeometryError> {
        if sets == 0 {
            return Err(GeometryError::ZeroSets);
        }
        if !sets.is_power_of_two() {
            return Err(GeometryError::SetsNotPowerOfTwo(sets));
        }
        if line_size < MIN_LINE_SIZE {
            return Err(GeometryError::LineTooSmall(line_size));
        }
        if !line_size.is_power_of_two() {
            return Err(GeometryError::LineNotPowerOfTwo(line_size));
        }
        if ways == 0 {
            return Err(GeometryError::ZeroWays);
        }
        let fits = sets
            .checked_mul(ways)
            .and_then(|lines| u64::try_from(lines).ok())
            .and_then(|lines| lines.checked_mul(line_size))
            .is_some();
        if !fits {
            return Err(GeometryError::TooLarge {
                sets,
                ways,
                line_size,
            });
        }
        Ok(Self {
            sets,
            ways,
            line_size,
        })
    }

    pub fn sets(&self) -> usize {
        self.sets
    }

    pub fn ways(&self) -> usize {
        self.ways
    }

    pub fn line_size(&self) -> u64 {
        self.line_size
    }

    /// Number of line-offset bits, log2(line_size).
    pub fn index_shift(&self) -> u32 {
        self.line_size.trailing_zeros()
    }

    pub fn lines(&self) -> usize {
        self.sets * self.ways
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.lines() as u64 * self.line_size
    }

    /// Address with the line offset stripped.
    pub fn line_addr(&self, addr: u64) -> u64 {
        addr >> self.index_shift()
    }

    pub fn set_index(&self, addr: u64) -> usize {
        (self.line_addr(addr) & (self.sets as u64 - 1)) as usize
    }

    /// `addr` rounded down to the start of its line.
    pub fn align(&self, addr: u64) -> u64 {
        addr & !(self.line_size - 1)
    }
}

impl FromStr for CacheGeometry {
    type Err = GeometryError;

    /// Parses `sets:ways:blocksize`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || GeometryError::Malformed(value.to_string());
        let fields: Vec<&str> = value.trim().split(':').collect();
        let [sets, ways, line_size] = fields.as_slice() else {
            return Err(malformed());
        };
        let sets = sets.trim().parse::<usize>().map_err(|_| malformed())?;
        let ways = ways.trim().parse::<usize>().map_err(|_| malformed())?;
        let line_size = line_size.trim().parse::<u64>().map_err(|_| malformed())?;
        Self::new(sets, ways, line_size)
    }
}

impl fmt::Display for CacheGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.sets, self.ways, self.line_size)
    }
}

/// How ways are searched and replaced.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Organization {
    SetAssociative,
    FullyAssociative,
}

impl Organization {
    /// Default choice for a geometry when the caller does not pick one.
    pub fn infer(geometry: &CacheGeometry) -> Self {
        if geometry.ways() > FA_WAYS_THRESHOLD && geometry.sets() == 1 {
            Self::FullyAssociative
        } else {
            Self::SetAssociative
        }
    }

    pub fn check(self, geometry: &CacheGeometry) -> Result<(), GeometryError> {
        match self {
            Self::FullyAssociative if geometry.sets() != 1 => {
                Err(GeometryError::FullyAssociativeSets(geometry.sets()))
            }
            _ => Ok(()),
        }
    }
}

impl FromStr for Organization {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "set_associative" | "sa" => Ok(Self::SetAssociative),
            "fully_associative" | "fa" => Ok(Self::FullyAssociative),
            _ => Err(format!(
                "unsupported organization '{}', expected one of: set_associative, fully_associative",
                value
            )),
        }
    }
}

impl fmt::Display for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SetAssociative => "set_associative",
            Self::FullyAssociative => "fully_associative",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_set_counts() {
        assert_eq!(CacheGeometry::new(0, 4, 64), Err(GeometryError::ZeroSets));
        assert_eq!(
            CacheGeometry::new(48, 4, 64),
            Err(GeometryError::SetsNotPowerOfTwo(48))
        );
    }

    #[test]
    fn rejects_bad_line_sizes() {
        assert_eq!(CacheGeometry::new(64, 4, 4), Err(GeometryError::LineTooSmall(4)));
        assert_eq!(
            CacheGeometry::new(64, 4, 96),
            Err(GeometryError::LineNotPowerOfTwo(96))
        );
        assert!(CacheGeometry::new(64, 4, 8).is_ok());
    }

    #[test]
    fn rejects_zero_ways() {
        assert_eq!(CacheGeometry::new(1, 0, 64), Err(GeometryError::ZeroWays));
    }

    #[test]
    fn rejects_geometry_too_large_to_index() {
        assert_eq!(
            CacheGeometry::new(2, usize::MAX, 64),
            Err(GeometryError::TooLarge {
                sets: 2,
                ways: usize::MAX,
                line_size: 64
            })
        );
        assert!(matches!(
            CacheGeometry::new(1, usize::MAX, 1 << 40),
            Err(GeometryError::TooLarge { .. })
        ));
        assert!("2:9223372036854775808:64".parse::<CacheGeometry>().is_err());
        let big = CacheGeometry::new(1 << 10, 1 << 10, 1 << 12).unwrap();
        assert_eq!(big.capacity_bytes(), 1 << 32);
    }

    #[test]
    fn non_power_of_two_way_count_is_fine() {
        let geometry = CacheGeometry::new(16, 3, 32).unwrap();
        assert_eq!(geometry.lines(), 48);
        assert_eq!(geometry.capacity_bytes(), 48 * 32);
    }

    #[test]
    fn index_shift_is_log2_of_line_size() {
        for (line, shift) in [(8u64, 3u32), (64, 6), (4096, 12)] {
            let geometry = CacheGeometry::new(1, 1, line).unwrap();
            assert_eq!(geometry.index_shift(), shift);
        }
    }

    #[test]
    fn set_index_and_alignment() {
        let geometry = CacheGeometry::new(64, 4, 64).unwrap();
        assert_eq!(geometry.set_index(0x1000), 0);
        assert_eq!(geometry.set_index(0x1040), 1);
        assert_eq!(geometry.set_index(0x2000), 0);
        assert_eq!(geometry.align(0x107f), 0x1040);
        assert_eq!(geometry.line_addr(0x1040), 0x41);
    }

    #[test]
    fn parses_colon_separated_config() {
        let geometry: CacheGeometry = "64:4:64".parse().unwrap();
        assert_eq!(geometry, CacheGeometry::new(64, 4, 64).unwrap());
        assert_eq!(geometry.to_string(), "64:4:64");
    }

    #[test]
    fn malformed_config_strings() {
        for bad in ["", "64", "64:4", "64:4:64:1", "a:4:64", "64::64", "-1:4:64"] {
            assert_eq!(
                bad.parse::<CacheGeometry>(),
                Err(GeometryError::Malformed(bad.to_string())),
                "input {bad:?}"
            );
        }
        assert_eq!(
            "3:4:64".parse::<CacheGeometry>(),
            Err(GeometryError::SetsNotPowerOfTwo(3))
        );
    }

    #[test]
    fn infer_picks_fully_associative_for_wide_single_set() {
        let wide = CacheGeometry::new(1, 64, 64).unwrap();
        let narrow = CacheGeometry::new(1, 4, 64).unwrap();
        let multi = CacheGeometry::new(2, 64, 64).unwrap();
        assert_eq!(Organization::infer(&wide), Organization::FullyAssociative);
        assert_eq!(Organization::infer(&narrow), Organization::SetAssociative);
        assert_eq!(Organization::infer(&multi), Organization::SetAssociative);
    }

    #[test]
    fn fully_associative_needs_single_set() {
        let geometry = CacheGeometry::new(4, 8, 64).unwrap();
        assert_eq!(
            Organization::FullyAssociative.check(&geometry),
            Err(GeometryError::FullyAssociativeSets(4))
        );
        assert!(Organization::SetAssociative.check(&geometry).is_ok());
    }

    #[test]
    fn organization_from_str() {
        assert_eq!("fa".parse(), Ok(Organization::FullyAssociative));
        assert_eq!("set_associative".parse(), Ok(Organization::SetAssociative));
        assert!("direct".parse::<Organization>().is_err());
    }
}
