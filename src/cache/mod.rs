pub mod geometry;
pub mod hierarchy;
pub mod sim;
pub mod stats;
pub mod tag_array;
pub mod tags;


pub use geometry::{CacheGeometry, GeometryError, Organization};
pub use hierarchy::{CacheHierarchy, HandlerId, HierarchyError, LevelId};
pub use sim::{AccessOutcome, CacheSim};
pub use stats::{CacheStats, StatsReport};
pub use tag_array::{FullyAssocTags, SetAssocTags, TagArray};
pub use tags::TagEntry;
