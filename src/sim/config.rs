use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

use crate::cache::{CacheGeometry, CacheSim, GeometryError, Organization};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrontendMode {
    #[default]
    Trace,
    Traffic,
}

impl FromStr for FrontendMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "trace" => Ok(Self::Trace),
            "traffic" => Ok(Self::Traffic),
            _ => Err(format!(
                "unsupported frontend mode '{}', expected one of: trace, traffic",
                value
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SimConfig {
    pub trace: Option<PathBuf>,
    pub log: bool,
    pub json: Option<PathBuf>,
    pub frontend_mode: FrontendMode,
}

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> anyhow::Result<Self> {
        match section {
            Some(value) => value
                .clone()
                .try_into()
                .context("cannot deserialize config section"),
            None => {
                warn!("config section not found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

impl Config for SimConfig {}

/// One cache level as written in the config file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LevelConfig {
    /// `sets:ways:blocksize`
    pub geometry: String,
    #[serde(default)]
    pub organization: Option<Organization>,
}

impl LevelConfig {
    pub fn new(geometry: impl Into<String>) -> Self {
        Self {
            geometry: geometry.into(),
            organization: None,
        }
    }

    pub fn build(&self, name: &str) -> Result<CacheSim, GeometryError> {
        let geometry = self.geometry.parse::<CacheGeometry>()?;
        match self.organization {
            Some(organization) => CacheSim::with_organization(name, geometry, organization),
            None => Ok(CacheSim::new(name, geometry)),
        }
    }
}

/// Split L1s feeding an optional shared L2. A missing L1 sends its traffic
/// to the next level down. Only levels named in a present `[hierarchy]`
/// section exist; the defaults apply when the section is absent.
#[derive(Debug, Deserialize, Clone)]
pub struct HierarchyConfig {
    pub icache: Option<LevelConfig>,
    pub dcache: Option<LevelConfig>,
    pub l2: Option<LevelConfig>,
}

impl Config for HierarchyConfig {}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            icache: Some(LevelConfig::new("64:4:64")),
            dcache: Some(LevelConfig::new("64:4:64")),
            l2: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml::Table;

    #[test]
    fn parses_full_config() {
        let table: Table = toml::from_str(
            r#"
            [sim]
            trace = "run.trace"
            log = true
            frontend_mode = "traffic"

            [hierarchy.dcache]
            geometry = "128:8:64"

            [hierarchy.l2]
            geometry = "1:16:64"
            organization = "set_associative"
            "#,
        )
        .unwrap();
        let sim = SimConfig::from_section(table.get("sim")).unwrap();
        assert_eq!(sim.trace, Some(PathBuf::from("run.trace")));
        assert!(sim.log);
        assert_eq!(sim.frontend_mode, FrontendMode::Traffic);

        let hierarchy = HierarchyConfig::from_section(table.get("hierarchy")).unwrap();
        assert_eq!(hierarchy.icache, None);
        assert_eq!(hierarchy.dcache, Some(LevelConfig::new("128:8:64")));
        let l2 = hierarchy.l2.unwrap();
        assert_eq!(l2.organization, Some(Organization::SetAssociative));
        assert_eq!(l2.build("L2$").unwrap().organization(), Organization::SetAssociative);
    }

    #[test]
    fn missing_section_falls_back_to_defaults() {
        let hierarchy = HierarchyConfig::from_section(None).unwrap();
        assert!(hierarchy.icache.is_some());
        assert!(hierarchy.l2.is_none());
        let sim = SimConfig::from_section(None).unwrap();
        assert_eq!(sim.frontend_mode, FrontendMode::Trace);
    }

    #[test]
    fn bad_field_type_is_an_error() {
        let table: Table = toml::from_str("[sim]\nlog = 3\n").unwrap();
        assert!(SimConfig::from_section(table.get("sim")).is_err());
    }

    #[test]
    fn level_build_reports_geometry_errors() {
        assert_eq!(
            LevelConfig::new("3:4:64").build("D$").unwrap_err(),
            GeometryError::SetsNotPowerOfTwo(3)
        );
    }
}
