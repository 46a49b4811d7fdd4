use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use toml::Table;

use crate::sim::config::{Config, FrontendMode, HierarchyConfig, LevelConfig, SimConfig};
use crate::sim::top::Sim;
use crate::traffic::TrafficConfig;

#[derive(Parser, Debug, Default)]
#[command(version, about = "Trace-driven cache hierarchy simulator")]
pub struct CachesimArgs {
    #[arg(help = "Path to config.toml")]
    pub config_path: Option<PathBuf>,
    #[arg(long, help = "Instruction cache as sets:ways:blocksize")]
    pub ic: Option<String>,
    #[arg(long, help = "Data cache as sets:ways:blocksize")]
    pub dc: Option<String>,
    #[arg(long, help = "Shared L2 cache as sets:ways:blocksize")]
    pub l2: Option<String>,
    #[arg(long, help = "Access trace to replay")]
    pub trace: Option<PathBuf>,
    #[arg(long, help = "Access source (trace, traffic)")]
    pub frontend: Option<FrontendMode>,
    #[arg(long, help = "Trace every cache miss")]
    pub log: bool,
    #[arg(long, help = "Write a JSON run summary to this path")]
    pub json: Option<PathBuf>,
}

/// Default env_logger filter: `info` when the miss trace is requested by
/// `--log` or by `log = true` under `[sim]`, `warn` otherwise. A config that
/// fails to parse is reported later by [`make_sim`].
pub fn default_log_filter(toml_string: &str, cli_args: &CachesimArgs) -> &'static str {
    let from_toml = toml::from_str::<Table>(toml_string)
        .ok()
        .and_then(|table| table.get("sim")?.get("log")?.as_bool())
        .unwrap_or(false);
    if cli_args.log || from_toml {
        "info"
    } else {
        "warn"
    }
}

/// Make a Sim object from the TOML configuration.
/// If `cli_args` is given, override TOML options with CLI arguments.
pub fn make_sim(toml_string: &str, cli_args: Option<CachesimArgs>) -> anyhow::Result<Sim> {
    let config_table: Table = toml::from_str(toml_string).context("cannot parse config toml")?;
    let mut sim_config = SimConfig::from_section(config_table.get("sim"))?;
    let mut hierarchy_config = HierarchyConfig::from_section(config_table.get("hierarchy"))?;
    let traffic_config = TrafficConfig::from_section(config_table.get("traffic"))?;

    // override toml configs with CLI args
    if let Some(args) = cli_args {
        let level = |geometry: Option<String>, current: Option<LevelConfig>| {
            geometry.map(LevelConfig::new).or(current)
        };
        hierarchy_config.icache = level(args.ic, hierarchy_config.icache);
        hierarchy_config.dcache = level(args.dc, hierarchy_config.dcache);
        hierarchy_config.l2 = level(args.l2, hierarchy_config.l2);
        sim_config.log |= args.log;
        sim_config.trace = args.trace.or(sim_config.trace);
        sim_config.json = args.json.or(sim_config.json);
        sim_config.frontend_mode = args.frontend.unwrap_or(sim_config.frontend_mode);
    }

    Sim::new(sim_config, hierarchy_config, traffic_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Organization;

    #[test]
    fn cli_overrides_toml() {
        let toml = r#"
            [sim]
            trace = "from_toml.trace"

            [hierarchy.dcache]
            geometry = "64:4:64"
        "#;
        let args = CachesimArgs::parse_from([
            "cachesim",
            "--l2",
            "1:16:64",
            "--trace",
            "from_cli.trace",
            "--log",
        ]);
        let sim = make_sim(toml, Some(args)).unwrap();
        assert_eq!(sim.config().trace, Some(PathBuf::from("from_cli.trace")));
        assert!(sim.config().log);
        let h = sim.hierarchy();
        assert_eq!(h.len(), 2);
        let l2 = h.find("L2$").unwrap();
        assert_eq!(h.level(l2).organization(), Organization::FullyAssociative);
        assert!(h.level(l2).log());
        assert!(h.find("I$").is_none());
    }

    #[test]
    fn empty_toml_uses_default_hierarchy() {
        let sim = make_sim("", None).unwrap();
        assert!(sim.hierarchy().find("I$").is_some());
        assert!(sim.hierarchy().find("D$").is_some());
        assert!(sim.hierarchy().find("L2$").is_none());
    }

    #[test]
    fn bad_cli_geometry_is_rejected() {
        let args = CachesimArgs::parse_from(["cachesim", "--dc", "64:4"]);
        assert!(make_sim("", Some(args)).is_err());
    }

    #[test]
    fn miss_trace_from_toml_raises_log_filter() {
        let args = CachesimArgs::default();
        assert_eq!(default_log_filter("[sim]\nlog = true\ntrace = \"t\"", &args), "info");
        assert_eq!(default_log_filter("[sim]\nlog = false", &args), "warn");
        assert_eq!(default_log_filter("", &args), "warn");
        assert_eq!(default_log_filter("not toml [", &args), "warn");

        let cli = CachesimArgs::parse_from(["cachesim", "--log"]);
        assert_eq!(default_log_filter("[sim]\nlog = false", &cli), "info");

        let sim = make_sim("[sim]\nlog = true", None).unwrap();
        let dc = sim.hierarchy().find("D$").unwrap();
        assert!(sim.hierarchy().level(dc).log());
    }

    #[test]
    fn frontend_flag_parses() {
        let args = CachesimArgs::parse_from(["cachesim", "cfg.toml", "--frontend", "traffic"]);
        assert_eq!(args.frontend, Some(FrontendMode::Traffic));
        assert_eq!(args.config_path, Some(PathBuf::from("cfg.toml")));
    }
}
