use std::fs;
use std::process::ExitCode;

use cachesim::cache::geometry::{GeometryError, USAGE};
use cachesim::ui::{default_log_filter, make_sim, CachesimArgs};
use clap::Parser;
use env_logger::Env;

pub fn main() -> ExitCode {
    let argv = CachesimArgs::parse();

    let config = match &argv.config_path {
        Some(path) => match fs::read_to_string(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to read config file {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => String::new(),
    };

    let default_filter = default_log_filter(&config, &argv);
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let result = make_sim(&config, Some(argv)).and_then(|mut sim| sim.simulate());
    match result {
        Ok(summary) => {
            print!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            if err.downcast_ref::<GeometryError>().is_some() {
                eprintln!("{}", USAGE);
            }
            ExitCode::FAILURE
        }
    }
}
