use std::process::ExitCode;

use lorenz_flow::{Config, ConfigError, Simulation, Strategy};

const USAGE: &str = "usage: lorenz-flow [CONFIG.json] [--strategy rk4|single-step|gpu] [--seed N]";

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Config, ConfigError> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut strategy = None;
    let mut seed = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--strategy" => {
                let value = args.next().ok_or_else(|| {
                    ConfigError::InvalidArgument("--strategy needs a value".into())
                })?;
                strategy = Some(value.parse::<Strategy>()?);
            }
            "--seed" => {
                let value = args
                    .next()
                    .ok_or_else(|| ConfigError::InvalidArgument("--seed needs a value".into()))?;
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidArgument(format!("--seed {}", value)))?;
                seed = Some(parsed);
            }
            flag if flag.starts_with("--") => {
                return Err(ConfigError::InvalidArgument(flag.to_string()));
            }
            path if config_path.is_none() => config_path = Some(path.to_string()),
            extra => return Err(ConfigError::InvalidArgument(extra.to_string())),
        }
    }

    let mut config = match config_path {
        Some(path) => {
            log::info!("loading configuration from {}", path);
            Config::load(path)?
        }
        None => Config::default(),
    };
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match parse_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    match Simulation::new().with_config(config).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
