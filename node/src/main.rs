use anyhow::{Context, Result};
use churn_rpc::{start_server, AppState};
use churn_scoring::artifacts::{PIPELINE_FILE, TEST_SET_FILE};
use clap::{value_parser, Arg, ArgMatches, Command};
use config::{Config, File as ConfigFile};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "config/churn.toml";
const ENV_PREFIX: &str = "CHURN";

#[derive(Debug, Clone, PartialEq)]
struct AppConfig {
    config_path: Option<PathBuf>,

    // Listener
    host: String,
    port: u16,

    // Artifacts
    model_dir: PathBuf,
    model_file: String,
    test_set_file: String,

    // Logging
    log_level: String,
    log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_dir: PathBuf::from("app").join("model"),
            model_file: PIPELINE_FILE.to_string(),
            test_set_file: TEST_SET_FILE.to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Layer: defaults < config file < `CHURN_*` environment.
    fn load(config_path_override: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                Some(path)
            } else {
                None
            }
        };

        let mut builder = Config::builder();

        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        let config = builder.build()?;

        let port = match get_string_value(&config, &["port"]) {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid port `{raw}`"))?,
            None => defaults.port,
        };

        Ok(Self {
            config_path: resolved_path,
            host: get_string_value(&config, &["host"]).unwrap_or(defaults.host),
            port,
            model_dir: get_string_value(&config, &["model_dir"])
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            model_file: get_string_value(&config, &["model_file"]).unwrap_or(defaults.model_file),
            test_set_file: get_string_value(&config, &["test_set_file"])
                .unwrap_or(defaults.test_set_file),
            log_level: get_string_value(&config, &["log_level"]).unwrap_or(defaults.log_level),
            log_format: get_string_value(&config, &["log_format"])
                .map(|format| format.to_lowercase())
                .unwrap_or(defaults.log_format),
        })
    }

    /// Command-line flags win over every other source.
    fn apply_cli_overrides(&mut self, matches: &ArgMatches) {
        if let Some(host) = matches.get_one::<String>("host") {
            self.host = host.clone();
        }
        if let Some(port) = matches.get_one::<u16>("port") {
            self.port = *port;
        }
        if let Some(dir) = matches.get_one::<PathBuf>("model-dir") {
            self.model_dir = dir.clone();
        }
    }

    fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    fn test_set_path(&self) -> PathBuf {
        self.model_dir.join(&self.test_set_file)
    }

    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn cli() -> Command {
    Command::new("churn-api")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Churn prediction scoring service")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Address to bind"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Port to listen on"),
        )
        .arg(
            Arg::new("model-dir")
                .short('m')
                .long("model-dir")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding churn_pipeline.json and test_set.csv"),
        )
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut config = AppConfig::load(matches.get_one::<String>("config").map(String::as_str))?;
    config.apply_cli_overrides(&matches);
    init_logging(&config)?;

    info!("Churn API v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config.config_path {
        info!("Configuration loaded from {}", path.display());
    }

    let state = match AppState::load(&config.model_path(), &config.test_set_path()) {
        Ok(state) => state,
        Err(err) => {
            error!("Cannot start without a valid pipeline: {err:#}");
            return Err(err);
        }
    };
    state.warm_up();

    start_server(state, &config.bind_address()).await
}
