//! # Application Configuration
//!
//! Loading, default generation and resolution of the miner configuration.
//! The file is a TOML document managed by `confy` with three sections:
//! - `[rpc]`: how to reach the daemon.
//! - `[miner]`: which network profile to use and how to mine on it.
//! - `[logging]`: default log level.
//!
//! Most fields are optional: whatever the file leaves out is filled in from
//! the selected [`Network`] profile. Command line flags beat both.

use clap::ValueEnum;
use fleet_mining_controller::{ControllerSettings, GenerateDialect, DEFAULT_HIGH_DIFFICULTY};
use fleet_rpc_connector::RpcConfig as ConnectorRpcConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const APP_NAME: &str = "fleet_miner";
pub const CONFIG_NAME: &str = "Config";

/// Network the daemon runs on. Selects the defaults of everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Regtest,
}

/// Defaults that differ between networks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkProfile {
    pub default_rpc_url: &'static str,
    pub dialect: GenerateDialect,
    pub default_max_tries: u64,
    pub mining_timeout: Duration,
    pub default_interval: Duration,
    pub expects_credentials: bool,
    /// Command that starts a daemon for this network.
    pub daemon_command: &'static str,
}

const MAINNET: NetworkProfile = NetworkProfile {
    default_rpc_url: "http://127.0.0.1:22555",
    dialect: GenerateDialect::CountWithMaxTries,
    default_max_tries: fleet_mining_controller::DEFAULT_MAX_TRIES,
    mining_timeout: Duration::from_secs(3600),
    default_interval: Duration::from_secs(10),
    expects_credentials: true,
    daemon_command: "fleetcreditsd -daemon",
};

const REGTEST: NetworkProfile = NetworkProfile {
    default_rpc_url: "http://127.0.0.1:42068",
    dialect: GenerateDialect::CountOnly,
    default_max_tries: fleet_mining_controller::DEFAULT_MAX_TRIES,
    mining_timeout: Duration::from_secs(30),
    default_interval: Duration::from_secs(1),
    expects_credentials: false,
    daemon_command: "fleetcreditsd -regtest -daemon",
};

impl Network {
    pub fn profile(self) -> &'static NetworkProfile {
        match self {
            Network::Mainnet => &MAINNET,
            Network::Regtest => &REGTEST,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[rpc]` section.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RpcConfig {
    /// JSON-RPC endpoint. Falls back to the network profile when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Budget for a `generate` call. Profile default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mining_timeout_secs: Option<u64>,
    #[serde(default = "default_info_timeout_secs")]
    pub info_timeout_secs: u64,
}

fn default_info_timeout_secs() -> u64 { 30 }

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            url: None,
            username: None,
            password: None,
            mining_timeout_secs: None,
            info_timeout_secs: default_info_timeout_secs(),
        }
    }
}

/// `[miner]` section.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MinerConfig {
    #[serde(default)]
    pub network: Network,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tries: Option<u64>,
    /// Pause between auto-mining attempts, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<f64>,
    #[serde(default = "default_high_difficulty_threshold")]
    pub high_difficulty_threshold: f64,
}

fn default_high_difficulty_threshold() -> f64 { DEFAULT_HIGH_DIFFICULTY }

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            network: Network::default(),
            max_tries: None,
            interval_secs: None,
            high_difficulty_threshold: default_high_difficulty_threshold(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level() }
    }
}

/// Where [`Config::load`] got its configuration from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// An existing file was read.
    Loaded(PathBuf),
    /// No file existed; one was written with default values.
    Created(PathBuf),
}

impl ConfigOrigin {
    pub fn path(&self) -> &Path {
        match self {
            ConfigOrigin::Loaded(p) | ConfigOrigin::Created(p) => p,
        }
    }

    /// Reports the origin once logging is up.
    pub fn log(&self) {
        match self {
            ConfigOrigin::Loaded(p) => info!("Configuration loaded from '{}'.", p.display()),
            ConfigOrigin::Created(p) => info!(
                "Created configuration file '{}' with default values. Edit it to set RPC credentials.",
                p.display()
            ),
        }
    }
}

/// Command line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub network: Option<Network>,
    pub rpc_url: Option<String>,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
}

/// Everything a command needs, after file, flags and profile have been merged.
#[derive(Debug, Clone)]
pub struct Settings {
    pub network: Network,
    pub rpc: ConnectorRpcConfig,
    pub controller: ControllerSettings,
    pub interval: Duration,
}

impl Config {
    /// Loads the configuration from `path_override` or from confy's default
    /// location for app `fleet_miner`, file `Config`.
    ///
    /// A missing file is created with default values. A file that exists but
    /// cannot be parsed is reported as an error and left untouched.
    ///
    /// This runs before logging is set up, so it reports what it did through
    /// the returned [`ConfigOrigin`] instead of logging it.
    pub fn load(path_override: Option<&str>) -> Result<(Self, ConfigOrigin), confy::ConfyError> {
        // Resolve the path first: whether the file existed decides the origin.
        let path = match path_override {
            Some(p) => PathBuf::from(p),
            None => confy::get_configuration_file_path(APP_NAME, Some(CONFIG_NAME))?,
        };
        let existed = path.exists();

        // confy writes the defaults itself when the file is missing; a parse
        // error comes back as `Err` without touching the file.
        let cfg: Config = confy::load_path(&path)?;
        let origin = if existed { ConfigOrigin::Loaded(path) } else { ConfigOrigin::Created(path) };
        Ok((cfg, origin))
    }

    /// Merges the file with command line overrides and the network profile.
    pub fn resolve(&self, overrides: &Overrides) -> Settings {
        // The network decides every default below, so it is settled first.
        let network = overrides.network.unwrap_or(self.miner.network);
        let profile = network.profile();

        // Endpoint and credentials: flag, then file, then profile.
        let url = overrides
            .rpc_url
            .clone()
            .or_else(|| self.rpc.url.clone())
            .unwrap_or_else(|| profile.default_rpc_url.to_string());
        let username = overrides.rpc_user.clone().or_else(|| self.rpc.username.clone());
        let password = overrides.rpc_password.clone().or_else(|| self.rpc.password.clone());

        // Timeouts: a zero budget would fail every call, so it is corrected.
        let mining_timeout = match self.rpc.mining_timeout_secs {
            Some(secs) => validate_timeout_secs("rpc.mining_timeout_secs", secs, profile.mining_timeout),
            None => profile.mining_timeout,
        };
        let info_timeout = validate_timeout_secs(
            "rpc.info_timeout_secs",
            self.rpc.info_timeout_secs,
            Duration::from_secs(default_info_timeout_secs()),
        );

        let rpc = ConnectorRpcConfig {
            url,
            username,
            password,
            mining_timeout,
            info_timeout,
        };

        // Mining parameters. The dialect always follows the network.
        let controller = ControllerSettings {
            dialect: profile.dialect,
            max_tries: validate_max_tries(self.miner.max_tries.unwrap_or(profile.default_max_tries)),
            high_difficulty_threshold: self.miner.high_difficulty_threshold,
        };

        // Auto-mining pause; `auto --interval` may still override it later.
        let interval = self
            .miner
            .interval_secs
            .map(interval_from_secs)
            .unwrap_or(profile.default_interval);

        Settings { network, rpc, controller, interval }
    }
}

impl Settings {
    /// Whether both halves of the credentials are present.
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.rpc.username) && present(&self.rpc.password)
    }

    /// Logs a warning when the network expects credentials and none are set.
    /// Mining may still work if the daemon allows anonymous RPC.
    pub fn warn_on_missing_credentials(&self) -> bool {
        if self.network.profile().expects_credentials && !self.has_credentials() {
            warn!(
                "No RPC credentials configured for {}. Set rpc.username and rpc.password (or --rpc-user / --rpc-password) if the daemon requires them.",
                self.network
            );
            return true;
        }
        false
    }
}

/// Writes a default configuration to `path`.
pub fn generate_default_config(path: &str) -> Result<(), confy::ConfyError> {
    confy::store_path(path, Config::default())
}

/// Hints printed when the daemon cannot be reached at startup.
pub fn startup_hints(settings: &Settings) -> Vec<String> {
    let profile = settings.network.profile();
    let mut hints = vec![
        format!("Make sure the daemon is running: {}", profile.daemon_command),
        format!("Check that RPC is reachable at {}", settings.rpc.url),
    ];
    if profile.expects_credentials {
        hints.push("Check rpcuser / rpcpassword in the daemon's configuration file".to_string());
    }
    hints
}

/// Turns a configured interval into a `Duration`. Negative or non-finite
/// values become zero.
pub fn interval_from_secs(secs: f64) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) => d,
        Err(_) => {
            warn!("Invalid interval {} s. Using 0 (no pause between attempts).", secs);
            Duration::ZERO
        }
    }
}

/// A zero search budget can never find a block; fall back to the default.
pub fn validate_max_tries(max_tries: u64) -> u64 {
    if max_tries == 0 {
        warn!(
            "max_tries = 0 would never find a block. Using {}.",
            fleet_mining_controller::DEFAULT_MAX_TRIES
        );
        return fleet_mining_controller::DEFAULT_MAX_TRIES;
    }
    max_tries
}

/// A zero timeout makes every call of that class fail at once; fall back to
/// `fallback` instead.
pub fn validate_timeout_secs(field: &str, secs: u64, fallback: Duration) -> Duration {
    if secs == 0 {
        warn!(
            "{} = 0 would make every call time out immediately. Using {} s.",
            field,
            fallback.as_secs()
        );
        return fallback;
    }
    Duration::from_secs(secs)
}
