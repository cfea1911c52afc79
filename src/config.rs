use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use log::{info, warn};

use crate::capacity::HARD_FLEET_LIMIT;
use crate::packer::LayoutConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub planner: PlannerConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            planner: PlannerConfig::from_env(),
            store: StoreConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const HOST_VAR: &'static str = "TRUCK_PLANNER_API_HOST";
    const PORT_VAR: &'static str = "TRUCK_PLANNER_API_PORT";
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let (bind_ip, display_host) = parse_host(env_string(Self::HOST_VAR));
        let port = parse_port(env_string(Self::PORT_VAR));
        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            display_host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
        }
    }
}

fn parse_host(raw: Option<String>) -> (IpAddr, String) {
    let Some(host) = raw else {
        return (IpAddr::V4(Ipv4Addr::UNSPECIFIED), ApiConfig::DEFAULT_HOST.to_string());
    };
    match host.parse::<IpAddr>() {
        Ok(ip) => (ip, host),
        Err(err) => {
            warn!(
                "Could not parse {} ('{}'): {}. Using {}.",
                ApiConfig::HOST_VAR,
                host,
                err,
                ApiConfig::DEFAULT_HOST
            );
            (IpAddr::V4(Ipv4Addr::UNSPECIFIED), ApiConfig::DEFAULT_HOST.to_string())
        }
    }
}

fn parse_port(raw: Option<String>) -> u16 {
    let Some(raw) = raw else {
        return ApiConfig::DEFAULT_PORT;
    };
    match raw.parse::<u16>() {
        Ok(value) if value != 0 => value,
        Ok(_) => {
            warn!(
                "{} must not be 0. Using {}.",
                ApiConfig::PORT_VAR,
                ApiConfig::DEFAULT_PORT
            );
            ApiConfig::DEFAULT_PORT
        }
        Err(err) => {
            warn!(
                "Could not parse {} ('{}'): {}. Using {}.",
                ApiConfig::PORT_VAR,
                raw,
                err,
                ApiConfig::DEFAULT_PORT
            );
            ApiConfig::DEFAULT_PORT
        }
    }
}

/// Configuration for packing, scanning and capacity planning.
#[derive(Clone, Debug, Default)]
pub struct PlannerConfig {
    layout: LayoutConfig,
}

impl PlannerConfig {
    const GRID_STEP_VAR: &'static str = "TRUCK_PLANNER_GRID_STEP";
    const EPSILON_VAR: &'static str = "TRUCK_PLANNER_EPSILON";
    const ALLOW_ROTATION_VAR: &'static str = "TRUCK_PLANNER_ALLOW_ROTATION";
    const MAX_FLEET_VAR: &'static str = "TRUCK_PLANNER_MAX_FLEET_SIZE";

    fn from_env() -> Self {
        let grid_step = load_f64_with_warning(
            Self::GRID_STEP_VAR,
            LayoutConfig::DEFAULT_GRID_STEP,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted grid step changes free-spot resolution and search cost",
        );

        let epsilon = load_f64_with_warning(
            Self::EPSILON_VAR,
            LayoutConfig::DEFAULT_EPSILON,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted tolerance may let boxes touch the bed edge differently",
        );

        let allow_rotation = parse_allow_rotation(env_string(Self::ALLOW_ROTATION_VAR));

        let max_fleet_size = parse_fleet_size(env_string(Self::MAX_FLEET_VAR));

        let layout = LayoutConfig::builder()
            .grid_step(grid_step)
            .epsilon(epsilon)
            .allow_rotation(allow_rotation)
            .max_fleet_size(max_fleet_size)
            .build();

        Self { layout }
    }

    pub fn layout_config(&self) -> LayoutConfig {
        self.layout
    }
}

fn parse_allow_rotation(raw: Option<String>) -> bool {
    raw.and_then(|raw| parse_bool(&raw, PlannerConfig::ALLOW_ROTATION_VAR))
        .unwrap_or(LayoutConfig::DEFAULT_ALLOW_ROTATION)
}

fn parse_fleet_size(raw: Option<String>) -> usize {
    let default = LayoutConfig::DEFAULT_MAX_FLEET_SIZE;
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<usize>() {
        Ok(value) if (1..=HARD_FLEET_LIMIT).contains(&value) => value,
        Ok(value) => {
            warn!(
                "{} contains invalid value '{}': must be between 1 and {}. Using {}.",
                PlannerConfig::MAX_FLEET_VAR,
                value,
                HARD_FLEET_LIMIT,
                default
            );
            default
        }
        Err(err) => {
            warn!(
                "Could not parse {} ('{}'): {}. Using {}.",
                PlannerConfig::MAX_FLEET_VAR,
                raw,
                err,
                default
            );
            default
        }
    }
}

/// Where trucks and tours are kept.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    data_dir: Option<PathBuf>,
}

impl StoreConfig {
    const DATA_DIR_VAR: &'static str = "TRUCK_PLANNER_DATA_DIR";

    fn from_env() -> Self {
        Self {
            data_dir: env_string(Self::DATA_DIR_VAR).map(PathBuf::from),
        }
    }

    /// Directory of the JSON store; `None` means an in-memory store.
    pub fn data_dir(&self) -> Option<&PathBuf> {
        self.data_dir.as_ref()
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    parse_f64_setting(var_name, env_string(var_name), default, validator, invalid_hint, notice)
}

fn parse_f64_setting(
    var_name: &str,
    raw: Option<String>,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && validator(value) => {
            let tolerance = (default.abs().max(1.0)) * 1e-9;
            if (value - default).abs() > tolerance {
                info!("{} ({} = {}).", notice, var_name, value);
            }
            value
        }
        Ok(_) => {
            warn!(
                "{} contains invalid value '{}': {}. Using {}.",
                var_name, raw, invalid_hint, default
            );
            default
        }
        Err(err) => {
            warn!(
                "Could not parse {} ('{}') as number: {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}
