use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::model::TieBreak;
use crate::optimizer::EngineConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub catalog: CatalogConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            catalog: CatalogConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
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
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "WRAP_IT_NOW_API_HOST";
    const PORT_VAR: &'static str = "WRAP_IT_NOW_API_PORT";

    fn from_env() -> Self {
        Self::from_values(env_string(Self::HOST_VAR), env_string(Self::PORT_VAR))
    }

    fn from_values(host: Option<String>, port: Option<String>) -> Self {
        let default_ip = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let host_value = host.unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    var = Self::HOST_VAR,
                    value = %host_value,
                    %err,
                    "could not parse host, using {}",
                    Self::DEFAULT_HOST
                );
                (default_ip, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = match port {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(var = Self::PORT_VAR, "port must not be 0, using {}", Self::DEFAULT_PORT);
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        var = Self::PORT_VAR,
                        value = %raw,
                        %err,
                        "could not parse port, using {}",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

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

    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Where the material and template catalogs come from.
///
/// Unset paths mean the built-in tables.
#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    materials_path: Option<PathBuf>,
    templates_path: Option<PathBuf>,
}

impl CatalogConfig {
    const MATERIALS_VAR: &'static str = "WRAP_IT_NOW_MATERIALS_PATH";
    const TEMPLATES_VAR: &'static str = "WRAP_IT_NOW_TEMPLATES_PATH";

    fn from_env() -> Self {
        Self {
            materials_path: env_string(Self::MATERIALS_VAR).map(PathBuf::from),
            templates_path: env_string(Self::TEMPLATES_VAR).map(PathBuf::from),
        }
    }

    pub fn new(materials_path: Option<PathBuf>, templates_path: Option<PathBuf>) -> Self {
        Self {
            materials_path,
            templates_path,
        }
    }

    pub fn materials_path(&self) -> Option<&Path> {
        self.materials_path.as_deref()
    }

    pub fn templates_path(&self) -> Option<&Path> {
        self.templates_path.as_deref()
    }
}

/// Tunables of the design engine.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    engine: EngineConfig,
}

impl OptimizerConfig {
    const LABEL_MARGIN_VAR: &'static str = "WRAP_IT_NOW_LABEL_MARGIN";
    const CLEARANCE_VAR: &'static str = "WRAP_IT_NOW_STRUCTURAL_CLEARANCE";
    const FOOTPRINT_RATIO_VAR: &'static str = "WRAP_IT_NOW_SUPPORT_FOOTPRINT_RATIO";
    const LABEL_RETRIES_VAR: &'static str = "WRAP_IT_NOW_MAX_LABEL_RETRIES";
    const TIE_BREAK_VAR: &'static str = "WRAP_IT_NOW_TIE_BREAK";
    const PARALLEL_VAR: &'static str = "WRAP_IT_NOW_PARALLEL_SEARCH";

    fn from_env() -> Self {
        let label_margin = load_f64_with_warning(
            Self::LABEL_MARGIN_VAR,
            EngineConfig::DEFAULT_LABEL_MARGIN,
            |value| value >= 0.0,
            "must not be negative",
            "adjusted label margin changes how much text fits on a panel",
        );

        let structural_clearance = load_f64_with_warning(
            Self::CLEARANCE_VAR,
            EngineConfig::DEFAULT_STRUCTURAL_CLEARANCE,
            |value| value >= 0.0,
            "must not be negative",
            "adjusted clearance changes the size of every support block",
        );

        let support_footprint_ratio = load_f64_with_warning(
            Self::FOOTPRINT_RATIO_VAR,
            EngineConfig::DEFAULT_SUPPORT_FOOTPRINT_RATIO,
            |value| value > 0.0 && value <= 1.0,
            "must be greater than 0 and at most 1",
            "adjusted footprint ratio changes when supports are flagged",
        );

        let max_label_retries = load_usize_with_warning(
            Self::LABEL_RETRIES_VAR,
            EngineConfig::DEFAULT_MAX_LABEL_RETRIES,
        );

        let tie_break = env_string(Self::TIE_BREAK_VAR)
            .and_then(|raw| parse_tie_break(&raw, Self::TIE_BREAK_VAR))
            .unwrap_or_else(|| TieBreak::DEFAULT_ORDER.to_vec());

        let parallel_search = env_string(Self::PARALLEL_VAR)
            .and_then(|raw| parse_bool(&raw, Self::PARALLEL_VAR))
            .unwrap_or(EngineConfig::DEFAULT_PARALLEL_SEARCH);

        let engine = EngineConfig::builder()
            .label_margin(label_margin)
            .structural_clearance(structural_clearance)
            .support_footprint_ratio(support_footprint_ratio)
            .max_label_retries(max_label_retries)
            .tie_break(tie_break)
            .parallel_search(parallel_search)
            .build();

        Self { engine }
    }

    pub fn new(engine: EngineConfig) -> Self {
        Self { engine }
    }

    /// Returns the configured engine tunables.
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
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
            warn!(var = name, %err, "could not read variable, using default value");
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
                var = var_name,
                value = other,
                "could not interpret as boolean, using default value"
            );
            None
        }
    }
}

fn parse_tie_break(raw: &str, var_name: &str) -> Option<Vec<TieBreak>> {
    let parsed = TieBreak::parse_list(raw);
    if parsed.is_none() {
        warn!(
            var = var_name,
            value = raw,
            "expected a comma separated list of volume, cost, sustainability; using default order"
        );
    }
    parsed
}

fn load_usize_with_warning(var_name: &str, default: usize) -> usize {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) => value,
            Err(err) => {
                warn!(var = var_name, value = %raw, %err, "could not parse, using {}", default);
                default
            }
        },
        None => default,
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => parse_f64_with_warning(&raw, var_name, default, validator, invalid_hint, warning),
        None => default,
    }
}

fn parse_f64_with_warning(
    raw: &str,
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && validator(value) => {
            let tolerance = (default.abs().max(1.0)) * 1e-9;
            if (value - default).abs() > tolerance {
                info!(var = var_name, value, "{}", warning);
            }
            value
        }
        Ok(_) => {
            warn!(
                var = var_name,
                value = raw,
                "invalid value: {}, using {}",
                invalid_hint,
                default
            );
            default
        }
        Err(err) => {
            warn!(
                var = var_name,
                value = raw,
                %err,
                "could not parse as number, using {}",
                default
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        for raw in ["1", "true", "yes", "y", "on", "TRUE", "Yes", "ON", " true ", "  1  "] {
            assert_eq!(parse_bool(raw, "TEST_VAR"), Some(true), "{raw:?}");
        }
    }

    #[test]
    fn test_parse_bool_false_values() {
        for raw in ["0", "false", "no", "n", "off", "FALSE", "No", "OFF", " false ", "  0  "] {
            assert_eq!(parse_bool(raw, "TEST_VAR"), Some(false), "{raw:?}");
        }
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("maybe", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
        assert_eq!(parse_bool("  ", "TEST_VAR"), None);
    }

    #[test]
    fn f64_values_fall_back_on_invalid_input() {
        let positive = |v: f64| v > 0.0;
        assert_eq!(parse_f64_with_warning("2.5", "V", 1.0, positive, "", ""), 2.5);
        assert_eq!(parse_f64_with_warning("-1", "V", 1.0, positive, "", ""), 1.0);
        assert_eq!(parse_f64_with_warning("abc", "V", 1.0, positive, "", ""), 1.0);
        assert_eq!(parse_f64_with_warning("NaN", "V", 1.0, |_| true, "", ""), 1.0);
    }

    #[test]
    fn tie_break_lists() {
        assert_eq!(
            parse_tie_break("cost, volume", "V"),
            Some(vec![TieBreak::Cost, TieBreak::OuterVolume])
        );
        assert_eq!(parse_tie_break("weight", "V"), None);
    }

    #[test]
    fn api_config_falls_back_to_defaults() {
        let config = ApiConfig::from_values(Some("not-an-ip".to_string()), Some("0".to_string()));
        assert_eq!(config.port(), 8080);
        assert!(config.uses_default_host());
        assert!(config.binds_to_all_interfaces());

        let config = ApiConfig::from_values(Some("127.0.0.1".to_string()), Some("9000".to_string()));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
        assert!(!config.binds_to_all_interfaces());
    }

    #[test]
    fn catalog_paths_default_to_builtin() {
        let config = CatalogConfig::default();
        assert!(config.materials_path().is_none());
        assert!(config.templates_path().is_none());
    }
}
