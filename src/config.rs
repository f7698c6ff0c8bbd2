use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Every component receives this by reference at construction; no component
/// reads the environment on its own.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// API credential used for the accept request and the WebSocket handshake.
    pub api_key: String,
    /// Project identifier, doubling as the SIP identity we dial.
    pub project_id: String,
    /// Base URL of the control plane, e.g. `https://api.openai.com`.
    pub control_plane_base: String,
    /// Base URL of the realtime WebSocket endpoint, e.g. `wss://api.openai.com`.
    pub streaming_base: String,
    /// Hostname of the remote SIP peer.
    pub sip_domain: String,
    /// Instruction text sent in the accept body and as the first stream frame.
    pub instructions: String,
    pub model: String,
    pub accept_timeout: Duration,
    pub dial_timeout: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let project_id = std::env::var("OPENAI_PROJECT_ID")
            .map_err(|_| ConfigError::MissingVar("OPENAI_PROJECT_ID".to_string()))?;

        let control_plane_base = std::env::var("CONTROL_PLANE_URL")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());

        let streaming_base =
            std::env::var("REALTIME_WS_URL").unwrap_or_else(|_| "wss://api.openai.com".to_string());

        let sip_domain =
            std::env::var("SIP_DOMAIN").unwrap_or_else(|_| "sip.api.openai.com".to_string());

        let instructions =
            std::env::var("INSTRUCTIONS").unwrap_or_else(|_| "Say Hi.".to_string());

        let model = std::env::var("REALTIME_MODEL").unwrap_or_else(|_| "gpt-realtime".to_string());

        let accept_timeout = parse_secs("ACCEPT_TIMEOUT_SECS", 30)?;
        let dial_timeout = parse_secs("DIAL_TIMEOUT_SECS", 30)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            api_key,
            project_id,
            control_plane_base,
            streaming_base,
            sip_domain,
            instructions,
            model,
            accept_timeout,
            dial_timeout,
            log_level,
        })
    }
}

fn parse_secs(var: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Err(_) => Ok(Duration::from_secs(default)),
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("OPENAI_PROJECT_ID");
            env::remove_var("CONTROL_PLANE_URL");
            env::remove_var("REALTIME_WS_URL");
            env::remove_var("SIP_DOMAIN");
            env::remove_var("INSTRUCTIONS");
            env::remove_var("REALTIME_MODEL");
            env::remove_var("ACCEPT_TIMEOUT_SECS");
            env::remove_var("DIAL_TIMEOUT_SECS");
            env::remove_var("RUST_LOG");
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-api-key");
            env::set_var("OPENAI_PROJECT_ID", "proj_test");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8000");
        assert_eq!(config.api_key, "test-api-key");
        assert_eq!(config.project_id, "proj_test");
        assert_eq!(config.control_plane_base, "https://api.openai.com");
        assert_eq!(config.streaming_base, "wss://api.openai.com");
        assert_eq!(config.sip_domain, "sip.api.openai.com");
        assert_eq!(config.instructions, "Say Hi.");
        assert_eq!(config.model, "gpt-realtime");
        assert_eq!(config.accept_timeout, Duration::from_secs(30));
        assert_eq!(config.dial_timeout, Duration::from_secs(30));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:9090");
            env::set_var("CONTROL_PLANE_URL", "http://localhost:4000");
            env::set_var("REALTIME_WS_URL", "ws://localhost:4001");
            env::set_var("SIP_DOMAIN", "sip.example.net");
            env::set_var("INSTRUCTIONS", "Speak slowly.");
            env::set_var("REALTIME_MODEL", "gpt-realtime-mini");
            env::set_var("ACCEPT_TIMEOUT_SECS", "5");
            env::set_var("DIAL_TIMEOUT_SECS", "10");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:9090");
        assert_eq!(config.control_plane_base, "http://localhost:4000");
        assert_eq!(config.streaming_base, "ws://localhost:4001");
        assert_eq!(config.sip_domain, "sip.example.net");
        assert_eq!(config.instructions, "Speak slowly.");
        assert_eq!(config.model, "gpt-realtime-mini");
        assert_eq!(config.accept_timeout, Duration::from_secs(5));
        assert_eq!(config.dial_timeout, Duration::from_secs(10));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_missing_api_key() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_PROJECT_ID", "proj_test");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "OPENAI_API_KEY"),
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_project_id() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-api-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "OPENAI_PROJECT_ID"),
            _ => panic!("Expected MissingVar for OPENAI_PROJECT_ID"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_timeout() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("ACCEPT_TIMEOUT_SECS", "soon");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "ACCEPT_TIMEOUT_SECS"),
            _ => panic!("Expected InvalidValue for ACCEPT_TIMEOUT_SECS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
