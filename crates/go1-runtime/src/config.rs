//! Session configuration – reads `~/.go1link/config.toml`.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration for a robot on its own access point.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use go1_types::Go1Error;

/// Broker protocol revision requested on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    #[default]
    V311,
    V5,
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolVersion::V311 => write!(f, "3.1.1"),
            ProtocolVersion::V5 => write!(f, "5"),
        }
    }
}

/// Broker connection parameters.  Fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Broker address; the robot's own access point by default.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Client identifier.  A random `go1link-<uuid>` is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default)]
    pub protocol_version: ProtocolVersion,
}

fn default_host() -> String {
    "192.168.12.1".to_string()
}
fn default_port() -> u16 {
    1883
}
fn default_keep_alive_secs() -> u64 {
    5
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keep_alive_secs: default_keep_alive_secs(),
            client_id: None,
            protocol_version: ProtocolVersion::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// The configured client id, or a fresh random one.
    pub fn client_id_or_random(&self) -> String {
        match &self.client_id {
            Some(id) => id.clone(),
            None => format!("go1link-{}", uuid::Uuid::new_v4().simple()),
        }
    }

    /// `host:port`, as handed to a broker client.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Everything a [`Session`][crate::Session] needs besides its transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Default cadence of the stick stream, in milliseconds.
    #[serde(default = "default_stream_interval_ms")]
    pub stream_interval_ms: u64,

    /// Pause after a mode change before the robot accepts motion commands.
    #[serde(default = "default_mode_settle_ms")]
    pub mode_settle_ms: u64,
}

fn default_stream_interval_ms() -> u64 {
    100
}
fn default_mode_settle_ms() -> u64 {
    2000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            stream_interval_ms: default_stream_interval_ms(),
            mode_settle_ms: default_mode_settle_ms(),
        }
    }
}

impl SessionConfig {
    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }

    pub fn mode_settle(&self) -> Duration {
        Duration::from_millis(self.mode_settle_ms)
    }

    /// Reject values no session can run with.
    pub fn validate(&self) -> Result<(), Go1Error> {
        if self.connection.host.trim().is_empty() {
            return Err(Go1Error::Config("connection.host must not be empty".to_string()));
        }
        if self.connection.port == 0 {
            return Err(Go1Error::Config("connection.port must not be 0".to_string()));
        }
        if self.connection.client_id.as_deref().is_some_and(str::is_empty) {
            return Err(Go1Error::Config(
                "connection.client_id must not be empty when set".to_string(),
            ));
        }
        if self.stream_interval_ms == 0 {
            return Err(Go1Error::Config("stream_interval_ms must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Return the path to `~/.go1link/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".go1link").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<SessionConfig>, Go1Error> {
    load_from(&config_path())
}

/// Load the config from a specific path, apply environment overrides and
/// validate the result.
pub fn load_from(path: &Path) -> Result<Option<SessionConfig>, Go1Error> {
    let Some(mut cfg) = read_file(path)? else {
        return Ok(None);
    };
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Parse the file as written, without overrides or validation.
pub(crate) fn read_file(path: &Path) -> Result<Option<SessionConfig>, Go1Error> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        Go1Error::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| Go1Error::Config(format!("failed to parse {}: {e}", path.display())))
}

/// [`load`], falling back to defaults (plus environment overrides) when no
/// file exists.
pub fn load_or_default() -> Result<SessionConfig, Go1Error> {
    match load()? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = SessionConfig::default();
            apply_env_overrides(&mut cfg);
            cfg.validate()?;
            Ok(cfg)
        }
    }
}

/// Apply `GO1_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GO1_HOST` | `connection.host` |
/// | `GO1_PORT` | `connection.port` |
/// | `GO1_CLIENT_ID` | `connection.client_id` |
/// | `GO1_STREAM_INTERVAL_MS` | `stream_interval_ms` |
///
/// Unparsable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut SessionConfig) {
    if let Ok(v) = std::env::var("GO1_HOST") {
        cfg.connection.host = v;
    }
    if let Ok(v) = std::env::var("GO1_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.connection.port = port;
    }
    if let Ok(v) = std::env::var("GO1_CLIENT_ID") {
        cfg.connection.client_id = Some(v);
    }
    if let Ok(v) = std::env::var("GO1_STREAM_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.stream_interval_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = config_path_for_home(&dir.path().to_string_lossy());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_match_the_robot_access_point() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.connection.host, "192.168.12.1");
        assert_eq!(cfg.connection.port, 1883);
        assert_eq!(cfg.connection.keep_alive(), Duration::from_secs(5));
        assert_eq!(cfg.connection.protocol_version, ProtocolVersion::V311);
        assert_eq!(cfg.stream_interval(), Duration::from_millis(100));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_path_points_to_go1link_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.go1link/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(
            &dir,
            r#"
stream_interval_ms = 50

[connection]
host = "10.0.0.7"
protocol_version = "v5"
"#,
        );
        let cfg = read_file(&path).expect("parse ok").expect("some");
        assert_eq!(cfg.connection.host, "10.0.0.7");
        assert_eq!(cfg.connection.port, 1883);
        assert_eq!(cfg.connection.protocol_version, ProtocolVersion::V5);
        assert_eq!(cfg.stream_interval_ms, 50);
        assert_eq!(cfg.mode_settle_ms, 2000);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "connection = [[[");
        assert!(matches!(load_from(&path), Err(Go1Error::Config(_))));
    }

    #[test]
    fn zero_interval_fails_validation() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "stream_interval_ms = 0\n");
        let cfg = read_file(&path).expect("parse ok").expect("some");
        assert!(matches!(cfg.validate(), Err(Go1Error::Config(_))));
    }

    #[test]
    fn random_client_ids_are_prefixed_and_distinct() {
        let cfg = ConnectionConfig::default();
        let a = cfg.client_id_or_random();
        let b = cfg.client_id_or_random();
        assert!(a.starts_with("go1link-"));
        assert_ne!(a, b);

        let fixed = ConnectionConfig {
            client_id: Some("dog-1".to_string()),
            ..ConnectionConfig::default()
        };
        assert_eq!(fixed.client_id_or_random(), "dog-1");
    }

    #[test]
    fn serialized_defaults_round_trip_through_toml() {
        let cfg = SessionConfig::default();
        let raw = toml::to_string_pretty(&cfg).unwrap();
        let back: SessionConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back, cfg);
    }

    // Every variable is touched by exactly one test so parallel tests never
    // observe each other's values.
    #[test]
    fn apply_env_overrides_changes_host_and_client_id() {
        // SAFETY: no other test reads GO1_HOST or GO1_CLIENT_ID.
        unsafe {
            std::env::set_var("GO1_HOST", "robot.local");
            std::env::set_var("GO1_CLIENT_ID", "bench-rig");
        }
        let mut cfg = SessionConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.connection.host, "robot.local");
        assert_eq!(cfg.connection.client_id.as_deref(), Some("bench-rig"));
        unsafe {
            std::env::remove_var("GO1_HOST");
            std::env::remove_var("GO1_CLIENT_ID");
        }
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_port() {
        // SAFETY: no other test reads GO1_PORT.
        unsafe { std::env::set_var("GO1_PORT", "not-a-port") };
        let mut cfg = SessionConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.connection.port, 1883);
        unsafe { std::env::remove_var("GO1_PORT") };
    }

    #[test]
    fn apply_env_overrides_changes_stream_interval() {
        // SAFETY: no other test reads GO1_STREAM_INTERVAL_MS.
        unsafe { std::env::set_var("GO1_STREAM_INTERVAL_MS", "20") };
        let mut cfg = SessionConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.stream_interval(), Duration::from_millis(20));
        unsafe { std::env::remove_var("GO1_STREAM_INTERVAL_MS") };
    }
}
