use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};

use crate::spotify_rs::client::SpotifyApiCredentials;

const APP_DIR: &str = "spotify-chatbox";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pause between the end of one poll and the start of the next
    #[serde(with = "humantime_duration")]
    pub poll_interval: Duration,
    pub spotify: SpotifyConfig,
    pub osc: OscConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub token_cache: Option<String>,
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,
    pub retries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    pub host: String,
    pub port: u16,
    pub address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            spotify: SpotifyConfig::default(),
            osc: OscConfig::default(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            token_cache: None,
            request_timeout: Duration::from_secs(10),
            retries: 5,
        }
    }
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            address: "/chatbox/input".to_string(),
        }
    }
}

/// Values given on the command line or through the environment. They win over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub osc_host: Option<String>,
    pub osc_port: Option<u16>,
    pub poll_interval: Option<Duration>,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Default config file location
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join(APP_DIR).join("config.toml"))
    }

    /// Load the default config file, falling back to defaults when it doesn't exist
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write a default config file unless one already exists. Returns its path.
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or(eyre!("No config directory on this platform"))?;
        Self::create_default_at(&path)?;
        Ok(path)
    }

    fn create_default_at(path: &Path) -> Result<()> {
        if path.exists() {
            log::info!("Config file already exists at {}", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create config dir: {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(path, contents)
            .wrap_err(format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(client_id) = overrides.client_id {
            self.spotify.client_id = Some(client_id);
        }
        if let Some(client_secret) = overrides.client_secret {
            self.spotify.client_secret = Some(client_secret);
        }
        if let Some(redirect_uri) = overrides.redirect_uri {
            self.spotify.redirect_uri = Some(redirect_uri);
        }
        if let Some(host) = overrides.osc_host {
            self.osc.host = host;
        }
        if let Some(port) = overrides.osc_port {
            self.osc.port = port;
        }
        if let Some(poll_interval) = overrides.poll_interval {
            self.poll_interval = poll_interval;
        }
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    /// Where the Spotify token is cached between runs
    pub fn token_cache_path(&self) -> PathBuf {
        if let Some(ref path) = self.spotify.token_cache {
            return self.expand_path(path);
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join("token.json"))
            .unwrap_or_else(|| PathBuf::from(".spotify-chatbox-token.json"))
    }

    pub fn credentials(&self) -> Result<SpotifyApiCredentials> {
        let require = |value: &Option<String>, name: &str, env: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or(eyre!("Missing Spotify {name}. Set spotify.{name} in the config or {env}"))
        };
        Ok(SpotifyApiCredentials::new(
            require(&self.spotify.client_id, "client_id", "SPOTIPY_CLIENT_ID")?,
            require(&self.spotify.client_secret, "client_secret", "SPOTIPY_CLIENT_SECRET")?,
            require(&self.spotify.redirect_uri, "redirect_uri", "SPOTIPY_REDIRECT_URI")?,
        ))
    }
}

/// Durations written the way people type them ("1s", "500ms", "1m 30s").
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
poll_interval = "500ms"

[spotify]
client_id = "id"
client_secret = "secret"
redirect_uri = "http://127.0.0.1:8888/callback"
request_timeout = "5s"

[osc]
port = 9001
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.spotify.client_id.as_deref(), Some("id"));
        assert_eq!(config.spotify.request_timeout, Duration::from_secs(5));
        assert_eq!(config.spotify.retries, 5);
        assert_eq!(config.osc.host, "127.0.0.1");
        assert_eq!(config.osc.port, 9001);
        assert_eq!(config.osc.address, "/chatbox/input");

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.client_secret(), "secret");
        assert_eq!(credentials.redirect_uri(), "http://127.0.0.1:8888/callback");
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_bad_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval = \"soon\"").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::from_file(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_create_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        Config::create_default_at(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());

        // An existing file is left alone
        std::fs::write(&path, "[osc]\nport = 1234\n").unwrap();
        Config::create_default_at(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().osc.port, 1234);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default();
        config.spotify.client_id = Some("from_file".into());
        config.apply(Overrides {
            client_id: Some("from_env".into()),
            client_secret: Some("secret".into()),
            osc_port: Some(9002),
            poll_interval: Some(Duration::from_secs(2)),
            ..Default::default()
        });
        assert_eq!(config.spotify.client_id.as_deref(), Some("from_env"));
        assert_eq!(config.spotify.client_secret.as_deref(), Some("secret"));
        assert_eq!(config.spotify.redirect_uri, None);
        assert_eq!(config.osc.host, "127.0.0.1");
        assert_eq!(config.osc.port, 9002);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = Config::default();
        config.spotify.client_id = Some("id".into());
        config.spotify.client_secret = Some(String::new());
        let err = config.credentials().unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn test_token_cache_path() {
        let mut config = Config::default();
        config.spotify.token_cache = Some("/tmp/token.json".into());
        assert_eq!(config.token_cache_path(), PathBuf::from("/tmp/token.json"));

        config.spotify.token_cache = Some("~/token.json".into());
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.token_cache_path(), home.join("token.json"));
        }
    }
}
