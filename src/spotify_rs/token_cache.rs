use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::spotify_rs::types::SpotifyTokenResponse;

/// Tokens are refreshed this many seconds before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Token persisted between runs so the user only logs in once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

impl CachedToken {
    /// The refresh token and scope of `previous` are kept when a refresh
    /// response leaves them out.
    pub fn from_response(
        response: SpotifyTokenResponse,
        previous: Option<&CachedToken>,
        now: i64,
    ) -> Self {
        let scope = match previous {
            Some(previous) if response.scope.trim().is_empty() => previous.scope.clone(),
            _ => response.scope,
        };
        Self {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| previous.and_then(|previous| previous.refresh_token.clone())),
            scope,
            expires_at: now + response.expires_in as i64,
        }
    }

    pub fn is_expiring(&self, now: i64) -> bool {
        self.expires_at - now < EXPIRY_MARGIN_SECS
    }

    /// Whether every scope in `required` was granted.
    pub fn covers_scope(&self, required: &str) -> bool {
        let granted: Vec<&str> = self.scope.split_whitespace().collect();
        required
            .split_whitespace()
            .all(|scope| granted.contains(&scope))
    }
}

pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable cache is treated as "not logged in".
    pub fn load(&self) -> Option<CachedToken> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!(
                    "&eCouldn't read token cache {}: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!(
                    "&eIgnoring malformed token cache {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    pub fn save(&self, token: &CachedToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create token cache dir: {}", parent.display())
            })?;
        }
        let contents =
            serde_json::to_string_pretty(token).wrap_err("Failed to serialize token")?;
        std::fs::write(&self.path, contents)
            .wrap_err_with(|| format!("Failed to write token cache: {}", self.path.display()))?;
        log::debug!("Saved Spotify token to {}", self.path.display());
        Ok(())
    }
}
