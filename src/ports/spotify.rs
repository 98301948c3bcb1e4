use std::time::Duration;

use reqwest::StatusCode;

use crate::spotify_rs::auth::RefreshTokenError;
use crate::spotify_rs::types::{CurrentlyPlaying, PlaybackContext};

#[derive(Debug, thiserror::Error)]
pub enum SpotifyApiError {
    /// The request or the body read exceeded the configured timeout.
    #[error("Spotify API request timed out")]
    Timeout,
    #[error("Spotify API returned {status}: {body}")]
    Status {
        status: StatusCode,
        body: String,
        /// Parsed `Retry-After` header, sent along with 429s.
        retry_after: Option<Duration>,
    },
    #[error("Failed to send Spotify API request: {0}")]
    Request(reqwest::Error),
    #[error("Failed to parse Spotify API response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to refresh Spotify access token: {0}")]
    Refresh(RefreshTokenError),
    #[error("Spotify access token expired and no refresh token is available")]
    NoRefreshToken,
}

impl SpotifyApiError {
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(error)
        }
    }

    /// A refresh that timed out is a timeout like any other request.
    pub fn from_refresh(error: RefreshTokenError) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Refresh(error)
        }
    }

    /// Delay the server asked for before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Rate limiting and server errors are worth another attempt, everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Port trait wrapping the two playback endpoints polled every tick.
///
/// `Ok(None)` means Spotify answered "204 No Content", i.e. no active session.
/// Implementations live in `spotify_rs::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaybackApi: Send + Sync {
    async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>, SpotifyApiError>;
    async fn current_playback(&self) -> Result<Option<PlaybackContext>, SpotifyApiError>;
}
