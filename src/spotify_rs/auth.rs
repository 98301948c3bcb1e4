use std::collections::HashMap;
use std::time::Duration;

use base64::{
    Engine, alphabet,
    engine::{self, general_purpose},
};
use rand::Rng;
use url::Url;

use crate::spotify_rs::types::{SpotifyAuthResponse, SpotifyTokenResponse};

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Everything the bridge reads: the current item and the repeat mode.
pub const SPOTIFY_SCOPES: [&str; 2] = ["user-read-currently-playing", "user-read-playback-state"];

const CUSTOM_ENGINE: engine::GeneralPurpose =
    engine::GeneralPurpose::new(&alphabet::STANDARD, general_purpose::PAD);

/// Generate a random string from the URL-safe unreserved characters
fn generate_random_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            const CHARSET: &[u8] =
                b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
            CHARSET[rng.random_range(0..CHARSET.len())] as char
        })
        .collect()
}

/// Generate a random state parameter for CSRF protection
fn generate_state() -> String {
    generate_random_string(16)
}

pub fn scope() -> String {
    SPOTIFY_SCOPES.join(" ")
}

/// Build the authorization URL the user has to open in a browser.
pub fn initiate_oauth(client_id: &str, redirect_uri: &str) -> SpotifyAuthResponse {
    let state = generate_state();

    let auth_url = format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&state={}&scope={}",
        SPOTIFY_AUTH_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&state),
        urlencoding::encode(&scope())
    );

    SpotifyAuthResponse { auth_url, state }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Redirect URL is not a valid URL: {0}")]
    InvalidRedirectUrl(#[from] url::ParseError),
    #[error("Spotify denied the authorization request: {0}")]
    Denied(String),
    #[error("State mismatch, expected {expected} but the redirect carried {actual:?}")]
    StateMismatch {
        expected: String,
        actual: Option<String>,
    },
    #[error("Redirect URL has no authorization code")]
    MissingCode,
}

/// Pull the authorization code out of the URL Spotify redirected the browser to.
pub fn parse_redirect(redirected_url: &str, expected_state: &str) -> Result<String, AuthError> {
    let url = Url::parse(redirected_url.trim())?;
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return Err(AuthError::Denied(error.clone()));
    }

    let state = params.get("state");
    if state.map(String::as_str) != Some(expected_state) {
        return Err(AuthError::StateMismatch {
            expected: expected_state.to_string(),
            actual: state.cloned(),
        });
    }

    params.get("code").cloned().ok_or(AuthError::MissingCode)
}

fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        CUSTOM_ENGINE.encode(format!("{}:{}", client_id, client_secret))
    )
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeCodeForTokenError {
    #[error("Invalid code: {reason}")]
    InvalidCode { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response")]
    FailedToParseResponse(reqwest::Error),
}

/// Exchange authorization code for access token
/// https://developer.spotify.com/documentation/web-api/tutorials/code-flow
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
    // Must be the exact redirect URI used to build the authorization URL
    redirect_uri: &str,
) -> Result<SpotifyTokenResponse, ExchangeCodeForTokenError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "authorization_code");
    params.insert("code", code);
    params.insert("redirect_uri", redirect_uri);

    let response = client
        .post(SPOTIFY_TOKEN_URL)
        // This automatically serializes to x-www-form-urlencoded and sets the header (as required by spotify)
        .form(&params)
        .header("Authorization", basic_auth_header(client_id, client_secret))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(ExchangeCodeForTokenError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(ExchangeCodeForTokenError::InvalidCode {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    let token_response: SpotifyTokenResponse = response
        .json()
        .await
        .map_err(ExchangeCodeForTokenError::FailedToParseResponse)?;

    Ok(token_response)
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenError {
    #[error("Invalid refresh token: {reason}")]
    InvalidRefreshToken { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

impl RefreshTokenError {
    /// Whether the token endpoint didn't answer (or finish answering) in time.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::FailedToSendRequest(e) | Self::FailedToParseResponse(e) => e.is_timeout(),
            Self::InvalidRefreshToken { .. } => false,
        }
    }
}

/// Refresh an access token using a refresh token
pub async fn refresh_access_token(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
    timeout: Duration,
) -> Result<SpotifyTokenResponse, RefreshTokenError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("refresh_token", refresh_token);

    let response = client
        .post(token_url)
        .form(&params)
        .header("Authorization", basic_auth_header(client_id, client_secret))
        .timeout(timeout)
        .send()
        .await
        .map_err(RefreshTokenError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(RefreshTokenError::InvalidRefreshToken {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    let token_response: SpotifyTokenResponse = response
        .json()
        .await
        .map_err(RefreshTokenError::FailedToParseResponse)?;

    Ok(token_response)
}
