use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use color_eyre::eyre::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::ports::spotify::{PlaybackApi, SpotifyApiError};
use crate::spotify_rs::auth::{self, exchange_code_for_token, initiate_oauth, parse_redirect};
use crate::spotify_rs::token_cache::{CachedToken, TokenCache};
use crate::spotify_rs::types::{CurrentlyPlaying, PlaybackContext};

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

#[derive(Debug, Clone)]
pub struct SpotifyApiCredentials {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SpotifyApiCredentials {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Reads one line from stdin on a plain thread. A pending tokio stdin read
/// would keep the runtime from shutting down after Ctrl-C.
async fn read_line() -> Result<Option<String>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let read = std::io::stdin()
            .read_line(&mut line)
            .map(|n| (n > 0).then_some(line));
        let _ = tx.send(read);
    });
    rx.await
        .wrap_err("stdin reader stopped")?
        .wrap_err("Failed to read redirect URL from stdin")
}

/// Run the authorization code flow on the terminal: print the URL, read back
/// the URL the browser was redirected to, and trade the code for a token.
pub async fn login_interactive(
    http: &reqwest::Client,
    credentials: &SpotifyApiCredentials,
    cache: &TokenCache,
) -> Result<CachedToken> {
    let auth = initiate_oauth(credentials.client_id(), credentials.redirect_uri());

    println!("Open this URL in your browser and log in to Spotify:\n\n  {}\n", auth.auth_url);
    println!("Then paste the URL you were redirected to:");

    let Some(redirected) = read_line().await? else {
        bail!("stdin closed before a redirect URL was entered");
    };

    let code = parse_redirect(&redirected, &auth.state)?;
    let response = exchange_code_for_token(
        http,
        credentials.client_id(),
        credentials.client_secret(),
        &code,
        credentials.redirect_uri(),
    )
    .await?;

    let token = CachedToken::from_response(response, None, now());
    cache.save(&token)?;
    log::info!("&aSpotify login successful!");
    Ok(token)
}

/// Spotify Web API client for the player endpoints
pub struct SpotifyClient {
    client: reqwest::Client,
    credentials: SpotifyApiCredentials,
    token: Mutex<CachedToken>,
    cache: TokenCache,
    api_url: String,
    token_url: String,
    timeout: Duration,
    retries: usize,
}

impl SpotifyClient {
    pub fn new(
        client: reqwest::Client,
        credentials: SpotifyApiCredentials,
        token: CachedToken,
        cache: TokenCache,
        timeout: Duration,
        retries: usize,
    ) -> Self {
        Self {
            client,
            credentials,
            token: Mutex::new(token),
            cache,
            api_url: SPOTIFY_API_URL.to_string(),
            token_url: auth::SPOTIFY_TOKEN_URL.to_string(),
            timeout,
            retries,
        }
    }

    /// Use the cached token when it grants the scopes we need, otherwise log in.
    pub async fn connect(
        credentials: SpotifyApiCredentials,
        cache: TokenCache,
        timeout: Duration,
        retries: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::new();
        let token = match cache.load() {
            Some(token) if token.covers_scope(&auth::scope()) => {
                log::debug!("Using cached Spotify token from {}", cache.path().display());
                token
            }
            Some(_) => {
                log::warn!("&eCached Spotify token is missing required scopes, logging in again");
                login_interactive(&client, &credentials, &cache).await?
            }
            None => login_interactive(&client, &credentials, &cache).await?,
        };

        Ok(Self::new(
            client,
            credentials,
            token,
            cache,
            timeout,
            retries,
        ))
    }

    /// Returns a valid access token, refreshing it first when it is about to expire.
    async fn access_token(&self) -> Result<String, SpotifyApiError> {
        let mut token = self.token.lock().await;
        if !token.is_expiring(now()) {
            return Ok(token.access_token.clone());
        }

        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or(SpotifyApiError::NoRefreshToken)?;
        log::debug!("Refreshing Spotify access token");
        let response = auth::refresh_access_token(
            &self.client,
            &self.token_url,
            self.credentials.client_id(),
            self.credentials.client_secret(),
            &refresh_token,
            self.timeout,
        )
        .await
        .map_err(SpotifyApiError::from_refresh)?;

        let refreshed = CachedToken::from_response(response, Some(&*token), now());
        *token = refreshed;
        if let Err(e) = self.cache.save(&token) {
            log::warn!("&eFailed to save refreshed Spotify token: {:?}", e);
        }
        Ok(token.access_token.clone())
    }

    async fn send_get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, SpotifyApiError> {
        let access_token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(access_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(SpotifyApiError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            // Spotify sends the delay in whole seconds
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(SpotifyApiError::Status {
                status,
                body: response
                    .text()
                    .await
                    .unwrap_or("Failed to get error text".to_string()),
                retry_after,
            });
        }

        let body = response
            .text()
            .await
            .map_err(SpotifyApiError::from_reqwest)?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// GET with retries on rate limiting and server errors. A `Retry-After`
    /// from the server replaces the backoff delay.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, SpotifyApiError> {
        (|| self.send_get::<T>(path))
            .retry(ExponentialBuilder::default().with_max_times(self.retries))
            .when(SpotifyApiError::is_retryable)
            .adjust(|error, delay| delay.map(|delay| error.retry_after().unwrap_or(delay)))
            .notify(|error, delay| {
                log::debug!("Retrying {} in {:?} after: {}", path, delay, error);
            })
            .await
    }
}

#[async_trait::async_trait]
impl PlaybackApi for SpotifyClient {
    async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>, SpotifyApiError> {
        self.get("/me/player/currently-playing").await
    }

    async fn current_playback(&self) -> Result<Option<PlaybackContext>, SpotifyApiError> {
        self.get("/me/player").await
    }
}
