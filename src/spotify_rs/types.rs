use serde::{Deserialize, Serialize};

/// Spotify OAuth token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

/// Response for authentication initiation
#[derive(Debug, Clone)]
pub struct SpotifyAuthResponse {
    pub auth_url: String,
    pub state: String,
}

/// `GET /v1/me/player/currently-playing`
///
/// `item` is null while an ad plays or when the session has nothing loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    pub item: Option<PlayingItem>,
}

/// A track or a podcast episode. Episodes carry no `artists`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayingItem {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

/// `GET /v1/me/player`, only the fields the bridge reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackContext {
    #[serde(default)]
    pub repeat_state: RepeatState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    Off,
    Context,
    Track,
    #[default]
    #[serde(other)]
    Unknown,
}
