use crate::spotify_rs::types::RepeatState;

/// One tick's normalized view of what Spotify is playing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub track_name: Option<String>,
    /// First listed artist
    pub artist_name: Option<String>,
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    pub repeat_state: Option<RepeatState>,
}

impl PlaybackSnapshot {
    pub fn nothing_playing() -> Self {
        Self::default()
    }

    /// `"<track> - <artist>"`, the identity used to detect song changes.
    pub fn track_key(&self) -> Option<String> {
        match (&self.track_name, &self.artist_name) {
            (Some(track), Some(artist)) => Some(format!("{} - {}", track, artist)),
            _ => None,
        }
    }
}
