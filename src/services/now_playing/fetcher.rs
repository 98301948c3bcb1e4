use crate::ports::spotify::{PlaybackApi, SpotifyApiError};
use crate::services::now_playing::snapshot::PlaybackSnapshot;
use crate::spotify_rs::types::{CurrentlyPlaying, PlaybackContext, RepeatState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Snapshot(PlaybackSnapshot),
    /// Spotify didn't answer in time; the next tick tries again.
    TimedOut,
}

impl FetchOutcome {
    /// A timed out fetch looks the same as nothing playing.
    pub fn into_snapshot(self) -> PlaybackSnapshot {
        match self {
            FetchOutcome::Snapshot(snapshot) => snapshot,
            FetchOutcome::TimedOut => PlaybackSnapshot::nothing_playing(),
        }
    }
}

pub struct TrackFetcher<A: PlaybackApi> {
    api: A,
}

impl<A: PlaybackApi> TrackFetcher<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Polls both player endpoints. Only timeouts are absorbed here, every
    /// other error is returned to the caller.
    pub async fn fetch(&self) -> Result<FetchOutcome, SpotifyApiError> {
        match self.fetch_snapshot().await {
            Ok(snapshot) => Ok(FetchOutcome::Snapshot(snapshot)),
            Err(SpotifyApiError::Timeout) => {
                log::warn!("&eSpotify API request timed out. Retrying...");
                Ok(FetchOutcome::TimedOut)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_snapshot(&self) -> Result<PlaybackSnapshot, SpotifyApiError> {
        let currently_playing = self.api.currently_playing().await?;
        let playback = self.api.current_playback().await?;
        Ok(normalize(currently_playing, playback))
    }
}

fn normalize(
    currently_playing: Option<CurrentlyPlaying>,
    playback: Option<PlaybackContext>,
) -> PlaybackSnapshot {
    let Some(CurrentlyPlaying {
        is_playing,
        progress_ms,
        item: Some(item),
    }) = currently_playing
    else {
        return PlaybackSnapshot::nothing_playing();
    };

    PlaybackSnapshot {
        artist_name: item.artists.into_iter().next().map(|artist| artist.name),
        track_name: Some(item.name),
        is_playing,
        progress_ms,
        repeat_state: Some(
            playback
                .map(|context| context.repeat_state)
                .unwrap_or(RepeatState::Unknown),
        ),
    }
}
