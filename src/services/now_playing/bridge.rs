use std::future::Future;
use std::time::Duration;

use color_eyre::eyre::{Context, Result};

use crate::ports::chatbox::ChatboxSink;
use crate::ports::spotify::PlaybackApi;
use crate::services::now_playing::detector::{DetectorState, Notification};
use crate::services::now_playing::fetcher::TrackFetcher;

/// Polls Spotify and forwards track changes to the chatbox.
pub struct NowPlayingBridge<A: PlaybackApi, S: ChatboxSink> {
    fetcher: TrackFetcher<A>,
    sink: S,
    poll_interval: Duration,
    state: DetectorState,
}

impl<A: PlaybackApi, S: ChatboxSink> NowPlayingBridge<A, S> {
    pub fn new(api: A, sink: S, poll_interval: Duration) -> Self {
        Self {
            fetcher: TrackFetcher::new(api),
            sink,
            poll_interval,
            state: DetectorState::default(),
        }
    }

    #[cfg(test)]
    fn state(&self) -> &DetectorState {
        &self.state
    }

    /// Fetch, detect, forward. Sink failures are logged and otherwise ignored;
    /// any fetch error other than a timeout is returned.
    pub async fn tick(&mut self) -> Result<Vec<Notification>> {
        let snapshot = self
            .fetcher
            .fetch()
            .await
            .wrap_err("Failed to fetch current track")?
            .into_snapshot();

        let (state, notifications) = std::mem::take(&mut self.state).step(&snapshot);
        self.state = state;

        for notification in &notifications {
            log_notification(notification);
            if let Some(text) = notification.chatbox_text()
                && let Err(e) = self.sink.notify(text).await
            {
                log::warn!("&eFailed to send to VRChat: {:?}", e);
            }
        }

        Ok(notifications)
    }

    /// Tick until `shutdown` completes or a fetch fails.
    ///
    /// The sleep runs after each tick, so a slow Spotify response stretches
    /// the effective poll period. Once `shutdown` is ready no further request
    /// or send is started.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        log::info!("&6Starting Spotify to VRChat OSC bridge...");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => return Ok(()),
                result = self.tick() => {
                    result?;
                }
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => return Ok(()),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

fn log_notification(notification: &Notification) {
    match notification {
        Notification::SongChanged(key) => log::info!("&eSong changed: &r{}", key),
        Notification::Resumed(key) => log::info!("&eResumed playing: &r{}", key),
        Notification::Paused => log::info!("&cPlayback paused."),
        Notification::Looped(key) => log::info!("&eTrack looped: &r{}", key),
    }
}
