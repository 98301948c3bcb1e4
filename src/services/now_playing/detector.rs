use crate::services::now_playing::snapshot::PlaybackSnapshot;
use crate::spotify_rs::types::RepeatState;

/// A backward jump must exceed this to count as the track restarting.
/// Smaller jumps are seeks or jitter in the reported progress.
pub const LOOP_SLACK_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    SongChanged(String),
    Resumed(String),
    /// Logged only, nothing is sent to the chatbox.
    Paused,
    Looped(String),
}

impl Notification {
    /// Text to forward to the chatbox, if any.
    pub fn chatbox_text(&self) -> Option<&str> {
        match self {
            Notification::SongChanged(key)
            | Notification::Resumed(key)
            | Notification::Looped(key) => Some(key.as_str()),
            Notification::Paused => None,
        }
    }
}

/// What the detector remembers between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorState {
    pub last_track_key: Option<String>,
    pub last_playing_state: bool,
    pub last_progress_ms: u64,
}

impl DetectorState {
    /// Apply one tick's snapshot.
    ///
    /// The rules are evaluated in order and are not exclusive, so a single
    /// tick can yield several notifications (a song change and a loop
    /// restart, for example).
    pub fn step(mut self, snapshot: &PlaybackSnapshot) -> (Self, Vec<Notification>) {
        let Some(current_key) = snapshot.track_key() else {
            return (self, Vec::new());
        };

        let mut notifications = Vec::new();

        if self.last_track_key.as_deref() != Some(current_key.as_str()) {
            notifications.push(Notification::SongChanged(current_key.clone()));
            self.last_track_key = Some(current_key.clone());
            self.last_playing_state = snapshot.is_playing;
        }

        if !self.last_playing_state && snapshot.is_playing {
            notifications.push(Notification::Resumed(current_key.clone()));
            self.last_playing_state = true;
        }

        if self.last_playing_state && !snapshot.is_playing {
            notifications.push(Notification::Paused);
            self.last_playing_state = false;
        }

        if let Some(progress_ms) = snapshot.progress_ms
            && progress_ms.saturating_add(LOOP_SLACK_MS) < self.last_progress_ms
            && snapshot.repeat_state == Some(RepeatState::Track)
        {
            notifications.push(Notification::Looped(current_key));
        }

        self.last_progress_ms = snapshot.progress_ms.unwrap_or(0);

        (self, notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(
        track: &str,
        artist: &str,
        is_playing: bool,
        progress_ms: u64,
        repeat_state: RepeatState,
    ) -> PlaybackSnapshot {
        PlaybackSnapshot {
            track_name: Some(track.into()),
            artist_name: Some(artist.into()),
            is_playing,
            progress_ms: Some(progress_ms),
            repeat_state: Some(repeat_state),
        }
    }

    fn run(snapshots: &[PlaybackSnapshot]) -> (DetectorState, Vec<Vec<Notification>>) {
        let mut state = DetectorState::default();
        let mut ticks = Vec::new();
        for snapshot in snapshots {
            let (next, notifications) = state.step(snapshot);
            state = next;
            ticks.push(notifications);
        }
        (state, ticks)
    }

    #[test]
    fn test_missing_names_is_noop() {
        let state = DetectorState {
            last_track_key: Some("A - Artist1".into()),
            last_playing_state: true,
            last_progress_ms: 50_000,
        };
        let partials = [
            PlaybackSnapshot::nothing_playing(),
            PlaybackSnapshot {
                track_name: Some("A".into()),
                is_playing: false,
                progress_ms: Some(0),
                repeat_state: Some(RepeatState::Track),
                ..Default::default()
            },
            PlaybackSnapshot {
                artist_name: Some("Artist1".into()),
                is_playing: true,
                progress_ms: Some(1),
                ..Default::default()
            },
        ];
        for partial in &partials {
            let (next, notifications) = state.clone().step(partial);
            assert_eq!(next, state);
            assert!(notifications.is_empty());
        }
    }

    #[test]
    fn test_first_valid_tick_is_song_change() {
        let (state, notifications) =
            DetectorState::default().step(&snapshot("A", "Artist1", true, 1000, RepeatState::Off));
        assert_eq!(
            notifications,
            vec![Notification::SongChanged("A - Artist1".into())]
        );
        assert_eq!(state.last_track_key.as_deref(), Some("A - Artist1"));
        assert!(state.last_playing_state);
        assert_eq!(state.last_progress_ms, 1000);
    }

    #[test]
    fn test_first_tick_paused_is_single_song_change() {
        let (state, notifications) = DetectorState::default()
            .step(&snapshot("A", "Artist1", false, 1000, RepeatState::Off));
        assert_eq!(
            notifications,
            vec![Notification::SongChanged("A - Artist1".into())]
        );
        assert!(!state.last_playing_state);
    }

    #[test]
    fn test_same_track_still_playing_is_quiet() {
        let (_, ticks) = run(&[
            snapshot("A", "Artist1", true, 1000, RepeatState::Off),
            snapshot("A", "Artist1", true, 2000, RepeatState::Off),
        ]);
        assert!(ticks[1].is_empty());
    }

    #[test]
    fn test_pause_then_resume() {
        let (state, ticks) = run(&[
            snapshot("A", "Artist1", true, 1000, RepeatState::Off),
            snapshot("A", "Artist1", false, 1500, RepeatState::Off),
        ]);
        assert_eq!(ticks[1], vec![Notification::Paused]);
        assert!(!state.last_playing_state);

        let (state, notifications) =
            state.step(&snapshot("A", "Artist1", true, 1500, RepeatState::Off));
        assert_eq!(
            notifications,
            vec![Notification::Resumed("A - Artist1".into())]
        );
        assert!(state.last_playing_state);
    }

    #[test]
    fn test_loop_detected_on_large_drop_with_repeat_track() {
        let (_, ticks) = run(&[
            snapshot("A", "Artist1", true, 50_000, RepeatState::Track),
            snapshot("A", "Artist1", true, 2_000, RepeatState::Track),
        ]);
        assert_eq!(ticks[1], vec![Notification::Looped("A - Artist1".into())]);
    }

    #[test]
    fn test_small_drop_is_not_a_loop() {
        let (_, ticks) = run(&[
            snapshot("A", "Artist1", true, 50_000, RepeatState::Track),
            snapshot("A", "Artist1", true, 45_000, RepeatState::Track),
        ]);
        assert!(ticks[1].is_empty());
    }

    #[test]
    fn test_drop_of_exactly_slack_is_not_a_loop() {
        let (_, ticks) = run(&[
            snapshot("A", "Artist1", true, 50_000, RepeatState::Track),
            snapshot("A", "Artist1", true, 40_000, RepeatState::Track),
        ]);
        assert!(ticks[1].is_empty());
    }

    #[test]
    fn test_no_loop_without_repeat_track() {
        for repeat_state in [RepeatState::Off, RepeatState::Context, RepeatState::Unknown] {
            let (_, ticks) = run(&[
                snapshot("A", "Artist1", true, 200_000, repeat_state),
                snapshot("A", "Artist1", true, 0, repeat_state),
            ]);
            assert!(ticks[1].is_empty(), "{repeat_state:?} should not loop");
        }
    }

    #[test]
    fn test_song_change_and_loop_in_same_tick() {
        let (_, ticks) = run(&[
            snapshot("A", "Artist1", true, 180_000, RepeatState::Track),
            snapshot("B", "Artist2", true, 1_000, RepeatState::Track),
        ]);
        assert_eq!(
            ticks[1],
            vec![
                Notification::SongChanged("B - Artist2".into()),
                Notification::Looped("B - Artist2".into()),
            ]
        );
    }

    #[test]
    fn test_song_change_keeps_playing_state_from_snapshot() {
        // Paused on A, then B starts playing: the song change sets the playing
        // state, so no separate resume fires.
        let (state, ticks) = run(&[
            snapshot("A", "Artist1", true, 1000, RepeatState::Off),
            snapshot("A", "Artist1", false, 2000, RepeatState::Off),
            snapshot("B", "Artist1", true, 0, RepeatState::Off),
        ]);
        assert_eq!(
            ticks[2],
            vec![Notification::SongChanged("B - Artist1".into())]
        );
        assert!(state.last_playing_state);
    }

    #[test]
    fn test_progress_recorded_every_valid_tick() {
        let (state, _) = run(&[
            snapshot("A", "Artist1", true, 1000, RepeatState::Off),
            snapshot("A", "Artist1", true, 7000, RepeatState::Off),
        ]);
        assert_eq!(state.last_progress_ms, 7000);

        let (state, _) = state.step(&PlaybackSnapshot::nothing_playing());
        assert_eq!(state.last_progress_ms, 7000);
    }

    #[test]
    fn test_missing_progress_skips_loop_check() {
        let (state, ticks) = run(&[
            snapshot("A", "Artist1", true, 50_000, RepeatState::Track),
            PlaybackSnapshot {
                progress_ms: None,
                ..snapshot("A", "Artist1", true, 0, RepeatState::Track)
            },
        ]);
        assert!(ticks[1].is_empty());
        assert_eq!(state.last_progress_ms, 0);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let sequence = [
            snapshot("A", "Artist1", true, 1000, RepeatState::Track),
            snapshot("A", "Artist1", false, 2000, RepeatState::Track),
            PlaybackSnapshot::nothing_playing(),
            snapshot("A", "Artist1", true, 90_000, RepeatState::Track),
            snapshot("A", "Artist1", true, 500, RepeatState::Track),
            snapshot("B", "Artist2", true, 0, RepeatState::Off),
        ];
        assert_eq!(run(&sequence), run(&sequence));
    }

    #[test]
    fn test_end_to_end_sequence() {
        let (state, ticks) = run(&[
            snapshot("A", "Artist1", true, 1000, RepeatState::Off),
            snapshot("A", "Artist1", true, 2000, RepeatState::Off),
            snapshot("A", "Artist1", false, 3000, RepeatState::Off),
            snapshot("A", "Artist1", true, 4000, RepeatState::Off),
        ]);
        assert_eq!(
            ticks,
            vec![
                vec![Notification::SongChanged("A - Artist1".into())],
                vec![],
                vec![Notification::Paused],
                vec![Notification::Resumed("A - Artist1".into())],
            ]
        );
        let texts: Vec<&str> = ticks
            .iter()
            .flatten()
            .filter_map(Notification::chatbox_text)
            .collect();
        assert_eq!(texts, vec!["A - Artist1", "A - Artist1"]);
        assert_eq!(
            state,
            DetectorState {
                last_track_key: Some("A - Artist1".into()),
                last_playing_state: true,
                last_progress_ms: 4000,
            }
        );
    }
}
