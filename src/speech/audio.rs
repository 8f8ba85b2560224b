use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::{MimiError, MimiResult};

/// Encoded speech audio (WAV) returned by synthesis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioTrack {
    bytes: Arc<[u8]>,
}

impl AudioTrack {
    /// Wrap WAV bytes without inspecting them.
    pub fn wav(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Raw encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Playback length read from the WAV header.
    pub fn duration(&self) -> MimiResult<Duration> {
        let reader = hound::WavReader::new(Cursor::new(&self.bytes[..]))
            .map_err(|e| MimiError::playback(format!("read wav header: {e}")))?;
        let rate = reader.spec().sample_rate;
        if rate == 0 {
            return Err(MimiError::playback("wav sample rate must be > 0"));
        }
        let frames = u64::from(reader.duration());
        Ok(Duration::from_nanos(frames * 1_000_000_000 / u64::from(rate)))
    }
}

/// A playable audio element.
///
/// Mirrors the parts of a media element the engine relies on: play/pause, the playhead and a
/// stream of time-update notifications that fire at implementation-defined granularity while
/// playing.
pub trait AudioHandle: Send + Sync {
    /// Start or resume playback.
    fn play(&self) -> MimiResult<()>;
    /// Pause playback; time updates stop until the next `play`.
    fn pause(&self);
    /// Return `true` while not playing (including after the track ended).
    fn is_paused(&self) -> bool;
    /// Current playhead position.
    fn current_time(&self) -> Duration;
    /// Subscribe to playhead updates.
    fn time_updates(&self) -> watch::Receiver<Duration>;
}

/// Factory turning a synthesized track into an [`AudioHandle`].
pub trait AudioBackend: Send + Sync {
    /// Open a new, paused handle for `track`.
    fn open(&self, track: &AudioTrack) -> MimiResult<Arc<dyn AudioHandle>>;
}

/// Opens [`ClockAudio`] handles.
#[derive(Clone, Copy, Debug)]
pub struct ClockAudioBackend {
    update_interval: Duration,
}

impl ClockAudioBackend {
    /// Time-update period used by browsers for media elements.
    pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

    /// Backend emitting time updates every `update_interval`.
    pub fn new(update_interval: Duration) -> Self {
        Self { update_interval }
    }
}

impl Default for ClockAudioBackend {
    fn default() -> Self {
        Self::new(Self::DEFAULT_UPDATE_INTERVAL)
    }
}

impl AudioBackend for ClockAudioBackend {
    fn open(&self, track: &AudioTrack) -> MimiResult<Arc<dyn AudioHandle>> {
        let duration = track.duration()?;
        Ok(Arc::new(ClockAudio::new(duration, self.update_interval)))
    }
}

#[derive(Debug)]
struct ClockState {
    /// Position accumulated before the current play run.
    base: Duration,
    /// Set while playing.
    started_at: Option<Instant>,
    ticker: Option<CancellationToken>,
}

#[derive(Debug)]
struct ClockShared {
    duration: Duration,
    update_interval: Duration,
    state: Mutex<ClockState>,
    tx: watch::Sender<Duration>,
}

impl ClockShared {
    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn position(&self, state: &ClockState) -> Duration {
        let run = state.started_at.map(|t| t.elapsed()).unwrap_or_default();
        (state.base + run).min(self.duration)
    }

    fn stop_locked(&self, state: &mut ClockState) {
        state.base = self.position(state);
        state.started_at = None;
        if let Some(token) = state.ticker.take() {
            token.cancel();
        }
    }
}

/// Audio element driven by the tokio clock.
///
/// Tracks the playhead of a track of known duration without producing sound, for headless
/// rendering. Time updates fire every `update_interval` while playing, starting immediately;
/// reaching the end publishes the final position and pauses.
#[derive(Debug, Clone)]
pub struct ClockAudio {
    shared: Arc<ClockShared>,
}

impl ClockAudio {
    /// Create a paused handle positioned at zero.
    pub fn new(duration: Duration, update_interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(Duration::ZERO);
        Self {
            shared: Arc::new(ClockShared {
                duration,
                update_interval: update_interval.max(Duration::from_millis(1)),
                state: Mutex::new(ClockState {
                    base: Duration::ZERO,
                    started_at: None,
                    ticker: None,
                }),
                tx,
            }),
        }
    }

    /// Total track length.
    pub fn duration(&self) -> Duration {
        self.shared.duration
    }

    /// Return `true` once the playhead reached the end.
    pub fn ended(&self) -> bool {
        let state = self.shared.lock();
        self.shared.position(&state) >= self.shared.duration
    }

    async fn run_ticker(shared: Arc<ClockShared>, token: CancellationToken) {
        let mut ticker = interval(shared.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let mut state = shared.lock();
            if token.is_cancelled() {
                return;
            }
            let pos = shared.position(&state);
            shared.tx.send_replace(pos);
            if pos >= shared.duration {
                shared.stop_locked(&mut state);
                tracing::debug!(duration_ms = shared.duration.as_millis() as u64, "audio ended");
                return;
            }
        }
    }
}

impl AudioHandle for ClockAudio {
    fn play(&self) -> MimiResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MimiError::playback(format!("no async runtime: {e}")))?;
        let mut state = self.shared.lock();
        if state.started_at.is_some() {
            return Ok(());
        }
        if self.shared.position(&state) >= self.shared.duration {
            state.base = Duration::ZERO;
        }
        let token = CancellationToken::new();
        state.started_at = Some(Instant::now());
        state.ticker = Some(token.clone());
        runtime.spawn(Self::run_ticker(self.shared.clone(), token));
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.shared.lock();
        self.shared.stop_locked(&mut state);
    }

    fn is_paused(&self) -> bool {
        self.shared.lock().started_at.is_none()
    }

    fn current_time(&self) -> Duration {
        let state = self.shared.lock();
        self.shared.position(&state)
    }

    fn time_updates(&self) -> watch::Receiver<Duration> {
        self.shared.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/speech/audio.rs"]
mod tests;
