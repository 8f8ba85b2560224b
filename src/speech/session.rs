use std::sync::Arc;

use crate::{
    MimiResult,
    speech::{
        audio::{AudioBackend, AudioHandle, AudioTrack},
        scheduler::{ScheduleBinding, VisemeScheduler},
        viseme::VisemeSequence,
    },
};

struct ActivePlayback {
    audio: Arc<dyn AudioHandle>,
    binding: ScheduleBinding,
    events: VisemeSequence,
}

/// Owner of the one live utterance.
///
/// Starting a new utterance always retires the previous one first: its audio is paused and its
/// viseme binding detached, so stale events can no longer reach the mouth.
pub struct PlaybackSession {
    backend: Arc<dyn AudioBackend>,
    scheduler: VisemeScheduler,
    current: Option<ActivePlayback>,
}

impl PlaybackSession {
    /// Create an idle session.
    pub fn new(backend: Arc<dyn AudioBackend>, scheduler: VisemeScheduler) -> Self {
        Self {
            backend,
            scheduler,
            current: None,
        }
    }

    /// Retire any current utterance, then open, bind and start `track`.
    ///
    /// On error nothing is left playing.
    #[tracing::instrument(level = "debug", skip_all, fields(events = events.len()))]
    pub fn play(&mut self, track: &AudioTrack, events: VisemeSequence) -> MimiResult<()> {
        self.retire();

        let audio = self.backend.open(track)?;
        let binding = self.scheduler.attach(audio.as_ref(), events.clone())?;
        if let Err(err) = audio.play() {
            binding.detach();
            return Err(err);
        }

        self.current = Some(ActivePlayback {
            audio,
            binding,
            events,
        });
        tracing::debug!("playback started");
        Ok(())
    }

    /// Pause and detach the current utterance, if any. Idempotent.
    pub fn retire(&mut self) {
        if let Some(active) = self.current.take() {
            active.audio.pause();
            active.binding.detach();
            tracing::debug!(draws = active.binding.draws(), "playback retired");
        }
    }

    /// Return `true` while an utterance is installed (playing or ended, not yet retired).
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Audio handle of the installed utterance.
    pub fn audio(&self) -> Option<Arc<dyn AudioHandle>> {
        self.current.as_ref().map(|a| a.audio.clone())
    }

    /// Events of the installed utterance.
    pub fn events(&self) -> Option<&VisemeSequence> {
        self.current.as_ref().map(|a| &a.events)
    }

    /// Mouth frames drawn by the installed utterance so far.
    pub fn draws(&self) -> u64 {
        self.current.as_ref().map_or(0, |a| a.binding.draws())
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("active", &self.is_active())
            .field("events", &self.events().map(VisemeSequence::len))
            .finish()
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.retire();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/speech/session.rs"]
mod tests;
