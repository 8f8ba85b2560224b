use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    MimiError, MimiResult, SpriteCache,
    foundation::config::{LipSyncConfig, SpriteNames},
    render::compositor::Compositor,
    speech::{audio::AudioHandle, viseme::VisemeSequence},
};

/// Drives the mouth region from an audio handle's time updates.
#[derive(Clone, Debug)]
pub struct VisemeScheduler {
    compositor: Compositor,
    cache: SpriteCache,
    sprites: Arc<SpriteNames>,
    transition_delay_ms: f64,
}

impl VisemeScheduler {
    /// Create a scheduler drawing mouths through `compositor`.
    pub fn new(
        compositor: Compositor,
        cache: SpriteCache,
        sprites: SpriteNames,
        lip_sync: &LipSyncConfig,
    ) -> Self {
        Self {
            compositor,
            cache,
            sprites: Arc::new(sprites),
            transition_delay_ms: lip_sync.transition_delay_ms,
        }
    }

    /// Lead time used for selection.
    pub fn transition_delay_ms(&self) -> f64 {
        self.transition_delay_ms
    }

    /// Bind `events` to `audio`'s time updates.
    ///
    /// Each update selects an event for the new position and, if one qualifies, redraws the
    /// mouth with its shape. Only positions published after this call count. The binding stays
    /// live until detached or dropped, or until the audio handle goes away.
    ///
    /// The listener runs on the current tokio runtime; outside one this is a playback error.
    pub fn attach(
        &self,
        audio: &dyn AudioHandle,
        events: VisemeSequence,
    ) -> MimiResult<ScheduleBinding> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MimiError::playback(format!("no async runtime: {e}")))?;
        let token = CancellationToken::new();
        let draws = Arc::new(AtomicU64::new(0));
        let task = runtime.spawn(self.clone().track(
            audio.time_updates(),
            events,
            token.clone(),
            draws.clone(),
        ));
        Ok(ScheduleBinding {
            compositor: self.compositor.clone(),
            token,
            draws,
            task: Some(task),
        })
    }

    /// Clear the mouth region and draw `shape_id`.
    ///
    /// The sprite is loaded before the surface is touched, so a load failure leaves the mouth
    /// as it was.
    pub async fn draw_mouth(&self, shape_id: u32) -> MimiResult<()> {
        let sprite = self.cache.get(&self.sprites.mouth(shape_id)).await?;
        self.compositor.paint(|f| {
            f.clear_mouth_region();
            f.draw_sprite(&sprite);
        });
        Ok(())
    }

    async fn track(
        self,
        mut updates: watch::Receiver<Duration>,
        events: VisemeSequence,
        token: CancellationToken,
        draws: Arc<AtomicU64>,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let t_ms = updates.borrow_and_update().as_secs_f64() * 1000.0;
            let Some(event) = events.select(t_ms, self.transition_delay_ms).copied() else {
                continue;
            };

            let sprite = match self.cache.get(&self.sprites.mouth(event.shape_id())).await {
                Ok(sprite) => sprite,
                Err(err) => {
                    tracing::warn!(shape_id = event.shape_id(), error = %err, "mouth frame skipped");
                    continue;
                }
            };
            // Checked under the surface lock, which detach also takes.
            let drawn = self.compositor.paint(|f| {
                if token.is_cancelled() {
                    return false;
                }
                f.clear_mouth_region();
                f.draw_sprite(&sprite);
                draws.fetch_add(1, Ordering::Relaxed);
                true
            });
            if !drawn {
                break;
            }
            tracing::trace!(t_ms, shape_id = event.shape_id(), "mouth frame");
        }
    }
}

/// Live link between one audio handle and the mouth region.
///
/// Detaching (or dropping) guarantees no further mouth draws from this binding, including one
/// whose sprite load was already in flight.
#[derive(Debug)]
pub struct ScheduleBinding {
    compositor: Compositor,
    token: CancellationToken,
    draws: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl ScheduleBinding {
    /// Stop reacting to time updates.
    ///
    /// Once this returns no mouth draw from this binding can land, even one already past its
    /// sprite load.
    pub fn detach(&self) {
        self.compositor.paint(|_| self.token.cancel());
    }

    /// Return `true` once detached.
    pub fn is_detached(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Mouth frames drawn through this binding.
    pub fn draws(&self) -> u64 {
        self.draws.load(Ordering::Relaxed)
    }

    /// Detach and wait for the listener task to finish.
    pub async fn join(mut self) {
        self.detach();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
            && err.is_panic()
        {
            tracing::error!(error = %err, "viseme listener panicked");
        }
    }
}

impl Drop for ScheduleBinding {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/speech/scheduler.rs"]
mod tests;
