use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    MimiResult, SpriteCache,
    assets::Sprite,
    foundation::{
        config::{BlinkConfig, SpriteNames},
        core::Rect,
    },
    render::compositor::Compositor,
};

/// Eye heights drawn while closing, one per sub-frame.
///
/// Starts from `full_height` and multiplies by `shrink_factor` until the height is at or below
/// `min_height_ratio * full_height`; the last entry is the first height under the floor. With the
/// default `0.8` / `0.2` tunables this is always 8 entries, whatever the height.
pub fn shrink_schedule(full_height: f64, config: &BlinkConfig) -> Vec<f64> {
    let factor = config.shrink_factor;
    if !(full_height > 0.0) || !(factor > 0.0 && factor < 1.0) {
        return Vec::new();
    }
    let floor = full_height * config.min_height_ratio;
    let mut heights = Vec::new();
    let mut height = full_height;
    while height > floor {
        height *= factor;
        heights.push(height);
    }
    heights
}

/// Periodic idle blink over the eye rectangles.
///
/// A cycle closes the eyes by squashing the open sprites, pins them at the height floor, swaps
/// in the closed sprites, then reopens. Every step waits on a timer; draws go through
/// [`Compositor::paint`] so each clear and its redraw stay together.
#[derive(Clone, Debug)]
pub struct BlinkController {
    compositor: Compositor,
    cache: SpriteCache,
    sprites: Arc<SpriteNames>,
    config: BlinkConfig,
}

impl BlinkController {
    /// Create a controller drawing through `compositor`.
    pub fn new(
        compositor: Compositor,
        cache: SpriteCache,
        sprites: SpriteNames,
        config: BlinkConfig,
    ) -> Self {
        Self {
            compositor,
            cache,
            sprites: Arc::new(sprites),
            config,
        }
    }

    /// Run one full close/reopen cycle.
    ///
    /// All four eye sprites are loaded up front, so a load failure aborts the cycle before
    /// anything is drawn.
    #[tracing::instrument(level = "trace", skip(self))]
    pub async fn run_cycle(&self) -> MimiResult<()> {
        let left = self.cache.get(&self.sprites.eye_left).await?;
        let right = self.cache.get(&self.sprites.eye_right).await?;
        let left_closed = self.cache.get(&self.sprites.eye_left_closed).await?;
        let right_closed = self.cache.get(&self.sprites.eye_right_closed).await?;

        let full_height = f64::from(left.height);
        for height in shrink_schedule(full_height, &self.config) {
            sleep(self.config.step()).await;
            self.paint_squashed(&left, &right, height);
        }

        // Pin at the floor; the multiplicative shrink overshoots it.
        sleep(self.config.step()).await;
        let floor = (full_height * self.config.min_height_ratio).floor();
        self.paint_squashed(&left, &right, floor);

        sleep(self.config.closed_hold()).await;
        self.paint_eyes(&left_closed, &right_closed);

        sleep(self.config.reopen_hold()).await;
        self.paint_eyes(&left, &right);
        Ok(())
    }

    /// Spawn the blink loop on the current tokio runtime.
    ///
    /// The first cycle starts one interval from now. If a cycle is still running when the
    /// interval elapses, that tick is skipped rather than starting an overlapping cycle.
    pub fn start(self) -> BlinkHandle {
        let token = CancellationToken::new();
        let cycles = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(self.run_loop(token.clone(), cycles.clone()));
        BlinkHandle {
            token,
            cycles,
            task: Some(task),
        }
    }

    async fn run_loop(self, token: CancellationToken, cycles: Arc<AtomicU64>) {
        let period = self.config.interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(interval_ms = self.config.interval_ms, "blink loop started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = token.cancelled() => break,
                res = self.run_cycle() => match res {
                    Ok(()) => {
                        cycles.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => tracing::warn!(error = %err, "blink cycle aborted"),
                },
            }
        }
        tracing::debug!("blink loop stopped");
    }

    fn paint_squashed(&self, left: &Sprite, right: &Sprite, height: f64) {
        self.compositor.paint(|f| {
            f.clear_eye_region();
            f.draw_sprite_in(left, squashed_rect(left, height));
            f.draw_sprite_in(right, squashed_rect(right, height));
        });
    }

    fn paint_eyes(&self, left: &Sprite, right: &Sprite) {
        self.compositor.paint(|f| {
            f.clear_eye_region();
            f.draw_sprite(left);
            f.draw_sprite(right);
        });
    }
}

/// Full-width destination at `height`, offset down by a third of the lost height.
fn squashed_rect(sprite: &Sprite, height: f64) -> Rect {
    let full = f64::from(sprite.height);
    Rect::from_origin_size((0.0, (full - height) / 3.0), (f64::from(sprite.width), height))
}

/// Cancellation handle for a running blink loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct BlinkHandle {
    token: CancellationToken,
    cycles: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl BlinkHandle {
    /// Request the loop to stop at its next await point.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Return `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of cycles that ran to completion.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Cancel and wait for the loop task to finish.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
            && err.is_panic()
        {
            tracing::error!(error = %err, "blink loop panicked");
        }
    }
}

impl Drop for BlinkHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/blink.rs"]
mod tests;
