use std::sync::Arc;

use crate::{
    AvatarConfig, MimiResult, SpriteCache, SpriteLoader,
    animation::blink::{BlinkController, BlinkHandle},
    render::compositor::Compositor,
    speech::{
        audio::AudioBackend,
        scheduler::VisemeScheduler,
        session::PlaybackSession,
        synthesis::{SynthesisRequest, Synthesizer, ValidationIssue},
    },
};

/// What happened to one activation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Activation {
    /// The request failed validation and was never sent.
    Suppressed(ValidationIssue),
    /// Synthesis or playback failed. The message is already logged.
    Failed(String),
    /// A new utterance is playing.
    Playing {
        /// Number of viseme events bound to the audio.
        events: usize,
    },
}

/// The talking head: one surface, one blink loop and at most one live utterance.
pub struct Avatar {
    config: AvatarConfig,
    compositor: Compositor,
    cache: SpriteCache,
    synthesizer: Arc<dyn Synthesizer>,
    session: PlaybackSession,
    blink: Option<BlinkHandle>,
}

impl Avatar {
    /// Build an avatar over a fresh surface. Nothing is drawn until [`Avatar::mount`].
    pub fn new(
        config: AvatarConfig,
        loader: Arc<dyn SpriteLoader>,
        audio: Arc<dyn AudioBackend>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> MimiResult<Self> {
        config.validate()?;
        let compositor = Compositor::new(config.canvas, config.geometry.clone());
        let cache = SpriteCache::new(loader);
        let scheduler = VisemeScheduler::new(
            compositor.clone(),
            cache.clone(),
            config.sprites.clone(),
            &config.lip_sync,
        );
        Ok(Self {
            session: PlaybackSession::new(audio, scheduler),
            config,
            compositor,
            cache,
            synthesizer,
            blink: None,
        })
    }

    /// Draw the resting face (body, open eyes, neutral mouth) and start blinking.
    ///
    /// Sprites are loaded before anything is drawn. Mounting again restarts the blink loop.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn mount(&mut self) -> MimiResult<()> {
        let names = &self.config.sprites;
        let body = self.cache.get(&names.body).await?;
        let eye_left = self.cache.get(&names.eye_left).await?;
        let eye_right = self.cache.get(&names.eye_right).await?;
        let mouth = self
            .cache
            .get(&names.mouth(self.config.lip_sync.neutral_shape_id))
            .await?;

        self.compositor.paint(|f| {
            f.draw_sprite(&body);
            f.draw_sprite(&eye_left);
            f.draw_sprite(&eye_right);
            f.draw_sprite(&mouth);
        });

        if let Some(previous) = self.blink.take() {
            previous.stop().await;
        }
        let blink = BlinkController::new(
            self.compositor.clone(),
            self.cache.clone(),
            self.config.sprites.clone(),
            self.config.blink.clone(),
        );
        self.blink = Some(blink.start());
        tracing::info!("avatar mounted");
        Ok(())
    }

    /// Validate, synthesize and play one request.
    ///
    /// Never fails outright. A rejected request is dropped silently; a synthesis failure is
    /// logged and the utterance already playing, if any, keeps playing.
    #[tracing::instrument(level = "debug", skip_all, fields(voice = %request.voice))]
    pub async fn activate(&mut self, request: &SynthesisRequest) -> Activation {
        let validated = match request.validate() {
            Ok(v) => v,
            Err(issue) => {
                tracing::debug!(%issue, "request suppressed");
                return Activation::Suppressed(issue);
            }
        };

        let result = match self.synthesizer.synthesize(&validated).await {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(error = %err, "speech synthesis failed");
                return Activation::Failed(err.to_string());
            }
        };

        let events = result.visemes.len();
        match self.session.play(&result.audio, result.visemes) {
            Ok(()) => Activation::Playing { events },
            Err(err) => {
                tracing::warn!(error = %err, "playback failed");
                Activation::Failed(err.to_string())
            }
        }
    }

    /// Stop blinking and retire playback.
    pub async fn teardown(&mut self) {
        if let Some(blink) = self.blink.take() {
            blink.stop().await;
        }
        self.session.retire();
        tracing::debug!("avatar torn down");
    }

    /// Engine configuration.
    pub fn config(&self) -> &AvatarConfig {
        &self.config
    }

    /// The shared drawing surface.
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Sprite cache shared by all drawers.
    pub fn cache(&self) -> &SpriteCache {
        &self.cache
    }

    /// Current playback session.
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Blink cycles completed since the last mount, or `None` when not blinking.
    pub fn blink_cycles(&self) -> Option<u64> {
        self.blink.as_ref().map(BlinkHandle::cycles_completed)
    }
}

impl std::fmt::Debug for Avatar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Avatar")
            .field("canvas", &self.config.canvas)
            .field("blinking", &self.blink.is_some())
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
#[path = "../tests/unit/avatar.rs"]
mod tests;
