//! Mimi is a viseme-driven lip-sync engine for a 2D sprite talking-head avatar.
//!
//! A speech synthesizer returns an audio track plus a sparse, timestamped sequence of viseme
//! (mouth-shape) events. Mimi plays the track, follows its position and swaps mouth sprites on a
//! shared 512x512 drawing surface, while an independent blink loop animates the eyes.
//!
//! # Pipeline overview
//!
//! 1. **Synthesize**: [`SynthesisRequest`] -> validated request -> [`Synthesizer`] ->
//!    [`SynthesisResult`] (`{audio, visemes}`)
//! 2. **Play**: [`PlaybackSession`] retires any previous utterance, opens an [`AudioHandle`] and
//!    attaches the [`VisemeScheduler`]
//! 3. **Track**: each audio time update selects a viseme with [`select_viseme`] and redraws the
//!    mouth region through the [`Compositor`]
//! 4. **Blink**: [`BlinkController`] closes and reopens the eyes on its own fixed interval
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Atomic region repaints**: a region clear and its redraw happen inside one synchronous
//!   [`Compositor::paint`] closure, so the two writers never interleave inside a region.
//! - **Premultiplied RGBA8** end-to-end on the drawing surface.
//!
//! [`Avatar`] ties everything together behind a single activation entry point.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod animation;
mod assets;
mod avatar;
mod foundation;
mod render;
mod speech;

pub use animation::blink::{BlinkController, BlinkHandle, shrink_schedule};
pub use assets::Sprite;
pub use assets::cache::{FsSpriteLoader, SpriteCache, SpriteLoader};
pub use assets::decode::decode_sprite;
pub use avatar::{Activation, Avatar};
pub use foundation::config::{
    AvatarConfig, AvatarGeometry, BlinkConfig, LipSyncConfig, SpriteNames,
};
pub use foundation::core::{Canvas, Point, Rect, Rgba8Premul};
pub use foundation::error::{MimiError, MimiResult};
pub use render::compositor::{Compositor, Frame};
pub use render::surface::Surface;
pub use speech::audio::{AudioBackend, AudioHandle, AudioTrack, ClockAudio, ClockAudioBackend};
pub use speech::recorded::{RecordedFrame, RecordedSynthesizer, load_utterance};
pub use speech::scheduler::{ScheduleBinding, VisemeScheduler};
pub use speech::session::PlaybackSession;
pub use speech::synthesis::{
    Percent, RawSynthesisOutcome, RawViseme, SynthesisRequest, SynthesisResult, Synthesizer,
    ValidatedRequest, ValidationIssue, clamp_percent_input,
};
pub use speech::viseme::{VisemeEvent, VisemeSequence, select_viseme};

#[cfg(test)]
#[path = "../tests/unit/support.rs"]
pub(crate) mod test_support;
