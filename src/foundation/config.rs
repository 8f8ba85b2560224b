use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use crate::foundation::core::{Canvas, Rect, Rgba8Premul};
use crate::foundation::error::{MimiError, MimiResult};

/// Complete engine configuration, loadable from JSON.
///
/// Every section has defaults matching the stock avatar artwork, so a config file only needs
/// to name what it overrides.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvatarConfig {
    /// Drawing surface size.
    pub canvas: Canvas,
    /// Fixed region geometry derived from the base artwork.
    pub geometry: AvatarGeometry,
    /// Sprite file names under the asset root.
    pub sprites: SpriteNames,
    /// Idle blink timing.
    pub blink: BlinkConfig,
    /// Viseme tracking parameters.
    pub lip_sync: LipSyncConfig,
}

impl AvatarConfig {
    /// Read and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> MimiResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text).map_err(|e| MimiError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> MimiResult<()> {
        Canvas::new(self.canvas.width, self.canvas.height)?;
        let bounds = self.canvas.rect();
        for (name, r) in [
            ("geometry.left_eye", self.geometry.left_eye),
            ("geometry.right_eye", self.geometry.right_eye),
            ("geometry.mouth", self.geometry.mouth),
        ] {
            if r.width() <= 0.0 || r.height() <= 0.0 {
                return Err(MimiError::validation(format!("{name} must have positive size")));
            }
            if bounds.intersect(r) != r {
                return Err(MimiError::validation(format!("{name} must lie inside the canvas")));
            }
        }
        self.sprites.validate()?;
        self.blink.validate()?;
        self.lip_sync.validate()
    }
}

/// Fixed rectangles cleared before each region redraw.
///
/// These come from the base body sprite. Replacement artwork must keep them or re-derive them,
/// otherwise region clears leave seams.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvatarGeometry {
    /// Body color behind the eyes and mouth, as straight `[r, g, b]`.
    pub background_rgb: [u8; 3],
    /// Left eye rectangle (viewer's right).
    pub left_eye: Rect,
    /// Right eye rectangle (viewer's left).
    pub right_eye: Rect,
    /// Mouth rectangle.
    pub mouth: Rect,
}

impl AvatarGeometry {
    /// Background as an opaque premultiplied color.
    pub fn background(&self) -> Rgba8Premul {
        let [r, g, b] = self.background_rgb;
        Rgba8Premul::opaque(r, g, b)
    }
}

impl Default for AvatarGeometry {
    fn default() -> Self {
        Self {
            background_rgb: [90, 81, 74],
            left_eye: Rect::from_origin_size((293.0, 156.0), (40.0, 44.0)),
            right_eye: Rect::from_origin_size((167.0, 156.0), (40.0, 44.0)),
            mouth: Rect::from_origin_size((200.0, 165.0), (100.0, 75.0)),
        }
    }
}

/// Sprite names relative to the asset root.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpriteNames {
    /// Full body base layer.
    pub body: String,
    /// Open left eye.
    pub eye_left: String,
    /// Open right eye.
    pub eye_right: String,
    /// Closed left eye, drawn at the bottom of a blink.
    pub eye_left_closed: String,
    /// Closed right eye.
    pub eye_right_closed: String,
    /// Mouth sprite template; `{id}` is replaced with the viseme shape id.
    pub mouth_template: String,
}

impl SpriteNames {
    const SHAPE_PLACEHOLDER: &'static str = "{id}";

    /// Sprite name for a viseme shape id.
    pub fn mouth(&self, shape_id: u32) -> String {
        self.mouth_template
            .replace(Self::SHAPE_PLACEHOLDER, &shape_id.to_string())
    }

    fn validate(&self) -> MimiResult<()> {
        if !self.mouth_template.contains(Self::SHAPE_PLACEHOLDER) {
            return Err(MimiError::validation(
                "sprites.mouth_template must contain '{id}'",
            ));
        }
        let names = [
            &self.body,
            &self.eye_left,
            &self.eye_right,
            &self.eye_left_closed,
            &self.eye_right_closed,
        ];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(MimiError::validation("sprite names must be non-empty"));
        }
        Ok(())
    }
}

impl Default for SpriteNames {
    fn default() -> Self {
        Self {
            body: "body.png".to_string(),
            eye_left: "eye-l.png".to_string(),
            eye_right: "eye-r.png".to_string(),
            eye_left_closed: "eye-l-closed.png".to_string(),
            eye_right_closed: "eye-r-closed.png".to_string(),
            mouth_template: "mouth-{id}.png".to_string(),
        }
    }
}

/// Idle blink timing. Independent of speech state.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlinkConfig {
    /// Time between blink cycle starts.
    pub interval_ms: u64,
    /// Delay before each shrink sub-frame and before the pinned minimum.
    pub step_ms: u64,
    /// Multiplicative shrink applied to eye height per sub-frame, in `(0, 1)`.
    pub shrink_factor: f64,
    /// Height floor as a fraction of full eye height, in `(0, 1)`.
    pub min_height_ratio: f64,
    /// Delay before the closed-eye sprites are drawn.
    pub closed_hold_ms: u64,
    /// Delay before the eyes reopen.
    pub reopen_hold_ms: u64,
}

impl BlinkConfig {
    /// Blink interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Shrink sub-frame delay as a [`Duration`].
    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    /// Closed-eye delay as a [`Duration`].
    pub fn closed_hold(&self) -> Duration {
        Duration::from_millis(self.closed_hold_ms)
    }

    /// Reopen delay as a [`Duration`].
    pub fn reopen_hold(&self) -> Duration {
        Duration::from_millis(self.reopen_hold_ms)
    }

    fn validate(&self) -> MimiResult<()> {
        if self.interval_ms == 0 {
            return Err(MimiError::validation("blink.interval_ms must be > 0"));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(MimiError::validation("blink.shrink_factor must be in (0, 1)"));
        }
        if !(self.min_height_ratio > 0.0 && self.min_height_ratio < 1.0) {
            return Err(MimiError::validation(
                "blink.min_height_ratio must be in (0, 1)",
            ));
        }
        Ok(())
    }
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3500,
            step_ms: 20,
            shrink_factor: 0.8,
            min_height_ratio: 0.2,
            closed_hold_ms: 75,
            reopen_hold_ms: 120,
        }
    }
}

/// Viseme tracking parameters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LipSyncConfig {
    /// Lead time in ms; half of it is subtracted from each event offset before comparison.
    pub transition_delay_ms: f64,
    /// Shape drawn at mount, before any event qualifies.
    pub neutral_shape_id: u32,
}

impl LipSyncConfig {
    fn validate(&self) -> MimiResult<()> {
        if !self.transition_delay_ms.is_finite() || self.transition_delay_ms < 0.0 {
            return Err(MimiError::validation(
                "lip_sync.transition_delay_ms must be a non-negative number",
            ));
        }
        Ok(())
    }
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            transition_delay_ms: 60.0,
            neutral_shape_id: 0,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
