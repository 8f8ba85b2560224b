use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    MimiResult,
    assets::Sprite,
    foundation::{
        config::AvatarGeometry,
        core::{Canvas, Rect},
    },
    render::surface::Surface,
};

/// Shared handle to the avatar drawing surface.
///
/// Cloning is cheap and every clone draws onto the same surface. The blink loop owns the eye
/// rectangles and the viseme scheduler owns the mouth rectangle; both go through [`paint`],
/// whose closure runs under the surface lock. Because the closure is synchronous, a region
/// clear and the redraw that follows it can never be split by an await point.
///
/// [`paint`]: Compositor::paint
#[derive(Clone, Debug)]
pub struct Compositor {
    surface: Arc<Mutex<Surface>>,
    geometry: Arc<AvatarGeometry>,
}

impl Compositor {
    /// Create a compositor over a fresh transparent surface.
    pub fn new(canvas: Canvas, geometry: AvatarGeometry) -> Self {
        Self {
            surface: Arc::new(Mutex::new(Surface::new(canvas))),
            geometry: Arc::new(geometry),
        }
    }

    /// Region geometry in use.
    pub fn geometry(&self) -> &AvatarGeometry {
        &self.geometry
    }

    /// Run one atomic batch of drawing operations.
    pub fn paint<R>(&self, f: impl FnOnce(&mut Frame<'_>) -> R) -> R {
        let mut surface = self.lock();
        let mut frame = Frame {
            surface: &mut *surface,
            geometry: &self.geometry,
        };
        f(&mut frame)
    }

    /// Copy of the current surface contents.
    pub fn snapshot(&self) -> Surface {
        self.lock().clone()
    }

    /// Write the current surface contents as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> MimiResult<()> {
        self.snapshot().save_png(path)
    }

    fn lock(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drawing access granted for the duration of one [`Compositor::paint`] call.
pub struct Frame<'a> {
    surface: &'a mut Surface,
    geometry: &'a AvatarGeometry,
}

impl Frame<'_> {
    /// Draw a full-canvas sprite at the origin.
    pub fn draw_sprite(&mut self, sprite: &Sprite) {
        self.surface.draw_sprite(sprite);
    }

    /// Draw a sprite scaled into `dst`.
    pub fn draw_sprite_in(&mut self, sprite: &Sprite, dst: Rect) {
        self.surface.draw_sprite_in(sprite, dst);
    }

    /// Paint both eye rectangles with the body background.
    pub fn clear_eye_region(&mut self) {
        let bg = self.geometry.background();
        self.surface.fill_rect(self.geometry.left_eye, bg);
        self.surface.fill_rect(self.geometry.right_eye, bg);
    }

    /// Paint the mouth rectangle with the body background.
    pub fn clear_mouth_region(&mut self) {
        self.surface
            .fill_rect(self.geometry.mouth, self.geometry.background());
    }

    /// Read-only view of the surface being painted.
    pub fn surface(&self) -> &Surface {
        self.surface
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
