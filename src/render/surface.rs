use std::ops::Range;
use std::path::Path;

use anyhow::Context;

use crate::{
    MimiError, MimiResult,
    assets::Sprite,
    foundation::core::{Canvas, Rect, Rgba8Premul},
};

/// Premultiplied RGBA8 drawing surface with canvas-2D style operations.
///
/// Coverage follows pixel centers: a pixel `(x, y)` is touched when `(x + 0.5, y + 0.5)` lies in
/// the half-open destination rectangle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    canvas: Canvas,
    rgba8_premul: Vec<u8>,
}

impl Surface {
    /// Create a fully transparent surface.
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            rgba8_premul: vec![0; canvas.byte_len()],
        }
    }

    /// Surface dimensions.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Raw premultiplied pixels, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.rgba8_premul
    }

    /// Premultiplied pixel at `(x, y)`; `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.canvas.width || y >= self.canvas.height {
            return None;
        }
        let idx = self.index(x, y);
        let px = &self.rgba8_premul[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Fill `rect` with `color` using source-over, like `fillRect`.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba8Premul) {
        let src = color.to_array();
        let xs = pixel_span(rect.x0, rect.x1, self.canvas.width);
        for y in pixel_span(rect.y0, rect.y1, self.canvas.height) {
            for x in xs.clone() {
                self.blend(x, y, src);
            }
        }
    }

    /// Draw a sprite at the origin at its natural size, like `drawImage(img, 0, 0)`.
    pub fn draw_sprite(&mut self, sprite: &Sprite) {
        let w = sprite.width.min(self.canvas.width);
        let h = sprite.height.min(self.canvas.height);
        for y in 0..h {
            for x in 0..w {
                if let Some(src) = sprite.pixel(x, y) {
                    self.blend(x, y, src);
                }
            }
        }
    }

    /// Draw a sprite scaled into `dst`, like `drawImage(img, dx, dy, dw, dh)`.
    ///
    /// Nearest-neighbor sampling. An empty `dst` draws nothing.
    pub fn draw_sprite_in(&mut self, sprite: &Sprite, dst: Rect) {
        let dst = dst.abs();
        if dst.width() <= 0.0 || dst.height() <= 0.0 || sprite.width == 0 || sprite.height == 0 {
            return;
        }
        let sx = f64::from(sprite.width) / dst.width();
        let sy = f64::from(sprite.height) / dst.height();
        let xs = pixel_span(dst.x0, dst.x1, self.canvas.width);
        for y in pixel_span(dst.y0, dst.y1, self.canvas.height) {
            let v = ((f64::from(y) + 0.5 - dst.y0) * sy).floor() as u32;
            let v = v.min(sprite.height - 1);
            for x in xs.clone() {
                let u = ((f64::from(x) + 0.5 - dst.x0) * sx).floor() as u32;
                let u = u.min(sprite.width - 1);
                if let Some(src) = sprite.pixel(u, v) {
                    self.blend(x, y, src);
                }
            }
        }
    }

    /// Convert to a straight-alpha `image` buffer.
    pub fn to_rgba_image(&self) -> MimiResult<image::RgbaImage> {
        let mut straight = self.rgba8_premul.clone();
        for px in straight.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 0 || a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        image::RgbaImage::from_raw(self.canvas.width, self.canvas.height, straight)
            .ok_or_else(|| MimiError::validation("surface buffer does not match canvas"))
    }

    /// Write the surface as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> MimiResult<()> {
        let path = path.as_ref();
        self.to_rgba_image()?
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.canvas.width as usize) + (x as usize)) * 4
    }

    fn blend(&mut self, x: u32, y: u32, src: [u8; 4]) {
        let idx = self.index(x, y);
        let dst = &mut self.rgba8_premul[idx..idx + 4];
        let out = over([dst[0], dst[1], dst[2], dst[3]], src);
        dst.copy_from_slice(&out);
    }
}

/// Premultiplied source-over.
pub(crate) fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

/// Pixel indices whose centers fall in `[lo, hi)`, clamped to `[0, limit)`.
fn pixel_span(lo: f64, hi: f64, limit: u32) -> Range<u32> {
    let limit_f = f64::from(limit);
    let start = (lo - 0.5).ceil().clamp(0.0, limit_f) as u32;
    let end = (hi - 0.5).ceil().clamp(0.0, limit_f) as u32;
    start..end.max(start)
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
