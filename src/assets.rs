pub(crate) mod cache;
pub(crate) mod decode;

/// Decoded sprite in premultiplied RGBA8 form.
///
/// Immutable once decoded; shared through [`cache::SpriteCache`] behind an `Arc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sprite {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Vec<u8>,
}

impl Sprite {
    /// Build a sprite from premultiplied pixels, checking the buffer length.
    pub fn from_premul(
        width: u32,
        height: u32,
        rgba8_premul: Vec<u8>,
    ) -> crate::MimiResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| crate::MimiError::validation("sprite size overflow"))?;
        if rgba8_premul.len() != expected {
            return Err(crate::MimiError::validation(
                "sprite buffer must be width*height*4 bytes",
            ));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul,
        })
    }

    /// Premultiplied pixel at `(x, y)`; `None` outside the sprite.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.rgba8_premul.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}
