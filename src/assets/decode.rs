use crate::{MimiError, MimiResult, assets::Sprite};

/// Decode encoded image bytes (PNG and friends) and convert to premultiplied RGBA8.
///
/// `path` is only used to label errors.
pub fn decode_sprite(path: &str, bytes: &[u8]) -> MimiResult<Sprite> {
    let dyn_img =
        image::load_from_memory(bytes).map_err(|e| MimiError::decode(path, e.to_string()))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(Sprite {
        width,
        height,
        rgba8_premul,
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
