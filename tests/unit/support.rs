//! Shared fixtures for unit tests.

use std::{
    collections::HashMap,
    io::Cursor,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    AvatarGeometry, MimiError, MimiResult, Rect, SpriteCache, SpriteLoader, SpriteNames,
    assets::Sprite,
};

pub(crate) const BODY: [u8; 4] = [90, 81, 74, 255];
pub(crate) const EYE_OPEN: [u8; 4] = [250, 250, 250, 255];
pub(crate) const EYE_CLOSED: [u8; 4] = [10, 10, 10, 255];

/// In-memory loader counting calls per path. Yields once per load so concurrent requests
/// overlap.
#[derive(Default)]
pub(crate) struct MemoryLoader {
    sprites: Mutex<HashMap<String, Sprite>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl MemoryLoader {
    pub(crate) fn insert(&self, path: &str, sprite: Sprite) {
        self.sprites
            .lock()
            .unwrap()
            .insert(path.to_string(), sprite);
    }

    pub(crate) fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpriteLoader for MemoryLoader {
    async fn load(&self, path: &str) -> MimiResult<Sprite> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default() += 1;
        tokio::task::yield_now().await;
        self.sprites
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| MimiError::decode(path, "missing in memory loader"))
    }
}

/// Transparent sprite of the given size with `rect` filled by `color`.
pub(crate) fn sprite_with_rect(width: u32, height: u32, rects: &[Rect], color: [u8; 4]) -> Sprite {
    let mut px = vec![0u8; (width * height * 4) as usize];
    for r in rects {
        for y in r.y0 as u32..r.y1 as u32 {
            for x in r.x0 as u32..r.x1 as u32 {
                let idx = ((y * width + x) * 4) as usize;
                px[idx..idx + 4].copy_from_slice(&color);
            }
        }
    }
    Sprite::from_premul(width, height, px).unwrap()
}

pub(crate) fn solid_sprite(width: u32, height: u32, color: [u8; 4]) -> Sprite {
    sprite_with_rect(
        width,
        height,
        &[Rect::new(0.0, 0.0, f64::from(width), f64::from(height))],
        color,
    )
}

pub(crate) fn mouth_color(shape_id: u32) -> [u8; 4] {
    [(shape_id * 10 + 5) as u8, 200, 40, 255]
}

/// Full stock sprite set at 512x512: body, open and closed eyes, mouths `0..=max_shape`.
pub(crate) fn avatar_loader(max_shape: u32) -> Arc<MemoryLoader> {
    let geometry = AvatarGeometry::default();
    let names = SpriteNames::default();
    let loader = Arc::new(MemoryLoader::default());
    loader.insert(&names.body, solid_sprite(512, 512, BODY));
    let eyes = [geometry.left_eye, geometry.right_eye];
    loader.insert(&names.eye_left, sprite_with_rect(512, 512, &eyes[..1], EYE_OPEN));
    loader.insert(&names.eye_right, sprite_with_rect(512, 512, &eyes[1..], EYE_OPEN));
    loader.insert(
        &names.eye_left_closed,
        sprite_with_rect(512, 512, &eyes[..1], EYE_CLOSED),
    );
    loader.insert(
        &names.eye_right_closed,
        sprite_with_rect(512, 512, &eyes[1..], EYE_CLOSED),
    );
    for id in 0..=max_shape {
        loader.insert(
            &names.mouth(id),
            sprite_with_rect(512, 512, &[geometry.mouth], mouth_color(id)),
        );
    }
    loader
}

pub(crate) fn avatar_cache(max_shape: u32) -> (SpriteCache, Arc<MemoryLoader>) {
    let loader = avatar_loader(max_shape);
    (SpriteCache::new(loader.clone()), loader)
}

/// Mono 16-bit silence of the given length, WAV encoded.
pub(crate) fn silent_wav(duration_ms: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buf, spec).unwrap();
        for _ in 0..(8 * duration_ms) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    buf.into_inner()
}

/// Unique scratch directory path under the system temp dir (not created).
pub(crate) fn temp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "mimi_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}
