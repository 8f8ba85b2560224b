use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    MimiError, MimiResult,
    speech::{
        audio::AudioTrack,
        synthesis::{SynthesisResult, Synthesizer, ValidatedRequest},
        viseme::{VisemeEvent, VisemeSequence},
    },
};

/// One entry of a recorded utterance's viseme file.
///
/// `id` may be written as a number or a numeric string; `offset` is in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Mouth shape identifier.
    #[serde(deserialize_with = "shape_id")]
    pub id: u32,
    /// Milliseconds from the start of the audio.
    pub offset: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ShapeRef {
    Number(u32),
    Text(String),
}

fn shape_id<'de, D: serde::Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    match ShapeRef::deserialize(de)? {
        ShapeRef::Number(n) => Ok(n),
        ShapeRef::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid shape id '{s}'"))),
    }
}

/// Load `<id>.wav` and `<id>.json` from `dir`.
#[tracing::instrument(level = "debug", skip(dir), fields(dir = %dir.as_ref().display()))]
pub async fn load_utterance(dir: impl AsRef<Path>, id: &str) -> MimiResult<SynthesisResult> {
    if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(MimiError::validation(format!("invalid utterance id '{id}'")));
    }
    let dir = dir.as_ref();
    let wav_path = dir.join(format!("{id}.wav"));
    let json_path = dir.join(format!("{id}.json"));

    let wav = tokio::fs::read(&wav_path)
        .await
        .with_context(|| format!("read utterance audio '{}'", wav_path.display()))?;
    let json = tokio::fs::read(&json_path)
        .await
        .with_context(|| format!("read utterance visemes '{}'", json_path.display()))?;

    let audio = AudioTrack::wav(wav);
    audio
        .duration()
        .map_err(|e| MimiError::synthesis(format!("utterance '{id}': {e}")))?;

    let frames: Vec<RecordedFrame> = serde_json::from_slice(&json)
        .map_err(|e| MimiError::serde(format!("{}: {e}", json_path.display())))?;
    let events = frames
        .iter()
        .map(|f| VisemeEvent::new(f.offset, f.id))
        .collect::<MimiResult<Vec<_>>>()?;

    tracing::debug!(events = events.len(), "utterance loaded");
    Ok(SynthesisResult {
        audio,
        visemes: VisemeSequence::from_unordered(events),
    })
}

/// A [`Synthesizer`] that replays one pre-recorded utterance for every request.
#[derive(Clone, Debug)]
pub struct RecordedSynthesizer {
    dir: PathBuf,
    id: String,
}

impl RecordedSynthesizer {
    /// Replay utterance `id` from `dir`.
    pub fn new(dir: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            id: id.into(),
        }
    }

    /// Utterance identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Synthesizer for RecordedSynthesizer {
    async fn synthesize(&self, request: &ValidatedRequest) -> MimiResult<SynthesisResult> {
        tracing::debug!(
            voice = request.voice(),
            style = request.express_style(),
            utterance = %self.id,
            "serving recorded utterance"
        );
        load_utterance(&self.dir, &self.id).await
    }
}

#[cfg(test)]
#[path = "../../tests/unit/speech/recorded.rs"]
mod tests;
