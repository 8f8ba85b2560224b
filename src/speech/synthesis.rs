use std::fmt;

use async_trait::async_trait;

use crate::{
    MimiError, MimiResult,
    speech::{
        audio::AudioTrack,
        viseme::{VisemeEvent, VisemeSequence},
    },
};

/// Viseme offsets from the speech service are in 100ns ticks.
const TICKS_PER_MS: f64 = 10_000.0;

/// A rate or pitch offset, clamped to `-100..=100`. Fractions are kept.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Percent(f64);

impl Percent {
    /// Smallest accepted offset.
    pub const MIN: f64 = -100.0;
    /// Largest accepted offset.
    pub const MAX: f64 = 100.0;

    /// Create a percent, rejecting non-finite values and values outside the accepted range.
    pub fn new(value: f64) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    /// Create a percent, clamping to the nearest bound. `None` for NaN or infinity.
    pub fn clamped(value: f64) -> Option<Self> {
        value
            .is_finite()
            .then(|| Self(value.clamp(Self::MIN, Self::MAX)))
    }

    /// Signed offset.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Percent {
    /// SSML prosody form, e.g. `+10%`, `-25%` or `+0.5%`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}%", self.0)
    }
}

/// Parse a user-entered percentage (`"10"`, `"+10"`, `"-10%"`, `"12.5"`) and clamp it.
///
/// Returns `None` when the input is not a finite number.
pub fn clamp_percent_input(input: &str) -> Option<f64> {
    parse_percent(input).map(Percent::value)
}

fn parse_percent(input: &str) -> Option<Percent> {
    let trimmed = input.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    number.parse::<f64>().ok().and_then(Percent::clamped)
}

/// Why a request was not sent to the speech service.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A required field is blank.
    #[error("{0} is empty")]
    EmptyField(&'static str),
    /// Rate or pitch is not a number.
    #[error("{field} is not a percentage: '{value}'")]
    NotAPercent {
        /// `rate` or `pitch`.
        field: &'static str,
        /// The rejected input.
        value: String,
    },
    /// Rate or pitch is exactly zero, which means unset.
    #[error("{0} is unset (0)")]
    ZeroPercent(&'static str),
}

/// Raw form input for one utterance.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SynthesisRequest {
    /// Service voice identifier.
    pub voice: String,
    /// Expressive speaking style.
    pub express_style: String,
    /// Text to speak.
    pub phrase: String,
    /// Signed rate offset in percent.
    pub rate: String,
    /// Signed pitch offset in percent.
    pub pitch: String,
}

impl SynthesisRequest {
    /// Check every field, clamping rate and pitch into range.
    ///
    /// Blank fields and a rate or pitch of exactly zero suppress synthesis.
    pub fn validate(&self) -> Result<ValidatedRequest, ValidationIssue> {
        let voice = required("voice", &self.voice)?;
        let express_style = required("express_style", &self.express_style)?;
        let phrase = required("phrase", &self.phrase)?;
        let rate = percent_field("rate", &self.rate)?;
        let pitch = percent_field("pitch", &self.pitch)?;
        Ok(ValidatedRequest {
            voice,
            express_style,
            phrase,
            rate,
            pitch,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationIssue> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationIssue::EmptyField(field));
    }
    Ok(value.to_string())
}

fn percent_field(field: &'static str, value: &str) -> Result<Percent, ValidationIssue> {
    if value.trim().is_empty() {
        return Err(ValidationIssue::EmptyField(field));
    }
    let percent = parse_percent(value).ok_or_else(|| ValidationIssue::NotAPercent {
        field,
        value: value.to_string(),
    })?;
    // Only an exact zero (including -0) means unset.
    if percent.value() == 0.0 {
        return Err(ValidationIssue::ZeroPercent(field));
    }
    Ok(percent)
}

/// A request that passed validation. Only these reach a [`Synthesizer`].
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedRequest {
    voice: String,
    express_style: String,
    phrase: String,
    rate: Percent,
    pitch: Percent,
}

impl ValidatedRequest {
    /// Service voice identifier.
    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Expressive speaking style.
    pub fn express_style(&self) -> &str {
        &self.express_style
    }

    /// Text to speak.
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Rate offset.
    pub fn rate(&self) -> Percent {
        self.rate
    }

    /// Pitch offset.
    pub fn pitch(&self) -> Percent {
        self.pitch
    }

    /// Render the SSML document sent to the speech service.
    pub fn to_ssml(&self) -> String {
        format!(
            concat!(
                r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" "#,
                r#"xmlns:mstts="https://www.w3.org/2001/mstts" xml:lang="en-US">"#,
                r#"<voice name="{voice}"><prosody rate="{rate}" pitch="{pitch}">"#,
                r#"<mstts:express-as style="{style}" styledegree="2">{phrase}</mstts:express-as>"#,
                r#"</prosody></voice></speak>"#,
            ),
            voice = xml_escape(&self.voice),
            rate = self.rate,
            pitch = self.pitch,
            style = xml_escape(&self.express_style),
            phrase = xml_escape(&self.phrase),
        )
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Audio plus the viseme events aligned to it.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisResult {
    /// Encoded speech.
    pub audio: AudioTrack,
    /// Mouth shapes, ascending by offset.
    pub visemes: VisemeSequence,
}

/// The speech service, seen from the engine.
///
/// Implementations may take arbitrarily long; callers must not assume a latency bound.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize one validated request.
    async fn synthesize(&self, request: &ValidatedRequest) -> MimiResult<SynthesisResult>;
}

/// One viseme as reported by the speech service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawViseme {
    /// Offset from the start of audio in 100ns ticks.
    pub audio_offset_ticks: u64,
    /// Mouth shape identifier.
    pub viseme_id: u32,
}

/// Final state of one synthesis call, as returned over the wire.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RawSynthesisOutcome {
    /// Audio was produced.
    Completed {
        /// WAV bytes.
        audio: Vec<u8>,
        /// Visemes collected during synthesis.
        visemes: Vec<RawViseme>,
    },
    /// The service gave up.
    Canceled {
        /// Service-provided explanation.
        reason: String,
    },
}

impl RawSynthesisOutcome {
    /// Validate a service payload into a playable result.
    ///
    /// The audio must carry a readable WAV header. Viseme offsets are converted to milliseconds
    /// and put in ascending order if the service delivered them out of order.
    pub fn into_result(self) -> MimiResult<SynthesisResult> {
        match self {
            Self::Canceled { reason } => Err(MimiError::synthesis(format!("canceled: {reason}"))),
            Self::Completed { audio, visemes } => {
                let audio = AudioTrack::wav(audio);
                audio
                    .duration()
                    .map_err(|e| MimiError::synthesis(format!("unusable audio: {e}")))?;

                let events = visemes
                    .iter()
                    .map(|v| VisemeEvent::new(v.audio_offset_ticks as f64 / TICKS_PER_MS, v.viseme_id))
                    .collect::<MimiResult<Vec<_>>>()?;
                let ordered = events.is_sorted_by(|a, b| a.offset_ms() <= b.offset_ms());
                let visemes = if ordered {
                    VisemeSequence::new(events)
                } else {
                    tracing::debug!(events = events.len(), "reordering out-of-order visemes");
                    VisemeSequence::from_unordered(events)
                };
                Ok(SynthesisResult { audio, visemes })
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/speech/synthesis.rs"]
mod tests;
