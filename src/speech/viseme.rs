use std::sync::Arc;

use crate::{MimiError, MimiResult};

/// One timestamped mouth shape emitted by the speech service.
///
/// Deserialized events go through the same checks as [`VisemeEvent::new`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawVisemeEvent")]
pub struct VisemeEvent {
    offset_ms: f64,
    shape_id: u32,
}

#[derive(serde::Deserialize)]
struct RawVisemeEvent {
    offset_ms: f64,
    shape_id: u32,
}

impl TryFrom<RawVisemeEvent> for VisemeEvent {
    type Error = MimiError;

    fn try_from(raw: RawVisemeEvent) -> MimiResult<Self> {
        Self::new(raw.offset_ms, raw.shape_id)
    }
}

impl VisemeEvent {
    /// Create an event, rejecting negative or non-finite offsets.
    pub fn new(offset_ms: f64, shape_id: u32) -> MimiResult<Self> {
        if !offset_ms.is_finite() || offset_ms < 0.0 {
            return Err(MimiError::validation(format!(
                "viseme offset must be a non-negative number, got {offset_ms}"
            )));
        }
        Ok(Self {
            offset_ms,
            shape_id,
        })
    }

    /// Milliseconds from the start of the audio track.
    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    /// Mouth shape identifier from the service's viseme vocabulary.
    pub fn shape_id(&self) -> u32 {
        self.shape_id
    }
}

/// Immutable viseme events for exactly one audio track, ascending by offset.
///
/// Ordering is established where the sequence is built from service output; lookups do not
/// re-check it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisemeSequence {
    events: Arc<[VisemeEvent]>,
}

impl VisemeSequence {
    /// Wrap events that are already in ascending offset order.
    pub fn new(events: Vec<VisemeEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }

    /// Build a sequence from events in any order (stable by offset).
    pub fn from_unordered(mut events: Vec<VisemeEvent>) -> Self {
        events.sort_by(|a, b| a.offset_ms().total_cmp(&b.offset_ms()));
        Self::new(events)
    }

    /// Events as a slice.
    pub fn as_slice(&self) -> &[VisemeEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Return `true` when there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Return `true` if offsets never decrease.
    pub fn is_ordered(&self) -> bool {
        self.events.windows(2).all(|w| w[0].offset_ms() <= w[1].offset_ms())
    }

    /// Event to show at audio position `t_ms`; see [`select_viseme`].
    pub fn select(&self, t_ms: f64, transition_delay_ms: f64) -> Option<&VisemeEvent> {
        select_viseme(&self.events, t_ms, transition_delay_ms)
    }
}

/// Pick the mouth shape for audio position `t_ms`.
///
/// Scans forward and returns the first event with `offset - transition_delay / 2 >= t_ms`. On an
/// ascending sequence that is the next boundary at or after the (lead-adjusted) playhead, so the
/// mouth anticipates the upcoming shape. `None` means the mouth stays as last drawn.
pub fn select_viseme(
    events: &[VisemeEvent],
    t_ms: f64,
    transition_delay_ms: f64,
) -> Option<&VisemeEvent> {
    let lead = transition_delay_ms / 2.0;
    events.iter().find(|e| e.offset_ms() - lead >= t_ms)
}

#[cfg(test)]
#[path = "../../tests/unit/speech/viseme.rs"]
mod tests;
