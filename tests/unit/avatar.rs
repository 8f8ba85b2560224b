use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::speech::synthesis::{SynthesisResult, ValidatedRequest};
use crate::test_support::{BODY, EYE_OPEN, avatar_loader, mouth_color, silent_wav};
use crate::{AudioTrack, ClockAudioBackend, MimiError, VisemeEvent, VisemeSequence};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Replies with a fixed utterance, or fails when `fail` is set.
struct StubSynth {
    calls: AtomicUsize,
    fail: bool,
    visemes: Vec<(f64, u32)>,
}

impl StubSynth {
    fn ok(visemes: &[(f64, u32)]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
            visemes: visemes.to_vec(),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
            visemes: Vec::new(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for StubSynth {
    async fn synthesize(&self, _request: &ValidatedRequest) -> MimiResult<SynthesisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(ms(40)).await;
        if self.fail {
            return Err(MimiError::synthesis("service unavailable"));
        }
        let events = self
            .visemes
            .iter()
            .map(|&(o, id)| VisemeEvent::new(o, id))
            .collect::<MimiResult<Vec<_>>>()?;
        Ok(SynthesisResult {
            audio: AudioTrack::wav(silent_wav(1500)),
            visemes: VisemeSequence::new(events),
        })
    }
}

fn request() -> SynthesisRequest {
    SynthesisRequest {
        voice: "en-US-JennyNeural".into(),
        express_style: "cheerful".into(),
        phrase: "Hi".into(),
        rate: "10".into(),
        pitch: "-10".into(),
    }
}

fn avatar(synth: Arc<dyn Synthesizer>) -> Avatar {
    Avatar::new(
        AvatarConfig::default(),
        avatar_loader(5),
        Arc::new(ClockAudioBackend::new(ms(100))),
        synth,
    )
    .unwrap()
}

fn px(a: &Avatar, x: u32, y: u32) -> [u8; 4] {
    a.compositor().snapshot().pixel(x, y).unwrap()
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = AvatarConfig::default();
    config.sprites.mouth_template = "mouth.png".into();
    let err = Avatar::new(
        config,
        avatar_loader(0),
        Arc::new(ClockAudioBackend::default()),
        StubSynth::ok(&[]),
    )
    .unwrap_err();
    assert!(matches!(err, MimiError::Validation(_)));
}

#[tokio::test(start_paused = true)]
async fn mount_draws_resting_face_and_starts_blinking() {
    let mut a = avatar(StubSynth::ok(&[]));
    assert_eq!(a.blink_cycles(), None);
    a.mount().await.unwrap();

    assert_eq!(px(&a, 20, 20), BODY);
    assert_eq!(px(&a, 313, 178), EYE_OPEN);
    assert_eq!(px(&a, 187, 178), EYE_OPEN);
    assert_eq!(px(&a, 250, 200), mouth_color(0));
    assert_eq!(a.blink_cycles(), Some(0));
    assert_eq!(a.compositor().snapshot().canvas(), a.config().canvas);
    assert!(a.cache().contains(&a.config().sprites.body));
    assert!(a.cache().decode_count() >= 4);

    tokio::time::sleep(ms(3900)).await;
    assert_eq!(a.blink_cycles(), Some(1));
    assert_eq!(px(&a, 313, 178), EYE_OPEN);

    a.teardown().await;
    assert_eq!(a.blink_cycles(), None);
}

#[tokio::test(start_paused = true)]
async fn mount_fails_on_missing_sprite() {
    let loader = avatar_loader(0);
    let mut config = AvatarConfig::default();
    config.lip_sync.neutral_shape_id = 9;
    let mut a = Avatar::new(
        config,
        loader,
        Arc::new(ClockAudioBackend::default()),
        StubSynth::ok(&[]),
    )
    .unwrap();
    assert!(a.mount().await.is_err());
    assert_eq!(a.blink_cycles(), None);
    // Nothing was drawn.
    assert_eq!(px(&a, 20, 20), [0, 0, 0, 0]);
}

#[tokio::test(start_paused = true)]
async fn zero_or_blank_controls_never_reach_the_synthesizer() {
    let synth = StubSynth::ok(&[(100.0, 1)]);
    let mut a = avatar(synth.clone());

    let mut req = request();
    req.rate = "0".into();
    assert_eq!(
        a.activate(&req).await,
        Activation::Suppressed(ValidationIssue::ZeroPercent("rate"))
    );

    let mut req = request();
    req.phrase.clear();
    assert!(matches!(
        a.activate(&req).await,
        Activation::Suppressed(ValidationIssue::EmptyField("phrase"))
    ));

    assert_eq!(synth.calls(), 0);
    assert!(!a.session().is_active());
}

#[tokio::test(start_paused = true)]
async fn activation_plays_and_drives_the_mouth() {
    let synth = StubSynth::ok(&[(100.0, 3), (400.0, 5)]);
    let mut a = avatar(synth.clone());
    a.mount().await.unwrap();

    assert_eq!(a.activate(&request()).await, Activation::Playing { events: 2 });
    assert_eq!(synth.calls(), 1);
    assert!(a.session().is_active());

    tokio::time::sleep(ms(50)).await;
    assert_eq!(px(&a, 250, 200), mouth_color(3));
    tokio::time::sleep(ms(200)).await;
    assert_eq!(px(&a, 250, 200), mouth_color(5));

    a.teardown().await;
    assert!(!a.session().is_active());
}

#[tokio::test(start_paused = true)]
async fn synthesis_failure_leaves_current_utterance_playing() {
    let mut a = avatar(StubSynth::ok(&[(100.0, 2)]));
    a.mount().await.unwrap();
    assert!(matches!(
        a.activate(&request()).await,
        Activation::Playing { .. }
    ));
    let playing = a.session().audio().unwrap();

    a.synthesizer = StubSynth::failing();
    let outcome = a.activate(&request()).await;
    assert_eq!(
        outcome,
        Activation::Failed("synthesis error: service unavailable".into())
    );

    assert!(a.session().is_active());
    let still = a.session().audio().unwrap();
    assert!(Arc::ptr_eq(&playing, &still));
    assert!(!still.is_paused());
}
