use super::*;
use crate::test_support::silent_wav;

fn request(rate: &str, pitch: &str) -> SynthesisRequest {
    SynthesisRequest {
        voice: "en-US-JennyNeural".to_string(),
        express_style: "cheerful".to_string(),
        phrase: "Hello there".to_string(),
        rate: rate.to_string(),
        pitch: pitch.to_string(),
    }
}

#[test]
fn percent_input_is_parsed_and_clamped() {
    assert_eq!(clamp_percent_input("10"), Some(10.0));
    assert_eq!(clamp_percent_input("+10"), Some(10.0));
    assert_eq!(clamp_percent_input(" -25% "), Some(-25.0));
    assert_eq!(clamp_percent_input("150"), Some(100.0));
    assert_eq!(clamp_percent_input("-1000"), Some(-100.0));
    assert_eq!(clamp_percent_input("12.5"), Some(12.5));
    assert_eq!(clamp_percent_input("0.2"), Some(0.2));
    assert_eq!(clamp_percent_input("fast"), None);
    assert_eq!(clamp_percent_input("inf"), None);
    assert_eq!(clamp_percent_input("NaN"), None);
    assert_eq!(clamp_percent_input(""), None);
}

#[test]
fn percent_renders_signed() {
    assert_eq!(Percent::clamped(10.0).unwrap().to_string(), "+10%");
    assert_eq!(Percent::clamped(-250.0).unwrap().to_string(), "-100%");
    assert_eq!(Percent::clamped(0.5).unwrap().to_string(), "+0.5%");
    assert_eq!(Percent::clamped(f64::NAN), None);
    assert_eq!(Percent::new(101.0), None);
    assert_eq!(Percent::new(-100.0).map(Percent::value), Some(-100.0));
}

#[test]
fn valid_request_clamps_out_of_range_values() {
    let ok = request("150", "-5").validate().unwrap();
    assert_eq!(ok.rate().value(), 100.0);
    assert_eq!(ok.pitch().value(), -5.0);
    assert_eq!(ok.voice(), "en-US-JennyNeural");
    assert_eq!(ok.express_style(), "cheerful");
    assert_eq!(ok.phrase(), "Hello there");
}

#[test]
fn only_exact_zero_suppresses() {
    for zero in ["0", "0%", "-0", "+0.0", " 0 "] {
        assert_eq!(
            request(zero, "10").validate(),
            Err(ValidationIssue::ZeroPercent("rate")),
            "rate = {zero:?}"
        );
    }
    assert_eq!(
        request("10", "0%").validate(),
        Err(ValidationIssue::ZeroPercent("pitch"))
    );

    let small = request("0.2", "-0.4").validate().unwrap();
    assert_eq!(small.rate().value(), 0.2);
    assert_eq!(small.pitch().value(), -0.4);
    assert!(small.to_ssml().contains(r#"<prosody rate="+0.2%" pitch="-0.4%">"#));
}

#[test]
fn blank_fields_suppress() {
    let mut req = request("10", "10");
    req.phrase = "   ".to_string();
    assert_eq!(req.validate(), Err(ValidationIssue::EmptyField("phrase")));

    let mut req = request("10", "10");
    req.voice.clear();
    assert_eq!(req.validate(), Err(ValidationIssue::EmptyField("voice")));

    assert_eq!(
        request("", "10").validate(),
        Err(ValidationIssue::EmptyField("rate"))
    );
}

#[test]
fn unparsable_percent_is_reported() {
    let issue = request("10", "high").validate().unwrap_err();
    assert_eq!(
        issue,
        ValidationIssue::NotAPercent {
            field: "pitch",
            value: "high".to_string()
        }
    );
    assert_eq!(issue.to_string(), "pitch is not a percentage: 'high'");
}

#[test]
fn ssml_carries_voice_prosody_and_style() {
    let mut req = request("20", "-10");
    req.phrase = "Tom & Jerry <3".to_string();
    let ssml = req.validate().unwrap().to_ssml();

    assert!(ssml.starts_with("<speak version=\"1.0\""));
    assert!(ssml.contains(r#"<voice name="en-US-JennyNeural">"#));
    assert!(ssml.contains(r#"<prosody rate="+20%" pitch="-10%">"#));
    assert!(ssml.contains(r#"<mstts:express-as style="cheerful" styledegree="2">"#));
    assert!(ssml.contains("Tom &amp; Jerry &lt;3"));
    assert!(ssml.ends_with("</speak>"));
}

#[test]
fn completed_outcome_converts_ticks_to_ms() {
    let outcome = RawSynthesisOutcome::Completed {
        audio: silent_wav(800),
        visemes: vec![
            RawViseme {
                audio_offset_ticks: 0,
                viseme_id: 0,
            },
            RawViseme {
                audio_offset_ticks: 2_000_000,
                viseme_id: 4,
            },
            RawViseme {
                audio_offset_ticks: 5_125_000,
                viseme_id: 12,
            },
        ],
    };
    let result = outcome.into_result().unwrap();
    let offsets: Vec<(f64, u32)> = result
        .visemes
        .as_slice()
        .iter()
        .map(|e| (e.offset_ms(), e.shape_id()))
        .collect();
    assert_eq!(offsets, vec![(0.0, 0), (200.0, 4), (512.5, 12)]);
    assert_eq!(
        result.audio.duration().unwrap(),
        std::time::Duration::from_millis(800)
    );
}

#[test]
fn out_of_order_visemes_are_sorted_stably() {
    let raw = |t, id| RawViseme {
        audio_offset_ticks: t,
        viseme_id: id,
    };
    let outcome = RawSynthesisOutcome::Completed {
        audio: silent_wav(100),
        visemes: vec![raw(3_000_000, 3), raw(1_000_000, 1), raw(1_000_000, 2)],
    };
    let result = outcome.into_result().unwrap();
    assert!(result.visemes.is_ordered());
    let ids: Vec<u32> = result.visemes.as_slice().iter().map(|e| e.shape_id()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn canceled_and_bad_audio_are_synthesis_errors() {
    let canceled = RawSynthesisOutcome::Canceled {
        reason: "quota".to_string(),
    };
    let err = canceled.into_result().unwrap_err();
    assert!(matches!(err, MimiError::Synthesis(ref m) if m.contains("quota")));

    let garbage = RawSynthesisOutcome::Completed {
        audio: b"nope".to_vec(),
        visemes: Vec::new(),
    };
    assert!(matches!(
        garbage.into_result(),
        Err(MimiError::Synthesis(_))
    ));
}

#[test]
fn outcome_wire_format_is_tagged() {
    let json = r#"{"status":"completed","audio":[],"visemes":[{"audioOffsetTicks":500000,"visemeId":7}]}"#;
    let outcome: RawSynthesisOutcome = serde_json::from_str(json).unwrap();
    assert_eq!(
        outcome,
        RawSynthesisOutcome::Completed {
            audio: Vec::new(),
            visemes: vec![RawViseme {
                audio_offset_ticks: 500_000,
                viseme_id: 7
            }],
        }
    );

    let canceled: RawSynthesisOutcome =
        serde_json::from_str(r#"{"status":"canceled","reason":"timeout"}"#).unwrap();
    assert!(matches!(canceled, RawSynthesisOutcome::Canceled { .. }));
}
