use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        MimiError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        MimiError::synthesis("x")
            .to_string()
            .contains("synthesis error:")
    );
    assert!(
        MimiError::playback("x")
            .to_string()
            .contains("playback error:")
    );
    assert!(
        MimiError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn decode_names_the_sprite_path() {
    let err = MimiError::decode("mouth-7.png", "bad png signature");
    let msg = err.to_string();
    assert!(msg.contains("mouth-7.png"));
    assert!(msg.contains("bad png signature"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = MimiError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
