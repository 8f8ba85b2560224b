use super::*;
use crate::test_support::silent_wav;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn track_duration_comes_from_wav_header() {
    let track = AudioTrack::wav(silent_wav(1500));
    assert_eq!(track.duration().unwrap(), ms(1500));
}

#[test]
fn track_rejects_non_wav_bytes() {
    let track = AudioTrack::wav(b"definitely not riff".to_vec());
    assert!(matches!(track.duration(), Err(MimiError::Playback(_))));
    assert!(ClockAudioBackend::default().open(&track).is_err());
}

#[test]
fn play_outside_a_runtime_is_a_playback_error() {
    let audio = ClockAudio::new(ms(100), ms(10));
    assert!(matches!(audio.play(), Err(MimiError::Playback(_))));
    assert!(audio.is_paused());
}

#[tokio::test(start_paused = true)]
async fn opened_handle_starts_paused_at_zero() {
    let handle = ClockAudioBackend::default()
        .open(&AudioTrack::wav(silent_wav(1000)))
        .unwrap();
    assert!(handle.is_paused());
    assert_eq!(handle.current_time(), Duration::ZERO);
    tokio::time::sleep(ms(500)).await;
    assert_eq!(handle.current_time(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn time_updates_fire_on_the_update_interval() {
    let audio = ClockAudio::new(ms(1000), ms(250));
    let mut rx = audio.time_updates();
    audio.play().unwrap();

    let mut seen = Vec::new();
    while rx.changed().await.is_ok() {
        seen.push(*rx.borrow_and_update());
        if seen.len() == 5 {
            break;
        }
    }
    assert_eq!(seen, vec![ms(0), ms(250), ms(500), ms(750), ms(1000)]);
    assert!(audio.is_paused());
    assert!(audio.ended());
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_the_playhead_and_updates() {
    let audio = ClockAudio::new(ms(2000), ms(100));
    let mut rx = audio.time_updates();
    audio.play().unwrap();
    assert!(!audio.is_paused());

    tokio::time::sleep(ms(330)).await;
    audio.pause();
    assert!(audio.is_paused());
    assert_eq!(audio.current_time(), ms(330));
    let _ = rx.borrow_and_update();

    tokio::time::sleep(ms(1000)).await;
    assert_eq!(audio.current_time(), ms(330));
    assert!(!rx.has_changed().unwrap());

    audio.play().unwrap();
    tokio::time::sleep(ms(70)).await;
    assert_eq!(audio.current_time(), ms(400));
}

#[tokio::test(start_paused = true)]
async fn play_while_playing_is_a_noop() {
    let audio = ClockAudio::new(ms(1000), ms(100));
    audio.play().unwrap();
    tokio::time::sleep(ms(200)).await;
    audio.play().unwrap();
    assert_eq!(audio.current_time(), ms(200));
}

#[tokio::test(start_paused = true)]
async fn play_after_end_restarts_from_zero() {
    let audio = ClockAudio::new(ms(100), ms(50));
    audio.play().unwrap();
    tokio::time::sleep(ms(200)).await;
    assert!(audio.ended());
    assert!(audio.is_paused());

    audio.play().unwrap();
    assert_eq!(audio.current_time(), Duration::ZERO);
    assert!(!audio.ended());
}
