//! Integration tests for subclip extraction against stand-in media tools.

#![cfg(unix)]

mod support;

use std::fs;

use tempfile::TempDir;
use vidstitch_core::{SubclipError, Subclipper, TranscodeError, Transcoder};

use support::{failing_ffmpeg, fake_ffmpeg, fake_ffprobe};

fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_end_before_start_is_invalid_range() {
    let tools = TempDir::new().expect("temp dir");
    let media = TempDir::new().expect("temp dir");
    let source = media.path().join("movie.mp4");
    fs::write(&source, b"movie").expect("seed source");

    let subclipper = Subclipper::new(Transcoder::new(
        fake_ffmpeg(tools.path()),
        fake_ffprobe(tools.path(), 20.0),
    ));
    let err = subclipper.clip(&source, 10, 5).await.unwrap_err();

    assert!(matches!(err, SubclipError::InvalidRange { start: 10, end: 5 }));
    assert_eq!(file_names(media.path()), vec!["movie.mp4"]);
}

#[tokio::test]
async fn test_end_past_duration_is_out_of_bounds() {
    let tools = TempDir::new().expect("temp dir");
    let media = TempDir::new().expect("temp dir");
    let source = media.path().join("movie.mp4");
    fs::write(&source, b"movie").expect("seed source");

    let subclipper = Subclipper::new(Transcoder::new(
        fake_ffmpeg(tools.path()),
        fake_ffprobe(tools.path(), 20.0),
    ));
    let err = subclipper.clip(&source, 0, 30).await.unwrap_err();

    match err {
        SubclipError::RangeOutOfBounds { end, duration_secs } => {
            assert_eq!(end, 30);
            assert!((duration_secs - 20.0).abs() < f64::EPSILON);
        }
        other => panic!("expected RangeOutOfBounds, got {other:?}"),
    }
    assert_eq!(file_names(media.path()), vec!["movie.mp4"]);
}

#[tokio::test]
async fn test_end_equal_to_duration_is_accepted() {
    let tools = TempDir::new().expect("temp dir");
    let media = TempDir::new().expect("temp dir");
    let source = media.path().join("movie.mp4");
    fs::write(&source, b"movie").expect("seed source");

    let subclipper = Subclipper::new(Transcoder::new(
        fake_ffmpeg(tools.path()),
        fake_ffprobe(tools.path(), 20.0),
    ));
    let output = subclipper.clip(&source, 0, 20).await.expect("clip");

    assert_eq!(output, media.path().join("movie-subclip-0-20.mp4"));
}

#[tokio::test]
async fn test_repeat_clip_overwrites_same_target() {
    let tools = TempDir::new().expect("temp dir");
    let media = TempDir::new().expect("temp dir");
    let source = media.path().join("movie.mp4");
    fs::write(&source, b"first cut").expect("seed source");

    let subclipper = Subclipper::new(Transcoder::new(
        fake_ffmpeg(tools.path()),
        fake_ffprobe(tools.path(), 20.0),
    ));
    let first = subclipper.clip(&source, 2, 8).await.expect("first clip");
    assert_eq!(fs::read(&first).expect("read clip"), b"first cut");

    fs::write(&source, b"second cut").expect("rewrite source");
    let second = subclipper.clip(&source, 2, 8).await.expect("second clip");

    assert_eq!(first, second);
    assert_eq!(fs::read(&second).expect("read clip"), b"second cut");
    assert_eq!(
        file_names(media.path()),
        vec!["movie-subclip-2-8.mp4", "movie.mp4"]
    );
}

#[tokio::test]
async fn test_engine_failure_leaves_no_partial_output() {
    let tools = TempDir::new().expect("temp dir");
    let media = TempDir::new().expect("temp dir");
    let source = media.path().join("movie.mp4");
    fs::write(&source, b"movie").expect("seed source");

    let subclipper = Subclipper::new(Transcoder::new(
        failing_ffmpeg(tools.path()),
        fake_ffprobe(tools.path(), 20.0),
    ));
    let err = subclipper.clip(&source, 1, 4).await.unwrap_err();

    assert!(
        matches!(err, SubclipError::Engine(TranscodeError::Failed { status: 1, .. })),
        "got {err:?}"
    );
    assert_eq!(file_names(media.path()), vec!["movie.mp4"]);
}

#[tokio::test]
async fn test_unreadable_probe_output_is_probe_error() {
    let tools = TempDir::new().expect("temp dir");
    let media = TempDir::new().expect("temp dir");
    let source = media.path().join("movie.mp4");
    fs::write(&source, b"movie").expect("seed source");
    let ffprobe = support::write_script(tools.path(), "ffprobe-na", "echo N/A\n");

    let subclipper = Subclipper::new(Transcoder::new(fake_ffmpeg(tools.path()), ffprobe));
    let err = subclipper.clip(&source, 0, 5).await.unwrap_err();

    assert!(
        matches!(
            err,
            SubclipError::Probe {
                source: TranscodeError::UnreadableDuration { .. },
                ..
            }
        ),
        "got {err:?}"
    );
}
