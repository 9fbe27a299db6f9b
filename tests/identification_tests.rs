//! End-to-end identification pipeline tests with scripted providers

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use helpers::{generate_test_wav, hit, ScriptedProvider, ScriptedResponse};
use mixscan::config::Config;
use mixscan::providers::IdentificationProvider;
use mixscan::services::{IdentificationCache, MixIdentifier};

fn test_config() -> Config {
    let mut config = Config::default();
    config.identification.segment_length = 30;
    config.identification.overlap_ratio = 0.5;
    config.identification.min_confidence = 50.0;
    config.identification.time_threshold = 60;
    config.app.rate_limit_enabled = false;
    config
}

fn boxed(provider: ScriptedProvider) -> Vec<Box<dyn IdentificationProvider>> {
    vec![Box::new(provider)]
}

#[tokio::test]
async fn duplicate_hits_across_overlapping_windows_collapse() {
    let dir = tempfile::tempdir().unwrap();
    let wav = generate_test_wav(&dir.path().join("mix.wav"), 120.0).unwrap();

    // Windows start every 15s: 0, 15, 30, ..., 105
    let provider = ScriptedProvider::new(vec![
        hit("Sunrise (Club Mix)", "DJ One", 88.0, 40.0),
        hit("Sunrise", "DJ One", 92.0, 40.0),
        ScriptedResponse::NoMatch,
        ScriptedResponse::NoMatch,
        hit("Second Song", "Artist Two", 85.0, 60.0),
        hit("Second Song", "Artist Two", 83.0, 60.0),
        ScriptedResponse::Fail,
        ScriptedResponse::NoMatch,
    ]);

    let identifier = MixIdentifier::new(test_config(), boxed(provider), None, None);
    let source = MixIdentifier::open_source(&wav).unwrap();
    let tracks = identifier.identify(&source).await.unwrap();

    assert_eq!(tracks.len(), 2, "expected two merged tracks: {tracks:?}");

    // The overlapping Sunrise detections collapse to the higher-confidence hit
    assert_eq!(tracks[0].song_name(), "Sunrise");
    assert_eq!(tracks[0].confidence(), 92.0);
    assert_eq!(tracks[0].start_time(), Some(15.0));
    assert_eq!(tracks[0].end_time(), Some(55.0));

    assert_eq!(tracks[1].song_name(), "Second Song");
    assert_eq!(tracks[1].confidence(), 85.0);
    assert_eq!(tracks[1].start_time(), Some(60.0));
    assert_eq!(tracks[1].end_time(), Some(120.0));
}

#[tokio::test]
async fn provider_failures_still_yield_partial_tracklist() {
    let dir = tempfile::tempdir().unwrap();
    let wav = generate_test_wav(&dir.path().join("mix.wav"), 60.0).unwrap();

    let mut config = test_config();
    config.identification.overlap_ratio = 0.0; // windows at 0 and 30

    let provider = ScriptedProvider::new(vec![
        ScriptedResponse::Fail,
        hit("Survivor", "Artist", 90.0, 30.0),
    ]);

    let identifier = MixIdentifier::new(config, boxed(provider), None, None);
    let source = MixIdentifier::open_source(&wav).unwrap();
    let tracks = identifier.identify(&source).await.unwrap();

    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].song_name(), "Survivor");
}

#[tokio::test]
async fn second_provider_is_tried_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let wav = generate_test_wav(&dir.path().join("mix.wav"), 30.0).unwrap();

    let mut config = test_config();
    config.identification.overlap_ratio = 0.0; // single window

    let failing = ScriptedProvider::new(vec![ScriptedResponse::Fail]);
    let backup = ScriptedProvider::new(vec![hit("Backup Song", "Artist", 88.0, 30.0)]);
    let providers: Vec<Box<dyn IdentificationProvider>> =
        vec![Box::new(failing), Box::new(backup)];

    let identifier = MixIdentifier::new(config, providers, None, None);
    let source = MixIdentifier::open_source(&wav).unwrap();
    let tracks = identifier.identify(&source).await.unwrap();

    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].song_name(), "Backup Song");
}

#[tokio::test]
async fn cached_run_makes_no_provider_calls() {
    let dir = tempfile::tempdir().unwrap();
    let wav = generate_test_wav(&dir.path().join("mix.wav"), 60.0).unwrap();
    let cache_dir = dir.path().join("cache");

    let mut config = test_config();
    config.identification.overlap_ratio = 0.0; // windows at 0 and 30

    let calls = Arc::new(AtomicUsize::new(0));
    let script = vec![
        hit("Song A", "Artist", 90.0, 30.0),
        hit("Song B", "Artist", 85.0, 30.0),
    ];

    let first = MixIdentifier::new(
        config.clone(),
        boxed(ScriptedProvider::with_call_counter(
            script.clone(),
            calls.clone(),
        )),
        Some(IdentificationCache::open(&cache_dir, 3600).unwrap()),
        None,
    );
    let source = MixIdentifier::open_source(&wav).unwrap();
    let first_tracks = first.identify(&source).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let second = MixIdentifier::new(
        config,
        boxed(ScriptedProvider::with_call_counter(script, calls.clone())),
        Some(IdentificationCache::open(&cache_dir, 3600).unwrap()),
        None,
    );
    let second_tracks = second.identify(&source).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2, "second run must be served from cache");
    assert_eq!(second_tracks, first_tracks);
}

#[tokio::test]
async fn cancellation_keeps_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    let wav = generate_test_wav(&dir.path().join("mix.wav"), 120.0).unwrap();

    let mut config = test_config();
    config.identification.overlap_ratio = 0.0; // windows at 0, 30, 60, 90

    let script = vec![
        hit("Song One", "Artist", 90.0, 30.0),
        hit("Song Two", "Artist", 90.0, 30.0),
        hit("Song Three", "Artist", 90.0, 30.0),
        hit("Song Four", "Artist", 90.0, 30.0),
    ];

    let token = tokio_util::sync::CancellationToken::new();
    let provider = ScriptedProvider::new(script).cancelling_on_call(1, token.clone());
    let identifier =
        MixIdentifier::new(config, boxed(provider), None, None).with_cancellation_token(token);

    let source = MixIdentifier::open_source(&wav).unwrap();
    let tracks = identifier.identify(&source).await.unwrap();

    // Cancelled during the second call: later windows are skipped
    assert!(tracks.len() < 4);
    assert!(!tracks.is_empty());
}

#[tokio::test]
async fn all_misses_yield_empty_tracklist_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let wav = generate_test_wav(&dir.path().join("mix.wav"), 60.0).unwrap();

    let provider = ScriptedProvider::new(Vec::new());
    let identifier = MixIdentifier::new(test_config(), boxed(provider), None, None);
    let source = MixIdentifier::open_source(&wav).unwrap();
    let tracks = identifier.identify(&source).await.unwrap();

    assert!(tracks.is_empty());
}
