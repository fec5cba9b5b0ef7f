//! Integration Tests
//!
//! End-to-end tests for the Sonoscape scene -> render -> WAV pipeline.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use sonoscape::engine::{decode_wav_bytes, import_audio, write_wav, AudioBuffer, BitDepth, Transport};
use sonoscape::playback::{LiveGraph, PreviewSession, VoiceEvent};
use sonoscape::render::{
    export_wav, spawn_export, CancelToken, DecodeCache, NullProgress, OfflineRenderer, PositionCurve,
    ProgressSink, RenderWarning,
};
use sonoscape::scene::{AudioHandle, Automation, LinearParams, OrbitParams, Vec3};
use sonoscape::{EngineConfig, ExportSettings, Scene, SonoscapeError, Source};

/// Config with a short reverb so tests stay fast
fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.reverb.duration_secs = 0.2;
    config.reverb.decay_secs = 0.2;
    config
}

fn constant_audio(value: f32, sample_rate: u32, seconds: f64) -> AudioHandle {
    let frames = (seconds * sample_rate as f64) as usize;
    let buffer = AudioBuffer::from_channels(vec![vec![value; frames]], sample_rate).unwrap();
    AudioHandle::Buffer(Arc::new(buffer))
}

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl ProgressSink for Recorder {
    fn report(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

// === Export Tests ===

#[test]
fn test_linear_flyby_export() {
    let mut scene = Scene::new();
    let source = Source::new("flyby")
        .with_audio(AudioHandle::tone(440.0, 5.0))
        .with_anchor(Vec3::new(0.0, 0.0, -5.0))
        .with_timeline(0.0, Some(5.0))
        .with_automation(Automation::Linear(LinearParams {
            target_pos: Vec3::new(0.0, 0.0, 5.0),
            duration: None,
        }));

    // Eased glide crosses the listener once (1 - p)^3 = 0.5
    let crossing = 5.0 * (1.0 - 0.5f64.powf(1.0 / 3.0));
    let curve = PositionCurve::bake(&source, 0.05);
    assert_abs_diff_eq!(curve.value_at(crossing).z, 0.0, epsilon = 0.05);
    assert!(curve.value_at(crossing - 0.1).z < 0.0);
    assert!(curve.value_at(crossing + 0.1).z > 0.0);

    scene.add(source);
    let artifact = export_wav(
        &scene.snapshot(),
        &ExportSettings::cd_quality(),
        &fast_config(),
        &NullProgress,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(artifact.bytes.len(), 44100 * 5 * 2 * 2 + 44);
    assert_eq!(&artifact.bytes[0..4], b"RIFF");
    assert_eq!(artifact.report.frames, 44100 * 5);
    assert!(artifact.report.warnings.is_empty());

    let decoded = decode_wav_bytes(&artifact.bytes).unwrap();
    assert_eq!(decoded.num_channels(), 2);
    assert_eq!(decoded.num_samples(), 44100 * 5);
    assert!(decoded.samples[0].iter().any(|s| s.abs() > 0.01));
}

#[test]
fn test_activation_window_is_sample_exact() {
    let sr = 8000;
    let mut scene = Scene::new();
    scene.add(
        Source::new("burst")
            .with_audio(constant_audio(0.5, sr, 4.0))
            .with_anchor(Vec3::new(0.0, 0.0, -1.0))
            .with_timeline(1.0, Some(0.5)),
    );
    scene.add(
        Source::new("tail")
            .with_audio(constant_audio(0.5, sr, 4.0))
            .with_anchor(Vec3::new(0.0, 0.0, -1.0))
            .with_timeline(2.0, Some(1.0)),
    );

    let mix = OfflineRenderer::new(fast_config())
        .render(&scene.snapshot(), sr, 0.0, &NullProgress, &CancelToken::new())
        .unwrap();

    let left = &mix.buffer.samples[0];
    assert_eq!(left.len(), 3 * sr as usize);
    assert_eq!(left[7999], 0.0);
    assert!(left[8000].abs() > 0.0);
    assert!(left[11999].abs() > 0.0);
    assert_eq!(left[12000], 0.0);
    assert_eq!(left[15999], 0.0);
    assert!(left[16000].abs() > 0.0);
    assert!(left[23999].abs() > 0.0);
}

#[test]
fn test_missing_file_is_skipped_not_fatal() {
    let mut scene = Scene::new();
    let missing = scene.add(Source::new("ghost").with_audio(AudioHandle::file("/nonexistent/ghost.wav")));
    scene.add(
        Source::new("tone")
            .with_audio(AudioHandle::tone(220.0, 1.0))
            .with_timeline(0.0, Some(1.0)),
    );

    let artifact = export_wav(
        &scene.snapshot(),
        &ExportSettings::cd_quality(),
        &fast_config(),
        &NullProgress,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(artifact.report.sources_rendered, 1);
    assert!(matches!(
        artifact.report.warnings.as_slice(),
        [RenderWarning::DecodeFailed { source_id, .. }] if *source_id == missing
    ));
    // The missing clip still defines the timeline length (default 10 s clip)
    assert_eq!(artifact.report.frames, 441_000);
}

#[test]
fn test_unrenderable_sources_are_skipped_not_fatal() {
    let mut scene = Scene::new();
    scene.add(
        Source::new("tone")
            .with_audio(AudioHandle::tone(220.0, 1.0))
            .with_timeline(0.0, Some(1.0)),
    );
    let orbit = scene.add(
        Source::new("nan orbit")
            .with_audio(AudioHandle::tone(220.0, 1.0))
            .with_timeline(0.0, Some(1.0))
            .with_automation(Automation::Orbit(OrbitParams {
                radius: f64::NAN,
                ..OrbitParams::default()
            })),
    );
    let tone = scene.add(
        Source::new("nan tone")
            .with_audio(AudioHandle::tone(f32::NAN, 1.0))
            .with_timeline(0.0, Some(1.0)),
    );
    scene.add(
        Source::new("huge tone")
            .with_audio(AudioHandle::tone(440.0, 1.0e9))
            .with_timeline(0.0, Some(1.0)),
    );

    let artifact = export_wav(
        &scene.snapshot(),
        &ExportSettings::cd_quality(),
        &fast_config(),
        &NullProgress,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(artifact.report.sources_rendered, 1);
    assert_eq!(artifact.report.frames, 44100);
    let skipped: Vec<_> = artifact
        .report
        .warnings
        .iter()
        .filter_map(|w| match w {
            RenderWarning::InvalidSource { source_id, .. } => Some(*source_id),
            _ => None,
        })
        .collect();
    assert_eq!(skipped.len(), 3);
    assert!(skipped.contains(&orbit) && skipped.contains(&tone));

    let decoded = decode_wav_bytes(&artifact.bytes).unwrap();
    assert!(decoded.is_finite());
    assert!(decoded.peak() > 0.01);
}

#[test]
fn test_empty_scene_renders_minimum_silence() {
    let artifact = export_wav(
        &Scene::new().snapshot(),
        &ExportSettings::high_quality(),
        &fast_config(),
        &NullProgress,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(artifact.report.frames, 48000);
    assert_eq!(artifact.report.warnings, vec![RenderWarning::EmptyTimeline]);
    assert_eq!(artifact.bytes.len(), 48000 * 2 * 3 + 44);
}

#[test]
fn test_progress_messages_in_order() {
    let mut scene = Scene::new();
    scene.add(
        Source::new("pad")
            .with_audio(AudioHandle::tone(110.0, 1.0))
            .with_timeline(0.0, Some(1.0)),
    );
    let recorder = Recorder::default();

    export_wav(
        &scene.snapshot(),
        &ExportSettings::cd_quality(),
        &fast_config(),
        &recorder,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(
        recorder.0.into_inner().unwrap(),
        vec![
            "Loading: pad".to_string(),
            "Scheduling timeline...".to_string(),
            "Rendering audio...".to_string(),
            "Encoding WAV (16-bit)...".to_string(),
        ]
    );
}

#[test]
fn test_cancelled_export_returns_no_output() {
    let mut scene = Scene::new();
    scene.add(
        Source::new("long")
            .with_audio(AudioHandle::tone(440.0, 1.0))
            .with_timeline(0.0, Some(600.0)),
    );
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = export_wav(
        &scene.snapshot(),
        &ExportSettings::cd_quality(),
        &fast_config(),
        &NullProgress,
        &cancel,
    );
    assert!(matches!(result, Err(SonoscapeError::Cancelled)));
}

#[test]
fn test_background_export_uses_snapshot() {
    let mut scene = Scene::new();
    scene.add(
        Source::new("a")
            .with_audio(AudioHandle::tone(440.0, 1.0))
            .with_timeline(0.0, Some(1.0)),
    );
    let job = spawn_export(
        scene.snapshot(),
        ExportSettings::cd_quality(),
        fast_config(),
        Box::new(NullProgress),
    );

    // Editing the live scene does not affect the running export
    scene.add(Source::new("b").with_timeline(0.0, Some(30.0)));

    let artifact = job.join().unwrap();
    assert_eq!(artifact.report.frames, 44100);
}

#[test]
fn test_written_file_reimports() {
    let dir = tempdir().unwrap();
    let asset = dir.path().join("asset.wav");
    let tone = sonoscape::engine::generate_test_tone(330.0, 0.5, 22050).unwrap();
    write_wav(&tone, BitDepth::Int16, &asset).unwrap();

    let mut scene = Scene::new();
    scene.add(
        Source::new("asset")
            .with_audio(AudioHandle::file(&asset))
            .with_timeline(0.0, Some(1.0)),
    );
    let artifact = export_wav(
        &scene.snapshot(),
        &ExportSettings::new(44100, BitDepth::Float32),
        &fast_config(),
        &NullProgress,
        &CancelToken::new(),
    )
    .unwrap();
    let out = dir.path().join("out.wav");
    artifact.write_to(&out).unwrap();

    let reimported = import_audio(&out).unwrap();
    assert_eq!(reimported.sample_rate, 44100);
    assert_eq!(reimported.num_samples(), 44100);
    assert!(artifact.report.warnings.is_empty());
}

// === Scene Files ===

#[test]
fn test_scene_json_roundtrip() {
    let json = r#"{
        "reverb_level": 0.3,
        "sources": [
            {
                "name": "orbiter",
                "audio": { "kind": "tone", "frequency_hz": 440.0, "duration_secs": 2.0 },
                "timeline_start": 1.5,
                "timeline_duration": 4.0,
                "automation": { "type": "orbit", "radius": 3.0, "speed": 1.0 }
            },
            { "name": "still" }
        ]
    }"#;
    let dir = tempdir().unwrap();
    let path = dir.path().join("scene.json");
    std::fs::write(&path, json).unwrap();

    let scene = Scene::load(&path).unwrap();
    assert_eq!(scene.len(), 2);
    assert_eq!(scene.sources[0].timeline_end(), 5.5);
    assert_eq!(scene.sources[1].anchor, Vec3::new(0.0, 0.0, -5.0));
    assert_eq!(scene.total_duration(), 10.0);

    let copy = dir.path().join("copy.json");
    scene.save(&copy).unwrap();
    let reloaded = Scene::load(&copy).unwrap();
    assert_eq!(reloaded.sources[0].id(), scene.sources[0].id());
    assert_eq!(reloaded.sources[0].automation, scene.sources[0].automation);
}

// === Live Preview ===

#[test]
fn test_preview_follows_timeline() {
    let sr = 8000;
    let mut scene = Scene::new();
    let late = scene.add(
        Source::new("late")
            .with_audio(constant_audio(0.5, sr, 1.0))
            .with_timeline(0.5, Some(0.5)),
    );

    let mut session = PreviewSession::new(fast_config(), sr).unwrap();
    assert!(session.load(&scene).unwrap().is_empty());
    assert!(session.play(Instant::now(), &scene).is_empty());

    let mut block = AudioBuffer::with_rate(400, sonoscape::engine::ChannelLayout::Stereo, sr);
    let mut events = Vec::new();
    let mut heard = false;
    for _ in 0..40 {
        let report = session.advance(0.05, &scene);
        events.extend(report.voices);
        session.render(&mut block);
        heard |= block.samples[0].iter().any(|s| s.abs() > 0.0);
        if report.finished {
            break;
        }
    }

    assert!(heard);
    assert_eq!(session.transport().current_time(), 0.0);
    assert!(matches!(events[0], VoiceEvent::Started { id, .. } if id == late));
    assert_eq!(events.last(), Some(&VoiceEvent::Stopped { id: late }));
}

#[test]
fn test_live_positions_match_baked_curve() {
    let sr = 8000;
    let mut scene = Scene::new();
    let id = scene.add(
        Source::new("orbiter")
            .with_audio(AudioHandle::tone(330.0, 1.0))
            .with_timeline(1.0, Some(2.0))
            .with_automation(Automation::Orbit(OrbitParams {
                radius: 3.0,
                speed: 1.0,
                ..OrbitParams::default()
            })),
    );
    let step = 0.05;
    let curve = PositionCurve::bake(scene.get(id).unwrap(), step);

    let mut graph = LiveGraph::new(fast_config(), sr).unwrap();
    assert!(graph.load_scene(&scene, &mut DecodeCache::new(sr)).unwrap().is_empty());
    let mut transport = Transport::new();
    transport.play(Instant::now());

    // Grid points agree exactly; between them the chord error of a radius 3
    // orbit stepped by 0.05 rad stays below 2e-3
    for (time, epsilon) in [(1.0, 1e-9), (1.5, 1e-9), (3.0, 1e-9), (1.27, 2e-3), (2.33, 2e-3), (2.976, 2e-3)] {
        transport.seek(time);
        graph.seek(&scene, &transport);
        let live = graph.position(id).unwrap();
        let baked = curve.value_at(time);
        assert!(
            live.distance(baked) <= epsilon,
            "t = {}: live {:?} vs baked {:?}",
            time,
            live,
            baked
        );
    }
}
