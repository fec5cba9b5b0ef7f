//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::buffer::AudioBuffer;
use crate::engine::buffer::ChannelLayout;
use crate::engine::wav::BitDepth;
use crate::error::{Result, SonoscapeError};
use crate::playback::PreviewSession;
use crate::playback::VoiceEvent;
use crate::render::{export_wav, CancelToken, ExportSettings, TracingProgress};
use crate::scene::{Scene, Source, SourceId};

/// Load the engine config, or defaults when no path is given
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            info!("Loading engine config: {}", path.display());
            EngineConfig::load(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Render a scene to a WAV file.
pub fn render(
    scene_path: &Path,
    output: &Path,
    settings: ExportSettings,
    config: &EngineConfig,
    report_path: Option<&Path>,
) -> Result<()> {
    info!("Rendering scene: {}", scene_path.display());

    let scene = Scene::load(scene_path)?;
    let artifact = export_wav(
        &scene.snapshot(),
        &settings,
        config,
        &TracingProgress,
        &CancelToken::new(),
    )?;
    artifact.write_to(output)?;

    for warning in &artifact.report.warnings {
        warn!("{}", warning);
    }

    println!("Wrote: {}", output.display());
    println!(
        "Duration: {:.3}s ({} frames @ {} Hz, {})",
        artifact.report.duration_secs,
        artifact.report.frames,
        artifact.report.sample_rate,
        artifact.report.bit_depth
    );
    println!("Sources rendered: {}", artifact.report.sources_rendered);
    if !artifact.report.warnings.is_empty() {
        println!("Warnings: {}", artifact.report.warnings.len());
    }

    if let Some(report_path) = report_path {
        std::fs::write(report_path, serde_json::to_string_pretty(&artifact.report)?)?;
        println!("Report: {}", report_path.display());
    }

    Ok(())
}

/// Parse the `--bit-depth` argument.
pub fn parse_bit_depth(bits: u16) -> Result<BitDepth> {
    BitDepth::from_bits(bits)
}

/// Print the scene's sources and timeline.
pub fn inspect(scene_path: &Path) -> Result<()> {
    let scene = Scene::load(scene_path)?;

    println!("Scene: {}", scene_path.display());
    println!("Sources: {}", scene.len());
    println!("Total duration: {:.3}s", scene.total_duration());
    println!("Reverb level: {:.2}", scene.reverb_level);
    println!("{:-<72}", "");

    for source in &scene.sources {
        let audio = source
            .audio
            .as_ref()
            .map(|a| a.describe())
            .unwrap_or_else(|| "(silent)".to_string());
        println!(
            "{:<20} {:>8.3}s -> {:>8.3}s  vol {:>4.2}  {:<7} {}",
            source.label(),
            source.timeline_start,
            source.timeline_end(),
            source.volume,
            source.automation.kind(),
            audio
        );
    }

    Ok(())
}

fn find_source<'a>(scene: &'a Scene, key: &str) -> Option<&'a Source> {
    scene
        .sources
        .iter()
        .find(|s| s.name == key || s.id().to_string() == key)
}

/// Print a source's positions across its clip.
pub fn trace(scene_path: &Path, key: &str, step: f64) -> Result<()> {
    if !(step.is_finite() && step > 0.0) {
        return Err(SonoscapeError::invalid_parameter("step", step, "> 0"));
    }

    let scene = Scene::load(scene_path)?;
    let source = find_source(&scene, key).ok_or_else(|| {
        SonoscapeError::invalid_parameter("source", key, "a source name or id in the scene")
    })?;

    println!("{} ({})", source.label(), source.automation.kind());
    println!("{:>9} {:>9} {:>9} {:>9}", "time", "x", "y", "z");

    let end = source.timeline_end();
    let mut time = source.timeline_start;
    loop {
        let p = source.position_at(time);
        println!("{:>9.3} {:>9.3} {:>9.3} {:>9.3}", time, p.x, p.y, p.z);
        if time >= end {
            break;
        }
        time = (time + step).min(end);
    }

    Ok(())
}

/// Simulate live playback from start to finish.
pub fn preview(scene_path: &Path, tick_ms: u64, sample_rate: u32, config: &EngineConfig) -> Result<()> {
    if tick_ms == 0 {
        return Err(SonoscapeError::invalid_parameter("tick_ms", 0, ">= 1"));
    }

    let scene = Scene::load(scene_path)?;
    let mut session = PreviewSession::new(*config, sample_rate)?;
    for warning in session.load(&scene)? {
        warn!("{}", warning);
    }

    let delta = tick_ms as f64 / 1000.0;
    let frames_per_tick = ((delta * sample_rate as f64).round() as usize).max(1);
    let mut block = AudioBuffer::with_rate(frames_per_tick, ChannelLayout::Stereo, sample_rate);

    info!(
        "Previewing {:.3}s at {} ms ticks",
        session.total_duration(&scene),
        tick_ms
    );

    let print_events = |time: f64, events: &[VoiceEvent]| {
        for event in events {
            let name = |id: SourceId| {
                scene
                    .get(id)
                    .map(|s| s.label())
                    .unwrap_or_else(|| id.to_string())
            };
            match event {
                VoiceEvent::Started { id, offset_secs } => {
                    println!("{:>9.3}  start  {} (offset {:.3}s)", time, name(*id), offset_secs)
                }
                VoiceEvent::Stopped { id } => println!("{:>9.3}  stop   {}", time, name(*id)),
                VoiceEvent::Reseeked { id, offset_secs } => {
                    println!("{:>9.3}  seek   {} (offset {:.3}s)", time, name(*id), offset_secs)
                }
            }
        }
    };

    let events = session.play(std::time::Instant::now(), &scene);
    print_events(0.0, &events);

    let mut peak = 0.0f32;
    loop {
        session.render(&mut block);
        peak = peak.max(block.peak());

        let time_before = session.transport().current_time();
        let report = session.advance(delta, &scene);
        let event_time = if report.finished {
            time_before + delta
        } else {
            report.time
        };
        print_events(event_time, &report.voices);
        if report.finished {
            break;
        }
    }

    println!("Finished. Peak level: {:.3}", peak);
    Ok(())
}

/// Write the default engine config.
pub fn init_config(path: &Path) -> Result<()> {
    info!("Writing default config: {}", path.display());
    EngineConfig::default().save(path)?;
    println!("Config written: {}", path.display());
    Ok(())
}
