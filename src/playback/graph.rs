//! Live playback graph
//!
//! One [`Voice`] per source, all feeding a shared stereo mix bus and a shared
//! reverb send. The host calls [`LiveGraph::update`] every tick with the
//! current scene and transport; the graph pushes new positions and volumes
//! into the voices and starts or stops them as the playhead crosses their
//! timeline windows. Audio is pulled block by block through
//! [`LiveGraph::process`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::dsp::reverb::{ConvolutionReverb, ReverbImpulse};
use crate::dsp::voice::Voice;
use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::engine::transport::Transport;
use crate::error::{Result, SonoscapeError};
use crate::render::cache::DecodeCache;
use crate::render::offline::RenderWarning;
use crate::scene::{Scene, Source, SourceId, Vec3};

/// Playback change applied to a voice
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VoiceEvent {
    /// Voice began playing `offset_secs` into its content
    Started { id: SourceId, offset_secs: f64 },
    /// Voice stopped
    Stopped { id: SourceId },
    /// Already-playing voice jumped to a new offset after a seek
    Reseeked { id: SourceId, offset_secs: f64 },
}

/// Real-time mix graph
#[derive(Debug)]
pub struct LiveGraph {
    config: EngineConfig,
    sample_rate: u32,
    voices: BTreeMap<SourceId, Voice>,
    reverb: ConvolutionReverb,
    reverb_level: f32,
    send: AudioBuffer,
    wet: AudioBuffer,
}

impl LiveGraph {
    /// Build a graph with a synthesised reverb impulse
    pub fn new(config: EngineConfig, sample_rate: u32) -> Result<Self> {
        let impulse = ReverbImpulse::generate(&config.reverb, sample_rate)?;
        Self::with_impulse(config, sample_rate, &impulse)
    }

    /// Build a graph around an existing reverb impulse
    pub fn with_impulse(config: EngineConfig, sample_rate: u32, impulse: &ReverbImpulse) -> Result<Self> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(SonoscapeError::invalid_parameter("sample_rate", 0, "> 0"));
        }
        Ok(Self {
            reverb: ConvolutionReverb::new(impulse, config.live.convolution_block)?,
            config,
            sample_rate,
            voices: BTreeMap::new(),
            reverb_level: 0.0,
            send: AudioBuffer::with_rate(0, ChannelLayout::Stereo, sample_rate),
            wet: AudioBuffer::with_rate(0, ChannelLayout::Stereo, sample_rate),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Decode and attach every source of `scene`, dropping voices whose
    /// source no longer exists
    ///
    /// Sources that fail validation or whose audio fails to decode get a
    /// silent voice and a warning.
    pub fn load_scene(&mut self, scene: &Scene, cache: &mut DecodeCache) -> Result<Vec<RenderWarning>> {
        if cache.sample_rate() != self.sample_rate {
            return Err(SonoscapeError::invalid_parameter(
                "cache sample_rate",
                cache.sample_rate(),
                format!("{} (the graph's rate)", self.sample_rate),
            ));
        }

        let mut warnings = Vec::new();
        for source in &scene.sources {
            if let Err(e) = source.validate() {
                warn!(source = %source.label(), error = %e, "invalid source, attaching silent voice");
                warnings.push(RenderWarning::InvalidSource {
                    source_id: source.id(),
                    name: source.label(),
                    reason: e.to_string(),
                });
                self.attach(source, None);
                continue;
            }
            let content = match &source.audio {
                Some(handle) => match cache.load(handle) {
                    Ok(content) => Some(content),
                    Err(e) => {
                        warn!(source = %source.label(), error = %e, "failed to decode source audio");
                        warnings.push(RenderWarning::DecodeFailed {
                            source_id: source.id(),
                            name: source.label(),
                            reason: e.to_string(),
                        });
                        None
                    }
                },
                None => None,
            };
            self.attach(source, content);
        }

        self.voices.retain(|id, _| scene.get(*id).is_some());
        self.set_reverb_level(scene.reverb_level);
        Ok(warnings)
    }

    /// Add or replace the voice for `source`
    ///
    /// A replaced voice hands its playing state and cursor to the new one,
    /// so reloading a scene does not retrigger voices.
    pub fn attach(&mut self, source: &Source, content: Option<Arc<AudioBuffer>>) {
        let mut voice = Voice::new(content, self.config.panner, self.sample_rate);
        voice.set_gain(source.volume);
        voice.set_position(source.anchor);
        if let Some(previous) = self.voices.get(&source.id()) {
            voice.take_over(previous);
            debug!(source = %source.label(), playing = voice.is_playing(), "replaced voice");
        }
        self.voices.insert(source.id(), voice);
    }

    pub fn detach(&mut self, id: SourceId) -> bool {
        self.voices.remove(&id).is_some()
    }

    /// Change a voice's volume without touching its playback state
    pub fn set_volume(&mut self, id: SourceId, volume: f32) -> bool {
        match self.voices.get_mut(&id) {
            Some(voice) => {
                voice.set_gain(volume);
                true
            }
            None => false,
        }
    }

    pub fn reverb_level(&self) -> f32 {
        self.reverb_level
    }

    /// Set the global reverb wet level (0 = dry)
    pub fn set_reverb_level(&mut self, level: f32) {
        let level = if level.is_finite() { level.max(0.0) } else { 0.0 };
        if self.reverb_level == 0.0 && level > 0.0 {
            self.reverb.reset();
        }
        self.reverb_level = level;
    }

    /// Sync voices with the scene at the transport's current time
    ///
    /// Each voice is started or stopped exactly once per window crossing.
    pub fn update(&mut self, scene: &Scene, transport: &Transport) -> Vec<VoiceEvent> {
        self.sync(scene, transport, false)
    }

    /// Resync after a discontinuous playhead jump
    ///
    /// Voices that stay active are re-seeked to the new offset.
    pub fn seek(&mut self, scene: &Scene, transport: &Transport) -> Vec<VoiceEvent> {
        self.sync(scene, transport, true)
    }

    fn sync(&mut self, scene: &Scene, transport: &Transport, reseek: bool) -> Vec<VoiceEvent> {
        let time = transport.current_time();
        let playing = transport.is_playing();
        let mut events = Vec::new();

        for (&id, voice) in self.voices.iter_mut() {
            let Some(source) = scene.get(id) else {
                if voice.is_playing() {
                    voice.stop();
                    events.push(VoiceEvent::Stopped { id });
                }
                continue;
            };

            voice.set_gain(source.volume);
            voice.set_position(source.position_at(time));

            let active = playing && source.is_active_at(time);
            let offset = time - source.timeline_start;
            match (active, voice.is_playing()) {
                (true, false) => {
                    voice.start(offset);
                    events.push(VoiceEvent::Started { id, offset_secs: offset });
                }
                (true, true) if reseek => {
                    voice.seek(offset);
                    events.push(VoiceEvent::Reseeked { id, offset_secs: offset });
                }
                (false, true) => {
                    voice.stop();
                    events.push(VoiceEvent::Stopped { id });
                }
                _ => {}
            }
        }

        for event in &events {
            debug!(?event, time, "voice event");
        }
        events
    }

    /// Stop every playing voice
    pub fn stop_all(&mut self) -> Vec<VoiceEvent> {
        let mut events = Vec::new();
        for (&id, voice) in self.voices.iter_mut() {
            if voice.is_playing() {
                voice.stop();
                events.push(VoiceEvent::Stopped { id });
            }
        }
        events
    }

    /// Render the next block into `out` (stereo, overwritten)
    pub fn process(&mut self, out: &mut AudioBuffer) {
        if out.num_channels() != 2 {
            out.samples.resize(2, vec![0.0; out.num_samples()]);
        }
        let len = out.num_samples();
        out.clear();
        out.sample_rate = self.sample_rate;

        if self.send.num_samples() != len {
            self.send = AudioBuffer::with_rate(len, ChannelLayout::Stereo, self.sample_rate);
            self.wet = AudioBuffer::with_rate(len, ChannelLayout::Stereo, self.sample_rate);
        } else {
            self.send.clear();
        }

        for voice in self.voices.values_mut().filter(|v| v.is_playing()) {
            voice.render(len, 0..len, out, &mut self.send);
        }

        if self.reverb_level > 0.0 {
            self.reverb.process(&self.send, &mut self.wet);
            for (dst, wet) in out.samples.iter_mut().zip(&self.wet.samples) {
                for (o, w) in dst.iter_mut().zip(wet) {
                    *o += w * self.reverb_level;
                }
            }
        }
    }

    pub fn is_voice_playing(&self, id: SourceId) -> bool {
        self.voices.get(&id).is_some_and(|v| v.is_playing())
    }

    /// RMS level of the voice's last rendered block
    pub fn level(&self, id: SourceId) -> Option<f32> {
        self.voices.get(&id).map(|v| v.level())
    }

    /// Position last pushed into the voice's panner
    pub fn position(&self, id: SourceId) -> Option<Vec3> {
        self.voices.get(&id).map(|v| v.position())
    }
}

// ============================================================================
// Tests
// ============================================================================
