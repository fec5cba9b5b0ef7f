//! Preview session
//!
//! Couples the transport with the live graph so a host only has to forward
//! user actions and its frame ticks. Every call returns the voice changes it
//! caused, which makes the session usable headless (CLI preview, tests).

use std::time::Instant;

use serde::Serialize;

use super::graph::{LiveGraph, VoiceEvent};
use crate::config::EngineConfig;
use crate::engine::buffer::AudioBuffer;
use crate::engine::transport::{Transport, TransportEvent};
use crate::error::Result;
use crate::render::cache::DecodeCache;
use crate::render::offline::RenderWarning;
use crate::scene::{total_duration_of, Scene};

/// Result of one host tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Playhead after the tick
    pub time: f64,
    /// True when this tick hit the end of the timeline
    pub finished: bool,
    pub voices: Vec<VoiceEvent>,
}

/// Transport plus live graph
#[derive(Debug)]
pub struct PreviewSession {
    transport: Transport,
    graph: LiveGraph,
    min_duration: f64,
}

impl PreviewSession {
    pub fn new(config: EngineConfig, sample_rate: u32) -> Result<Self> {
        Ok(Self {
            transport: Transport::with_tick_cap(config.live.tick_cap_secs),
            graph: LiveGraph::new(config, sample_rate)?,
            min_duration: config.timeline.min_duration_secs,
        })
    }

    /// Decode the scene's audio into the graph
    pub fn load(&mut self, scene: &Scene) -> Result<Vec<RenderWarning>> {
        let mut cache = DecodeCache::new(self.graph.sample_rate());
        self.graph.load_scene(scene, &mut cache)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn graph(&self) -> &LiveGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut LiveGraph {
        &mut self.graph
    }

    /// Scene length used for the end-of-timeline stop
    pub fn total_duration(&self, scene: &Scene) -> f64 {
        total_duration_of(&scene.sources, self.min_duration)
    }

    pub fn play(&mut self, now: Instant, scene: &Scene) -> Vec<VoiceEvent> {
        self.transport.play(now);
        self.graph.update(scene, &self.transport)
    }

    /// Stop advancing without moving the playhead
    pub fn pause(&mut self, scene: &Scene) -> Vec<VoiceEvent> {
        self.transport.pause();
        self.graph.update(scene, &self.transport)
    }

    /// Stop and rewind to 0
    pub fn stop(&mut self, scene: &Scene) -> Vec<VoiceEvent> {
        self.transport.stop();
        self.graph.update(scene, &self.transport)
    }

    pub fn seek(&mut self, time: f64, scene: &Scene) -> Vec<VoiceEvent> {
        self.transport.seek(time);
        self.graph.seek(scene, &self.transport)
    }

    /// Advance by wall-clock time since the previous tick
    pub fn tick(&mut self, now: Instant, scene: &Scene) -> TickReport {
        let event = self.transport.tick(now, self.total_duration(scene));
        self.after_tick(event, scene)
    }

    /// Advance by an explicit delta in seconds
    pub fn advance(&mut self, delta_secs: f64, scene: &Scene) -> TickReport {
        let event = self.transport.advance(delta_secs, self.total_duration(scene));
        self.after_tick(event, scene)
    }

    fn after_tick(&mut self, event: TransportEvent, scene: &Scene) -> TickReport {
        let voices = self.graph.update(scene, &self.transport);
        TickReport {
            time: self.transport.current_time(),
            finished: event == TransportEvent::Finished,
            voices,
        }
    }

    /// Pull the next block of audio
    pub fn render(&mut self, out: &mut AudioBuffer) {
        self.graph.process(out);
    }
}
