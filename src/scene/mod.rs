//! Scene Model
//!
//! The ordered source collection edited by the surrounding application,
//! the global reverb level, and immutable snapshots taken for export.

pub mod source;
pub mod trajectory;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use source::{AudioHandle, Source, SourceId, DEFAULT_ANCHOR, DEFAULT_CLIP_SECS};
pub use trajectory::{
    ease_out_cubic, evaluate, Automation, LinearParams, OrbitParams, PulseParams, Vec3,
};

use crate::error::{Result, SonoscapeError};

/// Shortest timeline the engine will play or export
pub const MIN_TIMELINE_SECS: f64 = 1.0;

/// Scene length: the latest clip end, floored to `min_secs`
pub fn total_duration_of<'a>(sources: impl IntoIterator<Item = &'a Source>, min_secs: f64) -> f64 {
    sources
        .into_iter()
        .map(Source::timeline_end)
        .filter(|end| end.is_finite())
        .fold(min_secs, f64::max)
}

/// Mutable scene owned by the editor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Wet level of the shared reverb bus (0 = dry)
    #[serde(default)]
    pub reverb_level: f32,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a scene description from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SonoscapeError::FileNotFound {
            path: path.display().to_string(),
            source: Some(e),
        })?;
        let scene: Scene = serde_json::from_str(&text)?;
        scene.validate()?;
        Ok(scene)
    }

    /// Save the scene as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for source in &self.sources {
            source.validate()?;
        }
        if !self.reverb_level.is_finite() || self.reverb_level < 0.0 {
            return Err(SonoscapeError::invalid_parameter(
                "reverb_level",
                self.reverb_level,
                "a finite value >= 0",
            ));
        }
        Ok(())
    }

    /// Append a source, returning its id
    pub fn add(&mut self, source: Source) -> SourceId {
        let id = source.id();
        self.sources.push(source);
        id
    }

    pub fn remove(&mut self, id: SourceId) -> Option<Source> {
        let index = self.sources.iter().position(|s| s.id() == id)?;
        Some(self.sources.remove(index))
    }

    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.sources.iter().find(|s| s.id() == id)
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut Source> {
        self.sources.iter_mut().find(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Scene length floored to [`MIN_TIMELINE_SECS`]
    pub fn total_duration(&self) -> f64 {
        total_duration_of(&self.sources, MIN_TIMELINE_SECS)
    }

    /// Freeze the current state for rendering
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            sources: self.sources.iter().cloned().collect(),
            reverb_level: self.reverb_level,
        }
    }
}

/// Immutable copy of a scene taken at render start
///
/// Cheap to clone and safe to move to a worker thread while the editor keeps
/// mutating the live [`Scene`].
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    sources: Arc<[Source]>,
    reverb_level: f32,
}

impl SceneSnapshot {
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn reverb_level(&self) -> f32 {
        self.reverb_level
    }

    pub fn total_duration(&self) -> f64 {
        total_duration_of(self.sources.iter(), MIN_TIMELINE_SECS)
    }

    /// Total duration with a custom floor
    pub fn total_duration_with_min(&self, min_secs: f64) -> f64 {
        total_duration_of(self.sources.iter(), min_secs)
    }
}

impl From<&Scene> for SceneSnapshot {
    fn from(scene: &Scene) -> Self {
        scene.snapshot()
    }
}

// ============================================================================
// Tests
// ============================================================================
