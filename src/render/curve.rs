//! Baked position curves
//!
//! The offline renderer cannot evaluate automation per block from a live
//! clock, so each source's trajectory is sampled up front into a fixed-step
//! curve. Samples are spread evenly over `[0, clip]` so the last point lands
//! exactly on the clip end. Between points the curve interpolates linearly;
//! outside them it holds the first or last value.

use crate::scene::{Source, Vec3};

/// Per-axis position samples over a source's clip
#[derive(Debug, Clone, PartialEq)]
pub struct PositionCurve {
    /// Global timeline time of the first point
    start: f64,
    /// Span covered by the points, in seconds
    span: f64,
    xs: Vec<f64>,
    ys: Vec<f64>,
    zs: Vec<f64>,
}

impl PositionCurve {
    /// A curve holding one position forever
    pub fn constant(start: f64, position: Vec3) -> Self {
        Self {
            start,
            span: 0.0,
            xs: vec![position.x],
            ys: vec![position.y],
            zs: vec![position.z],
        }
    }

    /// Sample `source`'s trajectory every `step` seconds over its clip
    ///
    /// Produces `ceil(clip / step) + 1` points. Clips shorter than one step
    /// (or a non-animated source) bake to a single static position.
    pub fn bake(source: &Source, step: f64) -> Self {
        let clip = source.effective_duration();
        let start = source.timeline_start;

        if !source.automation.is_animated() || !(step > 0.0) || clip < step {
            return Self::constant(start, source.position_at_relative(0.0));
        }

        let count = (clip / step).ceil() as usize + 1;
        let mut xs = Vec::with_capacity(count);
        let mut ys = Vec::with_capacity(count);
        let mut zs = Vec::with_capacity(count);
        let last = count - 1;
        for i in 0..count {
            let t = if i == last {
                clip
            } else {
                clip * i as f64 / last as f64
            };
            let p = source.position_at_relative(t);
            xs.push(p.x);
            ys.push(p.y);
            zs.push(p.z);
        }

        Self {
            start,
            span: clip,
            xs,
            ys,
            zs,
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn is_static(&self) -> bool {
        self.xs.len() <= 1
    }

    /// Timeline time of the first point
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Timeline time of the last point
    pub fn end(&self) -> f64 {
        self.start + self.span
    }

    fn point(&self, index: usize) -> Vec3 {
        Vec3::new(self.xs[index], self.ys[index], self.zs[index])
    }

    /// Position at global timeline `time`
    pub fn value_at(&self, time: f64) -> Vec3 {
        if self.xs.is_empty() {
            return Vec3::ZERO;
        }
        if self.is_static() {
            return self.point(0);
        }

        let last = self.xs.len() - 1;
        let relative = time - self.start;
        if !(relative > 0.0) {
            return self.point(0);
        }
        if relative >= self.span {
            return self.point(last);
        }

        let pos = relative / self.span * last as f64;
        let index = (pos.floor() as usize).min(last - 1);
        let frac = pos - index as f64;
        let a = self.point(index);
        let b = self.point(index + 1);
        a + (b - a) * frac
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Automation, LinearParams, OrbitParams};
    use approx::assert_abs_diff_eq;

    fn linear_source() -> Source {
        Source::new("car")
            .with_anchor(Vec3::new(0.0, 0.0, -5.0))
            .with_timeline(1.0, Some(5.0))
            .with_automation(Automation::Linear(LinearParams {
                target_pos: Vec3::new(0.0, 0.0, 5.0),
                duration: None,
            }))
    }

    #[test]
    fn test_point_count() {
        let curve = PositionCurve::bake(&linear_source(), 0.05);
        assert_eq!(curve.len(), 101);
        assert_eq!(curve.start(), 1.0);
        assert_eq!(curve.end(), 6.0);

        // Non-multiple clip: ceil(1.01 / 0.05) + 1 = 22
        let source = linear_source().with_timeline(0.0, Some(1.01));
        assert_eq!(PositionCurve::bake(&source, 0.05).len(), 22);
    }

    #[test]
    fn test_last_point_is_clip_end() {
        let source = linear_source().with_timeline(0.0, Some(1.01));
        let curve = PositionCurve::bake(&source, 0.05);
        assert_eq!(curve.value_at(1.01), Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(curve.value_at(100.0), Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_holds_first_value_before_start() {
        let curve = PositionCurve::bake(&linear_source(), 0.05);
        assert_eq!(curve.value_at(0.0), Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(curve.value_at(-3.0), Vec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn test_matches_evaluator_within_interpolation_error() {
        let source = Source::new("orbit")
            .with_timeline(2.0, Some(6.0))
            .with_automation(Automation::Orbit(OrbitParams::default()));
        let curve = PositionCurve::bake(&source, 0.05);

        for i in 0..600 {
            let t = 2.0 + i as f64 * 0.01;
            let baked = curve.value_at(t);
            let exact = source.position_at(t);
            // radius 5, speed 1: chord sag over a 0.05 s step is ~1.6e-3
            assert!(baked.distance(exact) < 2e-3, "t={} error={}", t, baked.distance(exact));
        }
    }

    #[test]
    fn test_short_clip_is_static() {
        let source = linear_source().with_timeline(0.0, Some(0.03));
        let curve = PositionCurve::bake(&source, 0.05);
        assert!(curve.is_static());
        assert_eq!(curve.value_at(0.02), Vec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn test_unanimated_source_is_static() {
        let source = Source::new("still").with_anchor(Vec3::new(1.0, 2.0, 3.0));
        let curve = PositionCurve::bake(&source, 0.05);
        assert!(curve.is_static());
        assert_eq!(curve.value_at(4.0), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_interpolates_linearly_between_points() {
        let source = linear_source();
        let curve = PositionCurve::bake(&source, 0.05);
        let a = source.position_at(1.0 + 0.05 * 10.0);
        let b = source.position_at(1.0 + 0.05 * 11.0);
        let mid = curve.value_at(1.0 + 0.05 * 10.5);
        assert_abs_diff_eq!(mid.z, (a.z + b.z) / 2.0, epsilon = 1e-9);
    }
}
