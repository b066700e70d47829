pub mod anchors;
pub mod bbox;
pub mod config;
pub mod detector;
pub mod error;
pub mod frame;
pub mod fusion;
pub mod gap;
pub mod propagate;
pub mod timestamp;
pub mod tracker;

mod interpolate;

pub use anchors::AnchorSet;
pub use bbox::{BBox, CoordinateSpace, Ltrb};
pub use config::FusionConfig;
pub use detector::Detector;
pub use error::{Error, Result, TrackerFailure};
pub use frame::{FrameCache, FrameSource, FrameStore};
pub use fusion::{CoverageReport, MergedTrajectory, Source, Span};
pub use propagate::{Direction, PropagatedTrack};
pub use timestamp::{FrameClock, Timestamp};
pub use tracker::VisualTracker;

use tracing::{info, info_span, warn};

/// Produces a revised anchor set after someone has looked at a fused
/// trajectory, e.g. an annotation tool.
pub trait Correction {
    fn revise(&mut self, trajectory: &MergedTrajectory, anchors: &AnchorSet) -> Result<AnchorSet>;
}

/// Everything one fusion pass produced.
#[derive(Debug, Clone)]
pub struct FusionOutput {
    pub anchors: AnchorSet,
    pub forward: PropagatedTrack,
    pub backward: PropagatedTrack,
    pub trajectory: MergedTrajectory,
    pub report: CoverageReport,
}

pub struct TrackFusion {
    config: FusionConfig,
}

impl TrackFusion {
    pub fn new(config: FusionConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Loads a sequential source into memory so it can be walked backwards,
    /// bounded by `max_cached_frames`.
    pub fn materialize<S: FrameSource>(&self, source: S) -> Result<FrameCache<S::Frame>> {
        FrameCache::materialize(source, self.config.max_cached_frames)
    }

    pub fn detect<S, D>(&self, source: S, detector: &mut D) -> Result<AnchorSet>
    where
        S: FrameSource,
        D: Detector<S::Frame>,
    {
        crate::detector::detect_anchors(source, detector, self.config.detection_stride)
    }

    /// Rejects inputs that would otherwise yield silently wrong geometry.
    pub fn check<S, T>(&self, anchors: &AnchorSet, store: &S, tracker: &T) -> Result<()>
    where
        S: FrameStore,
        T: VisualTracker<S::Frame>,
    {
        let space = anchors.coordinate_space();

        if tracker.coordinate_space() != space {
            return Err(Error::CoordinateSpaceMismatch {
                anchors: space,
                tracker: tracker.coordinate_space(),
            });
        }

        if store.coordinate_space() != space {
            return Err(Error::FrameSpaceMismatch {
                anchors: space,
                frames: store.coordinate_space(),
            });
        }

        anchors.validate(store.clock())
    }

    /// One full pass: both propagations, then the merge. Runs the two
    /// directions on separate workers when `parallel` is set.
    pub fn run<S, T>(&self, anchors: &AnchorSet, store: &S, tracker: &T) -> Result<FusionOutput>
    where
        S: FrameStore + Sync,
        T: VisualTracker<S::Frame> + Sync,
    {
        if !self.config.parallel {
            return self.run_sequential(anchors, store, tracker);
        }

        let span = info_span!("fusion", anchors = anchors.len(), parallel = true);
        let _entered = span.enter();
        self.check(anchors, store, tracker)?;

        // workers do not inherit the caller's span
        let tolerance = self.config.gap_tolerance;
        let (forward, backward) = rayon::join(
            || span.in_scope(|| propagate::forward(anchors, store, tracker, tolerance)),
            || span.in_scope(|| propagate::backward(anchors, store, tracker, tolerance)),
        );

        Ok(self.finish(anchors, forward?, backward?, store.clock()))
    }

    pub fn run_sequential<S, T>(&self, anchors: &AnchorSet, store: &S, tracker: &T) -> Result<FusionOutput>
    where
        S: FrameStore,
        T: VisualTracker<S::Frame>,
    {
        let _span = info_span!("fusion", anchors = anchors.len(), parallel = false).entered();
        self.check(anchors, store, tracker)?;

        let tolerance = self.config.gap_tolerance;
        let forward = propagate::forward(anchors, store, tracker, tolerance)?;
        let backward = propagate::backward(anchors, store, tracker, tolerance)?;

        Ok(self.finish(anchors, forward, backward, store.clock()))
    }

    /// Hands the previous result to `correction` and runs a fresh pass over
    /// the anchor set it returns. Nothing from the previous pass is reused.
    pub fn rerun_with<C, S, T>(
        &self,
        correction: &mut C,
        previous: &FusionOutput,
        store: &S,
        tracker: &T,
    ) -> Result<FusionOutput>
    where
        C: Correction,
        S: FrameStore + Sync,
        T: VisualTracker<S::Frame> + Sync,
    {
        let revised = correction.revise(&previous.trajectory, &previous.anchors)?;

        if revised.coordinate_space() != previous.anchors.coordinate_space() {
            return Err(Error::Correction(format!(
                "revised anchors are in {:?}, previous pass used {:?}",
                revised.coordinate_space(),
                previous.anchors.coordinate_space()
            )));
        }

        info!(before = previous.anchors.len(), after = revised.len(), "anchors revised");

        self.run(&revised, store, tracker)
    }

    fn finish(
        &self,
        anchors: &AnchorSet,
        forward: PropagatedTrack,
        backward: PropagatedTrack,
        clock: &FrameClock,
    ) -> FusionOutput {
        let tracks = [forward, backward];
        let trajectory = fusion::merge(anchors, &tracks, clock);
        let [forward, backward] = tracks;
        let report = CoverageReport::new(&trajectory, clock);

        info!(
            retention = report.retention,
            covered = report.covered_frames,
            total = report.total_frames,
            gaps = report.uncovered.len(),
            "fusion finished"
        );

        if report.retention < self.config.low_retention_warning {
            warn!(
                retention = report.retention,
                threshold = self.config.low_retention_warning,
                "low retention, consider denser anchors or a correction pass"
            );
        }

        FusionOutput {
            anchors: anchors.clone(),
            forward,
            backward,
            trajectory,
            report,
        }
    }
}

impl Default for TrackFusion {
    fn default() -> Self {
        Self {
            config: FusionConfig::default(),
        }
    }
}
