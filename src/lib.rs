pub mod bbox;
pub mod component;
pub mod config;
pub mod error;
pub mod fitting;
pub mod frame;
pub mod image;
pub mod labeling;
pub mod math;
pub mod nearest;
pub mod pso;
pub mod scene;
pub mod skeleton;
pub mod timing;
pub mod track;
pub mod tracker;

pub use component::ConnectedComponent;
pub use config::Config;
pub use error::Error;
pub use frame::Frame;
pub use scene::Scene;
pub use skeleton::{JointType, Skeleton};

use ndarray::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

use fitting::SkeletonFitting;
use labeling::ConnectedComponentLabeling;
use scene::SkeletonPose;
use timing::Timings;
use track::{TrackingCluster, TrackingObject};
use tracker::Tracker;

pub trait PoseEstimation {
    fn process(&mut self, frame: &Frame) -> Result<(), Error>;
    fn scene(&self) -> Result<Scene, Error>;
}

/// Segmentation, tracking and skeleton fitting run back to back on every frame.
pub struct PoseTracker {
    config: Config,
    frame: u64,
    labeling: ConnectedComponentLabeling,
    tracker: Tracker,
    fitting: SkeletonFitting,
    timings: Timings,
}

impl PoseTracker {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            labeling: ConnectedComponentLabeling::new(&config.segmentation),
            tracker: Tracker::new(&config.tracking),
            fitting: SkeletonFitting::new(&config.fitting),
            frame: 0,
            timings: Timings::default(),
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of frames processed so far
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn component_labels(&self) -> &Array2<u32> {
        self.labeling.labels()
    }

    #[inline]
    pub fn components(&self) -> &[ConnectedComponent] {
        self.labeling.components()
    }

    /// Pixel to cluster id grid
    #[inline]
    pub fn track_labels(&self) -> &Array2<u32> {
        self.tracker.labels()
    }

    #[inline]
    pub fn objects(&self) -> &[TrackingObject] {
        self.tracker.objects()
    }

    #[inline]
    pub fn clusters(&self) -> &[TrackingCluster] {
        self.tracker.clusters()
    }

    #[inline]
    pub fn skeletons(&self) -> &BTreeMap<u32, Skeleton> {
        self.fitting.skeletons()
    }

    pub fn skeleton(&self, label: u32) -> Option<&Skeleton> {
        self.fitting.skeleton(label)
    }

    pub fn colored_component_labels(&self) -> Array3<u8> {
        image::colorize(self.labeling.labels())
    }

    pub fn colored_track_labels(&self) -> Array3<u8> {
        image::colorize(self.tracker.labels())
    }

    #[inline]
    pub fn timings(&self) -> &Timings {
        &self.timings
    }
}

impl crate::PoseEstimation for PoseTracker {
    fn process(&mut self, frame: &Frame) -> Result<(), Error> {
        if let Err(err) = frame.validate(self.config.height, self.config.width) {
            log::warn!("frame {} rejected: {}", self.frame + 1, err);
            return Err(err);
        }

        let start = Instant::now();

        let labeling = &mut self.labeling;
        self.timings
            .segmentation
            .time(|| labeling.process(&frame.foreground, &frame.points));

        let tracker = &mut self.tracker;
        let components = self.labeling.components();
        let component_labels = self.labeling.labels();
        self.timings
            .tracking
            .time(|| tracker.process(component_labels, components));

        let fitting = &mut self.fitting;
        let tracker = &self.tracker;
        self.timings
            .fitting
            .time(|| fitting.process(tracker.labels(), tracker.clusters(), frame))?;

        self.timings.total.record(start.elapsed());
        self.frame += 1;

        log::debug!(
            "frame {}: {} components, {} clusters, {} skeletons, {:.2} ms",
            self.frame,
            self.labeling.components().len(),
            self.tracker.clusters().len(),
            self.fitting.skeletons().len(),
            self.timings.total.last
        );

        Ok(())
    }

    fn scene(&self) -> Result<Scene, Error> {
        let mut skeletons = Vec::new();
        skeletons.try_reserve_exact(self.fitting.skeletons().len())?;
        for (&label, skeleton) in self.fitting.skeletons() {
            skeletons.push(SkeletonPose::new(label, skeleton)?);
        }

        let mut objects = Vec::new();
        objects.try_reserve_exact(self.tracker.objects().len())?;
        objects.extend_from_slice(self.tracker.objects());

        let mut clusters = Vec::new();
        clusters.try_reserve_exact(self.tracker.clusters().len())?;
        clusters.extend_from_slice(self.tracker.clusters());

        Ok(Scene {
            frame: self.frame,
            labels: self.tracker.labels().clone(),
            objects,
            clusters,
            skeletons,
        })
    }
}
