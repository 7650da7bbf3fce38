use nalgebra as na;
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::config::FittingConfig;
use crate::error::Error;
use crate::frame::Frame;
use crate::nearest::{NearestPoint, UserCloud};
use crate::pso;
use crate::skeleton::Skeleton;
use crate::track::TrackingCluster;

/// Nearest point distance of every joint, `None` where no point was found
fn joint_distances<N: NearestPoint>(skeleton: &Skeleton, cloud: &N) -> Vec<Option<f32>> {
    skeleton
        .joints()
        .iter()
        .map(|j| {
            cloud
                .nearest(&j.position, j.projected.as_ref())
                .map(|p| na::distance(&j.position, &p))
        })
        .collect()
}

/// Sum of squared nearest point distances over all joints.
pub fn energy<N: NearestPoint>(skeleton: &Skeleton, cloud: &N) -> f32 {
    skeleton
        .joints()
        .iter()
        .filter_map(|j| {
            cloud
                .nearest(&j.position, j.projected.as_ref())
                .map(|p| na::distance_squared(&j.position, &p))
        })
        .sum()
}

/// Keeps one skeleton per tracked label and fits it to that label's points.
pub struct SkeletonFitting {
    config: FittingConfig,
    skeletons: BTreeMap<u32, Skeleton>,
    rng: StdRng,
}

impl SkeletonFitting {
    pub fn new(config: &FittingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config: config.clone(),
            skeletons: BTreeMap::new(),
            rng,
        }
    }

    #[inline]
    pub fn skeletons(&self) -> &BTreeMap<u32, Skeleton> {
        &self.skeletons
    }

    pub fn skeleton(&self, label: u32) -> Option<&Skeleton> {
        self.skeletons.get(&label)
    }

    /// Fits the skeleton of every cluster against the pixels carrying its id in `labels`.
    pub fn process(
        &mut self,
        labels: &Array2<u32>,
        clusters: &[TrackingCluster],
        frame: &Frame,
    ) -> Result<(), Error> {
        self.sync(clusters)?;

        for (&label, skeleton) in self.skeletons.iter_mut() {
            let cloud = UserCloud::new(label, labels, &frame.depth, &frame.points)?;

            let centroid = match cloud.centroid() {
                Some(centroid) => centroid,
                None => {
                    log::trace!("skeleton {}: no valid points, skipped", label);
                    continue;
                }
            };

            if !skeleton.is_initialized() {
                skeleton.place(centroid, &frame.projection);
                log::trace!("skeleton {} placed at {:?}", label, centroid);
            }

            let mut probe = skeleton.clone();
            let (best, value) = pso::minimize(
                &self.config,
                skeleton.position(),
                &mut self.rng,
                |p: &na::Point3<f32>| {
                    probe.move_to(*p, &frame.projection);
                    energy(&probe, &cloud)
                },
            )?;

            skeleton.move_to(best, &frame.projection);

            let distances = joint_distances(skeleton, &cloud);
            skeleton.annotate(&distances, self.config.confidence_sigma);

            log::trace!(
                "skeleton {}: {} points, best energy {:.5}",
                label,
                cloud.len(),
                value
            );
        }

        Ok(())
    }

    /// Creates skeletons for new labels and drops the ones whose label is gone.
    fn sync(&mut self, clusters: &[TrackingCluster]) -> Result<(), Error> {
        self.skeletons.retain(|label, _| {
            let alive = clusters.iter().any(|c| c.id == *label);
            if !alive {
                log::trace!("skeleton {} destroyed", label);
            }

            alive
        });

        for cluster in clusters {
            if !self.skeletons.contains_key(&cluster.id) {
                self.skeletons.insert(cluster.id, Skeleton::new()?);
                log::trace!("skeleton {} created", cluster.id);
            }
        }

        Ok(())
    }
}
