use ndarray::prelude::*;

use crate::component::ConnectedComponent;
use crate::config::TrackingConfig;
use crate::math;
use crate::track::{TrackState, TrackingCluster, TrackingObject};

/// Links the components of consecutive frames into persistent tracks and groups
/// overlapping tracks into clusters.
///
/// Association is a global nearest first matching on the composite anchor distance of the
/// 3D boxes. A person standing still while another one walks into them keeps a distance
/// near zero: one side of the box moves, the opposite planes do not.
pub struct Tracker {
    search_radius: f32,
    min_cluster_overlap: f32,
    objects: Vec<TrackingObject>,
    clusters: Vec<TrackingCluster>,
    labels: Array2<u32>,
}

impl Tracker {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            search_radius: config.search_radius,
            min_cluster_overlap: config.min_cluster_overlap,
            objects: Vec::with_capacity(16),
            clusters: Vec::with_capacity(16),
            labels: Array2::zeros((0, 0)),
        }
    }

    #[inline]
    pub fn objects(&self) -> &[TrackingObject] {
        &self.objects
    }

    #[inline]
    pub fn clusters(&self) -> &[TrackingCluster] {
        &self.clusters
    }

    /// Pixel to cluster id grid of the last pass, 0 is background
    #[inline]
    pub fn labels(&self) -> &Array2<u32> {
        &self.labels
    }

    pub fn object(&self, id: u32) -> Option<&TrackingObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn cluster(&self, id: u32) -> Option<&TrackingCluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    pub fn process(&mut self, component_labels: &Array2<u32>, components: &[ConnectedComponent]) {
        if self.objects.is_empty() {
            for component in components {
                self.spawn(*component);
            }
        } else {
            self.associate(components);
        }

        self.build_clusters();
        self.collect_garbage();
        self.rebuild_labels(component_labels);

        log::debug!(
            "tracking: {} components, {} objects, {} clusters",
            components.len(),
            self.objects.len(),
            self.clusters.len()
        );
    }

    fn spawn(&mut self, component: ConnectedComponent) {
        let id = math::next_free_id(self.objects.iter().map(|o| o.id));
        log::trace!("new object {} from component {}", id, component.id);

        self.objects.push(TrackingObject::new(id, component));
    }

    /// Accepts every (object, component) pair under the search radius and assigns them
    /// nearest first. Ties go to the lower object id, then to the lower component id.
    fn associate(&mut self, components: &[ConnectedComponent]) {
        let mut candidates: Vec<(usize, usize, f32)> = Vec::new();

        for (obj_idx, object) in self.objects.iter().enumerate() {
            for (idx, component) in components.iter().enumerate() {
                let dist = object
                    .current
                    .bbox_3d
                    .composite_distance(&component.bbox_3d);

                if dist < self.search_radius {
                    candidates.push((obj_idx, idx, dist));
                }
            }
        }

        let objects = &self.objects;
        candidates.sort_by(|a, b| {
            a.2.total_cmp(&b.2)
                .then(objects[a.0].id.cmp(&objects[b.0].id))
                .then(components[a.1].id.cmp(&components[b.1].id))
        });

        let mut matched = vec![false; self.objects.len()];
        let mut assigned = vec![false; components.len()];

        for (obj_idx, idx, dist) in candidates {
            if matched[obj_idx] || assigned[idx] {
                continue;
            }

            matched[obj_idx] = true;
            assigned[idx] = true;

            let object = &mut self.objects[obj_idx];
            object.assign(components[idx]);

            log::trace!(
                "object {} <- component {} (dist {:.3}, moved {:?})",
                object.id,
                components[idx].id,
                dist,
                object.displacement()
            );
        }

        for (object, &found) in self.objects.iter_mut().zip(&matched) {
            if found {
                continue;
            }

            object.lose();
            log::trace!("object {} lost", object.id);
        }

        for (idx, component) in components.iter().enumerate() {
            if !assigned[idx] {
                self.spawn(*component);
            }
        }
    }

    #[inline]
    fn overlapping(&self, a: &TrackingObject, b: &TrackingObject) -> bool {
        let (a, b) = (&a.current.bbox_2d, &b.current.bbox_2d);

        a.overlap_factor(b) > self.min_cluster_overlap
            || b.overlap_factor(a) > self.min_cluster_overlap
    }

    /// Groups active objects by transitive 2D box overlap.
    ///
    /// Groups are seeded with the largest remaining object. A group keeps the previous
    /// cluster id of its seed, or failing that of its first member whose cluster has not
    /// been claimed yet; the rest get the smallest free ids.
    fn build_clusters(&mut self) {
        let n = self.objects.len();
        let mut assigned: Vec<bool> = self.objects.iter().map(|o| !o.is_active()).collect();
        let mut groups: Vec<Vec<usize>> = Vec::new();

        loop {
            let mut seed: Option<usize> = None;
            for idx in 0..n {
                if assigned[idx] {
                    continue;
                }

                let bigger = seed.map_or(true, |s| {
                    self.objects[idx].current.area > self.objects[s].current.area
                });
                if bigger {
                    seed = Some(idx);
                }
            }

            let seed = match seed {
                Some(seed) => seed,
                None => break,
            };

            assigned[seed] = true;
            let mut group = vec![seed];
            let mut cursor = 0;

            while cursor < group.len() {
                let member = group[cursor];

                for idx in 0..n {
                    if !assigned[idx] && self.overlapping(&self.objects[member], &self.objects[idx])
                    {
                        assigned[idx] = true;
                        group.push(idx);
                    }
                }

                cursor += 1;
            }

            groups.push(group);
        }

        let previous = std::mem::take(&mut self.clusters);
        let mut claimed: Vec<u32> = Vec::with_capacity(groups.len());
        let mut reused: Vec<Option<TrackingCluster>> = Vec::with_capacity(groups.len());

        for group in &groups {
            let reuse = group
                .iter()
                .filter_map(|&idx| self.objects[idx].cluster)
                .find(|id| !claimed.contains(id) && previous.iter().any(|c| c.id == *id));

            reused.push(reuse.and_then(|id| {
                claimed.push(id);
                previous.iter().find(|c| c.id == id).cloned()
            }));
        }

        for (group, cluster) in groups.iter().zip(reused) {
            let mut cluster = match cluster {
                Some(mut cluster) => {
                    cluster.frames += 1;
                    cluster.members.clear();
                    cluster
                }
                None => {
                    let id = math::next_free_id(claimed.iter().copied());
                    claimed.push(id);
                    log::trace!("new cluster {}", id);

                    TrackingCluster::new(id)
                }
            };

            for &idx in group {
                let object = &mut self.objects[idx];
                object.cluster = Some(cluster.id);
                cluster.members.push(object.id);
            }

            cluster.update_bounds(&self.objects);
            self.clusters.push(cluster);
        }

        for cluster in previous.iter().filter(|c| !claimed.contains(&c.id)) {
            log::trace!("cluster {} dissolved", cluster.id);
        }

        self.clusters.sort_unstable_by_key(|c| c.id);
    }

    fn collect_garbage(&mut self) {
        let lost: Vec<u32> = self
            .objects
            .iter()
            .filter(|o| o.state == TrackState::Lost)
            .map(|o| o.id)
            .collect();

        if lost.is_empty() {
            return;
        }

        for cluster in self.clusters.iter_mut() {
            cluster.members.retain(|id| !lost.contains(id));
        }

        let objects = &self.objects;
        self.clusters.retain(|c| !c.is_empty());
        for cluster in self.clusters.iter_mut() {
            cluster.update_bounds(objects);
        }

        self.objects.retain(|o| o.state != TrackState::Lost);
    }

    fn rebuild_labels(&mut self, component_labels: &Array2<u32>) {
        let max_component = self
            .objects
            .iter()
            .map(|o| o.current.id as usize)
            .max()
            .unwrap_or(0);

        let mut lookup = vec![0u32; max_component + 1];
        for object in &self.objects {
            if let Some(cluster) = object.cluster.filter(|id| self.cluster(*id).is_some()) {
                lookup[object.current.id as usize] = cluster;
            }
        }

        self.labels = component_labels.mapv(|l| lookup.get(l as usize).copied().unwrap_or(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::{BoundingBox2D, BoundingBox3D};
    use nalgebra as na;

    // one pixel is one centimeter in these fixtures
    fn component(id: u32, x0: i32, y0: i32, x1: i32, y1: i32) -> ConnectedComponent {
        let (w, h) = ((x1 - x0 + 1) as usize, (y1 - y0 + 1) as usize);
        let m = |v: i32| v as f32 * 0.01;

        ConnectedComponent {
            id,
            area: w * h,
            bbox_2d: BoundingBox2D::new(na::Point2::new(x0, y0), na::Point2::new(x1, y1), 1.0, 1.0),
            bbox_3d: BoundingBox3D::new(
                na::Point3::new(m(x0), -m(y1), 1.0),
                na::Point3::new(m(x1), -m(y0), 1.0),
            ),
            center_of_mass: na::Point2::new((x0 + x1) as f32 / 2.0, (y0 + y1) as f32 / 2.0),
            center_depth: 1.0,
        }
    }

    fn tracker(radius: f32) -> Tracker {
        Tracker::new(&TrackingConfig {
            search_radius: radius,
            ..Default::default()
        })
    }

    fn label_grid(rows: usize, cols: usize, components: &[ConnectedComponent]) -> Array2<u32> {
        let mut grid = Array2::zeros((rows, cols));
        for c in components {
            let (min, max) = (c.bbox_2d.min_point(), c.bbox_2d.max_point());
            grid.slice_mut(s![
                min.y as usize..=max.y as usize,
                min.x as usize..=max.x as usize
            ])
            .fill(c.id);
        }
        grid
    }

    fn step(t: &mut Tracker, components: &[ConnectedComponent]) {
        t.process(&label_grid(100, 200, components), components);
    }

    #[test]
    fn bootstrap_creates_one_object_per_component() {
        let mut t = tracker(0.3);
        step(&mut t, &[component(1, 0, 0, 9, 9), component(2, 50, 0, 59, 9)]);

        let ids: Vec<u32> = t.objects().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(t.clusters().len(), 2);
        assert_ne!(t.labels()[[5, 5]], t.labels()[[5, 55]]);
        assert_ne!(t.labels()[[5, 5]], 0);
    }

    #[test]
    fn nearby_component_keeps_identity() {
        let mut t = tracker(0.3);
        step(&mut t, &[component(1, 10, 10, 29, 49), component(2, 120, 10, 139, 49)]);
        step(&mut t, &[component(1, 125, 12, 144, 51), component(2, 15, 12, 34, 51)]);

        let left = t.objects().iter().find(|o| o.current.id == 2).unwrap();
        let right = t.objects().iter().find(|o| o.current.id == 1).unwrap();
        assert_eq!(left.id, 1);
        assert_eq!(right.id, 2);
        assert_eq!(left.frames, 2);
        assert_eq!(left.previous.map(|c| c.id), Some(1));
    }

    #[test]
    fn unmatched_object_is_removed() {
        let mut t = tracker(0.1);
        step(&mut t, &[component(1, 0, 0, 9, 9), component(2, 100, 0, 109, 9)]);
        step(&mut t, &[component(1, 1, 0, 10, 9)]);

        assert_eq!(t.objects().len(), 1);
        assert_eq!(t.objects()[0].id, 1);
        assert!(t.object(2).is_none());
        assert_eq!(t.clusters().len(), 1);
        assert!(t.labels().iter().all(|&l| l == 0 || l == t.clusters()[0].id));
    }

    #[test]
    fn far_component_spawns_new_object() {
        let mut t = tracker(0.1);
        step(&mut t, &[component(1, 0, 0, 9, 9), component(2, 100, 0, 109, 9)]);
        // object 1 disappears, object 2 stays, something shows up far away
        step(&mut t, &[component(1, 100, 0, 109, 9), component(2, 180, 80, 189, 89)]);

        let ids: Vec<u32> = t.objects().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(t.object(2).unwrap().frames, 2);
        assert_eq!(t.object(3).unwrap().frames, 1);

        // the id of the removed object is free again
        step(
            &mut t,
            &[
                component(1, 100, 0, 109, 9),
                component(2, 180, 80, 189, 89),
                component(3, 0, 80, 9, 89),
            ],
        );
        assert_eq!(t.object(1).map(|o| o.current.id), Some(3));
    }

    #[test]
    fn equally_near_candidates_resolve_to_lowest_component() {
        let mut t = tracker(0.5);
        step(&mut t, &[component(1, 50, 0, 59, 9)]);
        let left = component(1, 40, 0, 49, 9);
        let mut right = component(2, 60, 0, 69, 9);
        right.bbox_3d = left.bbox_3d;
        step(&mut t, &[left, right]);

        assert_eq!(t.object(1).unwrap().current.id, 1);
        assert_eq!(t.object(2).unwrap().current.id, 2);
    }

    #[test]
    fn stationary_object_keeps_its_component() {
        let mut t = tracker(0.4);
        step(&mut t, &[component(1, 0, 0, 19, 39), component(2, 60, 0, 79, 39)]);

        // the left one leaves, its box would still be within reach of the right component
        let right = component(1, 60, 0, 79, 39);
        let reach = t.object(1).unwrap().current.bbox_3d.composite_distance(&right.bbox_3d);
        assert!(reach < 0.4);
        step(&mut t, &[right]);

        assert_eq!(t.objects().len(), 1);
        assert!(t.object(1).is_none());
        let kept = t.object(2).unwrap();
        assert_eq!(kept.frames, 2);
        assert_eq!(kept.current.bbox_2d.min_point(), na::Point2::new(60, 0));
    }

    #[test]
    fn equally_near_objects_resolve_to_lowest_id() {
        let mut t = tracker(0.4);
        let first = component(1, 0, 0, 19, 39);
        let mut second = component(2, 60, 0, 79, 39);
        second.bbox_3d = first.bbox_3d;
        step(&mut t, &[first, second]);

        step(&mut t, &[component(1, 5, 0, 24, 39)]);

        assert_eq!(t.objects().len(), 1);
        assert_eq!(t.object(1).unwrap().frames, 2);
        assert!(t.object(2).is_none());
    }

    #[test]
    fn overlapping_objects_share_a_cluster() {
        let mut t = tracker(0.15);
        step(&mut t, &[component(1, 0, 0, 19, 39), component(2, 50, 0, 69, 39)]);
        assert_eq!(t.clusters().len(), 2);

        // both walk towards each other until the boxes overlap
        step(&mut t, &[component(1, 10, 0, 29, 39), component(2, 40, 0, 59, 39)]);
        assert_eq!(t.clusters().len(), 2);
        step(&mut t, &[component(1, 20, 0, 39, 39), component(2, 35, 0, 54, 39)]);

        assert_eq!(t.objects().len(), 2);
        assert_eq!(t.clusters().len(), 1);

        let cluster = &t.clusters()[0];
        assert!(cluster.contains(1) && cluster.contains(2));
        assert_eq!(cluster.bbox_2d.min_point(), na::Point2::new(20, 0));
        assert_eq!(cluster.bbox_2d.max_point(), na::Point2::new(54, 39));
        assert_eq!(t.labels()[[10, 25]], cluster.id);
        assert_eq!(t.labels()[[10, 50]], cluster.id);
    }

    #[test]
    fn clustering_is_transitive() {
        let mut t = tracker(0.2);
        step(
            &mut t,
            &[
                component(1, 0, 0, 19, 19),
                component(2, 15, 0, 34, 19),
                component(3, 30, 0, 49, 19),
                component(4, 120, 0, 139, 19),
            ],
        );

        let c1 = t.object(1).unwrap().cluster;
        assert_eq!(t.object(2).unwrap().cluster, c1);
        assert_eq!(t.object(3).unwrap().cluster, c1);
        assert_ne!(t.object(4).unwrap().cluster, c1);
        assert_eq!(t.clusters().len(), 2);
    }

    #[test]
    fn split_keeps_cluster_of_largest_member() {
        let mut t = tracker(0.2);
        step(&mut t, &[component(1, 0, 0, 29, 39), component(2, 25, 0, 39, 39)]);
        assert_eq!(t.clusters().len(), 1);
        let merged = t.clusters()[0].id;

        step(&mut t, &[component(1, 0, 0, 29, 39), component(2, 45, 0, 59, 39)]);

        assert_eq!(t.clusters().len(), 2);
        assert_eq!(t.object(1).unwrap().cluster, Some(merged));
        let kept = t.cluster(merged).unwrap();
        assert_eq!(kept.frames, 2);
        assert_eq!(kept.members, vec![1]);
        assert_ne!(t.object(2).unwrap().cluster, Some(merged));
    }

    #[test]
    fn empty_frame_clears_everything() {
        let mut t = tracker(0.2);
        step(&mut t, &[component(1, 0, 0, 9, 9)]);
        step(&mut t, &[]);

        assert!(t.objects().is_empty());
        assert!(t.clusters().is_empty());
        assert!(t.labels().iter().all(|&l| l == 0));
    }
}
