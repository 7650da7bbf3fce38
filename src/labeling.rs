use nalgebra as na;
use ndarray::prelude::*;

use crate::bbox::{BoundingBox2D, BoundingBox3D};
use crate::component::ConnectedComponent;
use crate::config::SegmentationConfig;

// marks pixels of a rejected region until the scan finishes
const DISCARDED: u32 = u32::MAX;

/// Running sums for the region being grown
struct Region {
    area: usize,
    min: na::Point2<i32>,
    max: na::Point2<i32>,
    min_depth: f32,
    max_depth: f32,
    min_3d: na::Point3<f32>,
    max_3d: na::Point3<f32>,
    has_3d: bool,
    sum_x: f64,
    sum_y: f64,
}

impl Region {
    fn new() -> Self {
        Self {
            area: 0,
            min: na::Point2::new(i32::MAX, i32::MAX),
            max: na::Point2::new(i32::MIN, i32::MIN),
            min_depth: f32::INFINITY,
            max_depth: f32::NEG_INFINITY,
            min_3d: na::Point3::origin(),
            max_3d: na::Point3::origin(),
            has_3d: false,
            sum_x: 0.0,
            sum_y: 0.0,
        }
    }

    fn add(&mut self, row: usize, col: usize, depth: f32, point: &na::Point3<f32>) {
        let p = na::Point2::new(col as i32, row as i32);

        self.area += 1;
        self.min = self.min.inf(&p);
        self.max = self.max.sup(&p);
        self.min_depth = self.min_depth.min(depth);
        self.max_depth = self.max_depth.max(depth);
        self.sum_x += col as f64;
        self.sum_y += row as f64;

        if point.coords.iter().all(|c| c.is_finite()) {
            if self.has_3d {
                self.min_3d = self.min_3d.inf(point);
                self.max_3d = self.max_3d.sup(point);
            } else {
                self.min_3d = *point;
                self.max_3d = *point;
                self.has_3d = true;
            }
        }
    }

    fn into_component(
        self,
        id: u32,
        mask: &Array2<f32>,
        labels: &Array2<u32>,
    ) -> ConnectedComponent {
        let n = self.area as f64;
        let center_of_mass = na::Point2::new((self.sum_x / n) as f32, (self.sum_y / n) as f32);
        let bbox_2d = BoundingBox2D::new(self.min, self.max, self.min_depth, self.max_depth);

        let bbox_3d = if self.has_3d {
            BoundingBox3D::new(self.min_3d, self.max_3d)
        } else {
            BoundingBox3D::default()
        };

        let row = center_of_mass.y.round() as usize;
        let col = center_of_mass.x.round() as usize;
        // a concave region may not contain its own center of mass
        let center_depth = match (mask.get((row, col)), labels.get((row, col))) {
            (Some(&d), Some(&l)) if l == id && d > 0.0 => d,
            _ => bbox_2d.avg_depth(),
        };

        ConnectedComponent {
            id,
            area: self.area,
            bbox_2d,
            bbox_3d,
            center_of_mass,
            center_depth,
        }
    }
}

/// Splits a foreground mask into depth coherent 8-connected regions.
pub struct ConnectedComponentLabeling {
    max_depth_delta: f32,
    min_size_ratio: Option<usize>,
    labels: Array2<u32>,
    components: Vec<ConnectedComponent>,
    stack: Vec<(usize, usize)>,
}

impl ConnectedComponentLabeling {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            max_depth_delta: config.max_depth_delta,
            min_size_ratio: config.min_size_ratio,
            labels: Array2::zeros((0, 0)),
            components: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Label grid of the last pass, 0 is background
    #[inline]
    pub fn labels(&self) -> &Array2<u32> {
        &self.labels
    }

    #[inline]
    pub fn components(&self) -> &[ConnectedComponent] {
        &self.components
    }

    pub fn process(&mut self, foreground: &Array2<f32>, points: &Array2<na::Point3<f32>>) {
        let (rows, cols) = foreground.dim();

        if self.labels.dim() != (rows, cols) {
            self.labels = Array2::zeros((rows, cols));
        } else {
            self.labels.fill(0);
        }
        self.components.clear();

        // every region of at most one pixel is dropped regardless of the ratio
        let min_size = self
            .min_size_ratio
            .map(|ratio| (rows * cols / ratio).max(2))
            .unwrap_or(2);

        let mut discarded = false;
        let mut next_label = 1;

        for row in 0..rows {
            for col in 0..cols {
                if foreground[[row, col]] <= 0.0 || self.labels[[row, col]] != 0 {
                    continue;
                }

                let region = self.grow(foreground, points, (row, col), next_label);

                if region.area >= min_size {
                    let component = region.into_component(next_label, foreground, &self.labels);
                    self.components.push(component);
                    next_label += 1;
                } else {
                    self.relabel(next_label, DISCARDED, region.min, region.max);
                    discarded = true;
                }
            }
        }

        if discarded {
            self.labels.mapv_inplace(|l| if l == DISCARDED { 0 } else { l });
        }

        log::trace!(
            "labeling: {} components, {} labels used",
            self.components.len(),
            next_label - 1
        );
    }

    /// Flood fill from `seed`, stamping `label` on every accepted pixel.
    fn grow(
        &mut self,
        foreground: &Array2<f32>,
        points: &Array2<na::Point3<f32>>,
        seed: (usize, usize),
        label: u32,
    ) -> Region {
        let (rows, cols) = foreground.dim();
        let mut region = Region::new();

        self.stack.clear();
        self.stack.push(seed);
        self.labels[seed] = label;

        while let Some((row, col)) = self.stack.pop() {
            let depth = foreground[[row, col]];
            region.add(row, col, depth, &points[[row, col]]);

            let r0 = row.saturating_sub(1);
            let r1 = (row + 1).min(rows - 1);
            let c0 = col.saturating_sub(1);
            let c1 = (col + 1).min(cols - 1);

            for nr in r0..=r1 {
                for nc in c0..=c1 {
                    if self.labels[[nr, nc]] != 0 {
                        continue;
                    }

                    let nd = foreground[[nr, nc]];
                    if nd > 0.0 && (nd - depth).abs() < self.max_depth_delta {
                        self.labels[[nr, nc]] = label;
                        self.stack.push((nr, nc));
                    }
                }
            }
        }

        region
    }

    // rejected regions are relabelled within their bounds only
    fn relabel(&mut self, from: u32, to: u32, min: na::Point2<i32>, max: na::Point2<i32>) {
        for row in min.y as usize..=max.y as usize {
            for col in min.x as usize..=max.x as usize {
                let l = &mut self.labels[[row, col]];
                if *l == from {
                    *l = to;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(rows: usize, cols: usize) -> Array2<na::Point3<f32>> {
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            na::Point3::new(c as f32 * 0.01, -(r as f32) * 0.01, 1.0)
        })
    }

    fn labeling() -> ConnectedComponentLabeling {
        ConnectedComponentLabeling::new(&SegmentationConfig::default())
    }

    #[test]
    fn empty_mask_yields_nothing() {
        let mut ccl = labeling();
        ccl.process(&Array2::zeros((10, 10)), &points(10, 10));

        assert!(ccl.components().is_empty());
        assert!(ccl.labels().iter().all(|&l| l == 0));
    }

    #[test]
    fn separates_regions_by_gap_and_depth() {
        let mut mask = Array2::zeros((10, 12));
        // two blocks, one pixel gap between them
        mask.slice_mut(s![1..4, 1..4]).fill(1.0);
        mask.slice_mut(s![1..4, 5..8]).fill(1.0);
        // touching the second block but 0.5 deeper
        mask.slice_mut(s![1..4, 8..11]).fill(1.5);

        let mut ccl = labeling();
        ccl.process(&mask, &points(10, 12));

        assert_eq!(ccl.components().len(), 3);
        assert!(ccl.components().iter().all(|c| c.area == 9));
        assert_eq!(ccl.labels()[[2, 2]], 1);
        assert_eq!(ccl.labels()[[2, 6]], 2);
        assert_eq!(ccl.labels()[[2, 9]], 3);
    }

    #[test]
    fn diagonal_neighbours_connect() {
        let mut mask = Array2::zeros((5, 5));
        for i in 0..5 {
            mask[[i, i]] = 1.0;
        }

        let mut ccl = labeling();
        ccl.process(&mask, &points(5, 5));

        assert_eq!(ccl.components().len(), 1);
        assert_eq!(ccl.components()[0].area, 5);
    }

    #[test]
    fn single_pixels_are_dropped() {
        let mut mask = Array2::zeros((6, 6));
        mask[[0, 0]] = 1.0;
        mask.slice_mut(s![3..5, 3..5]).fill(1.0);
        // isolated by depth from the block next to it
        mask[[2, 2]] = 3.0;

        let mut ccl = labeling();
        ccl.process(&mask, &points(6, 6));

        assert_eq!(ccl.components().len(), 1);
        assert_eq!(ccl.components()[0].id, 1);
        assert_eq!(ccl.labels()[[0, 0]], 0);
        assert_eq!(ccl.labels()[[2, 2]], 0);
        assert_eq!(ccl.labels()[[3, 3]], 1);
        assert!(ccl.labels().iter().all(|&l| l != DISCARDED));
    }

    #[test]
    fn min_size_ratio_filters_small_regions() {
        let mut mask = Array2::zeros((10, 10));
        mask.slice_mut(s![0..2, 0..2]).fill(1.0);
        mask.slice_mut(s![5..10, 5..10]).fill(1.0);

        let mut ccl = ConnectedComponentLabeling::new(&SegmentationConfig {
            min_size_ratio: Some(10),
            ..Default::default()
        });
        ccl.process(&mask, &points(10, 10));

        assert_eq!(ccl.components().len(), 1);
        assert_eq!(ccl.components()[0].area, 25);
        assert_eq!(ccl.labels()[[0, 0]], 0);
        assert_eq!(ccl.labels()[[7, 7]], 1);
    }

    #[test]
    fn summaries_match_region() {
        let mut mask = Array2::zeros((8, 8));
        mask.slice_mut(s![2..5, 1..6]).fill(2.0);
        mask[[3, 3]] = 2.05;

        let mut ccl = labeling();
        ccl.process(&mask, &points(8, 8));

        let c = &ccl.components()[0];
        assert_eq!(c.area, 15);
        assert_eq!(c.bbox_2d.min_point(), na::Point2::new(1, 2));
        assert_eq!(c.bbox_2d.max_point(), na::Point2::new(5, 4));
        assert_eq!(c.bbox_2d.min_depth(), 2.0);
        assert_eq!(c.bbox_2d.max_depth(), 2.05);
        assert!((c.center_of_mass.x - 3.0).abs() < 1e-6);
        assert!((c.center_of_mass.y - 3.0).abs() < 1e-6);
        assert_eq!(c.center_depth, 2.05);

        let min = c.bbox_3d.min_point();
        let max = c.bbox_3d.max_point();
        assert!((min.x - 0.01).abs() < 1e-6 && (max.x - 0.05).abs() < 1e-6);
        assert!((min.y + 0.04).abs() < 1e-6 && (max.y + 0.02).abs() < 1e-6);
    }

    #[test]
    fn non_finite_points_are_ignored_in_3d_bounds() {
        let mut mask = Array2::zeros((4, 4));
        mask.slice_mut(s![0..2, 0..2]).fill(1.0);

        let mut pts = points(4, 4);
        pts[[0, 0]] = na::Point3::new(f32::NAN, 0.0, 1.0);
        pts[[1, 1]] = na::Point3::new(f32::INFINITY, 0.0, 1.0);

        let mut ccl = labeling();
        ccl.process(&mask, &pts);

        let b = ccl.components()[0].bbox_3d;
        assert!(b.min_point().coords.iter().all(|c| c.is_finite()));
        assert!(b.max_point().coords.iter().all(|c| c.is_finite()));
        assert!((b.max_point().x - 0.01).abs() < 1e-6);
    }
}
