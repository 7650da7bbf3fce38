use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra as na;
use ndarray::prelude::*;

use crate::error::Error;

type PointTree = ImmutableKdTree<f32, 3>;

/// Two tier nearest point lookup: a constant time image space probe and an exact search.
pub trait NearestPoint {
    /// Looks at the 3x3 pixel window around `pixel` only.
    fn try_fast(&self, point: &na::Point3<f32>, pixel: &na::Point2<f32>)
        -> Option<na::Point3<f32>>;

    fn exact(&self, point: &na::Point3<f32>) -> Option<na::Point3<f32>>;

    fn nearest(
        &self,
        point: &na::Point3<f32>,
        pixel: Option<&na::Point2<f32>>,
    ) -> Option<na::Point3<f32>> {
        pixel
            .and_then(|px| self.try_fast(point, px))
            .or_else(|| self.exact(point))
    }
}

/// Points of one tracked label in the current frame.
pub struct UserCloud<'a> {
    label: u32,
    labels: &'a Array2<u32>,
    depth: &'a Array2<f32>,
    points: &'a Array2<na::Point3<f32>>,
    valid: Vec<na::Point3<f32>>,
    /// `None` for an empty cloud
    tree: Option<PointTree>,
}

#[inline]
fn is_finite(p: &na::Point3<f32>) -> bool {
    p.coords.iter().all(|c| c.is_finite())
}

fn owned_points<'a>(
    label: u32,
    labels: &'a Array2<u32>,
    depth: &'a Array2<f32>,
    points: &'a Array2<na::Point3<f32>>,
) -> impl Iterator<Item = na::Point3<f32>> + 'a {
    labels
        .iter()
        .zip(depth.iter())
        .zip(points.iter())
        .filter(move |((&l, &d), p)| l == label && d > 0.0 && is_finite(p))
        .map(|(_, p)| *p)
}

impl<'a> UserCloud<'a> {
    pub fn new(
        label: u32,
        labels: &'a Array2<u32>,
        depth: &'a Array2<f32>,
        points: &'a Array2<na::Point3<f32>>,
    ) -> Result<Self, Error> {
        let mut valid = Vec::new();
        valid.try_reserve_exact(owned_points(label, labels, depth, points).count())?;
        valid.extend(owned_points(label, labels, depth, points));

        let tree = if valid.is_empty() {
            None
        } else {
            let mut coords: Vec<[f32; 3]> = Vec::new();
            coords.try_reserve_exact(valid.len())?;
            coords.extend(valid.iter().map(|p| [p.x, p.y, p.z]));

            // items are indices into `coords`, and so into `valid`
            Some(PointTree::new_from_slice(&coords))
        };

        Ok(Self {
            label,
            labels,
            depth,
            points,
            valid,
            tree,
        })
    }

    #[inline]
    pub fn label(&self) -> u32 {
        self.label
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    pub fn points(&self) -> &[na::Point3<f32>] {
        &self.valid
    }

    pub fn centroid(&self) -> Option<na::Point3<f32>> {
        if self.valid.is_empty() {
            return None;
        }

        let sum = self
            .valid
            .iter()
            .fold(na::Vector3::<f64>::zeros(), |acc, p| acc + p.coords.cast::<f64>());

        Some(na::Point3::from((sum / self.valid.len() as f64).cast::<f32>()))
    }
}

impl<'a> NearestPoint for UserCloud<'a> {
    fn try_fast(
        &self,
        point: &na::Point3<f32>,
        pixel: &na::Point2<f32>,
    ) -> Option<na::Point3<f32>> {
        if !(pixel.x.is_finite() && pixel.y.is_finite()) {
            return None;
        }

        let (rows, cols) = self.labels.dim();
        let col = pixel.x.round() as i64;
        let row = pixel.y.round() as i64;

        let mut best: Option<(f32, na::Point3<f32>)> = None;

        for r in row - 1..=row + 1 {
            for c in col - 1..=col + 1 {
                if r < 0 || c < 0 || r >= rows as i64 || c >= cols as i64 {
                    continue;
                }

                let idx = [r as usize, c as usize];
                if self.labels[idx] != self.label || self.depth[idx] <= 0.0 {
                    continue;
                }

                let candidate = self.points[idx];
                if !is_finite(&candidate) {
                    continue;
                }

                let dist = na::distance_squared(point, &candidate);
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, candidate));
                }
            }
        }

        best.map(|(_, p)| p)
    }

    fn exact(&self, point: &na::Point3<f32>) -> Option<na::Point3<f32>> {
        if !is_finite(point) {
            return None;
        }

        let found = self
            .tree
            .as_ref()?
            .nearest_one::<SquaredEuclidean>(&[point.x, point.y, point.z]);

        self.valid.get(found.item as usize).copied()
    }
}
