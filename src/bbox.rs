use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

/// One of the four image-space lines enclosing a [`BoundingBox2D`]
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Anchor2 {
    Left,
    Right,
    Top,
    Bottom,
}

/// One of the six world-space planes enclosing a [`BoundingBox3D`]
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Anchor3 {
    Left,
    Right,
    Top,
    Bottom,
    Back,
    Front,
}

/// Image-space rectangle in pixels together with the depth range of the pixels inside it.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox2D {
    min: na::Point2<i32>,
    max: na::Point2<i32>,
    min_depth: f32,
    max_depth: f32,
}

impl Default for BoundingBox2D {
    fn default() -> Self {
        Self::new(na::Point2::origin(), na::Point2::origin(), 0.0, 0.0)
    }
}

impl BoundingBox2D {
    pub fn new(a: na::Point2<i32>, b: na::Point2<i32>, depth_a: f32, depth_b: f32) -> Self {
        Self {
            min: na::Point2::new(a.x.min(b.x), a.y.min(b.y)),
            max: na::Point2::new(a.x.max(b.x), a.y.max(b.y)),
            min_depth: depth_a.min(depth_b),
            max_depth: depth_a.max(depth_b),
        }
    }

    #[inline(always)]
    pub fn min_point(&self) -> na::Point2<i32> {
        self.min
    }

    #[inline(always)]
    pub fn max_point(&self) -> na::Point2<i32> {
        self.max
    }

    #[inline(always)]
    pub fn min_depth(&self) -> f32 {
        self.min_depth
    }

    #[inline(always)]
    pub fn max_depth(&self) -> f32 {
        self.max_depth
    }

    #[inline(always)]
    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    #[inline(always)]
    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> na::Point2<i32> {
        na::Point2::new(
            self.min.x + self.width() / 2,
            self.min.y + self.height() / 2,
        )
    }

    #[inline]
    pub fn area(&self) -> i32 {
        self.width() * self.height()
    }

    /// Number of pixels covered when both corners are counted as inside.
    #[inline]
    pub fn pixel_count(&self) -> i32 {
        (self.width() + 1) * (self.height() + 1)
    }

    #[inline]
    pub fn avg_depth(&self) -> f32 {
        self.min_depth + (self.max_depth - self.min_depth) / 2.0
    }

    #[inline]
    pub fn anchor(&self, anchor: Anchor2) -> i32 {
        match anchor {
            Anchor2::Left => self.min.x,
            Anchor2::Right => self.max.x,
            Anchor2::Top => self.min.y,
            Anchor2::Bottom => self.max.y,
        }
    }

    #[inline]
    pub fn anchor_distance(&self, anchor: Anchor2, other: &BoundingBox2D) -> i32 {
        (self.anchor(anchor) - other.anchor(anchor)).abs()
    }

    /// Overlapping pixels between both boxes, zero if disjoint
    pub fn overlap_area(&self, other: &BoundingBox2D) -> i32 {
        let left = self.min.x.max(other.min.x);
        let right = self.max.x.min(other.max.x);
        let top = self.min.y.max(other.min.y);
        let bottom = self.max.y.min(other.max.y);

        (right - left + 1).max(0) * (bottom - top + 1).max(0)
    }

    /// Share of this box covered by `other`, 1.0 when this box lies completely inside it.
    pub fn overlap_factor(&self, other: &BoundingBox2D) -> f32 {
        self.overlap_area(other) as f32 / self.pixel_count() as f32
    }

    #[inline]
    pub fn overlaps(&self, other: &BoundingBox2D) -> bool {
        self.overlap_area(other) > 0
    }

    pub fn union(&self, other: &BoundingBox2D) -> BoundingBox2D {
        BoundingBox2D {
            min: na::Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: na::Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
            min_depth: self.min_depth.min(other.min_depth),
            max_depth: self.max_depth.max(other.max_depth),
        }
    }
}

/// World-space axis aligned box in metric coordinates
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox3D {
    min: na::Point3<f32>,
    max: na::Point3<f32>,
}

impl Default for BoundingBox3D {
    fn default() -> Self {
        Self::new(na::Point3::origin(), na::Point3::origin())
    }
}

impl BoundingBox3D {
    pub fn new(a: na::Point3<f32>, b: na::Point3<f32>) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    #[inline(always)]
    pub fn min_point(&self) -> na::Point3<f32> {
        self.min
    }

    #[inline(always)]
    pub fn max_point(&self) -> na::Point3<f32> {
        self.max
    }

    #[inline]
    pub fn size(&self) -> na::Vector3<f32> {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> na::Point3<f32> {
        self.min + self.size() / 2.0
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        let size = self.size();
        size.x * size.y * size.z
    }

    /// Top and back are the planes with the larger y and z coordinate.
    #[inline]
    pub fn anchor(&self, anchor: Anchor3) -> f32 {
        match anchor {
            Anchor3::Left => self.min.x,
            Anchor3::Right => self.max.x,
            Anchor3::Top => self.max.y,
            Anchor3::Bottom => self.min.y,
            Anchor3::Back => self.max.z,
            Anchor3::Front => self.min.z,
        }
    }

    #[inline]
    pub fn anchor_distance(&self, anchor: Anchor3, other: &BoundingBox3D) -> f32 {
        (self.anchor(anchor) - other.anchor(anchor)).abs()
    }

    pub fn overlap_volume(&self, other: &BoundingBox3D) -> f32 {
        let lo = self.min.sup(&other.min);
        let hi = self.max.inf(&other.max);
        let d = (hi - lo).map(|x| x.max(0.0));

        d.x * d.y * d.z
    }

    pub fn overlap_factor(&self, other: &BoundingBox3D) -> f32 {
        let volume = self.volume();
        if volume <= 0.0 {
            return 0.0;
        }

        self.overlap_volume(other) / volume
    }

    /// Composite distance over the lateral planes.
    ///
    /// Takes the smallest mean anchor distance among all four planes, every triple of them
    /// and every horizontal/vertical pair, so a box whose one side is pushed by an adjacent
    /// object still matches on the planes that did not move.
    pub fn composite_distance(&self, other: &BoundingBox3D) -> f32 {
        let l = self.anchor_distance(Anchor3::Left, other);
        let r = self.anchor_distance(Anchor3::Right, other);
        let t = self.anchor_distance(Anchor3::Top, other);
        let b = self.anchor_distance(Anchor3::Bottom, other);

        let all = (l + r + t + b) / 4.0;

        let triples = [
            (l + r + t) / 3.0,
            (l + r + b) / 3.0,
            (l + t + b) / 3.0,
            (r + t + b) / 3.0,
        ];

        let pairs = [(l + t) / 2.0, (l + b) / 2.0, (r + t) / 2.0, (r + b) / 2.0];

        triples
            .iter()
            .chain(pairs.iter())
            .fold(all, |acc, &x| acc.min(x))
    }

    pub fn union(&self, other: &BoundingBox3D) -> BoundingBox3D {
        BoundingBox3D {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }
}
