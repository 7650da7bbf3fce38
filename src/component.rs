use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BoundingBox2D, BoundingBox3D};

/// One spatially contiguous, depth coherent foreground region of a single frame
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ConnectedComponent {
    /// label value in the segmentation grid, unique within the frame
    pub id: u32,
    /// number of pixels carrying `id`
    pub area: usize,
    pub bbox_2d: BoundingBox2D,
    pub bbox_3d: BoundingBox3D,
    pub center_of_mass: na::Point2<f32>,
    pub center_depth: f32,
}

impl ConnectedComponent {
    #[inline(always)]
    pub fn center_3d(&self) -> na::Point3<f32> {
        self.bbox_3d.center()
    }
}
