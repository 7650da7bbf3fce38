use nalgebra as na;
use ndarray::prelude::*;

use crate::error::Error;

/// Sensor data for one pipeline pass. All grids are indexed `[row, col]`.
#[derive(Debug, Clone)]
pub struct Frame {
    /// per-pixel distance, 0 marks an invalid return
    pub depth: Array2<f32>,
    /// background subtracted depth, nonzero marks a foreground candidate
    pub foreground: Array2<f32>,
    /// one world point per pixel, aligned with `depth`
    pub points: Array2<na::Point3<f32>>,
    pub projection: na::Matrix3x4<f32>,
}

impl Frame {
    pub fn new(
        depth: Array2<f32>,
        foreground: Array2<f32>,
        points: Array2<na::Point3<f32>>,
        projection: na::Matrix3x4<f32>,
    ) -> Self {
        Self {
            depth,
            foreground,
            points,
            projection,
        }
    }

    /// Checks that every grid is `rows x cols`.
    pub fn validate(&self, rows: usize, cols: usize) -> Result<(), Error> {
        let expected = (rows, cols);

        let grids = [
            ("depth map", self.depth.dim()),
            ("foreground mask", self.foreground.dim()),
            ("point cloud", self.points.dim()),
        ];

        for (what, actual) in grids {
            if actual != expected {
                return Err(Error::InvalidShape {
                    what,
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }
}
