#![allow(dead_code)]

use depthpose::{math, Config, Frame};
use nalgebra as na;
use ndarray::prelude::*;

pub const WIDTH: usize = 160;
pub const HEIGHT: usize = 120;
/// one pixel is one centimeter at a depth of one meter
pub const FOCAL: f32 = 100.0;

pub fn config() -> Config {
    let mut config = Config::new(WIDTH, HEIGHT);
    config.tracking.search_radius = 0.4;
    config.fitting.seed = Some(1);
    config
}

pub fn projection() -> na::Matrix3x4<f32> {
    math::pinhole(FOCAL, -FOCAL, WIDTH as f32 / 2.0, HEIGHT as f32 / 2.0)
}

pub fn empty_mask() -> Array2<f32> {
    Array2::zeros((HEIGHT, WIDTH))
}

/// Paints a disc of uniform depth, `center` is `(x, y)` in pixels.
pub fn disc(mask: &mut Array2<f32>, center: (i32, i32), radius: i32, depth: f32) {
    for ((row, col), value) in mask.indexed_iter_mut() {
        let dx = col as i32 - center.0;
        let dy = row as i32 - center.1;

        if dx * dx + dy * dy <= radius * radius {
            *value = depth;
        }
    }
}

/// Back-projects the mask exactly through the pinhole camera, y pointing up. Every pixel of a
/// uniform depth region lands on the same z plane.
pub fn frame(mask: &Array2<f32>) -> Frame {
    let (cx, cy) = (WIDTH as f32 / 2.0, HEIGHT as f32 / 2.0);
    let points = Array2::from_shape_fn((HEIGHT, WIDTH), |(row, col)| {
        let z = mask[[row, col]];

        na::Point3::new(
            (col as f32 - cx) * z / FOCAL,
            (cy - row as f32) * z / FOCAL,
            z,
        )
    });

    Frame::new(mask.clone(), mask.clone(), points, projection())
}

pub fn blob_frame(center: (i32, i32), radius: i32, depth: f32) -> Frame {
    let mut mask = empty_mask();
    disc(&mut mask, center, radius, depth);
    frame(&mask)
}

/// Paints an axis aligned block, bounds are inclusive `(x, y)` pixels.
pub fn rect(mask: &mut Array2<f32>, min: (usize, usize), max: (usize, usize), depth: f32) {
    mask.slice_mut(s![min.1..=max.1, min.0..=max.0]).fill(depth);
}
