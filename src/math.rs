use nalgebra as na;
use num_traits::Float;

/// Maps a world point to image coordinates, `None` when it lies on the camera plane.
#[inline]
pub fn project(projection: &na::Matrix3x4<f32>, p: &na::Point3<f32>) -> Option<na::Point2<f32>> {
    let h = projection * p.to_homogeneous();

    if h.z.abs() < f32::EPSILON {
        return None;
    }

    Some(na::Point2::new(h.x / h.z, h.y / h.z))
}

pub fn gauss<T: Float>(x: T, c: T) -> T {
    let two = T::one() + T::one();

    (-((x * x) / (two * c * c))).exp()
}

/// Smallest positive id not yielded by `used`
pub fn next_free_id<I: IntoIterator<Item = u32>>(used: I) -> u32 {
    let mut used: Vec<u32> = used.into_iter().collect();
    used.sort_unstable();
    used.dedup();

    let mut id = 1;
    for u in used {
        if u == id {
            id += 1;
        } else if u > id {
            break;
        }
    }

    id
}

/// Pinhole projection `[fx 0 cx 0; 0 fy cy 0; 0 0 1 0]`
pub fn pinhole(fx: f32, fy: f32, cx: f32, cy: f32) -> na::Matrix3x4<f32> {
    na::Matrix3x4::new(
        fx, 0.0, cx, 0.0, //
        0.0, fy, cy, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    )
}
