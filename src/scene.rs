use nalgebra as na;
use ndarray::prelude::*;
use serde_derive::Serialize;

use crate::error::Error;
use crate::skeleton::{JointType, Skeleton};
use crate::track::{TrackingCluster, TrackingObject};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct JointPose {
    pub kind: JointType,
    pub position: na::Point3<f32>,
    pub projected: Option<na::Point2<f32>>,
    pub confidence: f32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BonePose {
    pub start: JointType,
    pub end: JointType,
    pub length: f32,
    pub fixed: bool,
    pub energy: f32,
}

/// Fitted pose of the skeleton tracking one label
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SkeletonPose {
    pub label: u32,
    pub position: na::Point3<f32>,
    pub initialized: bool,
    pub energy: f32,
    pub joints: Vec<JointPose>,
    pub bones: Vec<BonePose>,
}

impl SkeletonPose {
    pub fn new(label: u32, skeleton: &Skeleton) -> Result<Self, Error> {
        let mut joints = Vec::new();
        joints.try_reserve_exact(skeleton.joints().len())?;
        joints.extend(skeleton.joints().iter().map(|j| JointPose {
            kind: j.kind,
            position: j.position,
            projected: j.projected,
            confidence: j.confidence,
        }));

        let mut bones = Vec::new();
        bones.try_reserve_exact(skeleton.bones().len())?;
        bones.extend(skeleton.bones().iter().map(|b| BonePose {
            start: skeleton.joints()[b.start].kind,
            end: skeleton.joints()[b.end].kind,
            length: b.length,
            fixed: b.fixed,
            energy: b.energy(),
        }));

        Ok(Self {
            label,
            position: skeleton.position(),
            initialized: skeleton.is_initialized(),
            energy: skeleton.energy(),
            joints,
            bones,
        })
    }

    pub fn joint(&self, kind: JointType) -> Option<&JointPose> {
        self.joints.iter().find(|j| j.kind == kind)
    }
}

/// Owned snapshot of the pipeline after one frame
#[derive(Debug, Clone)]
pub struct Scene {
    /// number of frames processed so far
    pub frame: u64,
    /// pixel to cluster id, 0 is background
    pub labels: Array2<u32>,
    pub objects: Vec<TrackingObject>,
    pub clusters: Vec<TrackingCluster>,
    pub skeletons: Vec<SkeletonPose>,
}

impl Scene {
    pub fn cluster(&self, id: u32) -> Option<&TrackingCluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    pub fn skeleton(&self, label: u32) -> Option<&SkeletonPose> {
        self.skeletons.iter().find(|s| s.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math;

    #[test]
    fn pose_mirrors_skeleton() {
        let mut skeleton = Skeleton::new().unwrap();
        skeleton.place(
            na::Point3::new(0.0, 0.0, 2.0),
            &math::pinhole(100.0, -100.0, 80.0, 60.0),
        );

        let pose = SkeletonPose::new(4, &skeleton).unwrap();

        assert_eq!(pose.label, 4);
        assert!(pose.initialized);
        assert_eq!(pose.joints.len(), skeleton.joints().len());
        assert_eq!(pose.bones.len(), skeleton.bones().len());
        assert_eq!(pose.bones[0].start, JointType::Torso);
        assert_eq!(pose.bones[0].end, JointType::Neck);
        assert_eq!(
            pose.joint(JointType::Head).map(|j| j.position),
            skeleton.joint(JointType::Head).map(|j| j.position)
        );
    }
}
