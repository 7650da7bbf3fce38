use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::error::Error;
use crate::math;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    Head,
    Neck,
    LeftShoulder,
    LeftElbow,
    LeftHand,
    RightShoulder,
    RightElbow,
    RightHand,
    Torso,
    Hips,
    LeftHip,
    LeftKnee,
    LeftFoot,
    RightHip,
    RightKnee,
    RightFoot,
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub kind: JointType,
    pub position: na::Point3<f32>,
    /// image position, `None` when the joint lies on the camera plane
    pub projected: Option<na::Point2<f32>>,
    pub confidence: f32,
    /// outgoing bones
    pub bones: Vec<usize>,
}

impl Joint {
    fn new(kind: JointType) -> Self {
        Self {
            kind,
            position: na::Point3::origin(),
            projected: None,
            confidence: 0.0,
            bones: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bone {
    /// joint indices
    pub start: usize,
    pub end: usize,
    /// incoming bone of `start`, `None` for bones leaving the root
    pub parent: Option<usize>,
    pub length: f32,
    /// relative to the parent bone, the bone axis is local +Z
    pub orientation: na::UnitQuaternion<f32>,
    /// excluded from orientation search
    pub fixed: bool,
    global: na::UnitQuaternion<f32>,
    energy: f32,
}

impl Bone {
    /// Orientation composed along the chain from the root, valid after `Skeleton::update`
    #[inline]
    pub fn global_orientation(&self) -> na::UnitQuaternion<f32> {
        self.global
    }

    /// Squared nearest point distance of the end joint from the last fitting pass
    #[inline]
    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Offset from start to end joint under the current global orientation
    #[inline]
    pub fn offset(&self) -> na::Vector3<f32> {
        self.global * na::Vector3::new(0.0, 0.0, self.length)
    }
}

/// Rest pose of one bone. `direction` is given in world space with y pointing up.
#[derive(Debug, Clone, Copy)]
pub struct BoneSpec {
    pub parent: JointType,
    pub child: JointType,
    pub length: f32,
    pub direction: na::Vector3<f32>,
    pub fixed: bool,
}

impl BoneSpec {
    pub fn new(
        parent: JointType,
        child: JointType,
        length: f32,
        direction: [f32; 3],
        fixed: bool,
    ) -> Self {
        Self {
            parent,
            child,
            length,
            direction: na::Vector3::new(direction[0], direction[1], direction[2]),
            fixed,
        }
    }
}

/// Tree layout consumed by `Skeleton::from_topology`. Every bone must start at the root or at
/// the child of an earlier bone.
#[derive(Debug, Clone)]
pub struct Topology {
    pub root: JointType,
    pub bones: Vec<BoneSpec>,
}

impl Topology {
    /// Torso, neck and head with both arms hanging down.
    pub fn upper_body() -> Self {
        use JointType::*;

        const UP: [f32; 3] = [0.0, 1.0, 0.0];
        const DOWN: [f32; 3] = [0.0, -1.0, 0.0];

        Self {
            root: Torso,
            bones: vec![
                BoneSpec::new(Torso, Neck, 0.45, UP, true),
                BoneSpec::new(Neck, Head, 0.25, UP, true),
                // facing the camera, the left side is on +x
                BoneSpec::new(Neck, LeftShoulder, 0.18, [1.0, 0.0, 0.0], true),
                BoneSpec::new(LeftShoulder, LeftElbow, 0.28, DOWN, false),
                BoneSpec::new(LeftElbow, LeftHand, 0.27, DOWN, false),
                BoneSpec::new(Neck, RightShoulder, 0.18, [-1.0, 0.0, 0.0], true),
                BoneSpec::new(RightShoulder, RightElbow, 0.28, DOWN, false),
                BoneSpec::new(RightElbow, RightHand, 0.27, DOWN, false),
            ],
        }
    }
}

/// Rooted joint tree stored as flat joint and bone lists. Joint 0 is the root.
#[derive(Debug, Clone)]
pub struct Skeleton {
    joints: Vec<Joint>,
    bones: Vec<Bone>,
    position: na::Point3<f32>,
    initialized: bool,
    energy: f32,
}

fn rotation_to(direction: &na::Vector3<f32>) -> na::UnitQuaternion<f32> {
    na::UnitQuaternion::rotation_between(&na::Vector3::z(), direction)
        .unwrap_or_else(|| na::UnitQuaternion::from_axis_angle(&na::Vector3::x_axis(), PI))
}

impl Skeleton {
    /// Upper body skeleton
    pub fn new() -> Result<Self, Error> {
        Self::from_topology(&Topology::upper_body())
    }

    pub fn from_topology(topology: &Topology) -> Result<Self, Error> {
        let mut joints = Vec::new();
        joints.try_reserve(topology.bones.len() + 1)?;
        joints.push(Joint::new(topology.root));

        let mut bones: Vec<Bone> = Vec::new();
        bones.try_reserve(topology.bones.len())?;

        for spec in &topology.bones {
            if !(spec.length.is_finite() && spec.length > 0.0) {
                return Err(Error::InvalidTopology(format!(
                    "bone {:?} -> {:?} has length {}",
                    spec.parent, spec.child, spec.length
                )));
            }

            if spec.direction.norm() <= f32::EPSILON {
                return Err(Error::InvalidTopology(format!(
                    "bone {:?} -> {:?} has no direction",
                    spec.parent, spec.child
                )));
            }

            let start = joints
                .iter()
                .position(|j| j.kind == spec.parent)
                .ok_or_else(|| {
                    Error::InvalidTopology(format!("{:?} is not in the tree yet", spec.parent))
                })?;

            if joints.iter().any(|j| j.kind == spec.child) {
                return Err(Error::InvalidTopology(format!(
                    "{:?} appears twice",
                    spec.child
                )));
            }

            let parent = bones.iter().position(|b| b.end == start);
            let rest = rotation_to(&spec.direction);
            let parent_rest = parent.map_or_else(na::UnitQuaternion::identity, |p| bones[p].global);

            let end = joints.len();
            joints[start].bones.push(bones.len());
            joints.push(Joint::new(spec.child));

            bones.push(Bone {
                start,
                end,
                parent,
                length: spec.length,
                orientation: parent_rest.inverse() * rest,
                fixed: spec.fixed,
                global: rest,
                energy: 0.0,
            });
        }

        Ok(Self {
            joints,
            bones,
            position: na::Point3::origin(),
            initialized: false,
            energy: 0.0,
        })
    }

    #[inline]
    pub fn root(&self) -> &Joint {
        &self.joints[0]
    }

    #[inline]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn joint(&self, kind: JointType) -> Option<&Joint> {
        self.joints.iter().find(|j| j.kind == kind)
    }

    #[inline]
    pub fn position(&self) -> na::Point3<f32> {
        self.position
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Sum of the squared nearest point distances of all joints
    #[inline]
    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Forward kinematics: derives every joint from the root position, the bone orientations
    /// and lengths, and projects it into the image.
    pub fn update(&mut self, projection: &na::Matrix3x4<f32>) {
        let root = &mut self.joints[0];
        root.position = self.position;
        root.projected = math::project(projection, &root.position);

        for idx in 0..self.bones.len() {
            let global = match self.bones[idx].parent {
                Some(parent) => self.bones[parent].global * self.bones[idx].orientation,
                None => self.bones[idx].orientation,
            };

            let bone = &mut self.bones[idx];
            bone.global = global;

            let position = self.joints[bone.start].position + bone.offset();
            let end = &mut self.joints[bone.end];
            end.position = position;
            end.projected = math::project(projection, &position);
        }
    }

    /// Moves the root and re-derives the tree.
    pub fn move_to(&mut self, position: na::Point3<f32>, projection: &na::Matrix3x4<f32>) {
        self.position = position;
        self.update(projection);
    }

    /// First placement of the skeleton, marks it initialized.
    pub fn place(&mut self, position: na::Point3<f32>, projection: &na::Matrix3x4<f32>) {
        self.move_to(position, projection);
        self.initialized = true;
    }

    /// Stores fitting results, `distances` holds the nearest point distance of every joint.
    pub(crate) fn annotate(&mut self, distances: &[Option<f32>], sigma: f32) {
        let mut total = 0.0;

        for (joint, dist) in self.joints.iter_mut().zip(distances) {
            joint.confidence = dist.map_or(0.0, |d| math::gauss(d, sigma));
            total += dist.map_or(0.0, |d| d * d);
        }

        for bone in self.bones.iter_mut() {
            bone.energy = distances
                .get(bone.end)
                .copied()
                .flatten()
                .map_or(0.0, |d| d * d);
        }

        self.energy = total;
    }
}
