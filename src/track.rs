use nalgebra as na;

use crate::bbox::{BoundingBox2D, BoundingBox3D};
use crate::component::ConnectedComponent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Active,
    /// no component matched in the last frame, removed at the end of that frame
    Lost,
}

/// Persistent identity of one person across frames
#[derive(Debug, Clone)]
pub struct TrackingObject {
    pub id: u32,
    pub frames: u32,
    pub state: TrackState,
    pub current: ConnectedComponent,
    pub previous: Option<ConnectedComponent>,
    /// id of the cluster this object belongs to, checked against the live cluster list
    pub cluster: Option<u32>,
}

impl TrackingObject {
    pub fn new(id: u32, component: ConnectedComponent) -> Self {
        Self {
            id,
            frames: 1,
            state: TrackState::Active,
            current: component,
            previous: None,
            cluster: None,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == TrackState::Active
    }

    pub fn assign(&mut self, component: ConnectedComponent) {
        self.frames += 1;
        self.state = TrackState::Active;
        self.previous = Some(std::mem::replace(&mut self.current, component));
    }

    #[inline]
    pub fn lose(&mut self) {
        self.state = TrackState::Lost;
    }

    /// Motion of the 3D box center since the previous frame
    pub fn displacement(&self) -> na::Vector3<f32> {
        match &self.previous {
            Some(prev) => self.current.center_3d() - prev.center_3d(),
            None => na::Vector3::zeros(),
        }
    }
}

/// Tracked objects whose 2D boxes currently overlap, e.g. people standing close together
#[derive(Debug, Clone)]
pub struct TrackingCluster {
    pub id: u32,
    pub frames: u32,
    pub members: Vec<u32>,
    pub bbox_2d: BoundingBox2D,
    pub bbox_3d: BoundingBox3D,
}

impl TrackingCluster {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            frames: 1,
            members: Vec::new(),
            bbox_2d: Default::default(),
            bbox_3d: Default::default(),
        }
    }

    #[inline]
    pub fn contains(&self, object_id: u32) -> bool {
        self.members.contains(&object_id)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Recomputes the aggregate boxes as the union of the members' boxes.
    pub fn update_bounds(&mut self, objects: &[TrackingObject]) {
        let mut boxes = objects
            .iter()
            .filter(|o| self.members.contains(&o.id))
            .map(|o| (o.current.bbox_2d, o.current.bbox_3d));

        if let Some((b2, b3)) = boxes.next() {
            let (b2, b3) = boxes.fold((b2, b3), |(a2, a3), (n2, n3)| {
                (a2.union(&n2), a3.union(&n3))
            });

            self.bbox_2d = b2;
            self.bbox_3d = b3;
        }
    }
}
