use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;

use crate::camera::Camera;
use crate::object_controller::PlacedObject;
use crate::reticle::Reticle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSpaceType {
    Viewer,
    Local,
}

/// Opaque host handle to a tracked coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSpace(pub u32);

/// Opaque host handle to a subscribed hit-test query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitTestSource(pub u32);

/// One surface intersection for the current frame. The pose is already
/// expressed in the session's tracked reference space.
#[derive(Debug, Clone, Copy)]
pub struct HitTestResult {
    pub pose: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFeature {
    HitTest,
    DomOverlay,
}

#[derive(Debug, Clone)]
pub struct SessionInit {
    pub required_features: Vec<SessionFeature>,
    pub optional_features: Vec<SessionFeature>,
}

impl SessionInit {
    pub fn immersive_ar() -> Self {
        Self {
            required_features: vec![SessionFeature::HitTest],
            optional_features: vec![SessionFeature::DomOverlay],
        }
    }
}

enum Slot<T> {
    Waiting,
    Done(anyhow::Result<T>),
    Consumed,
}

/// A one-shot continuation cell. The host holds a clone and fulfills it on
/// some later event-loop turn; the requesting component polls `take` once per
/// frame. Everything runs on one logical thread, so the cell is `Rc`-shared
/// rather than synchronized.
pub struct Pending<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T> Pending<T> {
    pub fn waiting() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Waiting)),
        }
    }

    #[allow(dead_code)]
    pub fn ready(value: T) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Done(Ok(value)))),
        }
    }

    #[allow(dead_code)]
    pub fn failed(error: anyhow::Error) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Done(Err(error)))),
        }
    }

    /// Host side: resolve the continuation. Ignored if already resolved.
    pub fn fulfill(&self, value: T) {
        let mut slot = self.slot.borrow_mut();
        if matches!(*slot, Slot::Waiting) {
            *slot = Slot::Done(Ok(value));
        }
    }

    /// Host side: reject the continuation. Ignored if already resolved.
    pub fn fail(&self, error: anyhow::Error) {
        let mut slot = self.slot.borrow_mut();
        if matches!(*slot, Slot::Waiting) {
            *slot = Slot::Done(Err(error));
        }
    }

    /// Consumer side: `None` while unresolved, the result exactly once after.
    pub fn take(&self) -> Option<anyhow::Result<T>> {
        let mut slot = self.slot.borrow_mut();
        match *slot {
            Slot::Waiting | Slot::Consumed => None,
            Slot::Done(_) => match std::mem::replace(&mut *slot, Slot::Consumed) {
                Slot::Done(result) => Some(result),
                _ => unreachable!(),
            },
        }
    }

    #[allow(dead_code)]
    pub fn is_waiting(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Waiting)
    }
}

/// Host XR entry point, the `navigator.xr` analog.
pub trait XrSystem {
    /// Whether the host exposes an XR implementation at all.
    fn has_xr(&self) -> bool;
    fn is_secure_context(&self) -> bool;
    /// Probe for immersive AR support. Only meaningful when `has_xr`.
    fn is_ar_supported(&self) -> bool;
    fn request_session(&mut self, init: &SessionInit) -> Pending<Box<dyn XrSession>>;
}

pub trait XrSession {
    fn request_reference_space(&mut self, ty: ReferenceSpaceType) -> Pending<ReferenceSpace>;
    fn request_hit_test_source(&mut self, space: ReferenceSpace) -> Pending<HitTestSource>;
    /// Asks the host to end the session. The transition happens when the
    /// host's end notification is observed via `take_ended`, not here.
    fn end(&mut self);
    /// Drains the host's asynchronous "ended" notification.
    fn take_ended(&mut self) -> bool;
}

/// Per-frame tracking data, available only while presenting.
pub trait XrFrame {
    fn hit_test_results(&self, source: HitTestSource) -> Vec<HitTestResult>;
}

/// What the renderer draws this frame. The renderer itself is an external
/// collaborator; visibility gating happens here, on the controller side.
pub struct SceneView<'a> {
    pub camera: &'a Camera,
    pub reticle: &'a Reticle,
    pub object: Option<&'a PlacedObject>,
}

/// The opaque rendering surface (the `renderer` + `renderer.xr` analog).
pub trait RenderSurface {
    fn is_presenting(&self) -> bool;
    fn set_reference_space_type(&mut self, ty: ReferenceSpaceType);
    fn set_session(&mut self, session: Box<dyn XrSession>);
    fn session_mut(&mut self) -> Option<&mut (dyn XrSession + 'static)>;
    fn take_session(&mut self) -> Option<Box<dyn XrSession>>;
    fn render(&mut self, view: &SceneView);
}
