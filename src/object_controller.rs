use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::control_panel::ControlPanel;
use crate::math::Aabb;
use crate::reticle::Reticle;
use crate::scene_graph::Transform;

// Raw touch deltas are tiny relative to world scale.
const PAN_GAIN: f32 = 30.0;
const ROTATE_GAIN: f32 = 10.0;

/// The single user-manipulable entity, created once asset loading completes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    pub transform: Transform,
    pub visible: bool,
    pub bounding_size: Vec3,
    pub bounding_center: Vec3,
    pub start_offset: Vec3,
}

impl PlacedObject {
    /// Initial placement: center the bounding box horizontally, rest it at
    /// ground level, then add the configured offset. The object starts
    /// hidden until the first tap on a visible reticle.
    pub fn from_aabb(aabb: &Aabb, offset: Vec3) -> Self {
        let center = aabb.center();
        let mut start_position = -center;
        start_position.y = 0.0;
        start_position += offset;

        Self {
            transform: Transform::from_translation(start_position),
            visible: false,
            bounding_size: aabb.size(),
            bounding_center: center,
            start_offset: offset,
        }
    }
}

/// Applies gesture deltas to the placed object. Continuous gestures work
/// against a snapshot taken on their `initial` event: pan accumulates
/// increments on top of the snapshot, rotate resets to the snapshot and
/// applies only the latest theta, so partial updates within one gesture
/// never compound.
pub struct ObjectController {
    object: Option<Rc<RefCell<PlacedObject>>>,
    start_position: Vec3,
    start_quaternion: Quat,
    // Captured for a future pinch-to-scale; never applied today.
    #[allow(dead_code)]
    start_scale: Vec3,
    pan_accumulated: Vec3,
}

impl ObjectController {
    pub fn new() -> Self {
        Self {
            object: None,
            start_position: Vec3::ZERO,
            start_quaternion: Quat::IDENTITY,
            start_scale: Vec3::ONE,
            pan_accumulated: Vec3::ZERO,
        }
    }

    pub fn attach(&mut self, object: Rc<RefCell<PlacedObject>>) {
        {
            let object = object.borrow();
            self.start_position = object.transform.translation;
            self.start_quaternion = object.transform.rotation;
            self.start_scale = object.transform.scale;
        }
        self.pan_accumulated = Vec3::ZERO;
        self.object = Some(object);
    }

    pub fn detach(&mut self) {
        self.object = None;
    }

    pub fn object(&self) -> Option<&Rc<RefCell<PlacedObject>>> {
        self.object.as_ref()
    }

    /// Anchors the hidden object to the reticle. Once visible, tap is a
    /// no-op; repositioning post-placement is not supported.
    pub fn on_tap(&mut self, reticle: &Reticle, panel: &mut ControlPanel) {
        let Some(object) = &self.object else {
            return;
        };
        let mut object = object.borrow_mut();

        if !object.visible && reticle.visible {
            object.transform.set_translation_from_matrix(&reticle.pose);
            object.visible = true;
            panel.show();
            log::debug!(
                "placed object at {:?}",
                object.transform.translation
            );
        }
    }

    /// Ground-plane translation: vertical stays locked to the snapshot.
    pub fn on_pan(&mut self, delta: Vec3, initial: bool) {
        let Some(object) = &self.object else {
            return;
        };
        let mut object = object.borrow_mut();

        if initial {
            self.start_position = object.transform.translation;
            self.pan_accumulated = Vec3::ZERO;
        } else {
            self.pan_accumulated += delta;
            let mut position = self.start_position + self.pan_accumulated * PAN_GAIN;
            position.y = self.start_position.y;
            object.transform.translation = position;
        }
    }

    /// Yaw-only, always relative to the gesture's starting orientation.
    pub fn on_rotate(&mut self, theta: f32, initial: bool) {
        let Some(object) = &self.object else {
            return;
        };
        let mut object = object.borrow_mut();

        if initial {
            self.start_quaternion = object.transform.rotation;
        } else {
            object.transform.rotation = self.start_quaternion;
            object.transform.rotate_y(theta * ROTATE_GAIN);
        }
    }

    /// Dismiss: the object stays attached to the scene, merely hidden, so a
    /// later tap can reveal it again.
    pub fn on_swipe(&mut self, panel: &mut ControlPanel) {
        let Some(object) = &self.object else {
            return;
        };
        let mut object = object.borrow_mut();

        if object.visible {
            object.visible = false;
            panel.hide();
        }
    }

    /// Scale-via-pinch is intentionally disabled; the snapshot is still
    /// taken so enabling it later only needs the apply half.
    pub fn on_pinch(&mut self, _scale: f32, initial: bool) {
        let Some(object) = &self.object else {
            return;
        };

        if initial {
            self.start_scale = object.borrow().transform.scale;
        }
    }

    pub fn on_double_tap(&mut self) {}

    pub fn on_press(&mut self) {}
}

impl Default for ObjectController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    fn controller_with_object() -> (ObjectController, Rc<RefCell<PlacedObject>>) {
        let aabb = Aabb::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let object = Rc::new(RefCell::new(PlacedObject::from_aabb(&aabb, Vec3::ZERO)));
        let mut controller = ObjectController::new();
        controller.attach(Rc::clone(&object));
        (controller, object)
    }

    fn visible_reticle_at(translation: Vec3) -> Reticle {
        let mut reticle = Reticle::new();
        reticle.visible = true;
        reticle.pose = Mat4::from_translation(translation);
        reticle
    }

    #[test]
    fn initial_placement_centers_rests_and_offsets() {
        // Bounding center (0, 0.5, 0), offset (1, 0, 0):
        // start = -center, y forced to 0, plus offset.
        let aabb = Aabb::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let object = PlacedObject::from_aabb(&aabb, Vec3::new(1.0, 0.0, 0.0));

        assert_eq!(object.transform.translation, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(object.bounding_center, Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(object.bounding_size, Vec3::new(2.0, 1.0, 2.0));
        assert!(!object.visible);
    }

    #[test]
    fn tap_places_once_and_is_idempotent() {
        let (mut controller, object) = controller_with_object();
        let mut panel = ControlPanel::new();
        let reticle = visible_reticle_at(Vec3::new(0.5, 0.0, -2.0));

        controller.on_tap(&reticle, &mut panel);
        assert!(object.borrow().visible);
        assert!(panel.is_visible());
        assert_eq!(
            object.borrow().transform.translation,
            Vec3::new(0.5, 0.0, -2.0)
        );

        // Repeated taps never reposition a visible object.
        let moved_reticle = visible_reticle_at(Vec3::new(3.0, 0.0, 1.0));
        controller.on_tap(&moved_reticle, &mut panel);
        assert_eq!(
            object.borrow().transform.translation,
            Vec3::new(0.5, 0.0, -2.0)
        );
    }

    #[test]
    fn tap_without_visible_reticle_does_nothing() {
        let (mut controller, object) = controller_with_object();
        let mut panel = ControlPanel::new();
        let reticle = Reticle::new();

        controller.on_tap(&reticle, &mut panel);
        assert!(!object.borrow().visible);
        assert!(!panel.is_visible());
    }

    #[test]
    fn pan_is_relative_to_snapshot_with_y_locked() {
        let (mut controller, object) = controller_with_object();
        object.borrow_mut().transform.translation = Vec3::new(1.0, 0.25, -1.0);

        controller.on_pan(Vec3::ZERO, true);
        let deltas = [
            Vec3::new(0.01, 0.02, 0.0),
            Vec3::new(-0.005, 0.1, 0.01),
            Vec3::new(0.002, -0.5, 0.002),
        ];
        for delta in deltas {
            controller.on_pan(delta, false);
        }

        let sum: Vec3 = deltas.iter().copied().sum();
        let mut expected = Vec3::new(1.0, 0.25, -1.0) + sum * 30.0;
        expected.y = 0.25;
        assert!((object.borrow().transform.translation - expected).length() < 1e-5);
    }

    #[test]
    fn rotate_resets_then_applies_latest_theta() {
        let (mut controller, object) = controller_with_object();
        object.borrow_mut().transform.rotation = Quat::from_rotation_y(0.5);

        controller.on_rotate(0.0, true);
        controller.on_rotate(0.02, false);
        controller.on_rotate(0.03, false);

        // t1's effect is overwritten, not accumulated.
        let expected = Quat::from_rotation_y(0.5) * Quat::from_rotation_y(0.3);
        assert!((object.borrow().transform.rotation - expected).length() < 1e-5);
    }

    #[test]
    fn swipe_hides_visible_object_and_panel() {
        let (mut controller, object) = controller_with_object();
        let mut panel = ControlPanel::new();
        let reticle = visible_reticle_at(Vec3::ZERO);

        controller.on_tap(&reticle, &mut panel);
        controller.on_swipe(&mut panel);
        assert!(!object.borrow().visible);
        assert!(!panel.is_visible());

        // Swipe on an already-hidden object is a no-op.
        controller.on_swipe(&mut panel);
        assert!(!object.borrow().visible);
    }

    #[test]
    fn hidden_object_can_be_retapped() {
        let (mut controller, object) = controller_with_object();
        let mut panel = ControlPanel::new();
        let reticle = visible_reticle_at(Vec3::new(1.0, 0.0, 0.0));

        controller.on_tap(&reticle, &mut panel);
        controller.on_swipe(&mut panel);

        let reticle = visible_reticle_at(Vec3::new(-1.0, 0.0, 2.0));
        controller.on_tap(&reticle, &mut panel);
        assert!(object.borrow().visible);
        assert_eq!(
            object.borrow().transform.translation,
            Vec3::new(-1.0, 0.0, 2.0)
        );
    }

    #[test]
    fn pinch_snapshot_only_never_scales() {
        let (mut controller, object) = controller_with_object();

        controller.on_pinch(1.0, true);
        controller.on_pinch(2.5, false);
        assert_eq!(object.borrow().transform.scale, Vec3::ONE);
    }

    #[test]
    fn gestures_without_object_are_ignored() {
        let mut controller = ObjectController::new();
        let mut panel = ControlPanel::new();

        controller.on_pan(Vec3::new(0.1, 0.0, 0.0), false);
        controller.on_rotate(0.5, false);
        controller.on_swipe(&mut panel);
        controller.on_tap(&visible_reticle_at(Vec3::ZERO), &mut panel);
        assert!(!panel.is_visible());
    }
}
