use glam::Vec3;

use crate::control_panel::ControlPanel;
use crate::object_controller::ObjectController;
use crate::reticle::Reticle;

/// One classified multi-touch event from the external gesture source.
/// Continuous gestures mark their first event with `initial`, which is when
/// the controller snapshots starting state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    Tap,
    DoubleTap,
    Press,
    Pan { delta: Vec3, initial: bool },
    Swipe,
    Pinch { scale: f32, initial: bool },
    Rotate { theta: f32, initial: bool },
}

/// External touch classifier. Events accumulate between frames and are
/// drained in delivery order while the session presents.
pub trait GestureSource {
    fn poll_events(&mut self, out: &mut Vec<GestureEvent>);
}

/// Dispatches gesture events to the object controller, one handler
/// invocation per event, no buffering or coalescing.
pub struct GestureRouter {
    queue: Vec<GestureEvent>,
}

impl GestureRouter {
    pub fn new() -> Self {
        Self { queue: Vec::new() }
    }

    pub fn pump(
        &mut self,
        source: &mut dyn GestureSource,
        controller: &mut ObjectController,
        reticle: &Reticle,
        panel: &mut ControlPanel,
    ) {
        self.queue.clear();
        source.poll_events(&mut self.queue);

        for event in self.queue.drain(..) {
            route(event, controller, reticle, panel);
        }
    }
}

impl Default for GestureRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn route(
    event: GestureEvent,
    controller: &mut ObjectController,
    reticle: &Reticle,
    panel: &mut ControlPanel,
) {
    match event {
        GestureEvent::Tap => controller.on_tap(reticle, panel),
        GestureEvent::DoubleTap => controller.on_double_tap(),
        GestureEvent::Press => controller.on_press(),
        GestureEvent::Pan { delta, initial } => controller.on_pan(delta, initial),
        GestureEvent::Swipe => controller.on_swipe(panel),
        GestureEvent::Pinch { scale, initial } => controller.on_pinch(scale, initial),
        GestureEvent::Rotate { theta, initial } => controller.on_rotate(theta, initial),
    }
}
