use std::cell::RefCell;
use std::f32::consts::PI;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::object_controller::PlacedObject;

const ROTATE_STEP: f32 = PI / 100.0;
const REPEAT_PERIOD: Duration = Duration::from_millis(10);
// A press shorter than this is a click; repeating starts only after it.
const HOLD_GRACE: Duration = Duration::from_millis(250);

struct PressState {
    next_tick: Instant,
    repeated: bool,
}

/// On-screen rotate control, hidden until an object is placed. A click
/// applies exactly one yaw increment; holding repeats the increment every
/// tick once the grace delay has passed, and a press that entered the
/// repeat path does not also count as a click on release.
pub struct ControlPanel {
    visible: bool,
    object: Option<Rc<RefCell<PlacedObject>>>,
    press: Option<PressState>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self {
            visible: false,
            object: None,
            press: None,
        }
    }

    pub fn set_object(&mut self, object: Rc<RefCell<PlacedObject>>) {
        self.object = Some(object);
    }

    pub fn release_object(&mut self) {
        self.object = None;
        self.press = None;
    }

    /// Display toggle only; the held object reference is untouched.
    pub fn show(&mut self) {
        self.visible = true;
    }

    /// Display toggle only; the held object reference is untouched.
    pub fn hide(&mut self) {
        self.visible = false;
        self.press = None;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn pointer_down(&mut self, now: Instant) {
        if !self.visible {
            return;
        }
        self.press = Some(PressState {
            next_tick: now + HOLD_GRACE,
            repeated: false,
        });
    }

    pub fn pointer_up(&mut self, _now: Instant) {
        if let Some(press) = self.press.take() {
            if !press.repeated {
                self.rotate_once();
            }
        }
    }

    /// The pointer leaving the control cancels the press without a click.
    pub fn pointer_leave(&mut self) {
        self.press = None;
    }

    /// Driven once per rendered frame; catches up on all repeat periods
    /// elapsed since the last call.
    pub fn tick(&mut self, now: Instant) {
        let steps = match &mut self.press {
            None => return,
            Some(press) => {
                let mut steps = 0u32;
                while press.next_tick <= now {
                    press.next_tick += REPEAT_PERIOD;
                    steps += 1;
                }
                if steps > 0 {
                    press.repeated = true;
                }
                steps
            }
        };

        for _ in 0..steps {
            self.rotate_once();
        }
    }

    fn rotate_once(&mut self) {
        if let Some(object) = &self.object {
            object.borrow_mut().transform.rotate_y(ROTATE_STEP);
        }
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}
