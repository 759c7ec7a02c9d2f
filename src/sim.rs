//! Scripted host implementations of the XR, gesture, render-surface and
//! asset-loader seams. `main` uses them to drive one full headless
//! place-and-manipulate run; the unit tests use the same types with
//! fine-grained control over when each asynchronous step resolves.

// Driver knobs not reached from the demo script are used by the tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context};
use glam::{Mat4, Vec2, Vec3};

use crate::app::App;
use crate::gestures::{GestureEvent, GestureSource};
use crate::loader::{AssetLoader, LoadEvent, LoadedAsset};
use crate::math::Aabb;
use crate::params::PlacementParams;
use crate::session::{Affordance, SessionState};
use crate::xr::{
    HitTestResult, HitTestSource, Pending, ReferenceSpace, ReferenceSpaceType, RenderSurface,
    SceneView, SessionInit, XrFrame, XrSession, XrSystem,
};

// ---------------------------------------------------------------------------
// XR system

struct SimXrState {
    xr_available: bool,
    secure: bool,
    ar_supported: bool,
    requests: VecDeque<Pending<Box<dyn XrSession>>>,
    request_count: usize,
    last_init: Option<SessionInit>,
}

#[derive(Clone)]
pub struct SimXr {
    state: Rc<RefCell<SimXrState>>,
}

impl SimXr {
    pub fn new() -> Self {
        Self::with_capabilities(true, true, true)
    }

    pub fn with_capabilities(xr_available: bool, secure: bool, ar_supported: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimXrState {
                xr_available,
                secure,
                ar_supported,
                requests: VecDeque::new(),
                request_count: 0,
                last_init: None,
            })),
        }
    }

    pub fn session_request_count(&self) -> usize {
        self.state.borrow().request_count
    }

    pub fn last_session_init(&self) -> Option<SessionInit> {
        self.state.borrow().last_init.clone()
    }

    /// Grants the oldest outstanding session request and hands back the
    /// driver-side session handle.
    pub fn resolve_next_session(&mut self) -> Option<SimSession> {
        let pending = self.state.borrow_mut().requests.pop_front()?;
        let session = SimSession::new();
        pending.fulfill(Box::new(session.clone()));
        Some(session)
    }

    pub fn reject_next_session(&mut self, reason: &str) {
        if let Some(pending) = self.state.borrow_mut().requests.pop_front() {
            pending.fail(anyhow::anyhow!("{}", reason));
        }
    }
}

impl XrSystem for SimXr {
    fn has_xr(&self) -> bool {
        self.state.borrow().xr_available
    }

    fn is_secure_context(&self) -> bool {
        self.state.borrow().secure
    }

    fn is_ar_supported(&self) -> bool {
        self.state.borrow().ar_supported
    }

    fn request_session(&mut self, init: &SessionInit) -> Pending<Box<dyn XrSession>> {
        let pending = Pending::waiting();
        let mut state = self.state.borrow_mut();
        state.requests.push_back(pending.clone());
        state.request_count += 1;
        state.last_init = Some(init.clone());
        pending
    }
}

// ---------------------------------------------------------------------------
// Session

struct SimSessionState {
    space_requests: VecDeque<Pending<ReferenceSpace>>,
    source_requests: VecDeque<Pending<HitTestSource>>,
    space_request_count: usize,
    source_request_count: usize,
    next_handle: u32,
    end_requested: bool,
    ended_notification: bool,
}

#[derive(Clone)]
pub struct SimSession {
    state: Rc<RefCell<SimSessionState>>,
}

impl SimSession {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimSessionState {
                space_requests: VecDeque::new(),
                source_requests: VecDeque::new(),
                space_request_count: 0,
                source_request_count: 0,
                next_handle: 0,
                end_requested: false,
                ended_notification: false,
            })),
        }
    }

    pub fn space_request_count(&self) -> usize {
        self.state.borrow().space_request_count
    }

    pub fn source_request_count(&self) -> usize {
        self.state.borrow().source_request_count
    }

    pub fn end_requested(&self) -> bool {
        self.state.borrow().end_requested
    }

    pub fn grant_viewer_space(&self) {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = state.next_handle;
        if let Some(pending) = state.space_requests.pop_front() {
            pending.fulfill(ReferenceSpace(handle));
        }
    }

    pub fn reject_viewer_space(&self, reason: &str) {
        if let Some(pending) = self.state.borrow_mut().space_requests.pop_front() {
            pending.fail(anyhow::anyhow!("{}", reason));
        }
    }

    pub fn grant_hit_test_source(&self) {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = state.next_handle;
        if let Some(pending) = state.source_requests.pop_front() {
            pending.fulfill(HitTestSource(handle));
        }
    }

    /// Queues the host's asynchronous "ended" notification.
    pub fn notify_ended(&self) {
        self.state.borrow_mut().ended_notification = true;
    }
}

impl XrSession for SimSession {
    fn request_reference_space(&mut self, _ty: ReferenceSpaceType) -> Pending<ReferenceSpace> {
        let pending = Pending::waiting();
        let mut state = self.state.borrow_mut();
        state.space_requests.push_back(pending.clone());
        state.space_request_count += 1;
        pending
    }

    fn request_hit_test_source(&mut self, _space: ReferenceSpace) -> Pending<HitTestSource> {
        let pending = Pending::waiting();
        let mut state = self.state.borrow_mut();
        state.source_requests.push_back(pending.clone());
        state.source_request_count += 1;
        pending
    }

    fn end(&mut self) {
        self.state.borrow_mut().end_requested = true;
    }

    fn take_ended(&mut self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().ended_notification)
    }
}

// ---------------------------------------------------------------------------
// Frame

pub struct SimFrame {
    results: Vec<HitTestResult>,
}

impl SimFrame {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
        }
    }

    pub fn with_hit(pose: Mat4) -> Self {
        Self {
            results: vec![HitTestResult { pose }],
        }
    }
}

impl XrFrame for SimFrame {
    fn hit_test_results(&self, _source: HitTestSource) -> Vec<HitTestResult> {
        self.results.clone()
    }
}

// ---------------------------------------------------------------------------
// Render surface

const SIM_RESOLUTION: Vec2 = Vec2::new(1280.0, 720.0);

#[derive(Default)]
struct SimSurfaceStats {
    presenting: bool,
    reference_space_type: Option<ReferenceSpaceType>,
    frames_rendered: u64,
    last_reticle_visible: bool,
    last_object_visible: Option<bool>,
    last_view_projection: Option<Mat4>,
}

/// Inspection handle into a `SimSurface` that has been boxed away.
#[derive(Clone)]
pub struct SimSurfaceProbe {
    stats: Rc<RefCell<SimSurfaceStats>>,
}

impl SimSurfaceProbe {
    pub fn frames_rendered(&self) -> u64 {
        self.stats.borrow().frames_rendered
    }

    pub fn last_reticle_visible(&self) -> bool {
        self.stats.borrow().last_reticle_visible
    }

    pub fn last_object_visible(&self) -> Option<bool> {
        self.stats.borrow().last_object_visible
    }

    pub fn last_view_projection(&self) -> Option<Mat4> {
        self.stats.borrow().last_view_projection
    }
}

pub struct SimSurface {
    session: Option<Box<dyn XrSession>>,
    stats: Rc<RefCell<SimSurfaceStats>>,
}

impl SimSurface {
    pub fn new() -> Self {
        Self {
            session: None,
            stats: Rc::new(RefCell::new(SimSurfaceStats::default())),
        }
    }

    pub fn probe(&self) -> SimSurfaceProbe {
        SimSurfaceProbe {
            stats: Rc::clone(&self.stats),
        }
    }

    pub fn reference_space_type(&self) -> Option<ReferenceSpaceType> {
        self.stats.borrow().reference_space_type
    }
}

impl RenderSurface for SimSurface {
    fn is_presenting(&self) -> bool {
        self.stats.borrow().presenting
    }

    fn set_reference_space_type(&mut self, ty: ReferenceSpaceType) {
        self.stats.borrow_mut().reference_space_type = Some(ty);
    }

    fn set_session(&mut self, session: Box<dyn XrSession>) {
        self.session = Some(session);
        self.stats.borrow_mut().presenting = true;
    }

    fn session_mut(&mut self) -> Option<&mut (dyn XrSession + 'static)> {
        self.session.as_deref_mut()
    }

    fn take_session(&mut self) -> Option<Box<dyn XrSession>> {
        self.stats.borrow_mut().presenting = false;
        self.session.take()
    }

    fn render(&mut self, view: &SceneView) {
        let mut stats = self.stats.borrow_mut();
        stats.frames_rendered += 1;
        stats.last_reticle_visible = view.reticle.visible;
        stats.last_object_visible = view.object.map(|object| object.visible);
        stats.last_view_projection = Some(view.camera.get_vp_matrix(SIM_RESOLUTION));
    }
}

// ---------------------------------------------------------------------------
// Gestures

#[derive(Clone)]
pub struct SimGestures {
    queue: Rc<RefCell<Vec<GestureEvent>>>,
}

impl SimGestures {
    pub fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn push(&self, event: GestureEvent) {
        self.queue.borrow_mut().push(event);
    }
}

impl GestureSource for SimGestures {
    fn poll_events(&mut self, out: &mut Vec<GestureEvent>) {
        out.append(&mut self.queue.borrow_mut());
    }
}

// ---------------------------------------------------------------------------
// Asset loader

struct SimLoaderState {
    requests: Vec<(String, String, String)>,
    events: Vec<LoadEvent>,
}

#[derive(Clone)]
pub struct SimLoader {
    state: Rc<RefCell<SimLoaderState>>,
}

impl SimLoader {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimLoaderState {
                requests: Vec::new(),
                events: Vec::new(),
            })),
        }
    }

    pub fn request_count(&self) -> usize {
        self.state.borrow().requests.len()
    }

    pub fn last_request(&self) -> Option<(String, String, String)> {
        self.state.borrow().requests.last().cloned()
    }

    pub fn push_progress(&self, fraction: f32) {
        self.state
            .borrow_mut()
            .events
            .push(LoadEvent::Progress(fraction));
    }

    pub fn push_loaded(&self, aabb: Aabb) {
        self.state
            .borrow_mut()
            .events
            .push(LoadEvent::Loaded(LoadedAsset { aabb }));
    }

    pub fn push_failed(&self, reason: &str) {
        self.state
            .borrow_mut()
            .events
            .push(LoadEvent::Failed(reason.to_string()));
    }
}

impl AssetLoader for SimLoader {
    fn begin_load(&mut self, obj_url: &str, texture_url: &str, obj_name: &str) {
        self.state.borrow_mut().requests.push((
            obj_url.to_string(),
            texture_url.to_string(),
            obj_name.to_string(),
        ));
    }

    fn poll_events(&mut self, out: &mut Vec<LoadEvent>) {
        out.append(&mut self.state.borrow_mut().events);
    }
}

// ---------------------------------------------------------------------------
// Demo run

const FRAME_TIME: Duration = Duration::from_millis(16);

/// Drives one scripted start→load→place→manipulate→end run and verifies the
/// teardown postconditions along the way.
pub fn run_demo(params: PlacementParams) -> anyhow::Result<()> {
    ensure!(
        params.asset_override().is_some(),
        "the demo needs objurl, txurl and objname in the query string"
    );

    let mut xr = SimXr::new();
    let surface = SimSurface::new();
    let surface_probe = surface.probe();
    let gestures = SimGestures::new();
    let loader = SimLoader::new();

    let mut app = App::new(
        Box::new(xr.clone()),
        Box::new(surface),
        Box::new(gestures.clone()),
        Box::new(loader.clone()),
        params,
    );
    ensure!(
        app.affordance() == Affordance::Start,
        "this host supports AR, the toggle should offer start"
    );

    fn step(app: &mut App, now: &mut Instant, frame: Option<&SimFrame>) {
        *now += FRAME_TIME;
        app.render(frame.map(|f| f as &dyn XrFrame), *now);
    }

    let mut now = Instant::now();

    // Start: the toggle both requests the session and kicks off the load.
    app.press_session_toggle();
    let session = xr
        .resolve_next_session()
        .context("host never saw a session request")?;
    step(&mut app, &mut now, None);

    ensure!(
        loader.request_count() == 1,
        "asset load should start with the session request"
    );
    loader.push_progress(0.4);
    loader.push_progress(1.0);
    loader.push_loaded(Aabb::new(
        Vec3::new(-0.5, 0.0, -0.5),
        Vec3::new(0.5, 1.0, 0.5),
    ));
    step(&mut app, &mut now, Some(&SimFrame::empty()));
    ensure!(
        !app.loading_indicator().visible,
        "loading bar should be gone once the asset is ready"
    );
    log::debug!("final load progress {}", app.loading_indicator().progress);
    if let Some(object) = app.placed_object() {
        let object = object.borrow();
        log::info!(
            "asset bounds {:?} around {:?}, start offset {:?}",
            object.bounding_size,
            object.bounding_center,
            object.start_offset
        );
    }
    session.grant_viewer_space();
    step(&mut app, &mut now, Some(&SimFrame::empty()));
    session.grant_hit_test_source();

    // Surface found: the reticle snaps to it.
    let floor = Mat4::from_translation(Vec3::new(0.1, 0.0, -1.2));
    step(&mut app, &mut now, Some(&SimFrame::with_hit(floor)));
    ensure!(app.reticle().visible, "reticle should be on the surface");

    // Place, drag along the ground, and spin.
    gestures.push(GestureEvent::Tap);
    step(&mut app, &mut now, Some(&SimFrame::with_hit(floor)));
    let object = app.placed_object().context("no object after tap")?;
    ensure!(object.borrow().visible, "object should be visible after tap");

    gestures.push(GestureEvent::Pan {
        delta: Vec3::ZERO,
        initial: true,
    });
    gestures.push(GestureEvent::Pan {
        delta: Vec3::new(0.01, 0.0, -0.005),
        initial: false,
    });
    gestures.push(GestureEvent::Rotate {
        theta: 0.0,
        initial: true,
    });
    gestures.push(GestureEvent::Rotate {
        theta: 0.04,
        initial: false,
    });
    step(&mut app, &mut now, Some(&SimFrame::with_hit(floor)));
    ensure!(
        surface_probe.last_reticle_visible() && surface_probe.last_object_visible() == Some(true),
        "renderer should see both reticle and object"
    );
    log::info!(
        "object after gestures: translation {:?}",
        object.borrow().transform.translation
    );

    // Hold the rotate control past the grace delay.
    app.panel_pointer_down(now);
    for _ in 0..20 {
        step(&mut app, &mut now, Some(&SimFrame::with_hit(floor)));
    }
    app.panel_pointer_up(now);

    // The reserved gestures are accepted and ignored; swipe dismisses, and
    // a fresh tap brings the object back.
    gestures.push(GestureEvent::DoubleTap);
    gestures.push(GestureEvent::Press);
    gestures.push(GestureEvent::Pinch {
        scale: 1.5,
        initial: true,
    });
    gestures.push(GestureEvent::Swipe);
    step(&mut app, &mut now, Some(&SimFrame::with_hit(floor)));
    ensure!(
        !object.borrow().visible,
        "swipe should dismiss the object"
    );

    gestures.push(GestureEvent::Tap);
    step(&mut app, &mut now, Some(&SimFrame::with_hit(floor)));
    ensure!(
        object.borrow().visible,
        "tap should reveal the dismissed object"
    );

    // Stop: teardown must clear everything before the next frame.
    app.press_session_toggle();
    ensure!(session.end_requested(), "host should see the end request");
    session.notify_ended();
    step(&mut app, &mut now, None);

    ensure!(!app.reticle().visible, "reticle must clear on session end");
    ensure!(
        app.placed_object().is_none(),
        "object must be released on session end"
    );
    ensure!(
        app.session_state() == SessionState::Idle,
        "toggle should be back to start"
    );
    log::info!(
        "demo finished after {} rendered frames",
        surface_probe.frames_rendered()
    );
    Ok(())
}
