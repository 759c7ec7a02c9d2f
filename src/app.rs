use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use crate::camera::Camera;
use crate::control_panel::ControlPanel;
use crate::gestures::{GestureRouter, GestureSource};
use crate::loader::{AssetLoader, LoadEvent, LoadingIndicator};
use crate::object_controller::{ObjectController, PlacedObject};
use crate::params::PlacementParams;
use crate::reticle::Reticle;
use crate::session::{Affordance, SessionEvent, SessionLifecycle, SessionState};
use crate::surface_tracker::SurfaceTracker;
use crate::xr::{RenderSurface, SceneView, XrFrame, XrSystem};

/// Owns every component and the host seams; constructed once at startup and
/// never torn down, with per-session fields reset on session end. The host
/// drives it through `render` once per display refresh plus the input entry
/// points.
pub struct App {
    system: Box<dyn XrSystem>,
    surface: Box<dyn RenderSurface>,
    gesture_source: Box<dyn GestureSource>,
    loader: Box<dyn AssetLoader>,
    params: PlacementParams,

    lifecycle: SessionLifecycle,
    tracker: SurfaceTracker,
    router: GestureRouter,
    controller: ObjectController,
    panel: ControlPanel,
    reticle: Reticle,
    camera: Camera,
    indicator: LoadingIndicator,
    loading: bool,
    load_events: Vec<LoadEvent>,
}

impl App {
    pub fn new(
        system: Box<dyn XrSystem>,
        surface: Box<dyn RenderSurface>,
        gesture_source: Box<dyn GestureSource>,
        loader: Box<dyn AssetLoader>,
        params: PlacementParams,
    ) -> Self {
        let lifecycle = SessionLifecycle::probe(system.as_ref());

        Self {
            system,
            surface,
            gesture_source,
            loader,
            params,
            lifecycle,
            tracker: SurfaceTracker::new(),
            router: GestureRouter::new(),
            controller: ObjectController::new(),
            panel: ControlPanel::new(),
            reticle: Reticle::new(),
            camera: Camera::standing(),
            indicator: LoadingIndicator::new(),
            loading: false,
            load_events: Vec::new(),
        }
    }

    pub fn affordance(&self) -> Affordance {
        self.lifecycle.affordance()
    }

    pub fn session_state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn reticle(&self) -> &Reticle {
        &self.reticle
    }

    pub fn placed_object(&self) -> Option<Rc<RefCell<PlacedObject>>> {
        self.controller.object().cloned()
    }

    pub fn loading_indicator(&self) -> LoadingIndicator {
        self.indicator
    }

    /// The single start/stop control. Starting also kicks off the asset
    /// load the first time around.
    pub fn press_session_toggle(&mut self) {
        match self.lifecycle.state() {
            SessionState::Active => self.lifecycle.end(self.surface.as_mut()),
            SessionState::Idle => {
                self.lifecycle.request_start(self.system.as_mut());
                self.begin_asset_load();
            }
            SessionState::Requesting | SessionState::Disabled => {}
        }
    }

    pub fn panel_pointer_down(&mut self, now: Instant) {
        self.panel.pointer_down(now);
    }

    pub fn panel_pointer_up(&mut self, now: Instant) {
        self.panel.pointer_up(now);
    }

    #[allow(dead_code)]
    pub fn panel_pointer_leave(&mut self) {
        self.panel.pointer_leave();
    }

    /// One rendering callback. Ordering matters: the lifecycle is polled
    /// first so a just-ended session is torn down before any hit-test read,
    /// then tracking, then gesture dispatch, then drawing.
    pub fn render(&mut self, frame: Option<&dyn XrFrame>, now: Instant) {
        match self.lifecycle.update(self.surface.as_mut()) {
            Some(SessionEvent::Started) => self.on_session_start(),
            Some(SessionEvent::Ended) => self.on_session_end(),
            Some(SessionEvent::StartFailed) | None => {}
        }

        self.poll_loader();

        if let Some(frame) = frame {
            if self.lifecycle.state() == SessionState::Active {
                let generation = self.lifecycle.generation();
                if let Some(session) = self.surface.session_mut() {
                    self.tracker
                        .update(session, frame, generation, &mut self.reticle);
                }
            }
        }

        if self.surface.is_presenting() {
            self.router.pump(
                self.gesture_source.as_mut(),
                &mut self.controller,
                &self.reticle,
                &mut self.panel,
            );
        }

        self.panel.tick(now);

        let object = self.controller.object().map(|object| object.borrow());
        self.surface.render(&SceneView {
            camera: &self.camera,
            reticle: &self.reticle,
            object: object.as_deref(),
        });
    }

    fn on_session_start(&mut self) {
        self.reticle.clear();
    }

    /// Clears reticle, object, hit-test source and panel before the next
    /// frame callback can observe the old session.
    fn on_session_end(&mut self) {
        self.tracker.clear();
        self.reticle.clear();
        self.controller.detach();
        self.panel.release_object();
        self.panel.hide();
    }

    fn begin_asset_load(&mut self) {
        if self.loading || self.controller.object().is_some() {
            return;
        }

        let Some((obj_url, texture_url, obj_name)) = self
            .params
            .asset_override()
            .map(|(o, t, n)| (o.to_string(), t.to_string(), n.to_string()))
        else {
            log::warn!("no asset specified, nothing to load");
            return;
        };

        if obj_url.is_empty() || texture_url.is_empty() || obj_name.is_empty() {
            log::warn!("incomplete asset location, nothing to load");
            return;
        }

        self.indicator.visible = true;
        self.indicator.progress = 0.0;
        self.loading = true;
        self.loader.begin_load(&obj_url, &texture_url, &obj_name);
        log::info!("loading asset {:?} from {:?}", obj_name, obj_url);
    }

    fn poll_loader(&mut self) {
        self.load_events.clear();
        self.loader.poll_events(&mut self.load_events);

        for event in self.load_events.drain(..) {
            match event {
                LoadEvent::Progress(fraction) => {
                    self.indicator.progress = fraction;
                    log::info!("{}% downloaded", (fraction * 100.0).round());
                }
                LoadEvent::Loaded(asset) => {
                    let object = Rc::new(RefCell::new(PlacedObject::from_aabb(
                        &asset.aabb,
                        self.params.offset,
                    )));
                    self.controller.attach(Rc::clone(&object));
                    self.panel.set_object(object);
                    self.loading = false;
                    self.indicator.visible = false;
                    log::info!("asset ready, waiting for surface tap");
                }
                LoadEvent::Failed(reason) => {
                    // The indicator is deliberately left as it was.
                    log::error!("asset load failed: {}", reason);
                    self.loading = false;
                }
            }
        }
    }
}
