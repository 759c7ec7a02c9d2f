use crate::xr::{Pending, ReferenceSpaceType, RenderSurface, SessionInit, XrSession, XrSystem};

pub const MSG_AR_NOT_SUPPORTED: &str = "AR NOT SUPPORTED";
pub const MSG_NEEDS_HTTPS: &str = "WEBXR NEEDS HTTPS";
pub const MSG_XR_UNAVAILABLE: &str = "WEBXR NOT AVAILABLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Terminal: no XR, insecure context, or AR unsupported. Reached only
    /// during the initial capability probe, never retried.
    Disabled,
    Idle,
    Requesting,
    Active,
}

/// What the single session toggle presents. Exactly one affordance at a
/// time, never both start and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Start,
    Stop,
    Unsupported(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    /// The host's asynchronous end notification was observed.
    Ended,
    /// The session request was rejected. Not retried.
    StartFailed,
}

/// Immersive session state machine: `Idle → Requesting → Active → Idle`,
/// with `Disabled` as the probe-time terminal state. Owns the session
/// generation counter that stamps in-flight continuations; a fulfillment
/// carrying a stale generation is discarded instead of mutating current
/// state.
pub struct SessionLifecycle {
    state: SessionState,
    affordance: Affordance,
    generation: u64,
    pending_session: Option<(Pending<Box<dyn XrSession>>, u64)>,
}

impl SessionLifecycle {
    /// Capability probe, run once at startup.
    pub fn probe(system: &dyn XrSystem) -> Self {
        let affordance = if !system.has_xr() {
            if system.is_secure_context() {
                Affordance::Unsupported(MSG_XR_UNAVAILABLE)
            } else {
                Affordance::Unsupported(MSG_NEEDS_HTTPS)
            }
        } else if !system.is_ar_supported() {
            Affordance::Unsupported(MSG_AR_NOT_SUPPORTED)
        } else {
            Affordance::Start
        };

        let state = match affordance {
            Affordance::Unsupported(message) => {
                log::warn!("immersive AR disabled: {}", message);
                SessionState::Disabled
            }
            _ => SessionState::Idle,
        };

        Self {
            state,
            affordance,
            generation: 0,
            pending_session: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn affordance(&self) -> Affordance {
        self.affordance
    }

    /// Stamp for continuations issued under the current session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Asks the host for an immersive AR session with `hit-test` required
    /// and `dom-overlay` optional. No-op unless Idle.
    pub fn request_start(&mut self, system: &mut dyn XrSystem) {
        if self.state != SessionState::Idle {
            return;
        }

        self.generation += 1;
        self.state = SessionState::Requesting;
        let pending = system.request_session(&SessionInit::immersive_ar());
        self.pending_session = Some((pending, self.generation));
        log::info!("requesting immersive AR session");
    }

    /// Asks the host to end the active session. The Active→Idle transition
    /// happens when the host's end notification arrives via `update`.
    pub fn end(&mut self, surface: &mut dyn RenderSurface) {
        if self.state != SessionState::Active {
            return;
        }
        if let Some(session) = surface.session_mut() {
            session.end();
        }
    }

    /// Polled once per frame before anything touches the session.
    pub fn update(&mut self, surface: &mut dyn RenderSurface) -> Option<SessionEvent> {
        if self.state == SessionState::Requesting {
            if let Some((pending, stamped)) = self.pending_session.clone() {
                if let Some(result) = pending.take() {
                    self.pending_session = None;
                    return self.on_session_request_resolved(surface, result, stamped);
                }
            }
        }

        if self.state == SessionState::Active {
            let ended = surface
                .session_mut()
                .map(|session| session.take_ended())
                .unwrap_or(false);
            if ended {
                surface.take_session();
                self.state = SessionState::Idle;
                self.affordance = Affordance::Start;
                self.generation += 1;
                log::info!("AR session ended");
                return Some(SessionEvent::Ended);
            }
        }

        None
    }

    fn on_session_request_resolved(
        &mut self,
        surface: &mut dyn RenderSurface,
        result: anyhow::Result<Box<dyn XrSession>>,
        stamped: u64,
    ) -> Option<SessionEvent> {
        if stamped != self.generation {
            log::warn!("dropping session grant from a stale request");
            self.state = SessionState::Idle;
            return None;
        }

        match result {
            Ok(session) => {
                surface.set_reference_space_type(ReferenceSpaceType::Local);
                surface.set_session(session);
                self.state = SessionState::Active;
                self.affordance = Affordance::Stop;
                log::info!("AR session started");
                Some(SessionEvent::Started)
            }
            Err(error) => {
                log::error!("AR session request failed: {:#}", error);
                self.state = SessionState::Idle;
                Some(SessionEvent::StartFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimSurface, SimXr};

    #[test]
    fn probe_branches_on_capabilities() {
        let full = SimXr::new();
        assert_eq!(SessionLifecycle::probe(&full).affordance(), Affordance::Start);

        let unsupported = SimXr::with_capabilities(true, true, false);
        let lifecycle = SessionLifecycle::probe(&unsupported);
        assert_eq!(lifecycle.state(), SessionState::Disabled);
        assert_eq!(
            lifecycle.affordance(),
            Affordance::Unsupported(MSG_AR_NOT_SUPPORTED)
        );

        let insecure = SimXr::with_capabilities(false, false, false);
        assert_eq!(
            SessionLifecycle::probe(&insecure).affordance(),
            Affordance::Unsupported(MSG_NEEDS_HTTPS)
        );

        let no_xr = SimXr::with_capabilities(false, true, false);
        assert_eq!(
            SessionLifecycle::probe(&no_xr).affordance(),
            Affordance::Unsupported(MSG_XR_UNAVAILABLE)
        );
    }

    #[test]
    fn session_request_carries_hit_test_features() {
        use crate::xr::SessionFeature;

        let mut system = SimXr::new();
        let mut lifecycle = SessionLifecycle::probe(&system);
        lifecycle.request_start(&mut system);

        let init = system.last_session_init().unwrap();
        assert_eq!(init.required_features, vec![SessionFeature::HitTest]);
        assert_eq!(init.optional_features, vec![SessionFeature::DomOverlay]);
    }

    #[test]
    fn start_request_resolves_to_active() {
        let mut system = SimXr::new();
        let mut surface = SimSurface::new();
        let mut lifecycle = SessionLifecycle::probe(&system);

        lifecycle.request_start(&mut system);
        assert_eq!(lifecycle.state(), SessionState::Requesting);
        // Still unresolved: nothing happens this frame.
        assert!(lifecycle.update(&mut surface).is_none());

        system.resolve_next_session().unwrap();
        assert_eq!(lifecycle.update(&mut surface), Some(SessionEvent::Started));
        assert_eq!(lifecycle.state(), SessionState::Active);
        assert_eq!(lifecycle.affordance(), Affordance::Stop);
        assert_eq!(
            surface.reference_space_type(),
            Some(ReferenceSpaceType::Local)
        );
        assert!(surface.is_presenting());
    }

    #[test]
    fn rejected_request_returns_to_idle() {
        let mut system = SimXr::new();
        let mut surface = SimSurface::new();
        let mut lifecycle = SessionLifecycle::probe(&system);

        lifecycle.request_start(&mut system);
        system.reject_next_session("user denied");

        assert_eq!(
            lifecycle.update(&mut surface),
            Some(SessionEvent::StartFailed)
        );
        assert_eq!(lifecycle.state(), SessionState::Idle);
        assert_eq!(lifecycle.affordance(), Affordance::Start);
        assert!(!surface.is_presenting());
    }

    #[test]
    fn host_end_notification_transitions_to_idle() {
        let mut system = SimXr::new();
        let mut surface = SimSurface::new();
        let mut lifecycle = SessionLifecycle::probe(&system);

        lifecycle.request_start(&mut system);
        let session = system.resolve_next_session().unwrap();
        lifecycle.update(&mut surface);
        let generation_while_active = lifecycle.generation();

        lifecycle.end(&mut surface);
        assert!(session.end_requested());
        // Transition waits for the host notification.
        assert_eq!(lifecycle.state(), SessionState::Active);

        session.notify_ended();
        assert_eq!(lifecycle.update(&mut surface), Some(SessionEvent::Ended));
        assert_eq!(lifecycle.state(), SessionState::Idle);
        assert!(!surface.is_presenting());
        // Ending invalidates continuations stamped under the old session.
        assert_ne!(lifecycle.generation(), generation_while_active);
    }

    #[test]
    fn request_start_is_ignored_unless_idle() {
        let mut system = SimXr::new();
        let mut surface = SimSurface::new();
        let mut lifecycle = SessionLifecycle::probe(&system);

        lifecycle.request_start(&mut system);
        lifecycle.request_start(&mut system);
        assert_eq!(system.session_request_count(), 1);

        system.resolve_next_session().unwrap();
        lifecycle.update(&mut surface);
        lifecycle.request_start(&mut system);
        assert_eq!(system.session_request_count(), 1);
    }

    #[test]
    fn disabled_state_is_terminal() {
        let mut system = SimXr::with_capabilities(true, true, false);
        let mut lifecycle = SessionLifecycle::probe(&system);

        lifecycle.request_start(&mut system);
        assert_eq!(lifecycle.state(), SessionState::Disabled);
        assert_eq!(system.session_request_count(), 0);
    }
}
