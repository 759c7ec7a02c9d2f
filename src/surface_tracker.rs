use crate::reticle::Reticle;
use crate::xr::{HitTestSource, Pending, ReferenceSpace, ReferenceSpaceType, XrFrame, XrSession};

/// Per-frame surface probe. The first eligible frame starts a one-shot
/// asynchronous chain (viewer reference space, then a hit-test source bound
/// to it); later frames reuse the acquired source. Exactly one source is
/// requested per session; `clear` on session end makes the next session
/// re-acquire from scratch.
pub struct SurfaceTracker {
    hit_test_source: Option<HitTestSource>,
    hit_test_source_requested: bool,
    pending_space: Option<(Pending<ReferenceSpace>, u64)>,
    pending_source: Option<(Pending<HitTestSource>, u64)>,
}

impl SurfaceTracker {
    pub fn new() -> Self {
        Self {
            hit_test_source: None,
            hit_test_source_requested: false,
            pending_space: None,
            pending_source: None,
        }
    }

    #[allow(dead_code)]
    pub fn has_source(&self) -> bool {
        self.hit_test_source.is_some()
    }

    /// Runs once per rendered frame while a session is active and frame
    /// data is available. While the acquisition chain is still in flight no
    /// hit test happens and the reticle keeps its previous visibility.
    pub fn update(
        &mut self,
        session: &mut dyn XrSession,
        frame: &dyn XrFrame,
        generation: u64,
        reticle: &mut Reticle,
    ) {
        if !self.hit_test_source_requested {
            self.hit_test_source_requested = true;
            self.pending_space = Some((
                session.request_reference_space(ReferenceSpaceType::Viewer),
                generation,
            ));
        }

        if let Some((pending, stamped)) = self.pending_space.clone() {
            if let Some(result) = pending.take() {
                self.pending_space = None;
                match result {
                    _ if stamped != generation => {
                        log::warn!("dropping viewer space from a stale session");
                    }
                    Ok(space) => {
                        self.pending_source =
                            Some((session.request_hit_test_source(space), generation));
                    }
                    Err(error) => {
                        log::error!("viewer reference space request failed: {:#}", error);
                    }
                }
            }
        }

        if let Some((pending, stamped)) = self.pending_source.clone() {
            if let Some(result) = pending.take() {
                self.pending_source = None;
                match result {
                    _ if stamped != generation => {
                        log::warn!("dropping hit-test source from a stale session");
                    }
                    Ok(source) => self.hit_test_source = Some(source),
                    Err(error) => {
                        log::error!("hit-test source request failed: {:#}", error);
                    }
                }
            }
        }

        if let Some(source) = self.hit_test_source {
            let results = frame.hit_test_results(source);
            match results.first() {
                Some(hit) => {
                    reticle.visible = true;
                    // Raw per-frame pose, no smoothing.
                    reticle.pose = hit.pose;
                }
                None => reticle.visible = false,
            }
        }
    }

    /// Session teardown: drop the source, the requested flag and any
    /// in-flight continuations before the next frame callback runs.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for SurfaceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimFrame, SimSession};
    use glam::{Mat4, Vec3};

    fn acquire_source(tracker: &mut SurfaceTracker, session: &SimSession, reticle: &mut Reticle) {
        let mut xr_session = session.clone();
        let frame = SimFrame::empty();

        // Frame 1 requests the viewer space.
        tracker.update(&mut xr_session, &frame, 1, reticle);
        session.grant_viewer_space();
        // Frame 2 chains into the hit-test source request.
        tracker.update(&mut xr_session, &frame, 1, reticle);
        session.grant_hit_test_source();
        tracker.update(&mut xr_session, &frame, 1, reticle);
        assert!(tracker.has_source());
    }

    #[test]
    fn reticle_follows_latest_hit_result() {
        let session = SimSession::new();
        let mut tracker = SurfaceTracker::new();
        let mut reticle = Reticle::new();
        acquire_source(&mut tracker, &session, &mut reticle);

        let pose = Mat4::from_translation(Vec3::new(0.2, 0.0, -1.5));
        tracker.update(
            &mut session.clone(),
            &SimFrame::with_hit(pose),
            1,
            &mut reticle,
        );
        assert!(reticle.visible);
        assert_eq!(reticle.pose, pose);

        tracker.update(&mut session.clone(), &SimFrame::empty(), 1, &mut reticle);
        assert!(!reticle.visible);

        let pose2 = Mat4::from_translation(Vec3::new(-1.0, 0.0, -0.5));
        tracker.update(
            &mut session.clone(),
            &SimFrame::with_hit(pose2),
            1,
            &mut reticle,
        );
        assert!(reticle.visible);
        assert_eq!(reticle.pose, pose2);
    }

    #[test]
    fn source_is_requested_exactly_once_per_session() {
        let session = SimSession::new();
        let mut tracker = SurfaceTracker::new();
        let mut reticle = Reticle::new();
        acquire_source(&mut tracker, &session, &mut reticle);

        for _ in 0..5 {
            tracker.update(&mut session.clone(), &SimFrame::empty(), 1, &mut reticle);
        }
        assert_eq!(session.space_request_count(), 1);
        assert_eq!(session.source_request_count(), 1);
    }

    #[test]
    fn reticle_unchanged_while_setup_in_flight() {
        let session = SimSession::new();
        let mut tracker = SurfaceTracker::new();
        let mut reticle = Reticle::new();
        reticle.visible = true;

        // Nothing granted yet: hit data exists but no source to query.
        tracker.update(
            &mut session.clone(),
            &SimFrame::with_hit(Mat4::IDENTITY),
            1,
            &mut reticle,
        );
        assert!(reticle.visible);
        assert!(!tracker.has_source());
    }

    #[test]
    fn clear_forces_reacquisition() {
        let session = SimSession::new();
        let mut tracker = SurfaceTracker::new();
        let mut reticle = Reticle::new();
        acquire_source(&mut tracker, &session, &mut reticle);

        tracker.clear();
        assert!(!tracker.has_source());

        tracker.update(&mut session.clone(), &SimFrame::empty(), 2, &mut reticle);
        assert_eq!(session.space_request_count(), 2);
    }

    #[test]
    fn stale_generation_fulfillment_is_discarded() {
        let session = SimSession::new();
        let mut tracker = SurfaceTracker::new();
        let mut reticle = Reticle::new();

        tracker.update(&mut session.clone(), &SimFrame::empty(), 1, &mut reticle);
        session.grant_viewer_space();
        // The session generation moved on before the grant was observed.
        tracker.update(&mut session.clone(), &SimFrame::empty(), 2, &mut reticle);
        assert_eq!(session.source_request_count(), 0);
        assert!(!tracker.has_source());
    }

    #[test]
    fn failed_space_request_degrades_quietly() {
        let session = SimSession::new();
        let mut tracker = SurfaceTracker::new();
        let mut reticle = Reticle::new();

        tracker.update(&mut session.clone(), &SimFrame::empty(), 1, &mut reticle);
        session.reject_viewer_space("tracking lost");
        tracker.update(&mut session.clone(), &SimFrame::empty(), 1, &mut reticle);

        assert!(!tracker.has_source());
        assert!(!reticle.visible);
    }
}
