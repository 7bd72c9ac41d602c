//! Progress accumulation and load-state machine.
//!
//! Percentages are monotonic: the tracker accumulates in f64, clamps at
//! 100, and never reports a value below the previous one. Fixed-weight
//! phases fire once each; geometry contributes proportionally to the total
//! geometry count and completion forces the final 100 so rounding can
//! never leave the UI stalled just below it.

/// Load phase attached to a progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadPhase {
    /// Node hierarchy assembled.
    Tree,
    /// All requested meshes arrived.
    Mesh,
    /// All requested materials arrived.
    Material,
    /// All requested textures arrived.
    Texture,
    /// One geometry payload applied.
    Geometry,
    /// Scene fully assembled.
    Completed,
}

/// Coarse load state, advancing monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadState {
    Started,
    FinishedHierarchy,
    FinishedMesh,
    FinishedGeometry,
}

/// Whether the running retrieval delivers the initial scene or a partial
/// update. Gates which completion callbacks fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalType {
    Initial,
    Partial,
}

/// Payload of `content_changes_progress` notifications.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Monotonic percentage in `0..=100`.
    pub percentage: f32,
    pub phase: LoadPhase,
}

const TREE_WEIGHT: f64 = 10.0;
const MESH_WEIGHT: f64 = 10.0;
const MATERIAL_WEIGHT: f64 = 10.0;
const TEXTURE_WEIGHT: f64 = 10.0;
const GEOMETRY_WEIGHT: f64 = 61.0;

#[derive(Debug)]
pub(crate) struct ProgressTracker {
    accumulated: f64,
    reported: f32,
    state: LoadState,
    retrieval: RetrievalType,
    total_geometry: usize,

    tree_fired: bool,
    mesh_fired: bool,
    material_fired: bool,
    texture_fired: bool,

    pub(crate) initial_view_fired: bool,
    pub(crate) scene_completed_fired: bool,
    pub(crate) initial_finished_fired: bool,
    pub(crate) partial_armed: bool,
}

impl ProgressTracker {
    pub(crate) fn new() -> Self {
        Self {
            accumulated: 0.0,
            reported: 0.0,
            state: LoadState::Started,
            retrieval: RetrievalType::Initial,
            total_geometry: 0,
            tree_fired: false,
            mesh_fired: false,
            material_fired: false,
            texture_fired: false,
            initial_view_fired: false,
            scene_completed_fired: false,
            initial_finished_fired: false,
            partial_armed: false,
        }
    }

    pub(crate) fn state(&self) -> LoadState {
        self.state
    }

    /// Advances the state machine. Regressions are ignored.
    pub(crate) fn advance(&mut self, to: LoadState) -> bool {
        if to > self.state {
            self.state = to;
            true
        } else {
            false
        }
    }

    pub(crate) fn retrieval(&self) -> RetrievalType {
        self.retrieval
    }

    pub(crate) fn set_retrieval(&mut self, retrieval: RetrievalType) {
        self.retrieval = retrieval;
        if retrieval == RetrievalType::Partial {
            self.partial_armed = true;
        }
    }

    /// Updates the geometry-weight denominator.
    pub(crate) fn set_total_geometry(&mut self, total: usize) {
        self.total_geometry = total;
    }

    /// Accumulates the weight of `phase` and returns the update to emit,
    /// if any. Fixed-weight phases contribute once; repeats return `None`.
    pub(crate) fn add_phase(&mut self, phase: LoadPhase) -> Option<ProgressUpdate> {
        let weight = match phase {
            LoadPhase::Tree => {
                if self.tree_fired {
                    return None;
                }
                self.tree_fired = true;
                TREE_WEIGHT
            }
            LoadPhase::Mesh => {
                if self.mesh_fired {
                    return None;
                }
                self.mesh_fired = true;
                MESH_WEIGHT
            }
            LoadPhase::Material => {
                if self.material_fired {
                    return None;
                }
                self.material_fired = true;
                MATERIAL_WEIGHT
            }
            LoadPhase::Texture => {
                if self.texture_fired {
                    return None;
                }
                self.texture_fired = true;
                TEXTURE_WEIGHT
            }
            LoadPhase::Geometry => GEOMETRY_WEIGHT / self.total_geometry.max(1) as f64,
            LoadPhase::Completed => return self.force_complete(),
        };
        self.accumulated = (self.accumulated + weight).min(100.0);
        Some(self.report(phase))
    }

    /// Drives the percentage to exactly 100.
    ///
    /// Returns `None` when 100 was already reported.
    pub(crate) fn force_complete(&mut self) -> Option<ProgressUpdate> {
        self.accumulated = 100.0;
        if self.reported >= 100.0 {
            return None;
        }
        Some(self.report(LoadPhase::Completed))
    }

    fn report(&mut self, phase: LoadPhase) -> ProgressUpdate {
        // Never report backwards, whatever the accumulator did.
        let percentage = (self.accumulated as f32).clamp(self.reported, 100.0);
        self.reported = percentage;
        ProgressUpdate { percentage, phase }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_phases_fire_once() {
        let mut tracker = ProgressTracker::new();
        let first = tracker.add_phase(LoadPhase::Tree).unwrap();
        assert_eq!(first.percentage, 10.0);
        assert!(tracker.add_phase(LoadPhase::Tree).is_none());
    }

    #[test]
    fn geometry_weight_splits_over_count() {
        let mut tracker = ProgressTracker::new();
        tracker.set_total_geometry(4);
        for _ in 0..4 {
            tracker.add_phase(LoadPhase::Geometry).unwrap();
        }
        let update = tracker.add_phase(LoadPhase::Mesh).unwrap();
        assert!((update.percentage - 71.0).abs() < 0.01);
    }

    #[test]
    fn percentage_never_exceeds_100() {
        let mut tracker = ProgressTracker::new();
        tracker.set_total_geometry(1);
        for _ in 0..10 {
            if let Some(update) = tracker.add_phase(LoadPhase::Geometry) {
                assert!(update.percentage <= 100.0);
            }
        }
    }

    #[test]
    fn completion_forces_100_once() {
        let mut tracker = ProgressTracker::new();
        tracker.add_phase(LoadPhase::Tree);
        let update = tracker.force_complete().unwrap();
        assert_eq!(update.percentage, 100.0);
        assert!(tracker.force_complete().is_none());
    }

    #[test]
    fn state_never_regresses() {
        let mut tracker = ProgressTracker::new();
        assert!(tracker.advance(LoadState::FinishedMesh));
        assert!(!tracker.advance(LoadState::FinishedHierarchy));
        assert_eq!(tracker.state(), LoadState::FinishedMesh);
        assert!(tracker.advance(LoadState::FinishedGeometry));
    }
}
