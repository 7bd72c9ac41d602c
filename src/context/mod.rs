//! Scene assembly orchestration.
//!
//! [`SceneContext`] is the heart of the crate: one instance per in-flight
//! scene load, mutated exclusively by the payload entry points the loader
//! invokes as responses arrive. It reconciles out-of-order, partial and
//! dependent payloads into one consistent scene on the
//! [`SceneBuilder`](crate::builder::SceneBuilder) sink, tracks which
//! resources are still pending per category, and emits deterministic
//! progress and completion milestones.
//!
//! The context is strictly single-threaded. The loader may have any number
//! of requests in flight, so entry points tolerate any interleaving order:
//! dependency tracking is idempotent by id and tree assembly retries
//! out-of-order parents.
//!
//! # Reporting contract
//!
//! Entry points return `SceneResult<Vec<SceneError>>`. An `Err` means the
//! payload itself was malformed and nothing was applied. The `Ok` vector
//! carries per-item errors for work that was skipped while the rest of the
//! payload went through; completion accounting stays correct either way.

mod animation;
mod progress;
mod resource;
#[cfg(test)]
mod tests;
mod tree;
mod view;

pub use progress::{LoadPhase, LoadState, ProgressUpdate, RetrievalType};

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::builder::{AnnotationInstance, Playback, SceneBuilder, Sequence, Track};
use crate::error::{SceneError, SceneResult};
use crate::event::EventRegistry;
use crate::geometry::GeometryFactory;
use crate::payload::{self, SceneRootPayload, TreeNodePayload};
use crate::queue::{RequestCategory, RequestMeta, RequestQueues};

use progress::ProgressTracker;
use view::{ViewGroupState, ViewState};

/// Milestone registries exposed to the loader.
///
/// Subscribe before feeding payloads; all registries are cleared by
/// [`SceneContext::dispose`].
#[derive(Debug, Default)]
pub struct SceneEvents {
    /// The initial retrieval fully assembled.
    pub initial_scene_finished: EventRegistry<()>,
    /// A partial retrieval fully assembled. Fires once per partial
    /// retrieval.
    pub partial_retrieval_finished: EventRegistry<()>,
    /// Every request queue drained for the first time.
    pub scene_completed: EventRegistry<()>,
    /// A view finished building. Carries the view id.
    pub view_finished: EventRegistry<String>,
    /// Every view of a group finished building. Carries the group id.
    pub view_group_finished: EventRegistry<String>,
    /// Weighted progress tick.
    pub content_changes_progress: EventRegistry<ProgressUpdate>,
    /// The initial view's meshes, geometry meshes and textures all
    /// arrived. Carries the view id.
    pub initial_view_completed: EventRegistry<String>,
    /// The initial view's activation camera became known. Carries the
    /// camera id.
    pub active_camera: EventRegistry<String>,
    /// A playback definition arrived.
    pub set_playback: EventRegistry<Playback>,
}

impl SceneEvents {
    fn clear_all(&mut self) {
        self.initial_scene_finished.clear();
        self.partial_retrieval_finished.clear();
        self.scene_completed.clear();
        self.view_finished.clear();
        self.view_group_finished.clear();
        self.content_changes_progress.clear();
        self.initial_view_completed.clear();
        self.active_camera.clear();
        self.set_playback.clear();
    }
}

/// Orchestrates the assembly of one streamed scene.
///
/// Constructed by the loader when a scene load starts and disposed when
/// the loader is done with it. All maps are keyed by the string
/// identifiers the stream uses.
pub struct SceneContext<S: SceneBuilder> {
    builder: S,
    factory: GeometryFactory,
    queues: RequestQueues,
    events: SceneEvents,
    progress: ProgressTracker,

    // Tree assembly. The batch lives until the next build pass; the
    // replaced set only within one pass.
    tree_nodes: Vec<TreeNodePayload>,
    partial_tree_sids: HashSet<String>,
    replaced_sids: Vec<String>,

    // Reverse indices from resource ids to their dependents.
    mesh_nodes: HashMap<String, Vec<String>>,
    parametric_nodes: HashMap<String, Vec<String>>,
    annotation_nodes: HashMap<String, Vec<String>>,
    material_nodes: HashMap<String, Vec<String>>,
    material_annotations: HashMap<String, Vec<AnnotationInstance>>,
    texture_materials: HashMap<String, Vec<String>>,

    // Views.
    views: HashMap<String, ViewState>,
    view_groups: HashMap<String, ViewGroupState>,
    initial_view_id: Option<String>,
    default_view_id: Option<String>,
    default_view_group_id: Option<String>,
    built_views: HashSet<String>,
    active_camera_fired: bool,

    // Animation.
    sequences: HashMap<String, Sequence>,
    tracks: HashMap<String, Track>,
    track_order: Vec<String>,
    playbacks: Vec<Playback>,
    animation_finalized: bool,
}

impl<S: SceneBuilder> SceneContext<S> {
    /// Creates a context that assembles into `builder`.
    pub fn new(builder: S) -> Self {
        Self {
            builder,
            factory: GeometryFactory::new(),
            queues: RequestQueues::new(),
            events: SceneEvents::default(),
            progress: ProgressTracker::new(),
            tree_nodes: Vec::new(),
            partial_tree_sids: HashSet::new(),
            replaced_sids: Vec::new(),
            mesh_nodes: HashMap::new(),
            parametric_nodes: HashMap::new(),
            annotation_nodes: HashMap::new(),
            material_nodes: HashMap::new(),
            material_annotations: HashMap::new(),
            texture_materials: HashMap::new(),
            views: HashMap::new(),
            view_groups: HashMap::new(),
            initial_view_id: None,
            default_view_id: None,
            default_view_group_id: None,
            built_views: HashSet::new(),
            active_camera_fired: false,
            sequences: HashMap::new(),
            tracks: HashMap::new(),
            track_order: Vec::new(),
            playbacks: Vec::new(),
            animation_finalized: false,
        }
    }

    /// The sink being assembled into.
    pub fn builder(&self) -> &S {
        &self.builder
    }

    /// Mutable access to the sink.
    pub fn builder_mut(&mut self) -> &mut S {
        &mut self.builder
    }

    /// Consumes the context, returning the sink.
    pub fn into_builder(self) -> S {
        self.builder
    }

    /// The milestone registries.
    pub fn events(&mut self) -> &mut SceneEvents {
        &mut self.events
    }

    /// Read access to the request queues.
    pub fn queues(&self) -> &RequestQueues {
        &self.queues
    }

    /// The current load state.
    pub fn load_state(&self) -> LoadState {
        self.progress.state()
    }

    /// The current retrieval type.
    pub fn retrieval_type(&self) -> RetrievalType {
        self.progress.retrieval()
    }

    /// The view chosen as initial, once one was decided.
    pub fn initial_view_id(&self) -> Option<&str> {
        self.initial_view_id.as_deref()
    }

    /// The default view group announced by the scene, if any.
    pub fn default_view_group_id(&self) -> Option<&str> {
        self.default_view_group_id.as_deref()
    }

    /// True iff no request queue is waiting on anything.
    pub fn is_scene_completed(&self) -> bool {
        self.queues.is_scene_completed()
    }

    /// Records scene-level defaults (default view and view group).
    ///
    /// Valid in any order relative to `set_view`; a default arriving after
    /// the initial view was decided does not re-decide it.
    pub fn set_scene_root(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let root: SceneRootPayload = payload::parse_object("set_scene_root", value)?;
        if self.default_view_id.is_none() {
            self.default_view_id = root.default_view_id;
        }
        if self.default_view_group_id.is_none() {
            self.default_view_group_id = root.default_view_group_id;
        }
        Ok(Vec::new())
    }

    /// Releases every owned map and set and clears every subscriber
    /// registry. The context is inert afterwards.
    pub fn dispose(&mut self) {
        self.queues.clear();
        self.events.clear_all();
        self.tree_nodes.clear();
        self.partial_tree_sids.clear();
        self.replaced_sids.clear();
        self.mesh_nodes.clear();
        self.parametric_nodes.clear();
        self.annotation_nodes.clear();
        self.material_nodes.clear();
        self.material_annotations.clear();
        self.texture_materials.clear();
        self.views.clear();
        self.view_groups.clear();
        self.built_views.clear();
        self.sequences.clear();
        self.tracks.clear();
        self.track_order.clear();
        self.playbacks.clear();
    }

    /// Metadata for a request issued during the current retrieval.
    ///
    /// Resources requested while the initial retrieval runs form the
    /// initial view's subset for the completion milestone.
    pub(crate) fn request_meta(&self) -> RequestMeta {
        RequestMeta {
            initial_view: self.progress.retrieval() == RetrievalType::Initial,
        }
    }

    /// Accumulates `phase` and notifies progress subscribers.
    pub(crate) fn fire_progress(&mut self, phase: LoadPhase) {
        let total = self.queues.get(RequestCategory::Geometries).global_len();
        self.progress.set_total_geometry(total);
        if let Some(update) = self.progress.add_phase(phase) {
            self.events.content_changes_progress.notify(&update);
        }
    }

    /// Re-evaluates completion after a fulfillment.
    ///
    /// Runs after every entry point that pops a queue: fixed-weight phases
    /// fire as their category drains, the initial-view milestone fires
    /// once, and scene completion fires once when every queue is idle.
    pub(crate) fn check_scene_completion(&mut self) {
        let meshes = self.queues.get(RequestCategory::Meshes);
        let meshes_done = meshes.global_len() > 0 && !meshes.is_waiting();
        let materials = self.queues.get(RequestCategory::Materials);
        let materials_done = materials.global_len() > 0 && !materials.is_waiting();
        let textures = self.queues.get(RequestCategory::Textures);
        let textures_done = textures.global_len() > 0 && !textures.is_waiting();
        let geometries = self.queues.get(RequestCategory::Geometries);
        let geometries_done = geometries.global_len() > 0 && !geometries.is_waiting();

        if meshes_done {
            self.fire_progress(LoadPhase::Mesh);
            self.progress.advance(LoadState::FinishedMesh);
        }
        if materials_done {
            self.fire_progress(LoadPhase::Material);
        }
        if textures_done {
            self.fire_progress(LoadPhase::Texture);
        }
        if geometries_done {
            self.progress.advance(LoadState::FinishedGeometry);
        }

        self.check_initial_view_completed();

        // Completion is meaningless before the first hierarchy pass: every
        // queue is trivially empty at session start.
        let drained =
            self.progress.state() != LoadState::Started && self.queues.is_scene_completed();
        if drained {
            if !self.progress.scene_completed_fired {
                self.progress.scene_completed_fired = true;
                if let Some(update) = self.progress.force_complete() {
                    self.events.content_changes_progress.notify(&update);
                }
                self.events.scene_completed.notify(&());
            }
            match self.progress.retrieval() {
                RetrievalType::Initial => {
                    if !self.progress.initial_finished_fired {
                        self.progress.initial_finished_fired = true;
                        self.events.initial_scene_finished.notify(&());
                    }
                }
                RetrievalType::Partial => {
                    if self.progress.partial_armed {
                        self.progress.partial_armed = false;
                        self.events.partial_retrieval_finished.notify(&());
                    }
                }
            }
        }
    }

    fn check_initial_view_completed(&mut self) {
        if self.progress.initial_view_fired {
            return;
        }
        let initial = match &self.initial_view_id {
            Some(id) if self.built_views.contains(id) => id.clone(),
            _ => return,
        };
        let done = self
            .queues
            .get(RequestCategory::Textures)
            .is_initial_view_completed()
            && self
                .queues
                .get(RequestCategory::Meshes)
                .is_initial_view_completed()
            && self
                .queues
                .get(RequestCategory::GeomMeshes)
                .is_initial_view_completed();
        if done {
            self.progress.initial_view_fired = true;
            self.events.initial_view_completed.notify(&initial);
        }
    }

    /// Shared index helper: appends `value` under `key` without
    /// duplicating it.
    pub(crate) fn index_insert(
        index: &mut HashMap<String, Vec<String>>,
        key: &str,
        value: &str,
    ) {
        let entries = index.entry(key.to_owned()).or_default();
        if !entries.iter().any(|v| v == value) {
            entries.push(value.to_owned());
        }
    }

    /// Emits the pending replaced-node mapping to the sink and forgets it.
    /// The mapping is only valid within the build pass that produced it.
    pub(crate) fn flush_replaced_nodes(&mut self) {
        if !self.replaced_sids.is_empty() {
            let replaced = std::mem::take(&mut self.replaced_sids);
            self.builder.update_views_for_replaced_nodes(&replaced);
        }
    }
}

impl<S: SceneBuilder> std::fmt::Debug for SceneContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneContext")
            .field("pending_tree_nodes", &self.tree_nodes.len())
            .field("views", &self.views.len())
            .field("state", &self.progress.state())
            .field("completed", &self.queues.is_scene_completed())
            .finish()
    }
}
