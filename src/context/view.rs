//! View management: per-view overlays on top of the base tree.
//!
//! A view never owns nodes. It owns deltas (visibility, transform,
//! material, opacity) against nodes owned by the base tree, or created
//! lazily and invisible the first time a view references them. Building a
//! view flattens those deltas into one list of records; activating the
//! view later replays the list without walking anything.
//!
//! Views only ever hide base-tree structure, they never delete it:
//! children missing from a view's incoming set get an explicit
//! hide record.

use serde_json::Value;

use crate::builder::{NodeCreateInfo, SceneBuilder, ViewInfo, ViewNodeInfo};
use crate::context::progress::{LoadPhase, LoadState};
use crate::context::tree::compute_partial_roots;
use crate::context::SceneContext;
use crate::error::{SceneError, SceneResult};
use crate::payload::{
    self, TreeNodePayload, ViewFinishedPayload, ViewGroupPayload, ViewNodeBatch, ViewPayload,
};
use crate::queue::RequestCategory;

/// Accumulated state of one view while it streams.
#[derive(Debug)]
pub(crate) struct ViewState {
    pub info: ViewInfo,
    /// Node deltas delivered so far.
    pub nodes: Vec<TreeNodePayload>,
}

/// A view group and the views it finalizes together.
#[derive(Debug)]
pub(crate) struct ViewGroupState {
    pub views: Vec<String>,
    pub finalized: bool,
}

impl<S: SceneBuilder> SceneContext<S> {
    /// Registers a view.
    ///
    /// Decides the initial view exactly once: the scene default if one was
    /// announced, otherwise the first view seen. Only for the initial view
    /// the payload's node list doubles as a tree payload and triggers a
    /// base-tree build.
    pub fn set_view(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let view: ViewPayload = payload::parse_object("set_view", value)?;
        let id = view.view_id.clone().ok_or(SceneError::MalformedPayload {
            context: "set_view",
            reason: "missing viewId".into(),
        })?;

        if self.initial_view_id.is_none() {
            let deferred_to_default = self
                .default_view_id
                .as_deref()
                .is_some_and(|default| default != id);
            if !deferred_to_default {
                self.initial_view_id = Some(id.clone());
            }
        }
        let is_initial = self.initial_view_id.as_deref() == Some(id.as_str());

        let info = ViewInfo {
            id: id.clone(),
            name: view.name.clone(),
            camera_id: view.camera_id.clone(),
            bounding_box: view.bounding_box.as_deref().and_then(payload::bounding_box),
            thumbnail_id: view.thumbnail_id.clone(),
            animated_thumbnail_id: view.animated_thumbnail_id.clone(),
            view_group_id: view.view_group_id.clone(),
        };

        let meta = if is_initial {
            crate::queue::RequestMeta::initial()
        } else {
            self.request_meta()
        };
        self.queues
            .get_mut(RequestCategory::Views)
            .push(id.clone(), meta.clone());
        if let Some(thumbnail) = &info.thumbnail_id {
            self.queues
                .get_mut(RequestCategory::Thumbnails)
                .push(thumbnail.clone(), meta.clone());
        }
        if let Some(animated) = &info.animated_thumbnail_id {
            self.queues
                .get_mut(RequestCategory::Thumbnails)
                .push(animated.clone(), meta);
        }

        if let Some(group_id) = &info.view_group_id {
            let group = self
                .view_groups
                .entry(group_id.clone())
                .or_insert_with(|| ViewGroupState {
                    views: Vec::new(),
                    finalized: false,
                });
            if !group.views.contains(&id) {
                group.views.push(id.clone());
            }
        }

        self.builder.create_view(&info);

        let nodes = view.nodes.unwrap_or_default();
        let state = self
            .views
            .entry(id.clone())
            .or_insert_with(|| ViewState {
                info: info.clone(),
                nodes: Vec::new(),
            });
        state.info = info;
        state.nodes.extend(nodes.iter().cloned());

        let mut errors = Vec::new();
        if is_initial && !nodes.is_empty() {
            // The initial view's payload doubles as a tree payload.
            self.tree_nodes.extend(nodes);
            errors.extend(self.build_tree());
        }

        if let Some(playbacks) = &view.playbacks {
            for playback in playbacks {
                self.handle_playback(playback, &mut errors);
            }
        }

        Ok(errors)
    }

    /// Accumulates node deltas for a registered view.
    ///
    /// For the initial view the deltas also route through tree assembly.
    pub fn set_view_node(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let batch: ViewNodeBatch = payload::parse_object("set_view_node", value)?;
        let id = batch.view_id.ok_or(SceneError::MalformedPayload {
            context: "set_view_node",
            reason: "missing viewId".into(),
        })?;
        if !self.views.contains_key(&id) {
            return Err(SceneError::UnknownView(id));
        }

        if self.initial_view_id.as_deref() == Some(id.as_str()) {
            self.tree_nodes.extend(batch.nodes.iter().cloned());
        }
        if let Some(state) = self.views.get_mut(&id) {
            state.nodes.extend(batch.nodes);
        }
        Ok(Vec::new())
    }

    /// Ends a view transmission: pops its pending id, runs tree completion
    /// processing when this was the initial view, then builds the view.
    pub fn notify_finished_view(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let finished: ViewFinishedPayload = payload::parse_object("notify_finished_view", value)?;
        let id = finished.view_id.ok_or(SceneError::MalformedPayload {
            context: "notify_finished_view",
            reason: "missing viewId".into(),
        })?;
        if !self.views.contains_key(&id) {
            return Err(SceneError::UnknownView(id));
        }

        self.queues.get_mut(RequestCategory::Views).pop(&id);

        let mut errors = Vec::new();
        if self.initial_view_id.as_deref() == Some(id.as_str()) {
            errors.extend(self.build_tree());
            self.fire_progress(LoadPhase::Tree);
            self.progress.advance(LoadState::FinishedHierarchy);

            if !self.active_camera_fired {
                if let Some(camera) = self.views[&id].info.camera_id.clone() {
                    self.active_camera_fired = true;
                    self.events.active_camera.notify(&camera);
                }
            }
        }

        errors.extend(self.build_view(&id));
        self.built_views.insert(id.clone());
        self.events.view_finished.notify(&id);

        self.check_view_groups(&id);
        self.try_finalize_animation();
        self.check_scene_completion();
        Ok(errors)
    }

    /// Registers a view group.
    ///
    /// The group fires its finished milestone once every listed view has
    /// been built.
    pub fn set_view_group(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let group: ViewGroupPayload = payload::parse_object("set_view_group", value)?;
        let id = group.id.ok_or(SceneError::MalformedPayload {
            context: "set_view_group",
            reason: "missing id".into(),
        })?;

        let state = self
            .view_groups
            .entry(id.clone())
            .or_insert_with(|| ViewGroupState {
                views: Vec::new(),
                finalized: false,
            });
        for view in group.views {
            if !state.views.contains(&view) {
                state.views.push(view);
            }
        }
        Ok(Vec::new())
    }

    /// Flattens a view's deltas into its activation list.
    pub(crate) fn build_view(&mut self, view_id: &str) -> Vec<SceneError> {
        let nodes = match self.views.get(view_id) {
            Some(state) => state.nodes.clone(),
            None => return vec![SceneError::UnknownView(view_id.to_owned())],
        };

        let pass = compute_partial_roots(&nodes);
        let mut infos = Vec::new();
        let mut errors = Vec::new();

        for index in 0..nodes.len() {
            if pass.parent_of[index].is_none() {
                let parent = nodes[index].parent.clone();
                self.process_view_node(
                    parent.as_deref(),
                    index,
                    &nodes,
                    &pass,
                    &mut infos,
                    &mut errors,
                );
            }
        }

        self.builder.apply_view_node_infos(view_id, &infos);
        errors
    }

    /// Emits one activation record for a node and recurses.
    fn process_view_node(
        &mut self,
        parent: Option<&str>,
        index: usize,
        nodes: &[TreeNodePayload],
        pass: &crate::context::tree::TreePass,
        infos: &mut Vec<ViewNodeInfo>,
        errors: &mut Vec<SceneError>,
    ) {
        let node = &nodes[index];
        let sid = match node.sid.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => {
                errors.push(SceneError::MissingNodeId);
                return;
            }
        };

        let transform = node.transform.as_deref().and_then(payload::transform_matrix);

        // A node the view references before the base tree delivered it is
        // created invisible, to be revealed only when the view activates.
        if !self.builder.has_node(sid) {
            let info = NodeCreateInfo {
                sid: sid.to_owned(),
                parent: parent.map(str::to_owned),
                name: node.name.clone(),
                transform,
                visible: false,
                displayable: pass.displayable[index],
                opacity: node.opacity,
                render_order: node.render_order.unwrap_or(0),
                mesh_id: node.mesh_id.clone(),
                parametric_id: node.parametric_id.clone(),
                annotation_id: node.annotation_id.clone(),
                material_id: node.material_id.clone(),
                highlight_style_id: node.highlight_style_id.clone(),
            };
            self.builder.create_node(&info);
            self.register_node_resources(&info);
        }

        let visible = pass.visible[index] != Some(false);

        // Children absent from the incoming set are hidden, never deleted.
        if let Some(children) = &node.children {
            let incoming: Vec<&str> = children
                .iter()
                .filter(|&&c| c < nodes.len())
                .filter_map(|&c| nodes[c].sid.as_deref())
                .collect();
            for existing in self.builder.child_node_ids(Some(sid)) {
                if !incoming.contains(&existing.as_str()) {
                    infos.push(ViewNodeInfo {
                        target: existing,
                        visible: Some(false),
                        ..Default::default()
                    });
                }
            }
        }

        infos.push(ViewNodeInfo {
            target: sid.to_owned(),
            visible: Some(visible),
            material_id: node.material_id.clone(),
            opacity: node.opacity,
            mesh_id: node.mesh_id.clone(),
            annotation_id: node.annotation_id.clone(),
            transform,
        });

        if let Some(children) = &node.children {
            for &child in children {
                if child >= nodes.len() {
                    errors.push(SceneError::ChildIndexOutOfRange {
                        sid: sid.to_owned(),
                        index: child,
                    });
                    continue;
                }
                self.process_view_node(Some(sid), child, nodes, pass, infos, errors);
            }
        }
    }

    /// Finalizes every group whose views are all built.
    fn check_view_groups(&mut self, _finished_view: &str) {
        let ready: Vec<(String, Vec<String>)> = self
            .view_groups
            .iter()
            .filter(|(_, group)| {
                !group.finalized
                    && !group.views.is_empty()
                    && group.views.iter().all(|v| self.built_views.contains(v))
            })
            .map(|(id, group)| (id.clone(), group.views.clone()))
            .collect();

        for (group_id, views) in ready {
            if let Some(group) = self.view_groups.get_mut(&group_id) {
                group.finalized = true;
            }
            self.builder.finalize_view_groups(&group_id, &views);
            self.events.view_group_finished.notify(&group_id);
        }
    }
}
