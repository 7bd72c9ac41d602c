//! Tree assembly: merging node batches into the persistent hierarchy.
//!
//! Batches arrive in arbitrary dependency order. `set_tree_node` only
//! accumulates; the structural work happens in one build pass triggered by
//! `notify_finished_tree` (or by the initial view, whose payload doubles
//! as a tree payload). A pass collapses cosmetic single-child wrappers,
//! classifies roots, restricts to a partial set when one was requested,
//! resolves cross-batch parents with a retry stage, and materializes nodes
//! on the sink while registering every resource dependency exactly once.

use serde_json::Value;

use crate::builder::{NodeCreateInfo, SceneBuilder};
use crate::context::progress::{LoadPhase, LoadState, RetrievalType};
use crate::context::SceneContext;
use crate::error::{SceneError, SceneResult};
use crate::payload::{self, TreeNodePayload};
use crate::queue::RequestCategory;

/// Per-pass working state derived from one batch.
///
/// Indices refer to the batch that produced the pass and never escape it.
pub(crate) struct TreePass {
    /// False for collapsed single-child wrappers.
    pub displayable: Vec<bool>,
    /// Visibility after the collapse merge (explicit `false` wins in both
    /// directions).
    pub visible: Vec<Option<bool>>,
    /// In-batch parent index, from the children arrays.
    pub parent_of: Vec<Option<usize>>,
}

/// Computes the display-only collapse and parent back-references.
///
/// A node with exactly one child that is an "element" node (no own entity
/// id) keeps its child in the graph but marks it non-displayable; an
/// explicit `visible == false` on either side of the pair hides both.
/// Siblings are never affected.
pub(crate) fn compute_partial_roots(nodes: &[TreeNodePayload]) -> TreePass {
    let len = nodes.len();
    let mut pass = TreePass {
        displayable: vec![true; len],
        visible: nodes.iter().map(|n| n.visible).collect(),
        parent_of: vec![None; len],
    };

    for (index, node) in nodes.iter().enumerate() {
        let Some(children) = &node.children else {
            continue;
        };
        for &child in children {
            if child < len {
                pass.parent_of[child] = Some(index);
            }
        }
        if children.len() == 1 {
            let child = children[0];
            if child < len && nodes[child].entity_id.is_none() {
                pass.displayable[child] = false;
                if pass.visible[index] == Some(false) || pass.visible[child] == Some(false) {
                    pass.visible[index] = Some(false);
                    pass.visible[child] = Some(false);
                }
            }
        }
    }

    pass
}

impl<S: SceneBuilder> SceneContext<S> {
    /// Appends a batch of tree nodes to the pending batch.
    ///
    /// No structural work happens here; the nodes wait for the next build
    /// pass. The payload must be an array of nodes.
    pub fn set_tree_node(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let nodes: Vec<TreeNodePayload> = payload::parse_array("set_tree_node", value)?;
        self.tree_nodes.extend(nodes);
        Ok(Vec::new())
    }

    /// Flags node sids wanted for a partial tree.
    ///
    /// The next build pass restricts its roots to these nodes, walking up
    /// to the nearest already-built ancestor.
    pub fn mark_partial_tree<I>(&mut self, sids: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.partial_tree_sids.extend(sids.into_iter().map(Into::into));
    }

    /// Ends a tree transmission and builds the accumulated batch.
    ///
    /// `is_initial` distinguishes the full initial tree from a partial
    /// (incremental) rebuild, which gates the completion callbacks.
    pub fn notify_finished_tree(&mut self, is_initial: bool) -> SceneResult<Vec<SceneError>> {
        self.progress.set_retrieval(if is_initial {
            RetrievalType::Initial
        } else {
            RetrievalType::Partial
        });
        let errors = self.build_tree();
        self.fire_progress(LoadPhase::Tree);
        self.progress.advance(LoadState::FinishedHierarchy);
        self.check_scene_completion();
        Ok(errors)
    }

    /// Runs one build pass over the pending batch.
    pub(crate) fn build_tree(&mut self) -> Vec<SceneError> {
        let batch = std::mem::take(&mut self.tree_nodes);
        let wanted = std::mem::take(&mut self.partial_tree_sids);
        if batch.is_empty() {
            return Vec::new();
        }

        let pass = compute_partial_roots(&batch);
        let mut errors = Vec::new();

        // Root classification: an explicit parent sid is a cross-batch
        // reference resolved against the built graph; everything without
        // an in-batch parent is a root as well.
        let all_roots: Vec<usize> = (0..batch.len())
            .filter(|&i| batch[i].parent.is_some() || pass.parent_of[i].is_none())
            .collect();

        let roots = if wanted.is_empty() {
            all_roots
        } else {
            self.restrict_to_partial(&batch, &pass, &wanted, all_roots)
        };

        // First attempt, deferring roots whose parent is not built yet.
        let mut deferred: Vec<(usize, String)> = Vec::new();
        for index in roots {
            match batch[index].parent.clone() {
                None => self.build_node(None, index, &batch, &pass, None, &mut errors),
                Some(parent) => {
                    if self.builder.has_node(&parent) {
                        self.build_node(
                            Some(parent.as_str()),
                            index,
                            &batch,
                            &pass,
                            None,
                            &mut errors,
                        );
                    } else {
                        deferred.push((index, parent));
                    }
                }
            }
        }

        // Retry stage: sweep the deferred list until a sweep resolves
        // nothing. Handles batches whose roots arrive in the wrong
        // dependency order; whatever remains is reported, not fatal.
        loop {
            let before = deferred.len();
            let mut still_deferred = Vec::new();
            for (index, parent) in deferred {
                if self.builder.has_node(&parent) {
                    self.build_node(
                        Some(parent.as_str()),
                        index,
                        &batch,
                        &pass,
                        None,
                        &mut errors,
                    );
                } else {
                    still_deferred.push((index, parent));
                }
            }
            deferred = still_deferred;
            if deferred.is_empty() || deferred.len() == before {
                break;
            }
        }
        for (index, parent) in deferred {
            log::warn!(
                "node {:?} left unbuilt: parent {parent} never arrived",
                batch[index].sid
            );
            errors.push(SceneError::UnresolvedParent {
                sid: batch[index].sid.clone().unwrap_or_default(),
                parent,
            });
        }

        self.flush_replaced_nodes();
        errors
    }

    /// Restricts the root set to the nodes flagged for a partial tree.
    ///
    /// Walks each wanted node up its in-batch parent chain until an
    /// already-built ancestor anchors the rebuild. A chain that reaches a
    /// node with no ancestor at all abandons the restriction and the full
    /// root set is used instead.
    fn restrict_to_partial(
        &self,
        batch: &[TreeNodePayload],
        pass: &TreePass,
        wanted: &std::collections::HashSet<String>,
        all_roots: Vec<usize>,
    ) -> Vec<usize> {
        let mut by_sid = std::collections::HashMap::new();
        for (index, node) in batch.iter().enumerate() {
            if let Some(sid) = node.sid.as_deref() {
                by_sid.insert(sid, index);
            }
        }

        let mut restricted = Vec::new();
        for sid in wanted {
            let Some(&start) = by_sid.get(sid.as_str()) else {
                continue;
            };
            let mut current = start;
            loop {
                if let Some(parent) = batch[current].parent.as_deref() {
                    if self.builder.has_node(parent) {
                        break;
                    }
                }
                match pass.parent_of[current] {
                    Some(parent_index) => {
                        let parent_built = batch[parent_index]
                            .sid
                            .as_deref()
                            .is_some_and(|s| self.builder.has_node(s));
                        if parent_built {
                            break;
                        }
                        current = parent_index;
                    }
                    None => {
                        if batch[current].parent.is_none() {
                            // No ancestor at all: fall back to the full,
                            // unrestricted root set.
                            return all_roots;
                        }
                        break;
                    }
                }
            }
            if !restricted.contains(&current) {
                restricted.push(current);
            }
        }
        restricted
    }

    /// Materializes one node and recurses into its children.
    ///
    /// The attachment parent comes from the caller, never from the
    /// payload: roots resolved it already and children attach under the
    /// node being built. `inherited_order` propagates the parent's render
    /// order to children that do not declare their own.
    pub(crate) fn build_node(
        &mut self,
        parent: Option<&str>,
        index: usize,
        batch: &[TreeNodePayload],
        pass: &TreePass,
        inherited_order: Option<i32>,
        errors: &mut Vec<SceneError>,
    ) {
        let node = &batch[index];
        let sid = match node.sid.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => {
                errors.push(SceneError::MissingNodeId);
                return;
            }
        };
        if node.suppressed {
            return;
        }

        // Update semantics: an incoming node replaces any existing one
        // with the same sid. The mapping is flushed to the sink at the end
        // of the pass so views can rebind.
        if self.builder.has_node(sid) {
            self.builder.remove_node(sid);
            self.replaced_sids.push(sid.to_owned());
        }

        let mut mesh_id = node.mesh_id.clone();
        let mut parametric_id = node.parametric_id.clone();
        if mesh_id.is_some() && parametric_id.is_some() {
            if self.builder.prefer_meshes() {
                parametric_id = None;
            } else {
                mesh_id = None;
            }
        }

        let render_order = node.render_order.or(inherited_order).unwrap_or(0);
        let transform = node.transform.as_deref().and_then(payload::transform_matrix);
        if node.transform.is_some() && transform.is_none() {
            log::warn!("node {sid}: transform must be 12 or 16 floats, ignored");
        }

        let info = NodeCreateInfo {
            sid: sid.to_owned(),
            parent: parent.map(str::to_owned),
            name: node.name.clone(),
            transform,
            visible: pass.visible[index] != Some(false),
            displayable: pass.displayable[index],
            opacity: node.opacity,
            render_order,
            mesh_id,
            parametric_id,
            annotation_id: node.annotation_id.clone(),
            material_id: node.material_id.clone(),
            highlight_style_id: node.highlight_style_id.clone(),
        };
        self.builder.create_node(&info);
        self.register_node_resources(&info);

        if let Some(children) = &node.children {
            for &child in children {
                if child >= batch.len() {
                    errors.push(SceneError::ChildIndexOutOfRange {
                        sid: sid.to_owned(),
                        index: child,
                    });
                    continue;
                }
                self.build_node(Some(sid), child, batch, pass, Some(render_order), errors);
            }
        }
    }

    /// Registers a node against the reverse indices and enqueues its
    /// resource requests. Queue pushes are idempotent, so repeated
    /// references to the same id request it exactly once.
    pub(crate) fn register_node_resources(&mut self, info: &NodeCreateInfo) {
        let meta = self.request_meta();
        let sid = info.sid.as_str();
        if let Some(id) = &info.mesh_id {
            Self::index_insert(&mut self.mesh_nodes, id, sid);
            self.queues
                .get_mut(RequestCategory::Meshes)
                .push(id.clone(), meta.clone());
        }
        if let Some(id) = &info.parametric_id {
            Self::index_insert(&mut self.parametric_nodes, id, sid);
            self.queues
                .get_mut(RequestCategory::Parametric)
                .push(id.clone(), meta.clone());
        }
        if let Some(id) = &info.annotation_id {
            Self::index_insert(&mut self.annotation_nodes, id, sid);
            self.queues
                .get_mut(RequestCategory::Annotations)
                .push(id.clone(), meta.clone());
        }
        if let Some(id) = &info.material_id {
            Self::index_insert(&mut self.material_nodes, id, sid);
            self.queues
                .get_mut(RequestCategory::Materials)
                .push(id.clone(), meta.clone());
        }
        if let Some(id) = &info.highlight_style_id {
            self.queues
                .get_mut(RequestCategory::Highlights)
                .push(id.clone(), meta);
        }
    }
}
