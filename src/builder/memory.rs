//! In-memory scene-graph sink for tests and headless assembly.

use std::collections::HashMap;

use crate::geometry::GeometryInfo;

use super::{
    AnnotationInstance, CameraInfo, HighlightInfo, MaterialInfo, NodeCreateInfo, ParametricInfo,
    Playback, SceneBuilder, Sequence, StyleInfo, SubmeshInfo, Track, ViewInfo, ViewNodeInfo,
};

/// One stored node with its attachments.
#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub info: NodeCreateInfo,
    pub children: Vec<String>,
    pub submeshes: Vec<SubmeshInfo>,
    pub parametric: Option<ParametricInfo>,
    /// Material assigned after creation, overriding `info.material_id`.
    pub assigned_material: Option<String>,
}

/// [`SceneBuilder`] that keeps the assembled scene in maps.
///
/// Nothing is rendered; the structure is inspectable afterwards, which is
/// what the crate's own tests build on.
#[derive(Debug, Default)]
pub struct MemorySceneBuilder {
    nodes: HashMap<String, MemoryNode>,
    roots: Vec<String>,
    views: HashMap<String, ViewInfo>,
    view_node_infos: HashMap<String, Vec<ViewNodeInfo>>,
    materials: HashMap<String, MaterialInfo>,
    resolved_textures: Vec<(String, String)>,
    images: HashMap<String, Vec<u8>>,
    geometries: HashMap<String, GeometryInfo>,
    annotations: Vec<AnnotationInstance>,
    line_styles: Vec<StyleInfo>,
    fill_styles: Vec<StyleInfo>,
    text_styles: Vec<StyleInfo>,
    highlights: HashMap<String, HighlightInfo>,
    cameras: HashMap<String, CameraInfo>,
    finalized_groups: Vec<(String, Vec<String>)>,
    finalized_animation: Option<(Vec<Sequence>, Vec<Track>)>,
    finalized_playbacks: Option<Vec<Playback>>,
    replaced_node_updates: Vec<Vec<String>>,
    prefer_meshes: bool,
}

impl MemorySceneBuilder {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes [`SceneBuilder::prefer_meshes`] return `true`.
    pub fn with_mesh_preference(mut self) -> Self {
        self.prefer_meshes = true;
        self
    }

    /// Looks a node up by sid.
    pub fn node(&self, sid: &str) -> Option<&MemoryNode> {
        self.nodes.get(sid)
    }

    /// Number of stored nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// A view's stored flat activation list.
    pub fn view_node_infos(&self, view_id: &str) -> Option<&[ViewNodeInfo]> {
        self.view_node_infos.get(view_id).map(Vec::as_slice)
    }

    /// Looks a material up by id.
    pub fn material(&self, id: &str) -> Option<&MaterialInfo> {
        self.materials.get(id)
    }

    /// Looks stored geometry content up by id.
    pub fn geometry(&self, id: &str) -> Option<&GeometryInfo> {
        self.geometries.get(id)
    }

    /// Stored image bytes.
    pub fn image(&self, id: &str) -> Option<&[u8]> {
        self.images.get(id).map(Vec::as_slice)
    }

    /// Every inserted annotation instance.
    pub fn annotations(&self) -> &[AnnotationInstance] {
        &self.annotations
    }

    /// Looks a camera up by id.
    pub fn camera(&self, id: &str) -> Option<&CameraInfo> {
        self.cameras.get(id)
    }

    /// Looks a highlight up by id.
    pub fn highlight(&self, id: &str) -> Option<&HighlightInfo> {
        self.highlights.get(id)
    }

    /// Material/image pairs resolved so far.
    pub fn resolved_textures(&self) -> &[(String, String)] {
        &self.resolved_textures
    }

    /// Registered leader-line styles, in arrival order.
    pub fn line_styles(&self) -> &[StyleInfo] {
        &self.line_styles
    }

    /// Registered fill styles, in arrival order.
    pub fn fill_styles(&self) -> &[StyleInfo] {
        &self.fill_styles
    }

    /// Registered text styles, in arrival order.
    pub fn text_styles(&self) -> &[StyleInfo] {
        &self.text_styles
    }

    /// Finalized view groups, in finalization order.
    pub fn finalized_groups(&self) -> &[(String, Vec<String>)] {
        &self.finalized_groups
    }

    /// Animation data handed over at finalization, if any.
    pub fn finalized_animation(&self) -> Option<&(Vec<Sequence>, Vec<Track>)> {
        self.finalized_animation.as_ref()
    }

    /// Playbacks handed over at finalization, if any.
    pub fn finalized_playbacks(&self) -> Option<&[Playback]> {
        self.finalized_playbacks.as_deref()
    }

    /// Replaced-node batches received via
    /// [`SceneBuilder::update_views_for_replaced_nodes`].
    pub fn replaced_node_updates(&self) -> &[Vec<String>] {
        &self.replaced_node_updates
    }

    fn detach(&mut self, sid: &str) {
        if let Some(node) = self.nodes.get(sid) {
            if let Some(parent) = node.info.parent.clone() {
                if let Some(parent_node) = self.nodes.get_mut(&parent) {
                    parent_node.children.retain(|c| c != sid);
                }
            }
        }
        self.roots.retain(|r| r != sid);
    }
}

impl SceneBuilder for MemorySceneBuilder {
    fn create_node(&mut self, info: &NodeCreateInfo) {
        // Update semantics: an existing node with the same sid is replaced
        // wholesale, children re-attach as they are rebuilt.
        if self.nodes.contains_key(&info.sid) {
            self.detach(&info.sid);
        }

        match info.parent.as_deref() {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    if !parent_node.children.iter().any(|c| c == &info.sid) {
                        parent_node.children.push(info.sid.clone());
                    }
                } else {
                    log::debug!("node {} created under unknown parent {parent}", info.sid);
                    self.roots.push(info.sid.clone());
                }
            }
            None => self.roots.push(info.sid.clone()),
        }

        self.nodes.insert(
            info.sid.clone(),
            MemoryNode {
                info: info.clone(),
                children: Vec::new(),
                submeshes: Vec::new(),
                parametric: None,
                assigned_material: None,
            },
        );
    }

    fn remove_node(&mut self, sid: &str) {
        self.detach(sid);
        self.nodes.remove(sid);
    }

    fn has_node(&self, sid: &str) -> bool {
        self.nodes.contains_key(sid)
    }

    fn child_node_ids(&self, parent: Option<&str>) -> Vec<String> {
        match parent {
            Some(sid) => self
                .nodes
                .get(sid)
                .map(|n| n.children.clone())
                .unwrap_or_default(),
            None => self.roots.clone(),
        }
    }

    fn insert_submesh(&mut self, node_sid: &str, submesh: &SubmeshInfo) {
        if let Some(node) = self.nodes.get_mut(node_sid) {
            if !node.submeshes.iter().any(|s| s == submesh) {
                node.submeshes.push(submesh.clone());
            }
        }
    }

    fn has_mesh(&self, mesh_id: &str) -> bool {
        self.nodes
            .values()
            .any(|n| n.submeshes.iter().any(|s| s.mesh_id == mesh_id))
    }

    fn set_geometry(&mut self, info: &GeometryInfo) {
        self.geometries.insert(info.id.clone(), info.clone());
    }

    fn update_material(&mut self, info: &MaterialInfo) {
        self.materials.insert(info.id.clone(), info.clone());
    }

    fn material_exists(&self, id: &str) -> bool {
        self.materials.contains_key(id)
    }

    fn assign_material(&mut self, node_sid: &str, material_id: &str) {
        if let Some(node) = self.nodes.get_mut(node_sid) {
            node.assigned_material = Some(material_id.to_owned());
        }
    }

    fn set_image(&mut self, id: &str, data: &[u8]) {
        self.images.insert(id.to_owned(), data.to_vec());
    }

    fn resolve_material_texture(&mut self, material_id: &str, image_id: &str) {
        self.resolved_textures
            .push((material_id.to_owned(), image_id.to_owned()));
    }

    fn set_parametric(&mut self, node_sid: &str, info: &ParametricInfo) {
        if let Some(node) = self.nodes.get_mut(node_sid) {
            node.parametric = Some(info.clone());
        }
    }

    fn insert_annotation(&mut self, instance: &AnnotationInstance) {
        self.annotations.push(instance.clone());
    }

    fn has_annotation(&self, id: &str) -> bool {
        self.annotations.iter().any(|a| a.annotation_id == id)
    }

    fn set_line_style(&mut self, style: &StyleInfo) {
        self.line_styles.push(style.clone());
    }

    fn set_fill_style(&mut self, style: &StyleInfo) {
        self.fill_styles.push(style.clone());
    }

    fn set_text_style(&mut self, style: &StyleInfo) {
        self.text_styles.push(style.clone());
    }

    fn insert_highlight(&mut self, info: &HighlightInfo) {
        self.highlights.insert(info.id.clone(), info.clone());
    }

    fn create_view(&mut self, info: &ViewInfo) {
        self.views.insert(info.id.clone(), info.clone());
    }

    fn get_view(&self, id: &str) -> Option<&ViewInfo> {
        self.views.get(id)
    }

    fn apply_view_node_infos(&mut self, view_id: &str, infos: &[ViewNodeInfo]) {
        self.view_node_infos
            .insert(view_id.to_owned(), infos.to_vec());
    }

    fn finalize_view_groups(&mut self, group_id: &str, view_ids: &[String]) {
        self.finalized_groups
            .push((group_id.to_owned(), view_ids.to_vec()));
    }

    fn create_camera(&mut self, info: &CameraInfo) {
        self.cameras.insert(info.id.clone(), info.clone());
    }

    fn prefer_meshes(&self) -> bool {
        self.prefer_meshes
    }

    fn update_views_for_replaced_nodes(&mut self, replaced_sids: &[String]) {
        self.replaced_node_updates.push(replaced_sids.to_vec());
    }

    fn finalize_animation(&mut self, sequences: &[Sequence], tracks: &[Track]) {
        self.finalized_animation = Some((sequences.to_vec(), tracks.to_vec()));
    }

    fn finalize_playbacks(&mut self, playbacks: &[Playback]) {
        self.finalized_playbacks = Some(playbacks.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(sid: &str, parent: Option<&str>) -> NodeCreateInfo {
        NodeCreateInfo {
            sid: sid.to_owned(),
            parent: parent.map(str::to_owned),
            visible: true,
            displayable: true,
            ..Default::default()
        }
    }

    #[test]
    fn create_attaches_to_parent() {
        let mut builder = MemorySceneBuilder::new();
        builder.create_node(&node("a", None));
        builder.create_node(&node("b", Some("a")));

        assert_eq!(builder.child_node_ids(None), vec!["a"]);
        assert_eq!(builder.child_node_ids(Some("a")), vec!["b"]);
    }

    #[test]
    fn recreate_replaces_without_duplicating() {
        let mut builder = MemorySceneBuilder::new();
        builder.create_node(&node("a", None));
        builder.create_node(&node("b", Some("a")));
        builder.create_node(&node("b", Some("a")));

        assert_eq!(builder.child_node_ids(Some("a")), vec!["b"]);
        assert_eq!(builder.node_count(), 2);
    }

    #[test]
    fn remove_detaches_from_parent() {
        let mut builder = MemorySceneBuilder::new();
        builder.create_node(&node("a", None));
        builder.create_node(&node("b", Some("a")));
        builder.remove_node("b");

        assert!(!builder.has_node("b"));
        assert!(builder.child_node_ids(Some("a")).is_empty());
    }

    #[test]
    fn submesh_insert_is_idempotent() {
        let mut builder = MemorySceneBuilder::new();
        builder.create_node(&node("a", None));
        let submesh = SubmeshInfo {
            mesh_id: "m1".into(),
            geometry_id: "g1".into(),
            bounding_box: [0.0; 6],
        };
        builder.insert_submesh("a", &submesh);
        builder.insert_submesh("a", &submesh);

        assert_eq!(builder.node("a").unwrap().submeshes.len(), 1);
        assert!(builder.has_mesh("m1"));
    }
}
