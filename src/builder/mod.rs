//! The scene-graph mutation sink.
//!
//! The assembly context does not own scene-graph storage. It issues
//! commands through the [`SceneBuilder`] trait and reads back only through
//! narrow queries (`has_node`, `child_node_ids`, existence checks). The
//! value types in this module are the vocabulary of those commands.
//!
//! [`MemorySceneBuilder`] is the bundled in-memory implementation, used by
//! the crate's own tests and suitable for headless assembly.

mod memory;

pub use memory::MemorySceneBuilder;

use serde_json::Value;

use crate::geometry::GeometryInfo;

/// Everything needed to materialize one scene-graph node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeCreateInfo {
    pub sid: String,
    /// Parent sid; `None` creates a top-level node.
    pub parent: Option<String>,
    pub name: Option<String>,
    /// Row-major 4x4 local transform.
    pub transform: Option<[f32; 16]>,
    pub visible: bool,
    /// A collapsed wrapper node stays in the graph but is not displayed.
    pub displayable: bool,
    pub opacity: Option<f32>,
    pub render_order: i32,
    pub mesh_id: Option<String>,
    pub parametric_id: Option<String>,
    pub annotation_id: Option<String>,
    pub material_id: Option<String>,
    pub highlight_style_id: Option<String>,
}

/// Bounding-box placeholder applied to a node while its geometry streams.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmeshInfo {
    pub mesh_id: String,
    pub geometry_id: String,
    pub bounding_box: [f32; 6],
}

/// Texture slot resolved onto a material.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAssignment {
    pub image_id: String,
    /// Texture usage, for example `diffuse` or `bump`.
    pub kind: Option<String>,
    pub uv_channel: u32,
}

/// Material data applied to the sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialInfo {
    pub id: String,
    pub name: Option<String>,
    pub ambient: Option<[f32; 4]>,
    pub diffuse: Option<[f32; 4]>,
    pub specular: Option<[f32; 4]>,
    pub emissive: Option<[f32; 4]>,
    pub opacity: Option<f32>,
    pub glossiness: Option<f32>,
    pub line_color: Option<[f32; 4]>,
    pub line_width: Option<f32>,
    pub textures: Vec<TextureAssignment>,
}

/// One shape of a parametric definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeInfo {
    pub kind: Option<String>,
    pub material_id: Option<String>,
    /// Shape parameters, passed through as delivered.
    pub properties: serde_json::Map<String, Value>,
}

/// Parametric content attached to a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParametricInfo {
    pub id: String,
    pub shapes: Vec<ShapeInfo>,
}

/// One annotation instance bound to a node (or unbound when the
/// annotation arrived unsolicited).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationInstance {
    pub annotation_id: String,
    pub node_sid: Option<String>,
    pub kind: Option<String>,
    pub text: Option<String>,
    pub points: Option<Vec<f32>>,
    pub material_id: Option<String>,
}

/// Drawing style applied to annotation rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleInfo {
    pub id: Option<String>,
    pub properties: serde_json::Map<String, Value>,
}

/// Highlight style definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightInfo {
    pub id: String,
    pub properties: serde_json::Map<String, Value>,
}

/// View metadata registered on the sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewInfo {
    pub id: String,
    pub name: Option<String>,
    pub camera_id: Option<String>,
    pub bounding_box: Option<[f32; 6]>,
    pub thumbnail_id: Option<String>,
    pub animated_thumbnail_id: Option<String>,
    pub view_group_id: Option<String>,
}

/// One record of a view's flat activation list.
///
/// Activating a view replays these records in order; no tree walk happens
/// at activation time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewNodeInfo {
    pub target: String,
    pub visible: Option<bool>,
    pub material_id: Option<String>,
    pub opacity: Option<f32>,
    pub mesh_id: Option<String>,
    pub annotation_id: Option<String>,
    pub transform: Option<[f32; 16]>,
}

/// Camera definition registered on the sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraInfo {
    pub id: String,
    pub projection: Option<String>,
    pub near_clip: Option<f32>,
    pub far_clip: Option<f32>,
    pub fov: Option<f32>,
    pub zoom: Option<f32>,
    pub position: Option<[f32; 3]>,
    pub target_direction: Option<[f32; 3]>,
    pub up_direction: Option<[f32; 3]>,
}

/// Joint of an assembled animation sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Joint {
    pub id: Option<String>,
    pub parent: Option<String>,
    pub node_sid: Option<String>,
}

/// Resolved track reference inside a sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceTrack {
    pub track_id: String,
    pub node_sid: Option<String>,
    pub binding: Option<String>,
}

/// Assembled animation sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    pub id: String,
    pub name: Option<String>,
    pub duration: Option<f32>,
    pub joints: Vec<Joint>,
    pub tracks: Vec<SequenceTrack>,
}

/// Assembled animation track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub id: String,
    pub times: Vec<f32>,
    pub values: Vec<f32>,
    pub interpolation: Option<String>,
    /// Cyclic wrap markers, present only on cyclic tracks.
    pub cyclic_start: Option<f32>,
    pub cyclic_end: Option<f32>,
}

/// Assembled playback schedule entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playback {
    pub id: String,
    pub sequence_id: Option<String>,
    pub start: Option<f32>,
    pub time_scale: Option<f32>,
    pub pre_delay: Option<f32>,
    pub post_delay: Option<f32>,
    pub repeat: Option<i32>,
    pub reversed: bool,
}

/// Render-graph mutation interface driven by the assembly context.
///
/// Implementations own node/view/resource storage. From the context's
/// perspective the sink is append/update-only: repeated commands for the
/// same id are expected and must behave idempotently.
pub trait SceneBuilder {
    /// Creates `info.sid`, replacing any node with the same sid.
    fn create_node(&mut self, info: &NodeCreateInfo);
    /// Removes a node, detaching it from its parent. A no-op for unknown
    /// sids.
    fn remove_node(&mut self, sid: &str);
    /// Whether a node with this sid exists.
    fn has_node(&self, sid: &str) -> bool;
    /// Child sids of `parent`, or the top-level sids for `None`.
    fn child_node_ids(&self, parent: Option<&str>) -> Vec<String>;

    /// Attaches a bounding-box submesh to a node.
    fn insert_submesh(&mut self, node_sid: &str, submesh: &SubmeshInfo);
    /// Whether detailed content for this mesh id was already applied.
    fn has_mesh(&self, mesh_id: &str) -> bool;
    /// Stores decoded geometry content.
    fn set_geometry(&mut self, info: &GeometryInfo);

    /// Creates or updates a material.
    fn update_material(&mut self, info: &MaterialInfo);
    /// Whether a material with this id exists.
    fn material_exists(&self, id: &str) -> bool;
    /// Assigns an existing material to a node.
    fn assign_material(&mut self, node_sid: &str, material_id: &str);
    /// Stores raw image content.
    fn set_image(&mut self, id: &str, data: &[u8]);
    /// Connects an arrived image to a material waiting on it.
    fn resolve_material_texture(&mut self, material_id: &str, image_id: &str);

    /// Attaches parametric content to a node.
    fn set_parametric(&mut self, node_sid: &str, info: &ParametricInfo);

    /// Inserts one annotation instance.
    fn insert_annotation(&mut self, instance: &AnnotationInstance);
    /// Whether any instance of this annotation id exists.
    fn has_annotation(&self, id: &str) -> bool;
    /// Registers a leader-line style.
    fn set_line_style(&mut self, style: &StyleInfo);
    /// Registers a fill style.
    fn set_fill_style(&mut self, style: &StyleInfo);
    /// Registers a text style.
    fn set_text_style(&mut self, style: &StyleInfo);

    /// Stores a highlight style.
    fn insert_highlight(&mut self, info: &HighlightInfo);

    /// Registers view metadata.
    fn create_view(&mut self, info: &ViewInfo);
    /// Looks a view up by id.
    fn get_view(&self, id: &str) -> Option<&ViewInfo>;
    /// Stores a view's flat activation list, replacing any previous one.
    fn apply_view_node_infos(&mut self, view_id: &str, infos: &[ViewNodeInfo]);
    /// Marks a view group as fully assembled.
    fn finalize_view_groups(&mut self, group_id: &str, view_ids: &[String]);

    /// Registers a camera.
    fn create_camera(&mut self, info: &CameraInfo);

    /// Tie-break policy when a node carries both a mesh and a parametric
    /// definition. The parametric wins unless this returns `true`.
    fn prefer_meshes(&self) -> bool {
        false
    }

    /// Rebinds view records that referenced nodes replaced during the last
    /// build pass.
    fn update_views_for_replaced_nodes(&mut self, replaced_sids: &[String]);

    /// Hands over the assembled animation data.
    fn finalize_animation(&mut self, sequences: &[Sequence], tracks: &[Track]);
    /// Hands over the assembled playback schedule.
    fn finalize_playbacks(&mut self, playbacks: &[Playback]);
}
