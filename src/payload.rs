//! Payload shapes delivered by the content stream.
//!
//! Every entry point of the context deserializes its JSON payload into one
//! of these structs at the boundary. A payload that does not match its
//! schema is rejected there as [`SceneError::MalformedPayload`] instead of
//! failing somewhere deep in traversal. Field names follow the wire
//! convention (camelCase).
//!
//! All shapes are transient: they live for the duration of one entry-point
//! call (tree batches a little longer, until the next build pass) and are
//! never stored in the assembled scene.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{SceneError, SceneResult};

/// One node of a tree batch.
///
/// `children` holds indices into the batch that delivered this node, never
/// into a previous batch. The indices are resolved during the build pass
/// and do not survive it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeNodePayload {
    pub sid: Option<String>,
    /// Parent identifier for cross-batch attachment.
    pub parent: Option<String>,
    pub name: Option<String>,
    /// Entity backing this node. Nodes without one are wrapper "element"
    /// nodes and candidates for the single-child collapse.
    pub entity_id: Option<String>,
    pub mesh_id: Option<String>,
    pub parametric_id: Option<String>,
    pub annotation_id: Option<String>,
    pub material_id: Option<String>,
    pub highlight_style_id: Option<String>,
    /// Batch-local child indices.
    pub children: Option<Vec<usize>>,
    /// 12 (3x4) or 16 (4x4) row-major floats.
    pub transform: Option<Vec<f32>>,
    pub visible: Option<bool>,
    pub opacity: Option<f32>,
    pub suppressed: bool,
    pub render_order: Option<i32>,
}

/// Scene-level defaults sent before any view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneRootPayload {
    pub scene_id: Option<String>,
    pub default_view_id: Option<String>,
    pub default_view_group_id: Option<String>,
}

/// View registration payload.
///
/// The initial view's payload doubles as a tree payload: its `nodes` are
/// routed through tree assembly as well as into the view's delta list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewPayload {
    pub view_id: Option<String>,
    pub name: Option<String>,
    pub camera_id: Option<String>,
    pub view_group_id: Option<String>,
    #[serde(rename = "box")]
    pub bounding_box: Option<Vec<f32>>,
    pub thumbnail_id: Option<String>,
    pub animated_thumbnail_id: Option<String>,
    pub nodes: Option<Vec<TreeNodePayload>>,
    pub playbacks: Option<Vec<PlaybackPayload>>,
}

/// Node deltas for one view.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewNodeBatch {
    pub view_id: Option<String>,
    pub nodes: Vec<TreeNodePayload>,
}

/// View completion notification.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewFinishedPayload {
    pub view_id: Option<String>,
}

/// A named group of views finalized together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewGroupPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub views: Vec<String>,
}

/// Texture reference inside a material payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TexturePayload {
    pub image_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub uv_channel: Option<u32>,
}

/// Material fulfillment payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaterialPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub ambient: Option<Vec<f32>>,
    pub diffuse: Option<Vec<f32>>,
    pub specular: Option<Vec<f32>>,
    pub emissive: Option<Vec<f32>>,
    pub opacity: Option<f32>,
    pub glossiness: Option<f32>,
    pub line_color: Option<Vec<f32>>,
    pub line_width: Option<f32>,
    pub textures: Vec<TexturePayload>,
}

/// One procedurally-defined shape of a parametric payload.
///
/// Shape parameters vary per kind and are passed through untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapePayload {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub material_id: Option<String>,
    #[serde(flatten)]
    pub properties: serde_json::Map<String, Value>,
}

/// Parametric fulfillment payload. Either a single `shape` or a composite
/// `shapes` list is present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParametricPayload {
    pub id: Option<String>,
    pub shape: Option<ShapePayload>,
    pub shapes: Vec<ShapePayload>,
}

/// Drawing style block carried by annotations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StylePayload {
    pub id: Option<String>,
    #[serde(flatten)]
    pub properties: serde_json::Map<String, Value>,
}

/// Annotation fulfillment payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub material_id: Option<String>,
    pub text: Option<String>,
    pub points: Option<Vec<f32>>,
    pub line_style: Option<StylePayload>,
    pub fill_style: Option<StylePayload>,
    pub text_style: Option<StylePayload>,
}

/// Highlight style payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HighlightPayload {
    pub id: Option<String>,
    #[serde(flatten)]
    pub properties: serde_json::Map<String, Value>,
}

/// Camera definition payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraPayload {
    pub id: Option<String>,
    pub projection: Option<String>,
    pub near_clip: Option<f32>,
    pub far_clip: Option<f32>,
    pub fov: Option<f32>,
    pub zoom: Option<f32>,
    pub position: Option<Vec<f32>>,
    pub target_direction: Option<Vec<f32>>,
    pub up_direction: Option<Vec<f32>>,
}

/// Reference from a sequence to one of its tracks.
///
/// Either `track` names the track id directly, or `index` refers to the
/// position of a previously-delivered track list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SequenceTrackRef {
    pub track: Option<String>,
    pub index: Option<usize>,
    /// Target node of the animated channel.
    pub sid: Option<String>,
    /// Animated channel, for example `TRANSLATE` or `OPACITY`.
    pub binding: Option<String>,
}

/// Joint definition inside a sequence payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JointPayload {
    pub id: Option<String>,
    pub parent: Option<String>,
    pub sid: Option<String>,
    #[serde(flatten)]
    pub properties: serde_json::Map<String, Value>,
}

/// Animation sequence payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SequencePayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub duration: Option<f32>,
    pub joints: Vec<JointPayload>,
    pub tracks: Vec<SequenceTrackRef>,
}

/// Animation track payload.
///
/// `cyclic_start` and `cyclic_end` are the cyclic markers; they must come
/// through the renaming unimpaired because downstream interpolation reads
/// them back.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackPayload {
    pub id: Option<String>,
    pub times: Vec<f32>,
    pub values: Vec<f32>,
    pub interpolation: Option<String>,
    pub cyclic_start: Option<f32>,
    pub cyclic_end: Option<f32>,
}

/// Playback scheduling payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackPayload {
    pub id: Option<String>,
    pub sequence_id: Option<String>,
    pub start: Option<f32>,
    pub time_scale: Option<f32>,
    pub pre_delay: Option<f32>,
    pub post_delay: Option<f32>,
    pub repeat: Option<i32>,
    pub reversed: Option<bool>,
}

/// Deserializes a payload that must be a JSON array of `T`.
pub(crate) fn parse_array<T: DeserializeOwned>(
    context: &'static str,
    value: Value,
) -> SceneResult<Vec<T>> {
    if !value.is_array() {
        return Err(SceneError::MalformedPayload {
            context,
            reason: "expected an array".into(),
        });
    }
    serde_json::from_value(value).map_err(|e| SceneError::MalformedPayload {
        context,
        reason: e.to_string(),
    })
}

/// Deserializes a payload that must be a JSON object of shape `T`.
pub(crate) fn parse_object<T: DeserializeOwned>(
    context: &'static str,
    value: Value,
) -> SceneResult<T> {
    if !value.is_object() {
        return Err(SceneError::MalformedPayload {
            context,
            reason: "expected an object".into(),
        });
    }
    serde_json::from_value(value).map_err(|e| SceneError::MalformedPayload {
        context,
        reason: e.to_string(),
    })
}

/// Normalizes a wire transform to a row-major 4x4 matrix.
///
/// Accepts 16 floats verbatim or 12 floats as the first three rows of a
/// 4x4 whose last row is `0 0 0 1`. Any other length is rejected.
pub(crate) fn transform_matrix(values: &[f32]) -> Option<[f32; 16]> {
    match values.len() {
        16 => {
            let mut m = [0.0; 16];
            m.copy_from_slice(values);
            Some(m)
        }
        12 => {
            let mut m = [0.0; 16];
            m[..12].copy_from_slice(values);
            m[15] = 1.0;
            Some(m)
        }
        _ => None,
    }
}

/// Normalizes a 6-float min/max bounding box.
pub(crate) fn bounding_box(values: &[f32]) -> Option<[f32; 6]> {
    if values.len() == 6 {
        let mut b = [0.0; 6];
        b.copy_from_slice(values);
        Some(b)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tree_node_from_wire_names() {
        let nodes: Vec<TreeNodePayload> = parse_array(
            "test",
            json!([{
                "sid": "n1",
                "entityId": "e1",
                "meshId": "m1",
                "renderOrder": 3,
                "children": [1],
                "suppressed": true
            }]),
        )
        .unwrap();

        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.sid.as_deref(), Some("n1"));
        assert_eq!(node.entity_id.as_deref(), Some("e1"));
        assert_eq!(node.mesh_id.as_deref(), Some("m1"));
        assert_eq!(node.render_order, Some(3));
        assert_eq!(node.children.as_deref(), Some(&[1][..]));
        assert!(node.suppressed);
    }

    #[test]
    fn non_array_is_malformed() {
        let err = parse_array::<TreeNodePayload>("set_tree_node", json!({"sid": "x"})).unwrap_err();
        assert!(matches!(
            err,
            SceneError::MalformedPayload {
                context: "set_tree_node",
                ..
            }
        ));
    }

    #[test]
    fn cyclic_markers_survive_renaming() {
        let tracks: Vec<TrackPayload> = parse_array(
            "test",
            json!([{
                "id": "t1",
                "times": [0.0, 1.0],
                "values": [0.0, 2.0],
                "cyclicStart": 0.25,
                "cyclicEnd": 0.75
            }]),
        )
        .unwrap();

        assert_eq!(tracks[0].cyclic_start, Some(0.25));
        assert_eq!(tracks[0].cyclic_end, Some(0.75));
    }

    #[test]
    fn shape_keeps_unknown_parameters() {
        let parametric: ParametricPayload = parse_object(
            "test",
            json!({
                "id": "p1",
                "shape": {"type": "cylinder", "materialId": "mat1", "radius": 2.5}
            }),
        )
        .unwrap();

        let shape = parametric.shape.unwrap();
        assert_eq!(shape.kind.as_deref(), Some("cylinder"));
        assert_eq!(shape.material_id.as_deref(), Some("mat1"));
        assert_eq!(shape.properties.get("radius"), Some(&json!(2.5)));
    }

    #[test]
    fn transform_accepts_12_and_16() {
        let twelve: Vec<f32> = (1..=12).map(|v| v as f32).collect();
        let m = transform_matrix(&twelve).unwrap();
        assert_eq!(m[0], 1.0);
        assert_eq!(m[11], 12.0);
        assert_eq!(&m[12..], &[0.0, 0.0, 0.0, 1.0]);

        let sixteen: Vec<f32> = (1..=16).map(|v| v as f32).collect();
        let m = transform_matrix(&sixteen).unwrap();
        assert_eq!(m[15], 16.0);

        assert!(transform_matrix(&[1.0, 2.0]).is_none());
    }
}
