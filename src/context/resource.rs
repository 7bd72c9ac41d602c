//! Resource dependency tracking.
//!
//! Every fulfillment entry point follows the same shape: pop the fulfilled
//! id(s) from the category queue, apply the payload to the sink, cascade
//! any follow-up requests the fulfillment implies (each id exactly once),
//! and re-evaluate completion. Handlers tolerate any arrival order;
//! unsolicited payloads are applied without having been pending.

use serde_json::Value;

use crate::builder::{
    AnnotationInstance, CameraInfo, HighlightInfo, MaterialInfo, ParametricInfo, SceneBuilder,
    ShapeInfo, StyleInfo, SubmeshInfo, TextureAssignment,
};
use crate::context::progress::LoadPhase;
use crate::context::SceneContext;
use crate::error::{SceneError, SceneResult};
use crate::geometry::{decode_geometry_batch, GeometryDescriptor, GeometryKind};
use crate::payload::{
    self, AnnotationPayload, CameraPayload, HighlightPayload, MaterialPayload, ParametricPayload,
    ShapePayload, StylePayload,
};
use crate::queue::RequestCategory;

/// Widens a 3- or 4-component wire color to RGBA.
fn color4(values: Option<&Vec<f32>>) -> Option<[f32; 4]> {
    let values = values?;
    match values.len() {
        4 => Some([values[0], values[1], values[2], values[3]]),
        3 => Some([values[0], values[1], values[2], 1.0]),
        _ => None,
    }
}

fn vec3(values: Option<&Vec<f32>>) -> Option<[f32; 3]> {
    let values = values?;
    if values.len() == 3 {
        Some([values[0], values[1], values[2]])
    } else {
        None
    }
}

fn material_info(id: &str, payload: &MaterialPayload) -> MaterialInfo {
    MaterialInfo {
        id: id.to_owned(),
        name: payload.name.clone(),
        ambient: color4(payload.ambient.as_ref()),
        diffuse: color4(payload.diffuse.as_ref()),
        specular: color4(payload.specular.as_ref()),
        emissive: color4(payload.emissive.as_ref()),
        opacity: payload.opacity,
        glossiness: payload.glossiness,
        line_color: color4(payload.line_color.as_ref()),
        line_width: payload.line_width,
        textures: payload
            .textures
            .iter()
            .filter_map(|t| {
                t.image_id.as_ref().map(|image_id| TextureAssignment {
                    image_id: image_id.clone(),
                    kind: t.kind.clone(),
                    uv_channel: t.uv_channel.unwrap_or(0),
                })
            })
            .collect(),
    }
}

fn shape_info(payload: &ShapePayload) -> ShapeInfo {
    ShapeInfo {
        kind: payload.kind.clone(),
        material_id: payload.material_id.clone(),
        properties: payload.properties.clone(),
    }
}

fn style_info(payload: &StylePayload) -> StyleInfo {
    StyleInfo {
        id: payload.id.clone(),
        properties: payload.properties.clone(),
    }
}

fn annotation_instance(
    id: &str,
    payload: &AnnotationPayload,
    node_sid: Option<String>,
) -> AnnotationInstance {
    AnnotationInstance {
        annotation_id: id.to_owned(),
        node_sid,
        kind: payload.kind.clone(),
        text: payload.text.clone(),
        points: payload.points.clone(),
        material_id: payload.material_id.clone(),
    }
}

impl<S: SceneBuilder> SceneContext<S> {
    /// Applies a binary mesh batch.
    ///
    /// Each entry pops its mesh id and places a bounding-box submesh on
    /// every dependent node, so the scene is visible before detailed
    /// geometry lands. An entry whose payload is embedded feeds geometry
    /// assembly immediately; an entry with an empty payload leaves its
    /// geometry pending until a later `set_geometry` message carries it.
    pub fn set_mesh(&mut self, data: &[u8]) -> SceneResult<Vec<SceneError>> {
        let descriptors = decode_geometry_batch(data)?;
        let mut errors = Vec::new();

        for descriptor in descriptors {
            let mesh_id = descriptor.id.clone();
            let popped = self.queues.get_mut(RequestCategory::Meshes).pop(&mesh_id);
            let meta = popped.unwrap_or_else(|| self.request_meta());

            if let Some(sids) = self.mesh_nodes.get(&mesh_id) {
                let submesh = SubmeshInfo {
                    mesh_id: mesh_id.clone(),
                    geometry_id: descriptor.id.clone(),
                    bounding_box: descriptor.bounding_box,
                };
                for sid in sids.clone() {
                    self.builder.insert_submesh(&sid, &submesh);
                }
            }

            self.queues
                .get_mut(RequestCategory::Geometries)
                .push(descriptor.id.clone(), meta.clone());

            let deferred =
                descriptor.kind != GeometryKind::Box && descriptor.buffer.is_empty();
            if deferred {
                self.queues
                    .get_mut(RequestCategory::GeomMeshes)
                    .push(mesh_id, meta);
            } else {
                self.apply_geometry(&descriptor, &mut errors);
            }
        }

        self.check_scene_completion();
        Ok(errors)
    }

    /// Applies out-of-band geometry content.
    ///
    /// Same wire format as `set_mesh`; completes geometries a mesh batch
    /// left pending.
    pub fn set_geometry(&mut self, data: &[u8]) -> SceneResult<Vec<SceneError>> {
        let descriptors = decode_geometry_batch(data)?;
        let mut errors = Vec::new();
        for descriptor in descriptors {
            self.apply_geometry(&descriptor, &mut errors);
        }
        self.check_scene_completion();
        Ok(errors)
    }

    /// Decodes one descriptor and stores the result.
    ///
    /// The id is popped from the geometry queues whether or not decoding
    /// succeeds: a skipped geometry must never stall completion
    /// accounting.
    pub(crate) fn apply_geometry(
        &mut self,
        descriptor: &GeometryDescriptor,
        errors: &mut Vec<SceneError>,
    ) {
        self.queues
            .get_mut(RequestCategory::Geometries)
            .pop(&descriptor.id);
        self.queues
            .get_mut(RequestCategory::GeomMeshes)
            .pop(&descriptor.id);

        match self.factory.geometry_info(descriptor) {
            Some(info) => {
                self.builder.set_geometry(&info);
                self.fire_progress(LoadPhase::Geometry);
            }
            None => {
                log::warn!("geometry {} skipped: empty buffer", descriptor.id);
                errors.push(SceneError::EmptyGeometry(descriptor.id.clone()));
            }
        }
    }

    /// Applies a batch of materials.
    ///
    /// A material may enqueue texture requests, re-style nodes waiting on
    /// it, and release leader-lines or image-notes parked on it.
    pub fn set_material(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let payloads: Vec<MaterialPayload> = payload::parse_array("set_material", value)?;
        let mut errors = Vec::new();
        let meta = self.request_meta();

        for material in &payloads {
            let Some(id) = material.id.clone() else {
                errors.push(SceneError::MalformedPayload {
                    context: "set_material",
                    reason: "material without id".into(),
                });
                continue;
            };
            self.queues.get_mut(RequestCategory::Materials).pop(&id);
            self.builder.update_material(&material_info(&id, material));

            for texture in &material.textures {
                if let Some(image_id) = &texture.image_id {
                    Self::index_insert(&mut self.texture_materials, image_id, &id);
                    self.queues
                        .get_mut(RequestCategory::Textures)
                        .push(image_id.clone(), meta.clone());
                }
            }

            if let Some(sids) = self.material_nodes.get(&id) {
                for sid in sids.clone() {
                    self.builder.assign_material(&sid, &id);
                }
            }
            if let Some(parked) = self.material_annotations.remove(&id) {
                for instance in parked {
                    self.builder.insert_annotation(&instance);
                }
            }
        }

        self.check_scene_completion();
        Ok(errors)
    }

    /// Applies texture image content.
    pub fn set_image(&mut self, id: &str, data: &[u8]) -> SceneResult<Vec<SceneError>> {
        self.queues.get_mut(RequestCategory::Textures).pop(id);
        self.builder.set_image(id, data);

        if let Some(materials) = self.texture_materials.remove(id) {
            for material_id in materials {
                self.builder.resolve_material_texture(&material_id, id);
            }
        }

        self.check_scene_completion();
        Ok(Vec::new())
    }

    /// Applies thumbnail image content for a view.
    pub fn set_thumbnail(&mut self, id: &str, data: &[u8]) -> SceneResult<Vec<SceneError>> {
        self.queues.get_mut(RequestCategory::Thumbnails).pop(id);
        self.builder.set_image(id, data);
        self.check_scene_completion();
        Ok(Vec::new())
    }

    /// Applies a batch of parametric definitions.
    ///
    /// One parametric id can back many nodes; the definition is applied to
    /// each. Single-shape and composite forms may both reference
    /// materials, which are enqueued exactly once.
    pub fn set_parametric(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let payloads: Vec<ParametricPayload> = payload::parse_array("set_parametric", value)?;
        let mut errors = Vec::new();
        let meta = self.request_meta();

        for parametric in payloads {
            let Some(id) = parametric.id.clone() else {
                errors.push(SceneError::MalformedPayload {
                    context: "set_parametric",
                    reason: "parametric without id".into(),
                });
                continue;
            };
            self.queues.get_mut(RequestCategory::Parametric).pop(&id);

            let shapes: Vec<ShapeInfo> = parametric
                .shape
                .iter()
                .chain(parametric.shapes.iter())
                .map(shape_info)
                .collect();
            for shape in &shapes {
                if let Some(material_id) = &shape.material_id {
                    self.queues
                        .get_mut(RequestCategory::Materials)
                        .push(material_id.clone(), meta.clone());
                }
            }

            let info = ParametricInfo { id: id.clone(), shapes };
            if let Some(sids) = self.parametric_nodes.get(&id) {
                for sid in sids.clone() {
                    self.builder.set_parametric(&sid, &info);
                }
            }
        }

        self.check_scene_completion();
        Ok(errors)
    }

    /// Applies a batch of annotations.
    ///
    /// An annotation shared by several nodes is replayed once per
    /// dependent node, producing independent instances; one that arrived
    /// unsolicited is applied once, unbound. Leader-lines and image-notes
    /// whose material has not arrived yet are parked until it does.
    pub fn set_annotation(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let payloads: Vec<AnnotationPayload> = payload::parse_array("set_annotation", value)?;
        let mut errors = Vec::new();
        let meta = self.request_meta();

        for annotation in &payloads {
            let Some(id) = annotation.id.clone() else {
                errors.push(SceneError::MalformedPayload {
                    context: "set_annotation",
                    reason: "annotation without id".into(),
                });
                continue;
            };
            self.queues.get_mut(RequestCategory::Annotations).pop(&id);

            if let Some(style) = &annotation.line_style {
                self.builder.set_line_style(&style_info(style));
            }
            if let Some(style) = &annotation.fill_style {
                self.builder.set_fill_style(&style_info(style));
            }
            if let Some(style) = &annotation.text_style {
                self.builder.set_text_style(&style_info(style));
            }

            let node_sids = self.annotation_nodes.get(&id).cloned().unwrap_or_default();
            let instances: Vec<AnnotationInstance> = if node_sids.is_empty() {
                vec![annotation_instance(&id, annotation, None)]
            } else {
                node_sids
                    .into_iter()
                    .map(|sid| annotation_instance(&id, annotation, Some(sid)))
                    .collect()
            };

            for instance in instances {
                match &annotation.material_id {
                    Some(material_id) if !self.builder.material_exists(material_id) => {
                        self.material_annotations
                            .entry(material_id.clone())
                            .or_default()
                            .push(instance);
                        self.queues
                            .get_mut(RequestCategory::Materials)
                            .push(material_id.clone(), meta.clone());
                    }
                    _ => self.builder.insert_annotation(&instance),
                }
            }
        }

        self.check_scene_completion();
        Ok(errors)
    }

    /// Applies a highlight style.
    pub fn set_highlight(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let highlight: HighlightPayload = payload::parse_object("set_highlight", value)?;
        let id = highlight.id.ok_or(SceneError::MalformedPayload {
            context: "set_highlight",
            reason: "missing id".into(),
        })?;

        self.queues.get_mut(RequestCategory::Highlights).pop(&id);
        self.builder.insert_highlight(&HighlightInfo {
            id,
            properties: highlight.properties,
        });

        self.check_scene_completion();
        Ok(Vec::new())
    }

    /// Registers a camera.
    ///
    /// The initial view's activation camera fires the active-camera
    /// milestone the first time it becomes known.
    pub fn set_camera(&mut self, value: Value) -> SceneResult<Vec<SceneError>> {
        let camera: CameraPayload = payload::parse_object("set_camera", value)?;
        let id = camera.id.clone().ok_or(SceneError::MalformedPayload {
            context: "set_camera",
            reason: "missing id".into(),
        })?;

        self.builder.create_camera(&CameraInfo {
            id: id.clone(),
            projection: camera.projection.clone(),
            near_clip: camera.near_clip,
            far_clip: camera.far_clip,
            fov: camera.fov,
            zoom: camera.zoom,
            position: vec3(camera.position.as_ref()),
            target_direction: vec3(camera.target_direction.as_ref()),
            up_direction: vec3(camera.up_direction.as_ref()),
        });

        if !self.active_camera_fired {
            let is_initial_camera = self
                .initial_view_id
                .as_ref()
                .and_then(|view| self.views.get(view))
                .and_then(|state| state.info.camera_id.as_deref())
                == Some(id.as_str());
            if is_initial_camera {
                self.active_camera_fired = true;
                self.events.active_camera.notify(&id);
            }
        }

        self.check_scene_completion();
        Ok(Vec::new())
    }
}
