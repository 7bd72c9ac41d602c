use serde_json::json;

use crate::builder::MemorySceneBuilder;
use crate::context::SceneContext;

mod tree_test;
mod view_test;

/// Fresh context over the in-memory sink.
fn context() -> SceneContext<MemorySceneBuilder> {
    let _ = env_logger::builder().is_test(true).try_init();
    SceneContext::new(MemorySceneBuilder::new())
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_f32(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends one mesh-type entry carrying `payload` in encoding 0.
fn push_mesh_entry(buf: &mut Vec<u8>, id: u32, payload: &[u8]) {
    push_u32(buf, id);
    for i in 0..6 {
        push_f32(buf, i as f32);
    }
    push_u16(buf, 2);
    buf.push(0); // flags
    push_f32(buf, 1.0); // quality
    push_u32(buf, (payload.len() / 12) as u32); // point count
    push_u32(buf, 0); // element count
    buf.push(0); // encoding
    push_u32(buf, payload.len() as u32);
    buf.extend_from_slice(payload);
}

/// One-entry mesh batch with a small embedded payload.
fn mesh_batch(id: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    for i in 0..3 {
        push_f32(&mut payload, i as f32);
    }
    let mut buf = Vec::new();
    push_mesh_entry(&mut buf, id, &payload);
    buf
}

/// One-entry mesh batch whose geometry content is deferred.
fn deferred_mesh_batch(id: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    push_mesh_entry(&mut buf, id, &[]);
    buf
}

/// Builds a small base tree: `root` with children `a` and `b`, where
/// `root` requests `mesh_id`.
fn build_base_tree(ctx: &mut SceneContext<MemorySceneBuilder>, mesh_id: &str) {
    ctx.set_tree_node(json!([
        { "sid": "root", "meshId": mesh_id, "children": [1, 2] },
        { "sid": "a", "entityId": "ea" },
        { "sid": "b", "entityId": "eb" },
    ]))
    .unwrap();
    let errors = ctx.notify_finished_tree(true).unwrap();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}
