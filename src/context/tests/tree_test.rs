//! Tree assembly scenarios.

use serde_json::json;

use crate::builder::SceneBuilder;
use crate::error::SceneError;
use crate::queue::RequestCategory;

use super::context;

#[test]
fn out_of_order_parents_resolve_through_retry() {
    let mut ctx = context();
    ctx.set_tree_node(json!([
        { "sid": "child", "parent": "B" },
        { "sid": "B", "parent": "A" },
        { "sid": "A" },
    ]))
    .unwrap();

    let errors = ctx.notify_finished_tree(true).unwrap();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let builder = ctx.builder();
    assert_eq!(builder.child_node_ids(None), vec!["A"]);
    assert_eq!(builder.child_node_ids(Some("A")), vec!["B"]);
    assert_eq!(builder.child_node_ids(Some("B")), vec!["child"]);
}

#[test]
fn single_child_element_collapses() {
    let mut ctx = context();
    ctx.set_tree_node(json!([
        { "sid": "wrapper", "entityId": "e1", "children": [1] },
        { "sid": "element", "children": [2] },
        { "sid": "leaf", "entityId": "e2" },
    ]))
    .unwrap();
    ctx.notify_finished_tree(true).unwrap();

    let builder = ctx.builder();
    assert!(!builder.node("element").unwrap().info.displayable);
    assert!(builder.node("wrapper").unwrap().info.displayable);
    assert!(builder.node("leaf").unwrap().info.displayable);
}

#[test]
fn collapse_inherits_explicit_hidden_both_ways() {
    // Parent hidden propagates to the collapsed child.
    let mut ctx = context();
    ctx.set_tree_node(json!([
        { "sid": "p", "entityId": "e", "visible": false, "children": [1] },
        { "sid": "c" },
        { "sid": "sibling", "entityId": "es" },
    ]))
    .unwrap();
    ctx.notify_finished_tree(true).unwrap();
    assert!(!ctx.builder().node("p").unwrap().info.visible);
    assert!(!ctx.builder().node("c").unwrap().info.visible);
    assert!(ctx.builder().node("sibling").unwrap().info.visible);

    // Child hidden propagates up to the parent.
    let mut ctx = context();
    ctx.set_tree_node(json!([
        { "sid": "p", "entityId": "e", "children": [1] },
        { "sid": "c", "visible": false },
    ]))
    .unwrap();
    ctx.notify_finished_tree(true).unwrap();
    assert!(!ctx.builder().node("p").unwrap().info.visible);
    assert!(!ctx.builder().node("c").unwrap().info.visible);
}

#[test]
fn node_without_sid_is_skipped_not_fatal() {
    let mut ctx = context();
    ctx.set_tree_node(json!([
        { "name": "anonymous" },
        { "sid": "ok" },
    ]))
    .unwrap();

    let errors = ctx.notify_finished_tree(true).unwrap();
    assert!(errors.contains(&SceneError::MissingNodeId));
    assert!(ctx.builder().has_node("ok"));
}

#[test]
fn suppressed_node_is_never_materialized() {
    let mut ctx = context();
    ctx.set_tree_node(json!([
        { "sid": "kept" },
        { "sid": "gone", "suppressed": true },
    ]))
    .unwrap();

    let errors = ctx.notify_finished_tree(true).unwrap();
    assert!(errors.is_empty());
    assert!(ctx.builder().has_node("kept"));
    assert!(!ctx.builder().has_node("gone"));
}

#[test]
fn unresolved_parent_reported_remaining_tree_built() {
    let mut ctx = context();
    ctx.set_tree_node(json!([
        { "sid": "orphan", "parent": "ghost" },
        { "sid": "fine" },
    ]))
    .unwrap();

    let errors = ctx.notify_finished_tree(true).unwrap();
    assert_eq!(
        errors,
        vec![SceneError::UnresolvedParent {
            sid: "orphan".into(),
            parent: "ghost".into(),
        }]
    );
    assert!(!ctx.builder().has_node("orphan"));
    assert!(ctx.builder().has_node("fine"));
}

#[test]
fn incoming_node_replaces_existing_one() {
    let mut ctx = context();
    ctx.set_tree_node(json!([{ "sid": "n", "name": "first" }]))
        .unwrap();
    ctx.notify_finished_tree(true).unwrap();

    ctx.set_tree_node(json!([{ "sid": "n", "name": "second" }]))
        .unwrap();
    ctx.notify_finished_tree(false).unwrap();

    let builder = ctx.builder();
    assert_eq!(
        builder.node("n").unwrap().info.name.as_deref(),
        Some("second")
    );
    // The replacement was flushed to the sink for view rebinding.
    assert_eq!(builder.replaced_node_updates(), &[vec!["n".to_string()]]);
}

#[test]
fn child_index_outside_batch_is_reported() {
    let mut ctx = context();
    ctx.set_tree_node(json!([{ "sid": "n", "children": [9] }]))
        .unwrap();

    let errors = ctx.notify_finished_tree(true).unwrap();
    assert_eq!(
        errors,
        vec![SceneError::ChildIndexOutOfRange {
            sid: "n".into(),
            index: 9,
        }]
    );
    assert!(ctx.builder().has_node("n"));
}

#[test]
fn partial_tree_restricts_to_wanted_nodes() {
    let mut ctx = context();
    ctx.set_tree_node(json!([
        { "sid": "A", "children": [1] },
        { "sid": "B", "entityId": "eb" },
    ]))
    .unwrap();
    ctx.notify_finished_tree(true).unwrap();

    ctx.mark_partial_tree(["C"]);
    ctx.set_tree_node(json!([
        { "sid": "C", "parent": "B" },
        { "sid": "unrelated" },
    ]))
    .unwrap();
    let errors = ctx.notify_finished_tree(false).unwrap();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    assert!(ctx.builder().has_node("C"));
    assert_eq!(ctx.builder().child_node_ids(Some("B")), vec!["C"]);
    // Nodes outside the wanted set stay out of a partial rebuild.
    assert!(!ctx.builder().has_node("unrelated"));
}

#[test]
fn partial_tree_without_built_ancestor_falls_back_to_full_set() {
    let mut ctx = context();
    ctx.mark_partial_tree(["X"]);
    ctx.set_tree_node(json!([
        { "sid": "X" },
        { "sid": "Y" },
    ]))
    .unwrap();
    ctx.notify_finished_tree(true).unwrap();

    // X has no ancestor anywhere, so the full root set was built.
    assert!(ctx.builder().has_node("X"));
    assert!(ctx.builder().has_node("Y"));
}

#[test]
fn shared_mesh_requested_exactly_once() {
    let mut ctx = context();
    ctx.set_tree_node(json!([
        { "sid": "n1", "meshId": "42" },
        { "sid": "n2", "meshId": "42" },
    ]))
    .unwrap();
    ctx.notify_finished_tree(true).unwrap();

    let meshes = ctx.queues().get(RequestCategory::Meshes);
    assert_eq!(meshes.pending_len(), 1);
    assert_eq!(meshes.global_len(), 1);
}

#[test]
fn non_array_tree_payload_is_rejected() {
    let mut ctx = context();
    let err = ctx
        .set_tree_node(json!({ "sid": "not-a-batch" }))
        .unwrap_err();
    assert!(matches!(err, SceneError::MalformedPayload { .. }));
}
