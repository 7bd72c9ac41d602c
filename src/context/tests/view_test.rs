//! View management scenarios.

use serde_json::json;

use crate::builder::SceneBuilder;
use crate::error::SceneError;

use super::context;

#[test]
fn first_view_seen_becomes_initial_and_builds_the_tree() {
    let mut ctx = context();
    ctx.set_view(json!({
        "viewId": "v1",
        "nodes": [{ "sid": "root", "children": [1] }, { "sid": "a", "entityId": "ea" }],
    }))
    .unwrap();

    assert_eq!(ctx.initial_view_id(), Some("v1"));
    // The initial view's payload doubles as a tree payload.
    assert!(ctx.builder().has_node("root"));
    assert_eq!(ctx.builder().child_node_ids(Some("root")), vec!["a"]);
}

#[test]
fn scene_default_overrides_first_seen() {
    let mut ctx = context();
    ctx.set_scene_root(json!({ "defaultViewId": "v2" })).unwrap();

    ctx.set_view(json!({
        "viewId": "v1",
        "nodes": [{ "sid": "stray" }],
    }))
    .unwrap();
    assert_eq!(ctx.initial_view_id(), None);
    // Non-initial view payloads stay deltas; no base tree was built.
    assert!(!ctx.builder().has_node("stray"));

    ctx.set_view(json!({ "viewId": "v2" })).unwrap();
    assert_eq!(ctx.initial_view_id(), Some("v2"));
}

#[test]
fn views_hide_but_never_delete_base_structure() {
    let mut ctx = context();
    ctx.set_view(json!({
        "viewId": "v1",
        "nodes": [
            { "sid": "root", "children": [1, 2] },
            { "sid": "a", "entityId": "ea" },
            { "sid": "b", "entityId": "eb" },
        ],
    }))
    .unwrap();
    ctx.notify_finished_view(json!({ "viewId": "v1" })).unwrap();

    // A later view references only child `a`.
    ctx.set_view(json!({
        "viewId": "v2",
        "nodes": [
            { "sid": "root", "children": [1] },
            { "sid": "a", "entityId": "ea" },
        ],
    }))
    .unwrap();
    ctx.notify_finished_view(json!({ "viewId": "v2" })).unwrap();

    // Base structure is intact: `b` is still a child of `root`.
    let children = ctx.builder().child_node_ids(Some("root"));
    assert!(children.contains(&"a".to_string()));
    assert!(children.contains(&"b".to_string()));

    // The absent child got an explicit hide record instead.
    let infos = ctx.builder().view_node_infos("v2").unwrap();
    let hidden = infos
        .iter()
        .find(|info| info.target == "b")
        .expect("expected a record for the absent child");
    assert_eq!(hidden.visible, Some(false));
}

#[test]
fn view_only_nodes_are_created_invisible() {
    let mut ctx = context();
    ctx.set_view(json!({
        "viewId": "v1",
        "nodes": [{ "sid": "root", "entityId": "er" }],
    }))
    .unwrap();
    ctx.notify_finished_view(json!({ "viewId": "v1" })).unwrap();

    ctx.set_view(json!({
        "viewId": "v2",
        "nodes": [{ "sid": "extra", "entityId": "ee", "visible": true }],
    }))
    .unwrap();
    ctx.notify_finished_view(json!({ "viewId": "v2" })).unwrap();

    // Created lazily for the view, invisible until activation.
    let node = ctx.builder().node("extra").expect("lazily created");
    assert!(!node.info.visible);

    // The activation record still carries the effective visibility.
    let infos = ctx.builder().view_node_infos("v2").unwrap();
    let record = infos.iter().find(|info| info.target == "extra").unwrap();
    assert_eq!(record.visible, Some(true));
}

#[test]
fn activation_list_is_flat_and_complete() {
    let mut ctx = context();
    ctx.set_view(json!({
        "viewId": "v1",
        "nodes": [
            { "sid": "root", "children": [1] },
            { "sid": "a", "entityId": "ea", "opacity": 0.5, "materialId": "m1" },
        ],
    }))
    .unwrap();
    ctx.notify_finished_view(json!({ "viewId": "v1" })).unwrap();

    let infos = ctx.builder().view_node_infos("v1").unwrap();
    let targets: Vec<&str> = infos.iter().map(|info| info.target.as_str()).collect();
    assert_eq!(targets, vec!["root", "a"]);
    assert_eq!(infos[1].opacity, Some(0.5));
    assert_eq!(infos[1].material_id.as_deref(), Some("m1"));
}

#[test]
fn view_deltas_accumulate_through_set_view_node() {
    let mut ctx = context();
    ctx.set_view(json!({
        "viewId": "v1",
        "nodes": [{ "sid": "root", "entityId": "er" }],
    }))
    .unwrap();
    ctx.set_view_node(json!({
        "viewId": "v1",
        "nodes": [{ "sid": "late", "entityId": "el" }],
    }))
    .unwrap();
    ctx.notify_finished_view(json!({ "viewId": "v1" })).unwrap();

    // The late delta made it into both the base tree (initial view) and
    // the activation list.
    assert!(ctx.builder().has_node("late"));
    let infos = ctx.builder().view_node_infos("v1").unwrap();
    assert!(infos.iter().any(|info| info.target == "late"));
}

#[test]
fn operations_on_unregistered_views_are_rejected() {
    let mut ctx = context();
    let err = ctx
        .set_view_node(json!({ "viewId": "nope", "nodes": [] }))
        .unwrap_err();
    assert_eq!(err, SceneError::UnknownView("nope".into()));

    let err = ctx
        .notify_finished_view(json!({ "viewId": "nope" }))
        .unwrap_err();
    assert_eq!(err, SceneError::UnknownView("nope".into()));
}

#[test]
fn view_group_finishes_once_all_views_built() {
    let mut ctx = context();
    ctx.set_view_group(json!({ "id": "g1", "views": ["v1", "v2"] }))
        .unwrap();

    let fired = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&fired);
    ctx.events()
        .view_group_finished
        .subscribe(move |id| sink.borrow_mut().push(id.clone()));

    ctx.set_view(json!({ "viewId": "v1", "nodes": [{ "sid": "r", "entityId": "e" }] }))
        .unwrap();
    ctx.set_view(json!({ "viewId": "v2" })).unwrap();

    ctx.notify_finished_view(json!({ "viewId": "v1" })).unwrap();
    assert!(fired.borrow().is_empty());

    ctx.notify_finished_view(json!({ "viewId": "v2" })).unwrap();
    assert_eq!(*fired.borrow(), vec!["g1".to_string()]);
    assert_eq!(ctx.builder().finalized_groups().len(), 1);
}

#[test]
fn active_camera_fires_for_the_initial_view() {
    let mut ctx = context();
    let fired = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&fired);
    ctx.events()
        .active_camera
        .subscribe(move |id| sink.borrow_mut().push(id.clone()));

    ctx.set_view(json!({
        "viewId": "v1",
        "cameraId": "cam1",
        "nodes": [{ "sid": "r", "entityId": "e" }],
    }))
    .unwrap();
    ctx.notify_finished_view(json!({ "viewId": "v1" })).unwrap();

    assert_eq!(*fired.borrow(), vec!["cam1".to_string()]);

    // A later camera payload for the same id does not re-fire.
    ctx.set_camera(json!({ "id": "cam1", "projection": "perspective" }))
        .unwrap();
    assert_eq!(fired.borrow().len(), 1);
}
