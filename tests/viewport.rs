//! End-to-end scenarios driven entirely through the public viewport
//! API: pointer and key input in, scene mutations and events out.

use glam::{Vec2, Vec3};
use maquette::{
    loader::box_mesh, CameraKind, EntityRef, LinkSpec, NodeSpec, StaticModelSource, Viewport,
    ViewportEvent, ViewportState,
};

const W: f32 = 800.0;
const H: f32 = 600.0;

fn node_spec(handle: u64, position: [f32; 3]) -> NodeSpec {
    NodeSpec {
        handle,
        position,
        model_url: None,
        reframe_on_model_load: false,
    }
}

fn viewport() -> Viewport {
    let mut vp = Viewport::default();
    vp.tick(W, H);
    vp.register();
    vp
}

fn top_view(vp: &mut Viewport) -> ViewportState {
    let mut state = *vp.state();
    state.camera_type = CameraKind::Top;
    vp.update_state(state);
    vp.tick(W, H);
    state
}

/// Pixel over a ground point for the active top camera.
fn px_over(vp: &Viewport, world: Vec3) -> Vec2 {
    let cam = vp.camera();
    let half_h = cam.ortho_half_h;
    let half_w = half_h * cam.aspect;
    let ndc_x = (world.x - cam.eye.x) / half_w;
    let ndc_y = (cam.eye.z - world.z) / half_h;
    Vec2::new((ndc_x + 1.0) * W / 2.0, (1.0 - ndc_y) * H / 2.0)
}

fn click(vp: &mut Viewport, px: Vec2) -> Vec<ViewportEvent> {
    vp.pointer_move(px);
    vp.tick(W, H);
    vp.pointer_down(px);
    vp.pointer_up(px)
}

#[test]
fn click_selects_then_empty_click_clears() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [-3.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [3.0, 0.0, 0.0]));
    top_view(&mut vp);

    let px = px_over(&vp, Vec3::new(-3.0, 0.0, 0.0));
    let events = click(&mut vp, px);
    assert!(events.contains(&ViewportEvent::SelectionChange(Some(EntityRef::node(1)))));

    let empty = px_over(&vp, Vec3::new(0.0, 0.0, 2.0));
    let events = click(&mut vp, empty);
    assert!(events.contains(&ViewportEvent::SelectionChange(None)));
}

#[test]
fn drag_commits_and_undo_restores() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [-3.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [3.0, 0.0, 0.0]));
    let mut state = top_view(&mut vp);

    let from = px_over(&vp, Vec3::new(-3.0, 0.0, 0.0));
    let to = px_over(&vp, Vec3::new(-1.0, 0.0, 2.0));
    vp.pointer_move(from);
    vp.tick(W, H);
    vp.pointer_down(from);
    vp.pointer_move(to);
    let events = vp.pointer_up(to);

    let moved = events
        .iter()
        .any(|e| matches!(e, ViewportEvent::NodeMove(1, _)));
    assert!(moved);
    assert!(events.contains(&ViewportEvent::CanUndoChanged(true)));
    let after = vp.scene.node(1).map(|n| n.position()).unwrap_or_default();
    assert!((after.x - -1.0).abs() < 0.05 && (after.z - 2.0).abs() < 0.05);

    state.undo_count += 1;
    let events = vp.update_state(state);
    assert!(events
        .iter()
        .any(|e| matches!(e, ViewportEvent::NodeMove(1, p) if (p.x - -3.0).abs() < 1e-3)));
    assert!(events.contains(&ViewportEvent::CanUndoChanged(false)));
    let restored = vp.scene.node(1).map(|n| n.position()).unwrap_or_default();
    assert!((restored.x - -3.0).abs() < 1e-3);
}

#[test]
fn sub_threshold_drag_resolves_as_click() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [0.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [4.0, 0.0, 0.0]));
    top_view(&mut vp);

    let from = px_over(&vp, Vec3::ZERO);
    let to = from + Vec2::new(1.0, 0.0);
    vp.pointer_move(from);
    vp.tick(W, H);
    vp.pointer_down(from);
    vp.pointer_move(to);
    let events = vp.pointer_up(to);

    assert!(!events
        .iter()
        .any(|e| matches!(e, ViewportEvent::NodeMove(..))));
    assert!(events.contains(&ViewportEvent::SelectionChange(Some(EntityRef::node(1)))));
}

#[test]
fn drag_is_disabled_under_the_perspective_camera() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [0.0, 0.0, 0.0]));
    top_view(&mut vp);

    let mut state = *vp.state();
    state.camera_type = CameraKind::Perspective;
    vp.update_state(state);
    vp.tick(W, H);

    let before = vp.scene.node(1).map(|n| n.position()).unwrap_or_default();
    let center = Vec2::new(W / 2.0, H / 2.0);
    vp.pointer_move(center);
    vp.tick(W, H);
    vp.pointer_down(center);
    vp.pointer_move(center + Vec2::new(120.0, 0.0));
    let events = vp.pointer_up(center + Vec2::new(120.0, 0.0));

    assert!(!events
        .iter()
        .any(|e| matches!(e, ViewportEvent::NodeMove(..))));
    assert_eq!(
        vp.scene.node(1).map(|n| n.position()).unwrap_or_default(),
        before
    );
}

#[test]
fn add_mode_reports_ground_position_without_selecting() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [-3.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [3.0, 0.0, 0.0]));
    let mut state = top_view(&mut vp);

    state.add_mode = true;
    vp.update_state(state);
    vp.tick(W, H);

    let target = Vec3::new(-2.0, 0.0, 1.0);
    let px = px_over(&vp, target);
    let events = click(&mut vp, px);

    let added = events.iter().any(
        |e| matches!(e, ViewportEvent::NodeAdd(p) if (*p - target).length() < 0.05),
    );
    assert!(added);
    assert!(!events
        .iter()
        .any(|e| matches!(e, ViewportEvent::SelectionChange(_))));
}

#[test]
fn link_mode_pairs_selected_and_clicked_nodes() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [-3.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [3.0, 0.0, 0.0]));
    let mut state = top_view(&mut vp);

    state.selection = Some(EntityRef::node(1));
    state.link_mode = true;
    vp.update_state(state);
    vp.tick(W, H);

    let px = px_over(&vp, Vec3::new(3.0, 0.0, 0.0));
    let events = click(&mut vp, px);
    assert!(events.contains(&ViewportEvent::LinkAdd(1, 2)));
    // Link mode always releases the selection after a click.
    assert!(events.contains(&ViewportEvent::SelectionChange(None)));
}

#[test]
fn link_raycast_hits_the_shaft_between_nodes() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [-3.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [3.0, 0.0, 0.0]));
    vp.add_link(LinkSpec {
        handle: 9,
        src_node: 1,
        dst_node: 2,
    });
    top_view(&mut vp);

    let px = px_over(&vp, Vec3::new(0.0, 0.5, 0.0));
    let events = click(&mut vp, px);
    assert!(events.contains(&ViewportEvent::SelectionChange(Some(EntityRef::link(9)))));
}

#[test]
fn frame_request_fits_the_selected_node() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [-3.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [30.0, 0.0, 0.0]));
    let mut state = top_view(&mut vp);

    // Frame is applied before Selection within one snapshot, so the
    // selection lands first in its own update.
    state.selection = Some(EntityRef::node(1));
    vp.update_state(state);
    state.frame_count += 1;
    vp.update_state(state);

    assert!((vp.cameras.top.target.x - -3.0).abs() < 1e-4);

    state.selection = None;
    vp.update_state(state);
    state.frame_count += 1;
    vp.update_state(state);
    // Whole-scene framing centers between the two nodes.
    assert!((vp.cameras.top.target.x - 13.5).abs() < 1e-3);
}

#[test]
fn model_load_swaps_placeholder_and_reframes() {
    let mut source = StaticModelSource::new();
    source.insert(
        "models/crate.glb",
        box_mesh(Vec3::new(-4.0, 0.0, -4.0), Vec3::new(4.0, 6.0, 4.0)),
    );
    let mut vp = Viewport::new(Box::new(source));
    vp.tick(W, H);

    vp.add_node(NodeSpec {
        handle: 1,
        position: [0.0, 0.0, 0.0],
        model_url: Some("models/crate.glb".to_string()),
        reframe_on_model_load: true,
    });
    let before = vp.cameras.orbit.distance;
    vp.tick(W, H);

    let node = vp.scene.node(1);
    assert!(node.map(|n| n.model().is_some()).unwrap_or(false));
    assert!(vp.cameras.orbit.distance != before);
}

#[test]
fn failed_load_keeps_the_placeholder() {
    let mut source = StaticModelSource::new();
    source.insert_failure(
        "models/missing.glb",
        maquette::LoadError::Fetch {
            url: "models/missing.glb".to_string(),
            reason: "404".to_string(),
        },
    );
    let mut vp = Viewport::new(Box::new(source));
    vp.tick(W, H);

    vp.add_node(NodeSpec {
        handle: 1,
        position: [0.0, 0.0, 0.0],
        model_url: Some("models/missing.glb".to_string()),
        reframe_on_model_load: true,
    });
    vp.tick(W, H);

    let node = vp.scene.node(1);
    assert!(node.map(|n| n.model().is_none()).unwrap_or(false));
    assert!(node.map(|n| !n.is_loading()).unwrap_or(false));
}

#[test]
fn removing_a_linked_node_keeps_the_link_frozen() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [-3.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [3.0, 0.0, 0.0]));
    vp.add_link(LinkSpec {
        handle: 9,
        src_node: 1,
        dst_node: 2,
    });
    vp.tick(W, H);

    vp.remove_node(2);
    vp.tick(W, H);

    let link = vp.scene.link(9);
    assert!(link.is_some());
    let (_, dst) = link.map(|l| l.endpoints()).unwrap_or_default();
    assert!((dst.x - 3.0).abs() < 1e-4);
}

#[test]
fn camera_toggle_cancels_an_in_flight_drag() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [0.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [4.0, 0.0, 0.0]));
    let mut state = top_view(&mut vp);

    let from = px_over(&vp, Vec3::ZERO);
    vp.pointer_move(from);
    vp.tick(W, H);
    vp.pointer_down(from);
    vp.pointer_move(px_over(&vp, Vec3::new(2.0, 0.0, 0.0)));
    assert!(vp.selection.drag.is_dragging());

    state.camera_type = CameraKind::Perspective;
    vp.update_state(state);

    assert!(!vp.selection.drag.is_dragging());
    let position = vp.scene.node(1).map(|n| n.position()).unwrap_or_default();
    assert_eq!(position, Vec3::ZERO);
}

#[test]
fn stale_undo_after_external_move_clears_history_silently() {
    let mut vp = viewport();
    vp.add_node(node_spec(1, [-3.0, 0.0, 0.0]));
    vp.add_node(node_spec(2, [3.0, 0.0, 0.0]));
    let mut state = top_view(&mut vp);

    let from = px_over(&vp, Vec3::new(-3.0, 0.0, 0.0));
    let to = px_over(&vp, Vec3::new(0.0, 0.0, 0.0));
    vp.pointer_move(from);
    vp.tick(W, H);
    vp.pointer_down(from);
    vp.pointer_move(to);
    vp.pointer_up(to);

    // An outside collaborator moves the node after the drag.
    if let Some(node) = vp.scene.node_mut(1) {
        node.set_position(Vec3::new(5.0, 0.0, 5.0));
    }

    state.undo_count += 1;
    let events = vp.update_state(state);
    assert!(!events
        .iter()
        .any(|e| matches!(e, ViewportEvent::NodeMove(..))));
    assert!(events.contains(&ViewportEvent::CanUndoChanged(false)));
    let position = vp.scene.node(1).map(|n| n.position()).unwrap_or_default();
    assert_eq!(position, Vec3::new(5.0, 0.0, 5.0));
}
