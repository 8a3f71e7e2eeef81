use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;
use iced::widget::shader;
use iced::{keyboard, mouse, Element, Event, Length, Point, Rectangle};

use crate::loader::ModelSource;
use crate::render::{Primitive, RenderScene};
use crate::scene::{LinkSpec, NodeSpec};
use crate::viewport::{Viewport, ViewportEvent, ViewportState};

/// Camera navigation grabs, driven by the right mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Navigating {
    None,
    Rotate,
    Pan,
}

/// Widget-side state. Owns the headless [`Viewport`] plus the cursor
/// bookkeeping iced does not keep for us.
pub struct Viewport3dState {
    viewport: Viewport,
    source_installed: bool,
    scene_epoch: Option<u64>,
    navigating: Navigating,
    last_cursor: Option<Point>,
    modifiers: keyboard::Modifiers,
}

impl Default for Viewport3dState {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            source_installed: false,
            scene_epoch: None,
            navigating: Navigating::None,
            last_cursor: None,
            modifiers: keyboard::Modifiers::default(),
        }
    }
}

/// The viewport as an iced shader program. Inputs flow in as props
/// (the mirrored snapshot, the scene epoch and specs); everything the
/// viewport wants to say flows out through `on_events`.
///
/// Specs pushed through the widget must carry explicit handles, since
/// reconciliation matches on them.
pub struct Viewport3d<Message> {
    pub state: ViewportState,
    pub nodes: Arc<Vec<NodeSpec>>,
    pub links: Arc<Vec<LinkSpec>>,
    pub scene_epoch: u64,
    pub model_source: Option<Rc<dyn Fn() -> Box<dyn ModelSource>>>,
    pub on_events: Option<Rc<dyn Fn(Vec<ViewportEvent>) -> Message>>,
}

impl<Message> Viewport3d<Message> {
    fn reconcile(&self, state: &mut Viewport3dState, out: &mut Vec<ViewportEvent>) {
        let viewport = &mut state.viewport;

        let keep: HashSet<u64> = self.links.iter().map(|s| s.handle).collect();
        let stale: Vec<u64> = viewport
            .scene
            .links()
            .iter()
            .map(|l| l.handle)
            .filter(|h| !keep.contains(h))
            .collect();
        for handle in stale {
            out.extend(viewport.remove_link(handle));
        }

        let keep: HashSet<u64> = self.nodes.iter().map(|s| s.handle).collect();
        let stale: Vec<u64> = viewport
            .scene
            .nodes()
            .iter()
            .map(|n| n.handle)
            .filter(|h| !keep.contains(h))
            .collect();
        for handle in stale {
            out.extend(viewport.remove_node(handle));
        }

        for spec in self.nodes.iter() {
            if viewport.scene.node(spec.handle).is_none() {
                viewport.add_node(spec.clone());
            }
        }
        for spec in self.links.iter() {
            if viewport.scene.link(spec.handle).is_none() {
                viewport.add_link(spec.clone());
            }
        }
    }

    fn emit(
        &self,
        out: Vec<ViewportEvent>,
        redraw: bool,
    ) -> Option<shader::Action<Message>> {
        if !out.is_empty() {
            if let Some(cb) = &self.on_events {
                return Some(shader::Action::publish(cb(out)).and_capture());
            }
        }
        if redraw || !out.is_empty() {
            return Some(shader::Action::request_redraw().and_capture());
        }
        None
    }
}

fn local(cursor_pos: Point, bounds: Rectangle) -> Vec2 {
    Vec2::new(cursor_pos.x - bounds.x, cursor_pos.y - bounds.y)
}

/// Any point the container rejects, used for releases that land
/// outside the widget so in-flight drags cancel.
const OUTSIDE: Vec2 = Vec2::new(-1.0, -1.0);

impl<Message> shader::Program<Message> for Viewport3d<Message> {
    type State = Viewport3dState;
    type Primitive = Primitive;

    fn update(
        &self,
        state: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<shader::Action<Message>> {
        let mut out = Vec::new();

        if !state.source_installed {
            state.source_installed = true;
            if let Some(build) = &self.model_source {
                state.viewport = Viewport::new(build());
            }
            out.extend(state.viewport.register());
        }

        state.viewport.tick(bounds.width, bounds.height);

        if state.scene_epoch != Some(self.scene_epoch) {
            state.scene_epoch = Some(self.scene_epoch);
            self.reconcile(state, &mut out);
        }

        out.extend(state.viewport.update_state(self.state));

        if let Event::Keyboard(keyboard::Event::ModifiersChanged(mods)) = event {
            state.modifiers = *mods;
        }

        match event {
            Event::Keyboard(keyboard::Event::KeyPressed { key, .. }) => {
                out.extend(state.viewport.key_down(key));
                return self.emit(out, false);
            }
            Event::Keyboard(keyboard::Event::KeyReleased { key, .. }) => {
                out.extend(state.viewport.key_up(key));
                return self.emit(out, false);
            }
            _ => {}
        }

        let Some(cursor_pos) = cursor.position_in(bounds) else {
            match event {
                Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                    out.extend(state.viewport.pointer_up(OUTSIDE));
                    return self.emit(out, true);
                }
                Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Right)) => {
                    state.navigating = Navigating::None;
                    state.last_cursor = None;
                    return self.emit(out, true);
                }
                _ => {}
            }
            return self.emit(out, false);
        };

        match event {
            Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                let notches = match *delta {
                    mouse::ScrollDelta::Lines { y, .. } => y,
                    mouse::ScrollDelta::Pixels { y, .. } => y / 120.0,
                };
                if notches.abs() > f32::EPSILON {
                    let controls = state.viewport.controls;
                    controls.zoom(&mut state.viewport.cameras, notches);
                    return self.emit(out, true);
                }
            }
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                state.viewport.pointer_down(local(cursor_pos, bounds));
                return self.emit(out, true);
            }
            Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                out.extend(state.viewport.pointer_up(local(cursor_pos, bounds)));
                return self.emit(out, true);
            }
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Right)) => {
                state.navigating = if state.modifiers.shift() {
                    Navigating::Pan
                } else {
                    Navigating::Rotate
                };
                state.last_cursor = Some(cursor_pos);
                return self.emit(out, true);
            }
            Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Right)) => {
                if state.navigating != Navigating::None {
                    state.navigating = Navigating::None;
                    state.last_cursor = None;
                    return self.emit(out, true);
                }
            }
            Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                match state.navigating {
                    Navigating::None => {
                        state.viewport.pointer_move(local(cursor_pos, bounds));
                        state.last_cursor = Some(cursor_pos);
                        return self.emit(out, true);
                    }
                    Navigating::Rotate | Navigating::Pan => {
                        let last = state.last_cursor.unwrap_or(cursor_pos);
                        let delta =
                            Vec2::new(cursor_pos.x - last.x, cursor_pos.y - last.y);
                        let controls = state.viewport.controls;
                        if state.navigating == Navigating::Rotate {
                            controls.rotate(&mut state.viewport.cameras, delta);
                        } else {
                            let container = state.viewport.container;
                            controls.pan(&mut state.viewport.cameras, delta, &container);
                        }
                        state.last_cursor = Some(cursor_pos);
                        return self.emit(out, true);
                    }
                }
            }
            _ => {}
        }

        self.emit(out, false)
    }

    fn draw(&self, state: &Self::State, _cursor: mouse::Cursor, _bounds: Rectangle) -> Primitive {
        Primitive {
            scene: Arc::new(RenderScene::capture(&state.viewport.scene)),
            version: state.viewport.scene.geometry_version(),
            camera: state.viewport.camera(),
        }
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if cursor.position_in(bounds).is_none() {
            return mouse::Interaction::default();
        }
        if state.navigating != Navigating::None || state.viewport.selection.drag.is_dragging() {
            mouse::Interaction::Grabbing
        } else if state.viewport.selection.add_mode() || state.viewport.selection.link_mode() {
            mouse::Interaction::Crosshair
        } else if state.viewport.selection.state.hovered().is_some() {
            mouse::Interaction::Pointer
        } else {
            mouse::Interaction::default()
        }
    }
}

/// Builds the viewport element from the mirrored snapshot and the
/// current scene specs.
pub fn viewport_3d<'a, Message>(
    state: ViewportState,
    nodes: Arc<Vec<NodeSpec>>,
    links: Arc<Vec<LinkSpec>>,
    scene_epoch: u64,
    model_source: Option<Rc<dyn Fn() -> Box<dyn ModelSource>>>,
    on_events: impl Fn(Vec<ViewportEvent>) -> Message + 'static,
) -> Element<'a, Message>
where
    Message: 'a,
{
    iced::widget::shader::Shader::new(Viewport3d {
        state,
        nodes,
        links,
        scene_epoch,
        model_source,
        on_events: Some(Rc::new(on_events)),
    })
    .width(Length::Fill)
    .height(Length::Fill)
    .into()
}
