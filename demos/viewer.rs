//! Interactive viewer: a scene of placeholder crates and links, a
//! control sidebar mirroring the viewport snapshot, and an event log.
//!
//! Run with `cargo run --example viewer`. Left-click selects, F
//! frames, T toggles the camera; switch to the top view to drag nodes.

use std::rc::Rc;
use std::sync::Arc;

use glam::Vec3;
use iced::widget::{button, checkbox, column, container, row, scrollable, text};
use iced::{Element, Length, Size, Task};

use maquette::{
    loader::box_mesh, viewport_3d, CameraKind, EntityKind, LinkSpec, ModelSource, NodeSpec,
    StaticModelSource, ViewportEvent, ViewportState,
};

fn main() -> iced::Result {
    env_logger::init();
    iced::application(App::new, App::update, App::view)
        .title("Scene Viewer")
        .window_size(Size::new(1200.0, 800.0))
        .run()
}

#[derive(Debug, Clone)]
enum Message {
    Viewport(Vec<ViewportEvent>),
    ToggleCamera,
    Frame,
    Undo,
    AddMode(bool),
    LinkMode(bool),
    RemoveSelected,
}

struct App {
    state: ViewportState,
    nodes: Vec<NodeSpec>,
    links: Vec<LinkSpec>,
    scene_epoch: u64,
    next_handle: u64,
    can_undo: bool,
    log: Vec<String>,
}

fn demo_source() -> Box<dyn ModelSource> {
    let mut source = StaticModelSource::new();
    source.insert(
        "models/crate.glb",
        box_mesh(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.0, 1.0)),
    );
    source.insert(
        "models/pallet.glb",
        box_mesh(Vec3::new(-1.5, 0.0, -1.0), Vec3::new(1.5, 0.4, 1.0)),
    );
    Box::new(source)
}

impl App {
    fn new() -> Self {
        let nodes = vec![
            NodeSpec {
                handle: 1,
                position: [-4.0, 0.0, 0.0],
                model_url: Some("models/crate.glb".to_string()),
                reframe_on_model_load: false,
            },
            NodeSpec {
                handle: 2,
                position: [4.0, 0.0, 0.0],
                model_url: Some("models/pallet.glb".to_string()),
                reframe_on_model_load: false,
            },
            NodeSpec {
                handle: 3,
                position: [0.0, 0.0, 4.0],
                model_url: None,
                reframe_on_model_load: false,
            },
        ];
        let links = vec![LinkSpec {
            handle: 4,
            src_node: 1,
            dst_node: 2,
        }];

        Self {
            state: ViewportState::default(),
            nodes,
            links,
            scene_epoch: 1,
            next_handle: 5,
            can_undo: false,
            log: Vec::new(),
        }
    }

    fn push_log(&mut self, line: String) {
        self.log.push(line);
        if self.log.len() > 50 {
            self.log.remove(0);
        }
    }

    fn claim_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn apply_event(&mut self, event: ViewportEvent) {
        match event {
            ViewportEvent::Registered => self.push_log("viewport registered".to_string()),
            ViewportEvent::FramePress => {
                self.state.frame_count += 1;
            }
            ViewportEvent::ToggleCameraPress => {
                self.state.camera_type = self.state.camera_type.toggled();
            }
            ViewportEvent::CanUndoChanged(can) => {
                self.can_undo = can;
            }
            ViewportEvent::NodeAdd(p) => {
                let handle = self.claim_handle();
                self.nodes.push(NodeSpec {
                    handle,
                    position: [p.x, p.y, p.z],
                    model_url: Some("models/crate.glb".to_string()),
                    reframe_on_model_load: false,
                });
                self.scene_epoch += 1;
                self.push_log(format!("node {handle} added at {:.1},{:.1}", p.x, p.z));
            }
            ViewportEvent::NodeMove(handle, p) => {
                if let Some(spec) = self.nodes.iter_mut().find(|n| n.handle == handle) {
                    spec.position = [p.x, p.y, p.z];
                }
                self.push_log(format!("node {handle} moved to {:.1},{:.1}", p.x, p.z));
            }
            ViewportEvent::LinkAdd(src, dst) => {
                let handle = self.claim_handle();
                self.links.push(LinkSpec {
                    handle,
                    src_node: src,
                    dst_node: dst,
                });
                self.scene_epoch += 1;
                self.push_log(format!("link {src} -> {dst}"));
            }
            ViewportEvent::SelectionChange(selection) => {
                self.state.selection = selection;
                self.push_log(match selection {
                    Some(e) => format!("selected {:?} {}", e.kind, e.handle),
                    None => "selection cleared".to_string(),
                });
            }
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Viewport(events) => {
                for event in events {
                    self.apply_event(event);
                }
            }
            Message::ToggleCamera => {
                self.state.camera_type = self.state.camera_type.toggled();
            }
            Message::Frame => self.state.frame_count += 1,
            Message::Undo => self.state.undo_count += 1,
            Message::AddMode(on) => {
                self.state.add_mode = on;
                if on {
                    self.state.link_mode = false;
                }
            }
            Message::LinkMode(on) => {
                self.state.link_mode = on;
                if on {
                    self.state.add_mode = false;
                }
            }
            Message::RemoveSelected => {
                if let Some(selected) = self.state.selection {
                    match selected.kind {
                        EntityKind::Node => {
                            self.nodes.retain(|n| n.handle != selected.handle);
                            self.links.retain(|l| {
                                l.src_node != selected.handle && l.dst_node != selected.handle
                            });
                        }
                        EntityKind::Link => {
                            self.links.retain(|l| l.handle != selected.handle);
                        }
                    }
                    self.scene_epoch += 1;
                }
            }
        }
        Task::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let camera_label = match self.state.camera_type {
            CameraKind::Perspective => "Camera: Perspective (T)",
            CameraKind::Top => "Camera: Top (T)",
        };

        let mut undo = button("Undo");
        if self.can_undo {
            undo = undo.on_press(Message::Undo);
        }
        let mut remove = button("Remove selected");
        if self.state.selection.is_some() {
            remove = remove.on_press(Message::RemoveSelected);
        }

        let sidebar = column![
            button(camera_label).on_press(Message::ToggleCamera),
            button("Frame (F)").on_press(Message::Frame),
            undo,
            checkbox(self.state.add_mode)
                .label("Add mode")
                .on_toggle(Message::AddMode),
            checkbox(self.state.link_mode)
                .label("Link mode")
                .on_toggle(Message::LinkMode),
            remove,
            text("Log:"),
            scrollable(column(
                self.log.iter().map(|line| text(line).size(12).into())
            ))
            .height(Length::Fill),
        ]
        .spacing(8)
        .width(260);

        let viewport = viewport_3d(
            self.state,
            Arc::new(self.nodes.clone()),
            Arc::new(self.links.clone()),
            self.scene_epoch,
            Some(Rc::new(demo_source)),
            Message::Viewport,
        );

        container(row![sidebar, viewport].spacing(12))
            .padding(12)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}
