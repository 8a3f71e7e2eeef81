//! Interactive 3D viewport for node-and-link scenes, built on iced's
//! shader widget.
//!
//! The crate splits into a headless interaction core and a thin GPU
//! shell. [`viewport::Viewport`] composes the container, the two
//! cameras, the scene graph, picking, dragging, and hotkeys; it never
//! touches wgpu, so everything down to drag-undo semantics runs in
//! plain unit tests. [`widget::Viewport3d`] wraps the core as a
//! [`shader::Program`](iced::widget::shader::Program) and
//! [`render`] draws the snapshot it captures each frame.

pub mod camera;
pub mod container;
pub mod controls;
pub mod drag;
pub mod geom;
pub mod hotkeys;
pub mod loader;
pub mod pick;
pub mod render;
pub mod scene;
pub mod selection;
pub mod viewport;
pub mod widget;

pub use camera::{Camera, CameraKind, CameraSwitcher};
pub use container::Container;
pub use controls::Controls;
pub use loader::{LoadError, LoadResult, Mesh, ModelSource, StaticModelSource};
pub use pick::{EntityKind, EntityRef};
pub use scene::{LinkSpec, NodeSpec, Scene};
pub use viewport::{Viewport, ViewportEvent, ViewportEvents, ViewportState};
pub use widget::{viewport_3d, Viewport3d};
