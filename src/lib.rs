//! Workspace and layout engine for a Wayland desktop compositor.
//!
//! The crate decides the position and size of every mapped window (view)
//! under floating, tiling, maximized, and fullscreen policies, and reacts to
//! workspace switches, output hotplug, and view lifecycle events. Protocol
//! plumbing, rendering, and input grabs live with the embedding compositor,
//! reached through the traits in [`desktop`].

pub mod common;
pub mod desktop;
pub mod geometry;
pub mod layout_engine;
pub mod model;
pub mod output;
pub mod workspace;

pub use desktop::{Desktop, ShellBackend};
pub use geometry::{Point, Rect, Size};
pub use layout_engine::{Edges, LayoutCommand, LayoutError, LayoutKind, LayoutOp};
pub use model::{View, ViewId, ViewState};
pub use output::{OutputHandle, OutputInfo};
pub use workspace::{Layer, Workspace};
