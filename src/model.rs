pub mod tree;
pub mod view;

pub use tree::{Forest, NodeId};
pub use view::{View, ViewId, ViewState};
