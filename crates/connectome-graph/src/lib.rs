pub mod edge;
pub mod groups;
pub mod layout;
pub mod node;
pub mod reconciler;
pub mod split_join;

pub use edge::*;
pub use groups::*;
pub use layout::*;
pub use node::*;
pub use reconciler::*;
pub use split_join::*;
