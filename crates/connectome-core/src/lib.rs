pub mod coloring;
pub mod config_manager;
pub mod error;
pub mod sets;
pub mod types;
pub mod workspace;

pub use coloring::*;
pub use config_manager::*;
pub use error::*;
pub use types::*;
pub use workspace::*;
