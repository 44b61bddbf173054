pub mod settle;
pub mod sliding_ring;

pub use settle::*;
pub use sliding_ring::*;
