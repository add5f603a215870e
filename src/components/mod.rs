//! Plain value components carried by entities.

pub mod transform;

pub use transform::{Coordinates, Transform};
