//! HTTP handlers for entity CRUD and listings.

pub mod entity;
pub use entity::*;
