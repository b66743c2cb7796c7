//! Entity/connection data model and its setup-time resolution.

pub mod connection;
pub mod entity;
pub mod resolve;
pub mod wiring;

pub use connection::Connection;
pub use entity::{Entity, EntityKind};
pub use resolve::{Binding, BoundGraph, resolve};
pub use wiring::{EntityParams, EntitySpec, Normalized, PlantDescription, normalize};
