/// Scene-graph game engine kernel
///
/// Entities form a tree owned by a [`kernel::Scene`]; each keeps its pose
/// both relative to its parent and in world space. Components hang rendering,
/// physics, cameras, lights and behaviors off those entities.

pub mod command;
pub mod config;
pub mod demo;
pub mod error;
pub mod kernel;
pub mod math;
pub mod physics;
pub mod renderer;
